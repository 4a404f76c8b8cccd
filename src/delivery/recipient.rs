use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one delivery target (a chat id for the Telegram transport)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RecipientId(String);

impl RecipientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RecipientId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<RecipientId> for String {
    fn from(id: RecipientId) -> Self {
        id.0
    }
}

impl From<&str> for RecipientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<i64> for RecipientId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Fixed, ordered set of recipients every entry fans out to.
///
/// Built once at startup; duplicates are dropped keeping first occurrence,
/// blank ids are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientSet {
    members: Vec<RecipientId>,
}

impl RecipientSet {
    pub fn new<I, R>(ids: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RecipientId>,
    {
        let mut members: Vec<RecipientId> = Vec::new();
        for id in ids.into_iter().map(Into::into) {
            if !id.as_str().is_empty() && !members.contains(&id) {
                members.push(id);
            }
        }
        Self { members }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecipientId> {
        self.members.iter()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<'a> IntoIterator for &'a RecipientSet {
    type Item = &'a RecipientId;
    type IntoIter = std::slice::Iter<'a, RecipientId>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_preserved_and_duplicates_dropped() {
        let set = RecipientSet::new(["797316319", "42", " 797316319 ", "", "7"]);

        let ids: Vec<&str> = set.iter().map(RecipientId::as_str).collect();
        assert_eq!(ids, vec!["797316319", "42", "7"]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_numeric_ids() {
        let set = RecipientSet::new([797316319i64, -1001234567890]);
        assert_eq!(
            set.iter().last().unwrap(),
            &RecipientId::from("-1001234567890")
        );
    }

    #[test]
    fn test_empty_set() {
        assert!(RecipientSet::new(Vec::<String>::new()).is_empty());
        assert!(RecipientSet::new(vec![" ".to_string()]).is_empty());
    }

    #[test]
    fn test_owned_strings() {
        let set = RecipientSet::new(vec![" 42 ".to_string(), "42".to_string()]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.iter().next().unwrap().as_str(), "42");
    }

    #[test]
    fn test_deserialize_trims_like_new() {
        let id: RecipientId = serde_json::from_str(r#"" 42 ""#).unwrap();
        assert_eq!(id, RecipientId::from(" 42 "));
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""42""#);
    }
}
