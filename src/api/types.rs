use serde::{Deserialize, Serialize};

/// Urlencoded body of `POST /submit`
#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub encrypted_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub queue_depth: Option<usize>,
}
