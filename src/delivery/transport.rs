use crate::delivery::error::DeliveryResult;
use crate::delivery::recipient::RecipientId;
use futures::future::BoxFuture;

/// An asynchronous push-messaging backend.
///
/// Returns a boxed future so the transport can be shared as
/// `Arc<dyn DeliveryTransport>` across the runtime boundary.
pub trait DeliveryTransport: Send + Sync + 'static {
    fn send<'a>(&'a self, recipient: &'a RecipientId, text: &'a str)
        -> BoxFuture<'a, DeliveryResult<()>>;

    /// Name used in logs
    fn name(&self) -> &'static str;
}
