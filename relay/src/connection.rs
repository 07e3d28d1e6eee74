//! Outbound capability the room registry holds for every registered client.

use async_trait::async_trait;

/// Delivery failed because the remote endpoint is gone or the transport
/// refused the write.
#[derive(Debug, thiserror::Error)]
#[error("send failed: {0}")]
pub(crate) struct SendError(pub String);

/// One registered client, seen from the delivery side.
///
/// The registry never reads from a connection; inbound traffic is driven by
/// the socket task that owns the read half.
#[async_trait]
pub(crate) trait Connection: Send + Sync {
    /// Stable identity used for membership bookkeeping.
    fn id(&self) -> &str;

    /// Deliver one payload to the remote endpoint.
    async fn send(&self, payload: &str) -> Result<(), SendError>;

    /// Whether the transport still considers the remote reachable. A closed
    /// connection stays registered until a delivery to it fails.
    fn is_open(&self) -> bool;
}
