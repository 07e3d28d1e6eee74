//! In-process pub/sub channel carrying serialized envelopes.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::warn;

use crate::envelope::{BusError, Envelope, encode};

/// Buffered payloads per subscriber before the oldest are dropped.
const CHANNEL_CAPACITY: usize = 64;

/// Handle to the shared channel. Clone is cheap; all clones publish into the
/// same stream.
#[derive(Clone)]
pub struct Bus {
    name: Arc<str>,
    tx: broadcast::Sender<Arc<str>>,
}

impl Bus {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            name: name.into().into(),
            tx,
        }
    }

    /// Channel name for this deployment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialize and publish an envelope. Publishing with no live
    /// subscribers drops the payload silently.
    pub fn publish(&self, envelope: &Envelope) -> Result<(), BusError> {
        let payload: Arc<str> = encode(envelope)?.into();
        let _ = self.tx.send(payload);
        Ok(())
    }

    /// Open a new cursor over the stream. Only payloads published after this
    /// call are observed.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            channel: Arc::clone(&self.name),
            rx: self.tx.subscribe(),
        }
    }
}

/// A subscriber's cursor over the shared channel.
pub struct Subscription {
    channel: Arc<str>,
    rx: broadcast::Receiver<Arc<str>>,
}

impl Subscription {
    /// Receive the next payload in publish order. Returns `None` once every
    /// `Bus` handle has been dropped. A lagged subscriber skips the dropped
    /// payloads and keeps reading.
    pub async fn next(&mut self) -> Option<Arc<str>> {
        loop {
            match self.rx.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "subscriber lagged, messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::decode;

    #[tokio::test]
    async fn subscriber_receives_published_envelope() {
        let bus = Bus::new("editor");
        let mut sub = bus.subscribe();

        bus.publish(&Envelope::edit("default", "x = 1")).unwrap();

        let payload = sub.next().await.unwrap();
        let env = decode(&payload).unwrap();
        assert_eq!(env.room, "default");
        assert_eq!(env.full_text.as_deref(), Some("x = 1"));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let bus = Bus::new("editor");
        bus.publish(&Envelope::edit("default", "dropped")).unwrap();
    }

    #[tokio::test]
    async fn each_subscriber_gets_a_copy() {
        let bus = Bus::new("editor");
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(&Envelope::edit("r", "hello")).unwrap();

        let pa = a.next().await.unwrap();
        let pb = b.next().await.unwrap();
        assert_eq!(pa, pb);
    }

    #[tokio::test]
    async fn publish_order_preserved_per_subscriber() {
        let bus = Bus::new("editor");
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.publish(&Envelope::edit("r", format!("t{i}"))).unwrap();
        }

        for i in 0..5 {
            let payload = sub.next().await.unwrap();
            let env = decode(&payload).unwrap();
            assert_eq!(env.full_text.as_deref(), Some(format!("t{i}").as_str()));
        }
    }

    #[tokio::test]
    async fn next_returns_none_after_bus_dropped() {
        let bus = Bus::new("editor");
        let mut sub = bus.subscribe();
        drop(bus);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn clones_share_the_stream() {
        let bus = Bus::new("editor");
        let publisher = bus.clone();
        let mut sub = bus.subscribe();

        publisher.publish(&Envelope::edit("r", "from clone")).unwrap();

        let payload = sub.next().await.unwrap();
        assert!(payload.contains("from clone"));
    }
}
