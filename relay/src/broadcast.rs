//! Broadcast relay: drains the shared channel and fans each payload out to
//! the tagged room.

use std::sync::Arc;

use bus::Subscription;
use tracing::{debug, warn};

use crate::rooms::RoomRegistry;

/// Consume the channel until it closes. One payload at a time is read here;
/// deliveries run as their own tasks so a slow or dead socket never stalls
/// the loop or another room's traffic.
pub(crate) async fn run(rooms: Arc<RoomRegistry>, mut subscription: Subscription) {
    while let Some(payload) = subscription.next().await {
        deliver(&rooms, payload).await;
    }
    debug!("shared channel closed, relay loop ended");
}

/// Fan one payload out to every member of its room. Delivery is
/// fire-and-forget: nothing is reported back to the publisher, and a member
/// whose send fails is evicted so it is not retried on the next payload.
async fn deliver(rooms: &Arc<RoomRegistry>, payload: Arc<str>) {
    let Some(room) = bus::peek_room(&payload) else {
        debug!("dropping payload without a room tag");
        return;
    };

    let members = rooms.members(&room).await;
    debug!(room = %room, recipients = members.len(), "relaying payload");

    for conn in members {
        let rooms = Arc::clone(rooms);
        let payload = Arc::clone(&payload);
        let room = room.clone();
        tokio::spawn(async move {
            if let Err(e) = conn.send(&payload).await {
                warn!(room = %room, connection = %conn.id(), error = %e, "delivery failed, evicting");
                rooms.evict(&room, conn.id()).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bus::{Bus, Envelope};

    use super::*;
    use crate::connection::fake::FakeConnection;

    #[tokio::test]
    async fn delivers_to_every_member_of_the_tagged_room() {
        let rooms = Arc::new(RoomRegistry::new());
        let (a, mut rx_a) = FakeConnection::channel("a");
        let (b, mut rx_b) = FakeConnection::channel("b");
        rooms.register(a, "default").await;
        rooms.register(b, "default").await;

        let payload: Arc<str> = bus::encode(&Envelope::edit("default", "x = 1"))
            .unwrap()
            .into();
        deliver(&rooms, payload).await;

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        for got in [got_a, got_b] {
            let envelope = bus::decode(&got).unwrap();
            assert_eq!(envelope.room, "default");
            assert_eq!(envelope.full_text.as_deref(), Some("x = 1"));
        }
    }

    #[tokio::test]
    async fn other_rooms_see_nothing() {
        let rooms = Arc::new(RoomRegistry::new());
        let (a, mut rx_a) = FakeConnection::channel("a");
        let (b, mut rx_b) = FakeConnection::channel("b");
        rooms.register(a, "alpha").await;
        rooms.register(b, "beta").await;

        let payload: Arc<str> = bus::encode(&Envelope::edit("alpha", "hi")).unwrap().into();
        deliver(&rooms, payload).await;

        assert!(rx_a.recv().await.is_some());
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx_b.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn failed_delivery_evicts_only_that_connection() {
        let rooms = Arc::new(RoomRegistry::new());
        let (dead, _rx_dead) = FakeConnection::channel("dead");
        let (live, mut rx_live) = FakeConnection::channel("live");
        dead.fail_sends();
        rooms.register(dead, "default").await;
        rooms.register(live, "default").await;

        let payload: Arc<str> = bus::encode(&Envelope::edit("default", "still here"))
            .unwrap()
            .into();
        deliver(&rooms, payload).await;

        assert!(rx_live.recv().await.is_some());

        // eviction runs on a spawned task; give it a moment
        for _ in 0..100 {
            if rooms.members("default").await.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let members = rooms.members("default").await;
        assert_eq!(members.len(), 1);
        assert_eq!(members.first().unwrap().id(), "live");
    }

    #[tokio::test]
    async fn untagged_payload_is_dropped() {
        let rooms = Arc::new(RoomRegistry::new());
        let (a, mut rx_a) = FakeConnection::channel("a");
        rooms.register(a, "default").await;

        deliver(&rooms, Arc::from("not json")).await;
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx_a.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn run_relays_published_envelopes_until_the_bus_drops() {
        let bus = Bus::new("editor");
        let rooms = Arc::new(RoomRegistry::new());
        let (a, mut rx_a) = FakeConnection::channel("a");
        rooms.register(a, "default").await;

        let relay = tokio::spawn(run(Arc::clone(&rooms), bus.subscribe()));

        bus.publish(&Envelope::edit("default", "one")).unwrap();
        bus.publish(&Envelope::edit("default", "two")).unwrap();

        let first = bus::decode(&rx_a.recv().await.unwrap()).unwrap();
        let second = bus::decode(&rx_a.recv().await.unwrap()).unwrap();
        assert_eq!(first.full_text.as_deref(), Some("one"));
        assert_eq!(second.full_text.as_deref(), Some("two"));

        drop(bus);
        tokio::time::timeout(Duration::from_secs(1), relay)
            .await
            .unwrap()
            .unwrap();
    }
}
