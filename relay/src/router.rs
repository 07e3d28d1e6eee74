//! Inbound router: every frame read from a submit socket passes through
//! here on its way to the shared channel.

use std::sync::Arc;

use bus::{Bus, Kind};
use tracing::{debug, warn};

use crate::dispatch::Dispatcher;

pub(crate) struct InboundRouter {
    bus: Bus,
    dispatcher: Arc<Dispatcher>,
}

impl InboundRouter {
    pub(crate) fn new(bus: Bus, dispatcher: Arc<Dispatcher>) -> Self {
        Self { bus, dispatcher }
    }

    /// Route one raw frame from a connection joined to `room`.
    ///
    /// The room tag always comes from the connection's endpoint; whatever the
    /// frame itself claims is overwritten. Run requests go through the
    /// dispatcher first, so the envelope that reaches the channel already
    /// carries any captured output. Frames that fail to decode are dropped.
    pub(crate) async fn route(&self, room: &str, raw: &str) {
        let mut envelope = match bus::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(room = %room, error = %e, "dropping undecodable frame");
                return;
            }
        };
        envelope.room = room.to_string();

        if envelope.kind == Kind::Run {
            self.dispatcher.dispatch(&mut envelope).await;
        }

        if let Err(e) = self.bus.publish(&envelope) {
            warn!(room = %room, error = %e, "republish failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use engine::{Engine, UnitId, UnitSpec};

    use super::*;
    use crate::config::PollingConfig;
    use crate::languages::LanguageRegistry;

    /// Engine that always succeeds and returns a fixed output.
    struct CannedEngine {
        output: String,
    }

    #[async_trait::async_trait]
    impl Engine for CannedEngine {
        fn name(&self) -> &str {
            "canned"
        }
        async fn create(&self, _spec: &UnitSpec<'_>) -> engine::Result<UnitId> {
            Ok(UnitId("unit".to_string()))
        }
        async fn start(&self, _unit: &UnitId) -> engine::Result<()> {
            Ok(())
        }
        async fn logs(&self, _unit: &UnitId) -> engine::Result<String> {
            Ok(self.output.clone())
        }
        async fn stop(&self, _unit: &UnitId) -> engine::Result<()> {
            Ok(())
        }
        async fn remove(&self, _unit: &UnitId) -> engine::Result<()> {
            Ok(())
        }
    }

    fn router_with(bus: &Bus, output: &str, root: &Path) -> InboundRouter {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(CannedEngine {
                output: output.to_string(),
            }),
            LanguageRegistry::defaults(),
            root.to_path_buf(),
            PollingConfig {
                attempts: 1,
                delay_ms: 1,
            },
        ));
        InboundRouter::new(bus.clone(), dispatcher)
    }

    #[tokio::test]
    async fn endpoint_room_overrides_the_frame_room() {
        let bus = Bus::new("editor");
        let mut sub = bus.subscribe();
        let root = tempfile::tempdir().unwrap();
        let router = router_with(&bus, "", root.path());

        router
            .route("alpha", r#"{"room":"beta","full_text":"x = 1"}"#)
            .await;

        let envelope = bus::decode(&sub.next().await.unwrap()).unwrap();
        assert_eq!(envelope.room, "alpha");
        assert_eq!(envelope.full_text.as_deref(), Some("x = 1"));
    }

    #[tokio::test]
    async fn client_extras_ride_through_untouched() {
        let bus = Bus::new("editor");
        let mut sub = bus.subscribe();
        let root = tempfile::tempdir().unwrap();
        let router = router_with(&bus, "", root.path());

        router
            .route(
                "default",
                r#"{"id":"c-17","patch_text":"@@ -1 +1 @@","sync_needed":true}"#,
            )
            .await;

        let envelope = bus::decode(&sub.next().await.unwrap()).unwrap();
        assert_eq!(envelope.kind, Kind::Edit);
        assert_eq!(
            envelope.extra.get("id").and_then(|v| v.as_str()),
            Some("c-17")
        );
        assert_eq!(
            envelope.extra.get("patch_text").and_then(|v| v.as_str()),
            Some("@@ -1 +1 @@")
        );
        assert_eq!(
            envelope.extra.get("sync_needed").and_then(|v| v.as_bool()),
            Some(true)
        );
    }

    #[tokio::test]
    async fn run_frames_are_republished_with_results() {
        let bus = Bus::new("editor");
        let mut sub = bus.subscribe();
        let root = tempfile::tempdir().unwrap();
        let router = router_with(&bus, "1\n", root.path());

        router
            .route(
                "default",
                r#"{"type":"run","language":"Python","full_text":"print(1)"}"#,
            )
            .await;

        let envelope = bus::decode(&sub.next().await.unwrap()).unwrap();
        assert_eq!(envelope.kind, Kind::Run);
        assert_eq!(envelope.results.as_deref(), Some("1\n"));
        assert!(envelope.full_text.is_none());
    }

    #[tokio::test]
    async fn unsupported_language_republishes_the_frame_unchanged() {
        let bus = Bus::new("editor");
        let mut sub = bus.subscribe();
        let root = tempfile::tempdir().unwrap();
        let router = router_with(&bus, "unused", root.path());

        router
            .route(
                "default",
                r#"{"type":"run","language":"Befunge","full_text":"@"}"#,
            )
            .await;

        let envelope = bus::decode(&sub.next().await.unwrap()).unwrap();
        assert!(envelope.results.is_none());
        assert_eq!(envelope.full_text.as_deref(), Some("@"));
    }

    #[tokio::test]
    async fn undecodable_frames_publish_nothing() {
        let bus = Bus::new("editor");
        let mut sub = bus.subscribe();
        let root = tempfile::tempdir().unwrap();
        let router = router_with(&bus, "", root.path());

        router.route("default", "{not json").await;

        assert!(
            tokio::time::timeout(Duration::from_millis(50), sub.next())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn unknown_types_pass_through() {
        let bus = Bus::new("editor");
        let mut sub = bus.subscribe();
        let root = tempfile::tempdir().unwrap();
        let router = router_with(&bus, "unused", root.path());

        router
            .route("default", r#"{"type":"cursor","full_text":"irrelevant"}"#)
            .await;

        let envelope = bus::decode(&sub.next().await.unwrap()).unwrap();
        assert_eq!(envelope.kind, Kind::Other("cursor".to_string()));
        assert!(envelope.results.is_none());
    }
}
