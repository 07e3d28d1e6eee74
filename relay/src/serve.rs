//! Service wiring: build the room registry, dispatcher and relay task, then
//! accept sockets until told to stop.

use std::sync::Arc;

use bus::Bus;
use engine::Engine;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::broadcast;
use crate::config::RelayConfig;
use crate::dispatch::Dispatcher;
use crate::error::RelayResult;
use crate::languages::LanguageRegistry;
use crate::rooms::RoomRegistry;
use crate::router::InboundRouter;
use crate::ws;

/// Run the relay on an already-bound listener until `shutdown` fires or the
/// listener breaks.
///
/// Shutdown is graceful: the accept loop stops first, then in-flight
/// executions finish their cleanup, then the relay task is dropped. Sockets
/// still open at that point die with the process.
pub async fn serve(
    config: RelayConfig,
    engine: Arc<dyn Engine>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) -> RelayResult<()> {
    tokio::fs::create_dir_all(&config.workspace_root).await?;

    let mut languages = LanguageRegistry::defaults();
    if let Some(overrides) = &config.languages {
        languages.apply_overrides(overrides);
    }
    info!(languages = ?languages.names(), "language table ready");

    let bus = Bus::new(config.channel.as_str());
    let rooms = Arc::new(RoomRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(
        engine,
        languages,
        config.workspace_root.clone(),
        config.polling,
    ));
    let router = Arc::new(InboundRouter::new(bus.clone(), Arc::clone(&dispatcher)));

    let relay_task = tokio::spawn(broadcast::run(Arc::clone(&rooms), bus.subscribe()));

    let addr = listener.local_addr()?;
    info!(
        %addr,
        channel = %bus.name(),
        workspace_root = %config.workspace_root.display(),
        "relay listening"
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(ws::handle_socket(
                        stream,
                        peer,
                        Arc::clone(&rooms),
                        Arc::clone(&router),
                    ));
                }
                Err(e) => warn!(error = %e, "accept failed"),
            },
        }
    }

    drop(listener);
    info!("accept loop stopped, draining in-flight executions");
    dispatcher.drain().await;
    relay_task.abort();
    info!("relay stopped");
    Ok(())
}
