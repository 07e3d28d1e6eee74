//! Room-scoped live editing relay with sandboxed code execution.
//!
//! Clients join a room over two WebSocket endpoints: frames written to
//! `/submit/{room}` are republished to every socket registered on
//! `/receive/{room}`, so everyone in a room sees everyone else's edits. A
//! frame marked as a run request is executed first: the submitted source is
//! persisted to a throwaway workspace, run inside an ephemeral engine unit,
//! and the rebroadcast envelope carries the captured output in place of the
//! source text.
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), relay::RelayError> {
//! use std::sync::Arc;
//!
//! use engine_docker::DockerEngine;
//! use relay::RelayConfig;
//!
//! let config = RelayConfig::default();
//! let engine = Arc::new(DockerEngine::connect()?);
//! let listener = tokio::net::TcpListener::bind(config.listen).await?;
//! let (_shutdown, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! relay::serve(config, engine, listener, shutdown_rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod languages;

mod broadcast;
mod connection;
mod dispatch;
mod error;
mod rooms;
mod router;
mod serve;
mod ws;

pub use config::{PollingConfig, RelayConfig};
pub use error::{RelayError, RelayResult};
pub use serve::serve;
