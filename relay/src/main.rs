use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use engine_docker::DockerEngine;
use relay::{RelayConfig, RelayResult};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::fmt::time::FormatTime;

struct Elapsed(Instant);

impl FormatTime for Elapsed {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        let d = self.0.elapsed();
        let total_secs = d.as_secs();
        let mins = total_secs / 60;
        let secs = total_secs % 60;
        let millis = d.subsec_millis();
        write!(w, "[{mins:02}:{secs:02}:{millis:03}]")
    }
}

#[derive(Parser)]
#[command(name = "relay", version, about = "Room-scoped live editing relay")]
struct Cli {
    /// Path to a YAML config file
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
    /// Listen address, overriding the config file
    #[arg(long, env = "RELAY_LISTEN")]
    listen: Option<SocketAddr>,
    /// Shared channel name, overriding the config file
    #[arg(long, env = "RELAY_CHANNEL")]
    channel: Option<String>,
    /// Directory for per-run workspaces, overriding the config file
    #[arg(long, env = "RELAY_WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_timer(Elapsed(Instant::now()))
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> RelayResult<()> {
    let mut config = match &cli.config {
        Some(path) => relay::config::load(path).await?,
        None => RelayConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen = listen;
    }
    if let Some(channel) = cli.channel {
        config.channel = channel;
    }
    if let Some(workspace_root) = cli.workspace_root {
        config.workspace_root = workspace_root;
    }

    let engine = Arc::new(DockerEngine::connect()?);
    let listener = TcpListener::bind(config.listen).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate()).ok();
        let mut sigint = signal(SignalKind::interrupt()).ok();

        tokio::select! {
            _ = recv_signal(&mut sigterm) => info!("received SIGTERM, stopping"),
            _ = recv_signal(&mut sigint) => info!("received SIGINT, stopping"),
        }
        let _ = shutdown_tx.send(true);
    });

    relay::serve(config, engine, listener, shutdown_rx).await
}

async fn recv_signal(sig: &mut Option<tokio::signal::unix::Signal>) {
    match sig {
        Some(s) => {
            s.recv().await;
        }
        None => std::future::pending().await,
    }
}
