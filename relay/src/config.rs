use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};
use crate::languages::LanguageSpec;

pub(crate) const DEFAULT_PORT: u16 = 8080;
pub(crate) const DEFAULT_CHANNEL: &str = "editor";
pub(crate) const DEFAULT_WORKSPACE_ROOT: &str = "unsafe";
pub(crate) const DEFAULT_POLL_ATTEMPTS: u32 = 10;
pub(crate) const DEFAULT_POLL_DELAY_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the WebSocket listener binds to.
    pub listen: SocketAddr,
    /// Name of the shared channel every room multiplexes over.
    pub channel: String,
    /// Directory holding the per-run workspaces. Created at startup when
    /// missing.
    pub workspace_root: PathBuf,
    pub polling: PollingConfig,
    /// Entries merged over the built-in language table.
    pub languages: Option<HashMap<String, LanguageSpec>>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            channel: DEFAULT_CHANNEL.to_string(),
            workspace_root: PathBuf::from(DEFAULT_WORKSPACE_ROOT),
            polling: PollingConfig::default(),
            languages: None,
        }
    }
}

/// How long the dispatcher waits for a run to produce output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Maximum number of log collections per run.
    pub attempts: u32,
    /// Delay between consecutive collections, in milliseconds.
    pub delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_POLL_ATTEMPTS,
            delay_ms: DEFAULT_POLL_DELAY_MS,
        }
    }
}

impl PollingConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Load a relay config from a YAML file. Every field is optional; omitted
/// fields take the compiled-in defaults.
///
/// Relative paths in the config are resolved against the config file's parent
/// directory.
pub async fn load(path: &Path) -> RelayResult<RelayConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RelayError::Config(format!("read {}: {e}", path.display())))?;
    let mut config: RelayConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| RelayError::Config(format!("parse {}: {e}", path.display())))?;
    if let Some(config_dir) = path.parent() {
        config.resolve_relative_paths(config_dir);
    }
    Ok(config)
}

impl RelayConfig {
    /// Resolve relative paths against `config_dir` (the directory containing
    /// the YAML file).
    fn resolve_relative_paths(&mut self, config_dir: &Path) {
        if self.workspace_root.is_relative() {
            self.workspace_root = config_dir.join(&self.workspace_root);
        }
    }
}
