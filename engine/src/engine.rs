use async_trait::async_trait;

use crate::error::Result;
use crate::types::{UnitId, UnitSpec};

/// Lifecycle of an isolated execution unit.
///
/// A unit is created from a [`UnitSpec`], started, observed through its
/// collected output, then stopped and removed. Implementations must be safe
/// to share across tasks; every method takes `&self`.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Human-readable name for this backend (e.g. "docker").
    fn name(&self) -> &str;

    /// Create a unit without starting it. Bind-mounts from the spec are
    /// wired up here so the mounted paths are visible when the command runs.
    async fn create(&self, spec: &UnitSpec<'_>) -> Result<UnitId>;

    /// Start a created unit.
    async fn start(&self, unit: &UnitId) -> Result<()>;

    /// Collect everything the unit has written to stdout and stderr so far.
    /// Does not wait for the unit to exit.
    async fn logs(&self, unit: &UnitId) -> Result<String>;

    /// Stop a running unit. Stopping a unit that already exited is not an
    /// error.
    async fn stop(&self, unit: &UnitId) -> Result<()>;

    /// Remove a stopped unit and release its resources. Removing a unit that
    /// is already gone is not an error.
    async fn remove(&self, unit: &UnitId) -> Result<()>;
}
