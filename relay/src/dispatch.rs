//! Execution dispatcher: runs submitted source inside an ephemeral engine
//! unit and folds the captured output back into the envelope.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bus::Envelope;
use engine::{BindMount, Engine, UnitId, UnitSpec};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PollingConfig;
use crate::error::RelayResult;
use crate::languages::{GUEST_CODE_DIR, LanguageRegistry, LanguageSpec};

pub(crate) struct Dispatcher {
    engine: Arc<dyn Engine>,
    languages: LanguageRegistry,
    workspace_root: PathBuf,
    polling: PollingConfig,
    in_flight: watch::Sender<usize>,
}

impl Dispatcher {
    pub(crate) fn new(
        engine: Arc<dyn Engine>,
        languages: LanguageRegistry,
        workspace_root: PathBuf,
        polling: PollingConfig,
    ) -> Self {
        Self {
            engine,
            languages,
            workspace_root,
            polling,
            in_flight: watch::Sender::new(0),
        }
    }

    /// Run the envelope's source and attach what the unit printed.
    ///
    /// On success the captured output replaces the source text. A request this
    /// dispatcher cannot or could not serve (unknown language, missing source,
    /// sandbox failure) leaves the envelope exactly as it arrived; the
    /// submitter is never sent an error.
    pub(crate) async fn dispatch(&self, envelope: &mut Envelope) {
        let Some(language) = envelope.language.as_deref() else {
            debug!(room = %envelope.room, "run request without a language, skipping");
            return;
        };
        let Some(spec) = self.languages.get(language) else {
            debug!(room = %envelope.room, language, "unsupported language, skipping");
            return;
        };
        let Some(source) = envelope.full_text.as_deref() else {
            debug!(room = %envelope.room, language, "run request without source text, skipping");
            return;
        };

        let _guard = self.track();
        match self.execute(spec, source).await {
            Ok(output) => {
                envelope.results = Some(output);
                envelope.full_text = None;
            }
            Err(e) => {
                warn!(room = %envelope.room, language, error = %e, "execution failed");
            }
        }
    }

    /// Wait until every in-flight execution has finished its cleanup.
    pub(crate) async fn drain(&self) {
        let mut rx = self.in_flight.subscribe();
        while *rx.borrow_and_update() != 0 {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    fn track(&self) -> InFlightGuard {
        self.in_flight.send_modify(|n| *n += 1);
        InFlightGuard {
            counter: self.in_flight.clone(),
        }
    }

    async fn execute(&self, spec: &LanguageSpec, source: &str) -> RelayResult<String> {
        let workspace = Workspace::allocate(&self.workspace_root, &spec.ext).await?;

        // Run inside the unit, then release the workspace regardless of
        // outcome.
        let result = self.run_in_unit(&workspace, spec, source).await;
        workspace.release().await;
        result
    }

    async fn run_in_unit(
        &self,
        workspace: &Workspace,
        spec: &LanguageSpec,
        source: &str,
    ) -> RelayResult<String> {
        tokio::fs::write(workspace.runfile_path(), source).await?;

        let command = spec.command_for(workspace.runfile());
        let binds = [workspace.bind()];
        let unit = self
            .engine
            .create(&UnitSpec {
                image: &spec.image,
                command: &command,
                binds: &binds,
            })
            .await?;
        info!(run = %workspace.name(), unit = %unit, image = %spec.image, "unit created");

        if let Err(e) = self.engine.start(&unit).await {
            self.release_unit(&unit).await;
            return Err(e.into());
        }

        let output = self.poll_output(&unit).await;
        info!(run = %workspace.name(), unit = %unit, bytes = output.len(), "run finished");

        self.release_unit(&unit).await;
        Ok(output)
    }

    /// Collect output, retrying on an empty read. The first non-empty read
    /// wins; when the budget runs out, whatever was last observed stands,
    /// empty included.
    async fn poll_output(&self, unit: &UnitId) -> String {
        let mut last = String::new();
        for attempt in 1..=self.polling.attempts {
            match self.engine.logs(unit).await {
                Ok(output) if !output.is_empty() => return output,
                Ok(output) => last = output,
                Err(e) => {
                    warn!(unit = %unit, attempt, error = %e, "log collection failed")
                }
            }
            if attempt < self.polling.attempts {
                tokio::time::sleep(self.polling.delay()).await;
            }
        }
        last
    }

    /// Best-effort stop and remove. Failures are logged, never propagated.
    async fn release_unit(&self, unit: &UnitId) {
        if let Err(e) = self.engine.stop(unit).await {
            warn!(unit = %unit, error = %e, "unit stop failed");
        }
        if let Err(e) = self.engine.remove(unit).await {
            warn!(unit = %unit, error = %e, "unit removal failed");
        }
    }
}

/// Decrements the in-flight count when an execution ends, however it ends.
struct InFlightGuard {
    counter: watch::Sender<usize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.send_modify(|n| *n = n.saturating_sub(1));
    }
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

/// Per-request directory holding the persisted source, bind-mounted into the
/// unit at [`GUEST_CODE_DIR`].
struct Workspace {
    dir: PathBuf,
    runfile: String,
}

impl Workspace {
    /// Create `root/run-<uuid>` for one request. The random name keeps
    /// concurrent requests from colliding.
    async fn allocate(root: &Path, ext: &str) -> RelayResult<Self> {
        let dir = root.join(format!("run-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            runfile: format!("run.{ext}"),
        })
    }

    fn name(&self) -> &str {
        self.dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("run")
    }

    fn runfile(&self) -> &str {
        &self.runfile
    }

    fn runfile_path(&self) -> PathBuf {
        self.dir.join(&self.runfile)
    }

    fn bind(&self) -> BindMount {
        BindMount {
            host_path: self.dir.clone(),
            guest_path: GUEST_CODE_DIR.to_string(),
        }
    }

    /// Delete the directory and everything in it. Failures are logged, never
    /// propagated.
    async fn release(self) {
        if let Err(e) = tokio::fs::remove_dir_all(&self.dir).await {
            warn!(run = %self.name(), error = %e, "workspace removal failed");
        }
    }
}
