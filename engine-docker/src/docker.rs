//! Docker daemon backend for the execution engine.

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, LogsOptionsBuilder, RemoveContainerOptionsBuilder,
    StopContainerOptionsBuilder,
};
use engine::{BindMount, Engine, EngineError, Result, UnitId, UnitSpec};
use futures_util::StreamExt;
use tracing::debug;
use uuid::Uuid;

/// Seconds the daemon waits for the unit to exit before killing it on stop.
const STOP_TIMEOUT_SECS: i32 = 5;

/// Execution engine backed by a local Docker daemon.
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connect with the platform defaults (unix socket on Linux).
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;
        Ok(Self { docker })
    }
}

#[async_trait]
impl Engine for DockerEngine {
    fn name(&self) -> &str {
        "docker"
    }

    async fn create(&self, spec: &UnitSpec<'_>) -> Result<UnitId> {
        let binds: Vec<String> = spec.binds.iter().map(format_bind).collect();
        let body = ContainerCreateBody {
            image: Some(spec.image.to_string()),
            cmd: Some(spec.command.to_vec()),
            host_config: Some(HostConfig {
                binds: if binds.is_empty() { None } else { Some(binds) },
                ..HostConfig::default()
            }),
            ..ContainerCreateBody::default()
        };

        let name = format!("unit-{}", Uuid::new_v4());
        let response = self
            .docker
            .create_container(
                Some(CreateContainerOptionsBuilder::new().name(&name).build()),
                body,
            )
            .await
            .map_err(|e| EngineError::CreateFailed(e.to_string()))?;

        debug!(unit = %response.id, image = spec.image, "unit created");
        Ok(UnitId(response.id))
    }

    async fn start(&self, unit: &UnitId) -> Result<()> {
        self.docker
            .start_container(
                unit.as_str(),
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
            .map_err(|e| EngineError::StartFailed(e.to_string()))
    }

    async fn logs(&self, unit: &UnitId) -> Result<String> {
        let options = LogsOptionsBuilder::new().stdout(true).stderr(true).build();
        let mut stream = self.docker.logs(unit.as_str(), Some(options));

        let mut output = String::new();
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => return Err(EngineError::LogsFailed(e.to_string())),
            }
        }
        Ok(output)
    }

    async fn stop(&self, unit: &UnitId) -> Result<()> {
        let options = StopContainerOptionsBuilder::new()
            .t(STOP_TIMEOUT_SECS)
            .build();
        match self.docker.stop_container(unit.as_str(), Some(options)).await {
            Ok(()) => Ok(()),
            // 304: the unit already exited on its own
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(EngineError::StopFailed(e.to_string())),
        }
    }

    async fn remove(&self, unit: &UnitId) -> Result<()> {
        let options = RemoveContainerOptionsBuilder::new()
            .force(true)
            .v(true)
            .build();
        match self
            .docker
            .remove_container(unit.as_str(), Some(options))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(EngineError::RemoveFailed(e.to_string())),
        }
    }
}

fn format_bind(bind: &BindMount) -> String {
    format!("{}:{}", bind.host_path.display(), bind.guest_path)
}

fn is_not_found(error: &BollardError) -> bool {
    matches!(
        error,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}
