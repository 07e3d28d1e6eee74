#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("backend not available: {0}")]
    Unavailable(String),

    #[error("unit creation failed: {0}")]
    CreateFailed(String),

    #[error("unit start failed: {0}")]
    StartFailed(String),

    #[error("log collection failed: {0}")]
    LogsFailed(String),

    #[error("unit stop failed: {0}")]
    StopFailed(String),

    #[error("unit removal failed: {0}")]
    RemoveFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
