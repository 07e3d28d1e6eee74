#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("config error: {0}")]
    Config(String),

    #[error("engine error: {0}")]
    Engine(#[from] engine::EngineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;
