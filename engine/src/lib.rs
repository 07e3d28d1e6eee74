mod engine;
mod error;
mod types;

pub use engine::Engine;
pub use error::{EngineError, Result};
pub use types::{BindMount, UnitId, UnitSpec};
