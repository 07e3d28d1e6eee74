use std::fmt;
use std::path::PathBuf;

/// Everything needed to create an isolated unit.
pub struct UnitSpec<'a> {
    /// Image reference; assumed present on the host.
    pub image: &'a str,
    /// Exec-form command run inside the unit.
    pub command: &'a [String],
    /// Host directories mounted into the unit.
    pub binds: &'a [BindMount],
}

/// One host directory mounted into the unit, read-write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host_path: PathBuf,
    pub guest_path: String,
}

/// Opaque backend-assigned handle to a created unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitId(pub String);

impl UnitId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
