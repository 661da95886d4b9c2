use thiserror::Error;

/// Errors surfaced by a layout pass.
///
/// Dangling references, missing live anchors, and unmet grid row targets are
/// deliberately not errors: they degrade to omissions or best-effort results
/// so a partial diagram still renders.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// The external layered layout engine rejected the graph or failed
    /// internally. Terminal for the pass; no partial layout is produced.
    #[error("layered engine failed: {0}")]
    EngineFailed(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;

impl LayoutError {
    pub fn engine<E: std::fmt::Display>(err: E) -> Self {
        LayoutError::EngineFailed(err.to_string())
    }
}
