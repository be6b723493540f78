use thiserror::Error;

pub type Result<T> = std::result::Result<T, TamiError>;

#[derive(Debug, Error)]
pub enum TamiError {
    #[error("List not found: {0}")]
    ListNotFound(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Subtask not found")]
    SubtaskNotFound,

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transient write failure: {0}")]
    TransientWrite(String),

    #[error("Workspace not initialized")]
    WorkspaceNotInitialized,

    #[error("Invalid extraction payload: {0}")]
    InvalidExtraction(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl TamiError {
    /// True when the error means a referenced row vanished underneath us,
    /// i.e. the caller was working from stale drag state.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ListNotFound(_) | Self::TaskNotFound(_))
    }

    /// True for best-effort write failures tolerated inside a move sequence.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientWrite(_))
    }
}
