use thiserror::Error;

/// Failures of the lifecycle core. Expected publish outcomes (deadline not
/// expired and friends) are *not* errors; see `grading::PublishOutcome`.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A feedback set would be persisted in a state that breaks the model
    /// invariants. Never auto-corrected.
    #[error("{0}")]
    Validation(String),

    /// The selected groups did not match what the caller is allowed to act
    /// on. The whole batch is rejected before any write.
    #[error("selected groups do not match the accessible set: {0}")]
    UnauthorizedSelection(String),

    /// A new attempt was requested for a group that does not exist. Only the
    /// automatic first attempt may be created alongside a new group.
    #[error("a new attempt requires an existing group")]
    GroupRequired,

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

impl LifecycleError {
    /// Stable code for the IPC error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::Validation(_) => "validation_failed",
            LifecycleError::UnauthorizedSelection(_) => "unauthorized_selection",
            LifecycleError::GroupRequired => "group_required",
            LifecycleError::NotFound(_) => "not_found",
            LifecycleError::Database(_) => "db_operation_failed",
        }
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
