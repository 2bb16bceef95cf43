//!
//! Error types for node construction, storage and command execution.
//!
//! Nothing in here is ever returned from a permission query: resolution
//! anomalies (cyclic inheritance, dangling group references) are absorbed by
//! the engine and only show up as `tracing` events.

/// Errors raised while constructing a [`crate::node::Node`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    /// The permission string was empty (or only whitespace).
    #[error("Node permission must not be empty")]
    EmptyPermission,
    /// A context entry had an empty key or value.
    #[error("Invalid context entry: {0}")]
    InvalidContext(String),
}

/// Failures reported by the persistence or audit collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The backend reported an I/O or query failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
    /// The backend is not accepting requests (e.g. shut down).
    #[error("Storage backend unavailable")]
    Unavailable,
}

/// Reasons a mutating command did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The identifier failed the naming constraint. No I/O was performed.
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
    /// Create was requested for a subject that already exists.
    #[error("{0} already exists")]
    AlreadyExists(String),
    /// The target of a delete or mutation could not be loaded.
    #[error("{0} does not exist")]
    DoesNotExist(String),
    /// The target may not be removed (the configured default group).
    #[error("{0} is protected and cannot be deleted")]
    Protected(String),
    #[error("Invalid node: {0}")]
    InvalidNode(#[from] NodeError),
    /// The backend answered `false` to a create request.
    #[error("Backend refused to create {0}")]
    CreateFailed(String),
    #[error("Backend refused to delete {0}")]
    DeleteFailed(String),
    #[error("Backend refused to save {0}")]
    SaveFailed(String),
    #[error(transparent)]
    Backend(#[from] StorageError),
}

impl CommandError {
    /// `true` for outcomes the caller caused (bad input, conflicts), as opposed
    /// to backend failures.
    pub fn is_invalid_args(&self) -> bool {
        matches!(
            self,
            CommandError::InvalidName(_)
                | CommandError::AlreadyExists(_)
                | CommandError::DoesNotExist(_)
                | CommandError::Protected(_)
                | CommandError::InvalidNode(_)
        )
    }
}

/// Errors raised while loading an [`crate::config::EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse engine config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid engine config: {0}")]
    Invalid(String),
}
