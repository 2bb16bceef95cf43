//!
//! Command boundary.
//!
//! Outcome and causation types shared by every mutating operation, name
//! validation, and [`CommandExecutor`], the one place where the async storage
//! pipeline is joined synchronously.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::context::ContextSet;
use crate::error::CommandError;
use crate::storage::coordinator::StorageCoordinator;

/// Uniform outcome reported to whoever issued a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandResult {
    Success,
    /// The request itself was wrong: bad name, conflict, missing target.
    InvalidArgs,
    Failure,
}

impl CommandResult {
    pub fn is_success(self) -> bool {
        self == CommandResult::Success
    }
}

impl From<&CommandError> for CommandResult {
    fn from(err: &CommandError) -> Self {
        if err.is_invalid_args() {
            CommandResult::InvalidArgs
        } else {
            CommandResult::Failure
        }
    }
}

impl<T> From<&Result<T, CommandError>> for CommandResult {
    fn from(result: &Result<T, CommandError>) -> Self {
        match result {
            Ok(_) => CommandResult::Success,
            Err(e) => CommandResult::from(e),
        }
    }
}

/// Why a subject is being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreationCause {
    Command,
    Api,
    Internal,
}

/// Why a subject is being deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionCause {
    Command,
    Api,
    Internal,
}

/// Whoever issued a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub uuid: Uuid,
    pub name: String,
}

impl Actor {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Actor { uuid, name: name.into() }
    }

    /// The server console: nil uuid, name `Console`.
    pub fn console() -> Self {
        Actor { uuid: Uuid::nil(), name: "Console".to_owned() }
    }
}

/// Lowercases `raw` and checks it is a valid group name: non-empty, at most
/// `max_len` characters, only `[a-z0-9_-]`.
pub fn normalize_group_name(raw: &str, max_len: usize) -> Result<String, CommandError> {
    let name = raw.to_lowercase();
    let valid = !name.is_empty()
        && name.chars().count() <= max_len
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(name)
    } else {
        Err(CommandError::InvalidName(raw.to_owned()))
    }
}

/// A group mutation as parsed by a command front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCommand {
    Create { name: String },
    Delete { name: String },
    SetPermission { group: String, permission: String, value: bool, contexts: ContextSet },
    UnsetPermission { group: String, permission: String, contexts: ContextSet },
}

impl GroupCommand {
    fn label(&self) -> &'static str {
        match self {
            GroupCommand::Create { .. } => "creategroup",
            GroupCommand::Delete { .. } => "deletegroup",
            GroupCommand::SetPermission { .. } => "permission set",
            GroupCommand::UnsetPermission { .. } => "permission unset",
        }
    }
}

/// Runs [`GroupCommand`]s to completion on the calling thread.
///
/// Must not be called from inside an async task: `execute` blocks.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    coordinator: Arc<StorageCoordinator>,
}

impl CommandExecutor {
    pub fn new(coordinator: Arc<StorageCoordinator>) -> Self {
        CommandExecutor { coordinator }
    }

    pub fn coordinator(&self) -> &Arc<StorageCoordinator> {
        &self.coordinator
    }

    pub fn execute(&self, actor: &Actor, command: GroupCommand) -> CommandResult {
        let label = command.label();
        let result = futures::executor::block_on(self.run(actor, command));
        if let Err(e) = &result {
            debug!(command = label, actor = %actor.name, error = %e, "command did not succeed");
        }
        CommandResult::from(&result)
    }

    async fn run(&self, actor: &Actor, command: GroupCommand) -> Result<(), CommandError> {
        let coordinator = &self.coordinator;
        match command {
            GroupCommand::Create { name } => {
                coordinator.create_group(actor, &name, CreationCause::Command).await?;
            }
            GroupCommand::Delete { name } => {
                coordinator.delete_group(actor, &name, DeletionCause::Command).await?;
            }
            GroupCommand::SetPermission { group, permission, value, contexts } => {
                coordinator.set_group_permission(actor, &group, &permission, value, &contexts).await?;
            }
            GroupCommand::UnsetPermission { group, permission, contexts } => {
                coordinator.unset_group_permission(actor, &group, &permission, &contexts).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NodeError, StorageError};

    #[test]
    fn names_are_lowercased() {
        assert_eq!(normalize_group_name("Admin", 36).unwrap(), "admin");
        assert_eq!(normalize_group_name("build_team-2", 36).unwrap(), "build_team-2");
    }

    #[test]
    fn invalid_names_are_rejected() {
        for raw in ["", "has space", "dots.not.allowed", "émoji", "a/b"] {
            assert!(matches!(normalize_group_name(raw, 36), Err(CommandError::InvalidName(_))), "{raw}");
        }
        assert!(normalize_group_name(&"a".repeat(36), 36).is_ok());
        assert!(normalize_group_name(&"a".repeat(37), 36).is_err());
    }

    #[test]
    fn errors_map_to_results() {
        assert_eq!(CommandResult::from(&CommandError::AlreadyExists("g".into())), CommandResult::InvalidArgs);
        assert_eq!(CommandResult::from(&CommandError::InvalidNode(NodeError::EmptyPermission)), CommandResult::InvalidArgs);
        assert_eq!(CommandResult::from(&CommandError::CreateFailed("g".into())), CommandResult::Failure);
        assert_eq!(CommandResult::from(&CommandError::Backend(StorageError::Unavailable)), CommandResult::Failure);
        assert_eq!(CommandResult::from(&Ok::<(), CommandError>(())), CommandResult::Success);
    }

    #[test]
    fn console_actor_has_nil_uuid() {
        assert_eq!(Actor::console().uuid, Uuid::nil());
    }
}
