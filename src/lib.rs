#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(deprecated)]

//!
//! Warden-Core is a permission and metadata resolution engine for
//! hierarchical subjects (groups and users).
//!
//! Given a subject, the nodes attached to it and to its ancestors, and a set
//! of active contexts, the [`engine::Engine`] answers tri-state permission
//! queries with wildcard matching, lists parents, and resolves prefix, suffix
//! and meta options through the defaults chain. Mutating operations go
//! through [`storage::coordinator::StorageCoordinator`], which validates,
//! calls the pluggable [`storage::Storage`] backend and emits audit entries.

// Shared enums (Tristate, SubjectKind).
pub mod types;

pub mod error;
pub mod escape;
pub mod context;
pub mod node;
pub mod tree;

pub mod subject;
pub mod registry;
pub mod inheritance;
pub mod meta;

pub mod engine;

pub mod config;
pub mod command;
pub mod storage;

#[cfg(feature = "subscriber")]
pub mod logging;

pub use command::{Actor, CommandExecutor, CommandResult, CreationCause, DeletionCause, GroupCommand};
pub use config::EngineConfig;
pub use context::ContextSet;
pub use engine::{Engine, SubjectView};
pub use error::{CommandError, ConfigError, NodeError, StorageError};
pub use node::{Node, NodeBuilder, NodeKind};
pub use registry::{MemoryRegistry, SharedRegistry, SubjectRegistry};
pub use subject::{Group, Subject, SubjectData, User};
pub use tree::NodeTree;
pub use types::{SubjectKind, Tristate};
