//!
//! Storage coordination.
//!
//! [`Storage`] is the persistence seam: the concrete backend (file, SQL,
//! remote) lives outside this crate. [`coordinator::StorageCoordinator`]
//! drives mutating operations against it and emits audit entries through
//! [`audit::AuditSink`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::command::{CreationCause, DeletionCause};
use crate::error::StorageError;
use crate::subject::Group;

pub mod audit;
pub mod coordinator;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

/// Persistence backend for groups.
///
/// Every operation answers `Ok(false)` for a clean refusal and `Err` for an
/// I/O failure. Guarding against two concurrent creates of the same name is
/// the backend's job.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Loads `name` into the registry if it exists. `Ok(true)` iff it exists.
    async fn load_group(&self, name: &str) -> Result<bool, StorageError>;

    /// Creates `name` and loads it into the registry.
    async fn create_and_load_group(&self, name: &str, cause: CreationCause) -> Result<bool, StorageError>;

    async fn delete_group(&self, group: &Group, cause: DeletionCause) -> Result<bool, StorageError>;

    /// Persists the group's current persistent node set.
    async fn save_group(&self, group: &Group) -> Result<bool, StorageError>;
}

pub type SharedStorage = Arc<dyn Storage>;
