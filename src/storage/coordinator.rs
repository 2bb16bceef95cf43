//!
//! Storage coordinator.
//!
//! Every mutating operation follows the same pipeline:
//!
//! ```text
//! validate -> existence check -> conditional backend call -> audit
//! ```
//!
//! Operations on one group are serialized by a per-group lock held from the
//! existence check until the backend call returns. A node mutation that the
//! backend fails to save is rolled back before the error is returned.
//!
//! Validation failures perform no I/O. The audit entry is only emitted once
//! the backend call has succeeded, and it is dispatched without waiting for
//! the sink: on a tokio runtime it is spawned, otherwise it is submitted
//! inline before the operation returns.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::command::{normalize_group_name, Actor, CreationCause, DeletionCause};
use crate::config::EngineConfig;
use crate::context::ContextSet;
use crate::error::{CommandError, NodeError};
use crate::registry::SharedRegistry;
use crate::storage::audit::{LogEntry, SharedAuditSink};
use crate::storage::SharedStorage;
use crate::subject::{Group, Subject, SubjectData};
use crate::types::{SubjectKind, Tristate};

pub struct StorageCoordinator {
    storage: SharedStorage,
    audit: SharedAuditSink,
    registry: SharedRegistry,
    config: EngineConfig,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl StorageCoordinator {
    pub fn new(
        storage: SharedStorage,
        audit: SharedAuditSink,
        registry: SharedRegistry,
        config: EngineConfig,
    ) -> Self {
        StorageCoordinator { storage, audit, registry, config, locks: DashMap::new() }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn normalize(&self, raw: &str) -> Result<String, CommandError> {
        normalize_group_name(raw, self.config.max_name_length)
    }

    /// Existence-or-load pass-through.
    #[instrument(skip(self))]
    pub async fn load_group(&self, name: &str) -> Result<bool, CommandError> {
        let name = self.normalize(name)?;
        debug!(group = %name, "loading group");
        Ok(self.storage.load_group(&name).await?)
    }

    /// Waits for exclusive access to the group called `name`.
    async fn lock_group(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.entry(name.to_owned()).or_default().value());
        lock.lock_owned().await
    }

    /// Loads `name` and returns it from the registry, or `DoesNotExist`.
    async fn require_group(&self, name: &str) -> Result<Arc<Group>, CommandError> {
        if !self.storage.load_group(name).await? {
            return Err(CommandError::DoesNotExist(name.to_owned()));
        }
        self.registry
            .get_group(name)
            .ok_or_else(|| CommandError::DoesNotExist(name.to_owned()))
    }

    /// Creates a new group. Rejects names that already exist.
    #[instrument(skip(self, actor), fields(actor = %actor.name))]
    pub async fn create_group(
        &self,
        actor: &Actor,
        name: &str,
        cause: CreationCause,
    ) -> Result<Arc<Group>, CommandError> {
        let name = self.normalize(name)?;
        let _guard = self.lock_group(&name).await;

        if self.storage.load_group(&name).await? {
            debug!(group = %name, "group already exists");
            return Err(CommandError::AlreadyExists(name));
        }

        if !self.storage.create_and_load_group(&name, cause).await? {
            return Err(CommandError::CreateFailed(name));
        }
        let group = self.registry.insert_group(&name);

        info!(group = %name, ?cause, "group created");
        self.dispatch_audit(actor, &name, "create").await;
        Ok(group)
    }

    /// Deletes a group. The configured default group cannot be deleted.
    #[instrument(skip(self, actor), fields(actor = %actor.name))]
    pub async fn delete_group(&self, actor: &Actor, name: &str, cause: DeletionCause) -> Result<(), CommandError> {
        let name = self.normalize(name)?;
        if name == self.config.default_group {
            return Err(CommandError::Protected(name));
        }

        let _guard = self.lock_group(&name).await;
        let group = self.require_group(&name).await?;
        if !self.storage.delete_group(&group, cause).await? {
            return Err(CommandError::DeleteFailed(name));
        }
        self.registry.remove_group(&name);

        info!(group = %name, ?cause, "group deleted");
        self.dispatch_audit(actor, &name, "delete").await;
        Ok(())
    }

    /// Sets `permission` to `value` in `contexts` on the group's persistent
    /// data and saves it. Returns `false` if the node was already set.
    #[instrument(skip(self, actor, contexts), fields(actor = %actor.name, %contexts))]
    pub async fn set_group_permission(
        &self,
        actor: &Actor,
        name: &str,
        permission: &str,
        value: bool,
        contexts: &ContextSet,
    ) -> Result<bool, CommandError> {
        let name = self.normalize(name)?;
        if permission.trim().is_empty() {
            return Err(NodeError::EmptyPermission.into());
        }

        let changed = self
            .mutate_group(&name, |data| data.set_permission(contexts, permission, Tristate::from(value)))
            .await?;
        if !changed {
            debug!(group = %name, %permission, "permission already set");
            return Ok(false);
        }

        info!(group = %name, %permission, value, "permission set");
        self.dispatch_audit(actor, &name, format!("permission set {} {}", permission.trim(), value)).await;
        Ok(true)
    }

    /// Removes `permission` in exactly `contexts`. Returns `false` if it was
    /// not set there.
    #[instrument(skip(self, actor, contexts), fields(actor = %actor.name, %contexts))]
    pub async fn unset_group_permission(
        &self,
        actor: &Actor,
        name: &str,
        permission: &str,
        contexts: &ContextSet,
    ) -> Result<bool, CommandError> {
        let name = self.normalize(name)?;
        if permission.trim().is_empty() {
            return Err(NodeError::EmptyPermission.into());
        }

        let changed = self
            .mutate_group(&name, |data| data.set_permission(contexts, permission, Tristate::Undefined))
            .await?;
        if !changed {
            debug!(group = %name, %permission, "permission was not set");
            return Ok(false);
        }

        info!(group = %name, %permission, "permission unset");
        self.dispatch_audit(actor, &name, format!("permission unset {}", permission.trim())).await;
        Ok(true)
    }

    /// Loads the group, applies `mutation` to its persistent data and saves
    /// it, all under the group's lock. If the save does not succeed the
    /// previous node set is restored. Returns whether anything changed.
    async fn mutate_group<F>(&self, name: &str, mutation: F) -> Result<bool, CommandError>
    where
        F: FnOnce(&SubjectData) -> Result<bool, NodeError>,
    {
        let _guard = self.lock_group(name).await;
        let group = self.require_group(name).await?;
        let data = group.subject_data();

        let before = data.nodes();
        if !mutation(data)? {
            return Ok(false);
        }
        if let Err(e) = self.save(&group).await {
            warn!(group = %name, error = %e, "save failed, restoring previous nodes");
            data.replace_nodes((*before).clone());
            return Err(e);
        }
        Ok(true)
    }

    async fn save(&self, group: &Group) -> Result<(), CommandError> {
        if self.storage.save_group(group).await? {
            Ok(())
        } else {
            Err(CommandError::SaveFailed(group.name().to_owned()))
        }
    }

    async fn dispatch_audit(&self, actor: &Actor, acted: &str, action: impl Into<String>) {
        let entry = LogEntry::build()
            .actor(actor)
            .kind(SubjectKind::Group)
            .acted_name(acted)
            .action(action)
            .build();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let sink = Arc::clone(&self.audit);
                handle.spawn(async move {
                    if let Err(e) = sink.submit(entry).await {
                        warn!(error = %e, "failed to submit audit entry");
                    }
                });
            }
            Err(_) => {
                if let Err(e) = self.audit.submit(entry).await {
                    warn!(error = %e, "failed to submit audit entry");
                }
            }
        }
    }
}

impl std::fmt::Debug for StorageCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCoordinator").field("config", &self.config).finish_non_exhaustive()
    }
}
