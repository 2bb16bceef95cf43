//! Subject registry: the shared cache of loaded groups and users, plus the
//! defaults subjects consulted by the fallback chain.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use crate::subject::{Group, User};
use crate::types::SubjectKind;

/// Identifier of the groups collection's defaults subject.
pub const GROUP_DEFAULTS_ID: &str = "group-defaults";
/// Identifier of the users collection's defaults subject.
pub const USER_DEFAULTS_ID: &str = "user-defaults";
/// Identifier of the service-wide defaults subject.
pub const SERVICE_DEFAULTS_ID: &str = "defaults";

/// Lookup capability the engine resolves subjects through.
///
/// Implementations must be safe for unbounded concurrent readers.
pub trait SubjectRegistry: Send + Sync {
    /// The loaded group called `name`, or an empty placeholder when it is not
    /// loaded. Placeholders are not cached.
    fn lookup_group(&self, name: &str) -> Arc<Group> {
        self.get_group(name).unwrap_or_else(|| {
            debug!(group = %name, "group not loaded, using empty placeholder");
            Arc::new(Group::new(name))
        })
    }

    fn get_group(&self, name: &str) -> Option<Arc<Group>>;

    /// Returns the cached group, inserting an empty one if absent.
    fn insert_group(&self, name: &str) -> Arc<Group>;

    fn remove_group(&self, name: &str) -> Option<Arc<Group>>;

    fn group_names(&self) -> Vec<String>;

    /// The loaded user, or an empty placeholder. Placeholders are not cached.
    fn lookup_user(&self, uuid: Uuid) -> Arc<User> {
        self.get_user(uuid).unwrap_or_else(|| Arc::new(User::new(uuid)))
    }

    fn get_user(&self, uuid: Uuid) -> Option<Arc<User>>;

    fn insert_user(&self, user: User) -> Arc<User>;

    /// Defaults subject of the collection that holds subjects of `kind`.
    fn collection_defaults(&self, kind: SubjectKind) -> Arc<Group>;

    fn service_defaults(&self) -> Arc<Group>;
}

pub type SharedRegistry = Arc<dyn SubjectRegistry>;

/// In-memory [`SubjectRegistry`] built on `DashMap`.
#[derive(Debug)]
pub struct MemoryRegistry {
    groups: DashMap<String, Arc<Group>>,
    users: DashMap<Uuid, Arc<User>>,
    group_defaults: Arc<Group>,
    user_defaults: Arc<Group>,
    service_defaults: Arc<Group>,
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRegistry {
    pub fn new() -> Self {
        MemoryRegistry {
            groups: DashMap::new(),
            users: DashMap::new(),
            group_defaults: Arc::new(Group::new(GROUP_DEFAULTS_ID)),
            user_defaults: Arc::new(Group::new(USER_DEFAULTS_ID)),
            service_defaults: Arc::new(Group::new(SERVICE_DEFAULTS_ID)),
        }
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl SubjectRegistry for MemoryRegistry {
    fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.get(&name.to_lowercase()).map(|g| Arc::clone(g.value()))
    }

    fn insert_group(&self, name: &str) -> Arc<Group> {
        let name = name.to_lowercase();
        let entry = self.groups.entry(name.clone()).or_insert_with(|| Arc::new(Group::new(&name)));
        Arc::clone(entry.value())
    }

    fn remove_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.remove(&name.to_lowercase()).map(|(_, g)| g)
    }

    fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    fn get_user(&self, uuid: Uuid) -> Option<Arc<User>> {
        self.users.get(&uuid).map(|u| Arc::clone(u.value()))
    }

    fn insert_user(&self, user: User) -> Arc<User> {
        let entry = self.users.entry(user.uuid()).or_insert_with(|| Arc::new(user));
        Arc::clone(entry.value())
    }

    fn collection_defaults(&self, kind: SubjectKind) -> Arc<Group> {
        match kind {
            SubjectKind::Group => Arc::clone(&self.group_defaults),
            SubjectKind::User => Arc::clone(&self.user_defaults),
        }
    }

    fn service_defaults(&self) -> Arc<Group> {
        Arc::clone(&self.service_defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextSet;
    use crate::subject::Subject;

    #[test]
    fn insert_is_idempotent_and_case_insensitive() {
        let registry = MemoryRegistry::new();
        let a = registry.insert_group("Admin");
        let b = registry.insert_group("admin");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.group_count(), 1);
        assert!(registry.get_group("ADMIN").is_some());
        assert_eq!(registry.group_names(), vec!["admin".to_owned()]);
    }

    #[test]
    fn lookup_returns_uncached_placeholder() {
        let registry = MemoryRegistry::new();
        let ghost = registry.lookup_group("ghost");
        assert_eq!(ghost.identifier(), "ghost");
        assert!(ghost.own_nodes(&ContextSet::global()).is_empty());
        assert!(registry.get_group("ghost").is_none());
    }

    #[test]
    fn remove_drops_group() {
        let registry = MemoryRegistry::new();
        registry.insert_group("mod");
        assert!(registry.remove_group("MOD").is_some());
        assert!(registry.remove_group("mod").is_none());
    }

    #[test]
    fn defaults_are_per_collection() {
        let registry = MemoryRegistry::new();
        assert_eq!(registry.collection_defaults(SubjectKind::Group).identifier(), GROUP_DEFAULTS_ID);
        assert_eq!(registry.collection_defaults(SubjectKind::User).identifier(), USER_DEFAULTS_ID);
        assert_eq!(registry.service_defaults().identifier(), SERVICE_DEFAULTS_ID);
    }

    #[test]
    fn users_are_keyed_by_uuid() {
        let registry = MemoryRegistry::new();
        let uuid = Uuid::new_v4();
        let user = registry.insert_user(User::new(uuid).with_name("alice"));
        assert_eq!(user.name(), Some("alice"));
        assert!(registry.get_user(uuid).is_some());
        assert!(registry.get_user(Uuid::nil()).is_none());
        assert_eq!(registry.lookup_user(Uuid::nil()).uuid(), Uuid::nil());
    }
}
