//!
//! Resolution engine.
//!
//! Composes the context filter, inheritance walker, node tree and meta
//! resolver, and runs every query through the defaults chain:
//!
//! ```text
//! subject  ->  collection defaults  ->  service defaults
//! ```
//!
//! Permission values and options stop at the first level with an answer.
//! Parents are concatenated across all three levels. Defaults subjects are
//! evaluated on their own level only.
//!
//! Nothing here performs I/O or returns an error: every query reads immutable
//! snapshots and always produces a value.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::config::EngineConfig;
use crate::context::{ContextSet, SERVER_KEY, WORLD_KEY};
use crate::inheritance::{flatten, InheritanceWalker};
use crate::meta;
use crate::node::Node;
use crate::registry::SharedRegistry;
use crate::subject::{Group, Subject};
use crate::tree::NodeTree;
use crate::types::Tristate;

/// Entry point for permission, parent and option queries.
#[derive(Clone)]
pub struct Engine {
    registry: SharedRegistry,
    config: Arc<EngineConfig>,
}

impl Engine {
    pub fn new(registry: SharedRegistry, config: EngineConfig) -> Self {
        Engine { registry, config: Arc::new(config) }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Query view bound to one subject.
    pub fn subject<'a>(&'a self, subject: &'a dyn Subject) -> SubjectView<'a> {
        SubjectView { engine: self, subject }
    }

    /// Adds the configured `server`/`world` scope to a query's contexts
    /// unless the query already names one.
    pub fn calculate_contexts(&self, contexts: &ContextSet) -> ContextSet {
        let mut out = contexts.clone();
        for (key, value) in [(SERVER_KEY, &self.config.server), (WORLD_KEY, &self.config.world)] {
            if let Some(value) = value {
                if !out.contains_key(key) {
                    out.insert(key, value);
                }
            }
        }
        out
    }

    /// Every node that applies to `subject` under `contexts`, own and
    /// inherited, in resolution order.
    pub fn resolved_nodes(&self, subject: &dyn Subject, contexts: &ContextSet) -> Vec<Node> {
        let contexts = self.calculate_contexts(contexts);
        let walker = InheritanceWalker::new(self.registry.as_ref(), &contexts)
            .log_cycles(self.config.log_inheritance_cycles);
        flatten(walker.walk(subject))
    }

    fn defaults_for(&self, subject: &dyn Subject) -> [Arc<Group>; 2] {
        [self.registry.collection_defaults(subject.kind()), self.registry.service_defaults()]
    }

    fn level_permission(&self, subject: &dyn Subject, contexts: &ContextSet, permission: &str) -> Tristate {
        let nodes = self.resolved_nodes(subject, contexts);
        NodeTree::from_nodes(&nodes).get(permission)
    }

    fn level_option(&self, subject: &dyn Subject, contexts: &ContextSet, key: &str) -> Option<String> {
        let nodes = self.resolved_nodes(subject, contexts);
        meta::resolve_option(&nodes, key)
    }

    fn level_parents(&self, subject: &dyn Subject, contexts: &ContextSet) -> Vec<Arc<Group>> {
        let contexts = self.calculate_contexts(contexts);
        InheritanceWalker::new(self.registry.as_ref(), &contexts).direct_parents(subject)
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("config", &self.config).finish_non_exhaustive()
    }
}

/// Query surface for one subject.
#[derive(Clone, Copy)]
pub struct SubjectView<'a> {
    engine: &'a Engine,
    subject: &'a dyn Subject,
}

impl SubjectView<'_> {
    pub fn identifier(&self) -> &str {
        self.subject.identifier()
    }

    /// Contexts the subject is currently in. Subjects here carry no context
    /// of their own, so this is always the global set.
    pub fn active_contexts(&self) -> ContextSet {
        ContextSet::global()
    }

    /// Tri-state value of `permission`, falling back through the defaults
    /// chain while the answer is `Undefined`.
    pub fn get_permission(&self, contexts: &ContextSet, permission: &str) -> Tristate {
        let value = self.engine.level_permission(self.subject, contexts, permission);
        if value.is_defined() {
            return value;
        }
        for defaults in self.engine.defaults_for(self.subject) {
            let value = self.engine.level_permission(defaults.as_ref(), contexts, permission);
            if value.is_defined() {
                trace!(subject = %self.identifier(), level = %defaults.identifier(), %permission, "resolved from defaults");
                return value;
            }
        }
        Tristate::Undefined
    }

    pub fn has_permission(&self, contexts: &ContextSet, permission: &str) -> bool {
        self.get_permission(contexts, permission).as_bool()
    }

    /// `true` iff `group.<parent>` resolves to `True` (directly or inherited).
    pub fn is_child_of(&self, contexts: &ContextSet, parent: &Group) -> bool {
        self.has_permission(contexts, &format!("group.{}", parent.name()))
    }

    /// Direct parents of the subject, then of the collection defaults, then
    /// of the service defaults. Duplicates are kept.
    pub fn get_parents(&self, contexts: &ContextSet) -> Vec<Arc<Group>> {
        let mut parents = self.engine.level_parents(self.subject, contexts);
        for defaults in self.engine.defaults_for(self.subject) {
            parents.extend(self.engine.level_parents(defaults.as_ref(), contexts));
        }
        parents
    }

    /// `prefix` / `suffix` (any case) resolve chat meta; any other key
    /// resolves meta. Falls back through the defaults chain while empty.
    pub fn get_option(&self, contexts: &ContextSet, key: &str) -> Option<String> {
        if let Some(value) = self.engine.level_option(self.subject, contexts, key) {
            return Some(value);
        }
        self.engine
            .defaults_for(self.subject)
            .iter()
            .find_map(|defaults| self.engine.level_option(defaults.as_ref(), contexts, key))
    }

    /// Every option resolvable for the subject. Keys defined on a closer
    /// level win over the defaults.
    pub fn get_options(&self, contexts: &ContextSet) -> BTreeMap<String, String> {
        let mut out = meta::collect_options(&self.engine.resolved_nodes(self.subject, contexts));
        for defaults in self.engine.defaults_for(self.subject) {
            for (key, value) in meta::collect_options(&self.engine.resolved_nodes(defaults.as_ref(), contexts)) {
                out.entry(key).or_insert(value);
            }
        }
        out
    }
}

impl std::fmt::Debug for SubjectView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubjectView").field("subject", &self.subject.identifier()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;
    use crate::registry::{MemoryRegistry, SubjectRegistry};
    use crate::subject::User;
    use uuid::Uuid;

    fn engine() -> (Arc<MemoryRegistry>, Engine) {
        let registry = Arc::new(MemoryRegistry::new());
        let engine = Engine::new(registry.clone(), EngineConfig::default());
        (registry, engine)
    }

    fn global() -> ContextSet {
        ContextSet::global()
    }

    #[test]
    fn undefined_when_nothing_matches() {
        let (registry, engine) = engine();
        let g = registry.insert_group("g");
        let view = engine.subject(g.as_ref());
        assert_eq!(view.get_permission(&global(), "some.perm"), Tristate::Undefined);
        assert!(!view.has_permission(&global(), "some.perm"));
    }

    #[test]
    fn inherited_permissions_and_is_child_of() {
        let (registry, engine) = engine();
        let admin = registry.insert_group("admin");
        admin.subject_data().add_parent(&global(), "mod").unwrap();
        let moderator = registry.insert_group("mod");
        moderator.subject_data().add_parent(&global(), "member").unwrap();
        moderator.subject_data().set_permission(&global(), "kick", Tristate::True).unwrap();
        let member = registry.insert_group("member");

        let view = engine.subject(admin.as_ref());
        assert_eq!(view.get_permission(&global(), "kick"), Tristate::True);
        assert!(view.is_child_of(&global(), &moderator));
        assert!(view.is_child_of(&global(), &member));
        assert!(!engine.subject(member.as_ref()).is_child_of(&global(), &admin));
    }

    #[test]
    fn own_node_overrides_inherited() {
        let (registry, engine) = engine();
        let child = registry.insert_group("child");
        child.subject_data().add_parent(&global(), "parent").unwrap();
        child.subject_data().set_permission(&global(), "fly", Tristate::False).unwrap();
        let parent = registry.insert_group("parent");
        parent.subject_data().set_permission(&global(), "fly", Tristate::True).unwrap();

        assert_eq!(engine.subject(child.as_ref()).get_permission(&global(), "fly"), Tristate::False);
    }

    #[test]
    fn users_fall_back_to_user_defaults() {
        let (registry, engine) = engine();
        let user = registry.insert_user(User::new(Uuid::new_v4()));
        registry
            .collection_defaults(crate::types::SubjectKind::User)
            .subject_data()
            .set_permission(&global(), "chat", Tristate::True)
            .unwrap();
        registry
            .collection_defaults(crate::types::SubjectKind::Group)
            .subject_data()
            .set_permission(&global(), "build", Tristate::True)
            .unwrap();

        let view = engine.subject(user.as_ref());
        assert!(view.has_permission(&global(), "chat"));
        assert_eq!(view.get_permission(&global(), "build"), Tristate::Undefined);
    }

    #[test]
    fn configured_server_scopes_queries() {
        let registry = Arc::new(MemoryRegistry::new());
        let config = EngineConfig { server: Some("lobby".into()), ..EngineConfig::default() };
        let engine = Engine::new(registry.clone(), config);
        let g = registry.insert_group("g");
        g.subject_data().set_node(NodeBuilder::new("fly").server("lobby").build().unwrap());

        let view = engine.subject(g.as_ref());
        assert!(view.has_permission(&global(), "fly"));
        // An explicit server in the query wins over the configured one.
        assert!(!view.has_permission(&ContextSet::singleton("server", "survival"), "fly"));
    }

    #[test]
    fn options_merge_across_levels() {
        let (registry, engine) = engine();
        let g = registry.insert_group("g");
        g.subject_data().set_option(&global(), "rank", Some("gold")).unwrap();
        let service = registry.service_defaults();
        service.subject_data().set_option(&global(), "rank", Some("none")).unwrap();
        service.subject_data().set_option(&global(), "motd", Some("hi")).unwrap();

        let options = engine.subject(g.as_ref()).get_options(&global());
        assert_eq!(options.get("rank").map(String::as_str), Some("gold"));
        assert_eq!(options.get("motd").map(String::as_str), Some("hi"));
    }
}
