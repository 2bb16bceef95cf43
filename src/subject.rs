//!
//! Subjects and their node sets.
//!
//! A subject is either a [`Group`] or a [`User`]. Both expose the [`Subject`]
//! capability trait, which is all the resolution engine and any platform
//! adapter need to know about them.
//!
//! Each subject owns two [`SubjectData`] holders: the persistent one (saved by
//! the storage layer) and a transient one (never saved, cleared
//! independently). Node sets are copy-on-write: a mutation builds a new vector
//! and publishes it with a single `Arc` swap, so a reader holding a snapshot
//! never sees a half-applied change.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::context::{filter_nodes, ContextSet};
use crate::error::NodeError;
use crate::escape::unescape;
use crate::meta::{self, ChatMetaType};
use crate::node::{Node, NodeBuilder, NodeKind};
use crate::types::{SubjectKind, Tristate};

/// Priority given to prefix/suffix nodes written through [`SubjectData::set_option`].
pub const OPTION_CHAT_META_PRIORITY: i32 = 100;

/// Capability interface shared by the two subject variants.
pub trait Subject: Send + Sync + fmt::Debug {
    /// Permanent, lowercase identifier.
    fn identifier(&self) -> &str;

    fn kind(&self) -> SubjectKind;

    /// Persistent node set.
    fn subject_data(&self) -> &SubjectData;

    /// Transient node set; never persisted.
    fn transient_data(&self) -> &SubjectData;

    /// Nodes of this subject alone that apply under `contexts`: transient
    /// first, then the persistent nodes whose permission no applicable
    /// transient node sets.
    fn own_nodes(&self, contexts: &ContextSet) -> Vec<Node> {
        let mut nodes = filter_nodes(self.transient_data().nodes().iter(), contexts);
        let claimed: HashSet<String> = nodes.iter().map(|n| n.key().to_owned()).collect();
        let persistent = filter_nodes(self.subject_data().nodes().iter(), contexts);
        nodes.extend(persistent.into_iter().filter(|n| !claimed.contains(n.key())));
        nodes
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SubjectData
// ─────────────────────────────────────────────────────────────────────────────

/// Copy-on-write holder of one node set.
pub struct SubjectData {
    persistent: bool,
    nodes: RwLock<Arc<Vec<Node>>>,
}

impl SubjectData {
    pub fn new(persistent: bool) -> Self {
        Self::with_nodes(persistent, Vec::new())
    }

    pub fn with_nodes(persistent: bool, nodes: Vec<Node>) -> Self {
        SubjectData { persistent, nodes: RwLock::new(Arc::new(nodes)) }
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Immutable snapshot of the current node set.
    pub fn nodes(&self) -> Arc<Vec<Node>> {
        Arc::clone(&self.nodes.read())
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Runs `f` against the current set while holding the write lock. If it
    /// returns a new set, that set is published. Returns whether a swap happened.
    fn mutate<F>(&self, f: F) -> bool
    where
        F: FnOnce(&[Node]) -> Option<Vec<Node>>,
    {
        let mut guard = self.nodes.write();
        match f(guard.as_slice()) {
            Some(next) => {
                *guard = Arc::new(next);
                true
            }
            None => false,
        }
    }

    /// Drops `remove` matches; returns `None` if nothing matched.
    fn without<P>(current: &[Node], remove: P) -> Option<Vec<Node>>
    where
        P: Fn(&Node) -> bool,
    {
        let next: Vec<Node> = current.iter().filter(|n| !remove(n)).cloned().collect();
        (next.len() != current.len()).then_some(next)
    }

    /// Replaces the whole node set.
    pub fn replace_nodes(&self, nodes: Vec<Node>) {
        self.mutate(|_| Some(nodes));
    }

    /// Adds `node`, replacing an existing node with the same permission and
    /// contexts. Returns `false` if an identical node was already present.
    pub fn set_node(&self, node: Node) -> bool {
        self.mutate(|current| {
            if current.contains(&node) {
                return None;
            }
            let mut next: Vec<Node> = current.iter().filter(|n| !n.same_target(&node)).cloned().collect();
            next.push(node);
            Some(next)
        })
    }

    /// Removes the node for `permission` in exactly `contexts`.
    pub fn unset_node(&self, permission: &str, contexts: &ContextSet) -> bool {
        let key = permission.trim().to_lowercase();
        self.mutate(|current| Self::without(current, |n| n.key() == key && n.contexts() == contexts))
    }

    /// `Tristate::Undefined` removes the node; otherwise it is set to the value.
    pub fn set_permission(
        &self,
        contexts: &ContextSet,
        permission: &str,
        value: Tristate,
    ) -> Result<bool, NodeError> {
        match value {
            Tristate::Undefined => {
                if permission.trim().is_empty() {
                    return Err(NodeError::EmptyPermission);
                }
                Ok(self.unset_node(permission, contexts))
            }
            defined => {
                let node = NodeBuilder::new(permission)
                    .value(defined.as_bool())
                    .contexts(contexts.clone())
                    .build()?;
                Ok(self.set_node(node))
            }
        }
    }

    /// Removes every node.
    pub fn clear_permissions(&self) -> bool {
        self.mutate(|current| (!current.is_empty()).then(Vec::new))
    }

    /// Removes every node defined in exactly `contexts`.
    pub fn clear_permissions_in(&self, contexts: &ContextSet) -> bool {
        self.mutate(|current| Self::without(current, |n| n.contexts() == contexts))
    }

    pub fn add_parent(&self, contexts: &ContextSet, group: &str) -> Result<bool, NodeError> {
        let node = NodeBuilder::group(group).contexts(contexts.clone()).build()?;
        Ok(self.set_node(node))
    }

    pub fn remove_parent(&self, contexts: &ContextSet, group: &str) -> bool {
        let group = group.to_lowercase();
        self.mutate(|current| {
            Self::without(current, |n| n.group_name() == Some(group.as_str()) && n.contexts() == contexts)
        })
    }

    pub fn clear_parents(&self) -> bool {
        self.mutate(|current| Self::without(current, Node::is_group_node))
    }

    /// Sets (or with `None`, removes) an option in exactly `contexts`.
    ///
    /// `prefix` and `suffix` keys replace every chat-meta node of that type in
    /// the context with a single one at [`OPTION_CHAT_META_PRIORITY`]; any
    /// other key replaces the meta nodes for that key.
    pub fn set_option(
        &self,
        contexts: &ContextSet,
        key: &str,
        value: Option<&str>,
    ) -> Result<bool, NodeError> {
        let chat_type = ChatMetaType::from_option_key(key);
        let replacement = match (value, chat_type) {
            (None, _) => None,
            (Some(v), Some(ChatMetaType::Prefix)) => Some(NodeBuilder::prefix(OPTION_CHAT_META_PRIORITY, v)),
            (Some(v), Some(ChatMetaType::Suffix)) => Some(NodeBuilder::suffix(OPTION_CHAT_META_PRIORITY, v)),
            (Some(v), None) => Some(NodeBuilder::meta(key, v)),
        };
        let replacement = replacement.map(|b| b.contexts(contexts.clone()).build()).transpose()?;

        let lower_key = key.to_lowercase();
        let is_target = |n: &Node| {
            n.contexts() == contexts
                && match (n.kind(), chat_type) {
                    (NodeKind::Prefix { .. }, Some(ChatMetaType::Prefix)) => true,
                    (NodeKind::Suffix { .. }, Some(ChatMetaType::Suffix)) => true,
                    (NodeKind::Meta { key: k, .. }, None) => unescape(k).to_lowercase() == lower_key,
                    _ => false,
                }
        };

        Ok(self.mutate(|current| {
            let mut next: Vec<Node> = current.iter().filter(|n| !is_target(n)).cloned().collect();
            if let Some(node) = replacement {
                next.push(node);
            }
            (next.as_slice() != current).then_some(next)
        }))
    }

    /// Removes every prefix, suffix and meta node.
    pub fn clear_options(&self) -> bool {
        self.mutate(|current| Self::without(current, |n| n.is_prefix() || n.is_suffix() || n.is_meta()))
    }

    /// Permission values defined in exactly `contexts`.
    pub fn permissions(&self, contexts: &ContextSet) -> BTreeMap<String, bool> {
        self.nodes()
            .iter()
            .filter(|n| n.contexts() == contexts)
            .map(|n| (n.permission().to_owned(), n.value()))
            .collect()
    }

    /// Every node grouped by its context set.
    pub fn all_permissions(&self) -> BTreeMap<ContextSet, BTreeMap<String, bool>> {
        let mut out: BTreeMap<ContextSet, BTreeMap<String, bool>> = BTreeMap::new();
        for node in self.nodes().iter() {
            out.entry(node.contexts().clone())
                .or_default()
                .insert(node.permission().to_owned(), node.value());
        }
        out
    }

    /// Names of the groups referenced (with value `true`) in exactly `contexts`.
    pub fn parents(&self, contexts: &ContextSet) -> Vec<String> {
        self.nodes()
            .iter()
            .filter(|n| n.value() && n.contexts() == contexts)
            .filter_map(|n| n.group_name().map(str::to_owned))
            .collect()
    }

    /// Options defined in exactly `contexts`, unescaped.
    pub fn options(&self, contexts: &ContextSet) -> BTreeMap<String, String> {
        let nodes = self.nodes();
        meta::collect_options(nodes.iter().filter(|n| n.contexts() == contexts))
    }
}

impl fmt::Debug for SubjectData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubjectData")
            .field("persistent", &self.persistent)
            .field("nodes", &self.nodes())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Variants
// ─────────────────────────────────────────────────────────────────────────────

/// A group: referenced by name from other subjects' `group.<name>` nodes.
#[derive(Debug)]
pub struct Group {
    name: String,
    data: SubjectData,
    transient: SubjectData,
}

impl Group {
    /// `name` is lowercased; it is the group's permanent identifier.
    pub fn new(name: &str) -> Self {
        Self::with_nodes(name, Vec::new())
    }

    pub fn with_nodes(name: &str, nodes: Vec<Node>) -> Self {
        Group {
            name: name.to_lowercase(),
            data: SubjectData::with_nodes(true, nodes),
            transient: SubjectData::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Group {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Group {}

impl Subject for Group {
    fn identifier(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SubjectKind {
        SubjectKind::Group
    }

    fn subject_data(&self) -> &SubjectData {
        &self.data
    }

    fn transient_data(&self) -> &SubjectData {
        &self.transient
    }
}

/// A user: identified by UUID, never referenced as a parent.
#[derive(Debug)]
pub struct User {
    uuid: Uuid,
    identifier: String,
    name: Option<String>,
    data: SubjectData,
    transient: SubjectData,
}

impl User {
    pub fn new(uuid: Uuid) -> Self {
        User {
            uuid,
            identifier: uuid.hyphenated().to_string(),
            name: None,
            data: SubjectData::new(true),
            transient: SubjectData::new(false),
        }
    }

    /// Last known username, stored lowercase.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_lowercase());
        self
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for User {}

impl Subject for User {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn kind(&self) -> SubjectKind {
        SubjectKind::User
    }

    fn subject_data(&self) -> &SubjectData {
        &self.data
    }

    fn transient_data(&self) -> &SubjectData {
        &self.transient
    }
}
