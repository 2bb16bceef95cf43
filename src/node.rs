//!
//! Permission nodes.
//!
//! A [`Node`] is one immutable grant: a permission string, a boolean value and
//! the contexts it applies in. Its [`NodeKind`] is derived once, at build time,
//! from the syntactic form of the permission:
//!
//! - `group.<name>`                -> group reference (inheritance)
//! - `prefix.<priority>.<value>`   -> chat prefix
//! - `suffix.<priority>.<value>`   -> chat suffix
//! - `meta.<key>.<value>`          -> arbitrary key/value metadata
//! - anything else                 -> plain permission
//!
//! Meta keys and chat-meta/meta values are stored escaped (see [`crate::escape`]).

use std::fmt;
use std::sync::Arc;

use crate::context::{ContextSet, SERVER_KEY, WORLD_KEY};
use crate::error::NodeError;
use crate::escape::escape;

const GROUP_PREFIX: &str = "group.";
const PREFIX_PREFIX: &str = "prefix.";
const SUFFIX_PREFIX: &str = "suffix.";
const META_PREFIX: &str = "meta.";

/// Classification of a node, derived from its permission string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Permission,
    /// Reference to a parent group. `name` is lowercase.
    Group { name: String },
    /// `value` is still escaped.
    Prefix { priority: i32, value: String },
    /// `value` is still escaped.
    Suffix { priority: i32, value: String },
    /// `key` and `value` are still escaped.
    Meta { key: String, value: String },
}

impl NodeKind {
    fn classify(permission: &str) -> NodeKind {
        if let Some(name) = strip_tag(permission, GROUP_PREFIX).filter(|n| !n.is_empty()) {
            return NodeKind::Group { name: name.to_lowercase() };
        }

        for (tag, is_prefix) in [(PREFIX_PREFIX, true), (SUFFIX_PREFIX, false)] {
            if let Some(rest) = strip_tag(permission, tag) {
                let mut parts = rest.splitn(2, '.');
                let priority = parts.next().and_then(|p| p.parse::<i32>().ok());
                let value = parts.next().filter(|v| !v.is_empty());
                if let (Some(priority), Some(value)) = (priority, value) {
                    let value = value.to_owned();
                    return if is_prefix {
                        NodeKind::Prefix { priority, value }
                    } else {
                        NodeKind::Suffix { priority, value }
                    };
                }
            }
        }

        if let Some(rest) = strip_tag(permission, META_PREFIX) {
            let mut parts = rest.splitn(2, '.');
            let key = parts.next().filter(|k| !k.is_empty());
            let value = parts.next();
            if let (Some(key), Some(value)) = (key, value) {
                return NodeKind::Meta { key: key.to_owned(), value: value.to_owned() };
            }
        }

        NodeKind::Permission
    }
}

/// Case-insensitive `strip_prefix` for an ASCII tag. The remainder keeps its
/// original case.
fn strip_tag<'a>(s: &'a str, tag: &str) -> Option<&'a str> {
    let head = s.get(..tag.len())?;
    if head.eq_ignore_ascii_case(tag) {
        s.get(tag.len()..)
    } else {
        None
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct NodeInner {
    permission: String,
    lower: String,
    value: bool,
    contexts: ContextSet,
    kind: NodeKind,
}

/// One immutable permission grant.
///
/// Cloning is cheap (the data lives behind an `Arc`), so node sets can be
/// snapshotted and filtered without copying strings.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Node(Arc<NodeInner>);

impl Node {
    /// Parses the scoped syntactic forms `server/permission` and
    /// `server-world/permission` into a node whose scope lives in the
    /// `server`/`world` contexts. A permission without `/` is global.
    pub fn parse(serialized: &str, value: bool) -> Result<Node, NodeError> {
        let Some((scope, permission)) = serialized.split_once('/') else {
            return NodeBuilder::new(serialized).value(value).build();
        };

        let (server, world) = match scope.split_once('-') {
            Some((server, world)) => (server, Some(world)),
            None => (scope, None),
        };
        if server.trim().is_empty() || world.is_some_and(|w| w.trim().is_empty()) {
            return Err(NodeError::InvalidContext(scope.to_owned()));
        }

        let mut builder = NodeBuilder::new(permission).value(value).server(server);
        if let Some(world) = world {
            builder = builder.world(world);
        }
        builder.build()
    }

    /// The permission string as it was given (original case).
    pub fn permission(&self) -> &str {
        &self.0.permission
    }

    /// Lowercased permission; the key used for all comparisons.
    pub fn key(&self) -> &str {
        &self.0.lower
    }

    pub fn value(&self) -> bool {
        self.0.value
    }

    pub fn contexts(&self) -> &ContextSet {
        &self.0.contexts
    }

    pub fn kind(&self) -> &NodeKind {
        &self.0.kind
    }

    pub fn is_group_node(&self) -> bool {
        matches!(self.0.kind, NodeKind::Group { .. })
    }

    pub fn group_name(&self) -> Option<&str> {
        match &self.0.kind {
            NodeKind::Group { name } => Some(name),
            _ => None,
        }
    }

    pub fn is_prefix(&self) -> bool {
        matches!(self.0.kind, NodeKind::Prefix { .. })
    }

    pub fn is_suffix(&self) -> bool {
        matches!(self.0.kind, NodeKind::Suffix { .. })
    }

    pub fn is_meta(&self) -> bool {
        matches!(self.0.kind, NodeKind::Meta { .. })
    }

    /// `true` for `*` and `<path>.*`.
    pub fn is_wildcard(&self) -> bool {
        self.0.lower == "*" || self.0.lower.ends_with(".*")
    }

    /// The first `server` context value, if the node is server-scoped.
    pub fn server(&self) -> Option<&str> {
        self.0.contexts.values(SERVER_KEY).next()
    }

    pub fn world(&self) -> Option<&str> {
        self.0.contexts.values(WORLD_KEY).next()
    }

    pub fn is_server_specific(&self) -> bool {
        self.0.contexts.contains_key(SERVER_KEY)
    }

    pub fn is_world_specific(&self) -> bool {
        self.0.contexts.contains_key(WORLD_KEY)
    }

    /// Same permission (case-insensitively) in the same contexts; the value is
    /// not compared. This is the identity used when replacing a node.
    pub fn same_target(&self, other: &Node) -> bool {
        self.0.lower == other.0.lower && self.0.contexts == other.0.contexts
    }

    /// A copy of this node with a different value.
    pub fn with_value(&self, value: bool) -> Node {
        if value == self.0.value {
            return self.clone();
        }
        Node(Arc::new(NodeInner {
            permission: self.0.permission.clone(),
            lower: self.0.lower.clone(),
            value,
            contexts: self.0.contexts.clone(),
            kind: self.0.kind.clone(),
        }))
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("permission", &self.0.permission)
            .field("value", &self.0.value)
            .field("contexts", &self.0.contexts)
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.0.permission, self.0.value)?;
        if !self.0.contexts.is_empty() {
            write!(f, " [{}]", self.0.contexts)?;
        }
        Ok(())
    }
}

/// Builder for [`Node`]. Defaults to value `true` in the global context.
#[derive(Debug, Clone)]
pub struct NodeBuilder {
    permission: String,
    value: bool,
    contexts: ContextSet,
}

impl NodeBuilder {
    pub fn new(permission: impl Into<String>) -> Self {
        NodeBuilder { permission: permission.into(), value: true, contexts: ContextSet::global() }
    }

    /// `group.<name>` reference node.
    pub fn group(name: &str) -> Self {
        Self::new(format!("{GROUP_PREFIX}{}", name.to_lowercase()))
    }

    /// `prefix.<priority>.<value>`; `value` is escaped.
    pub fn prefix(priority: i32, value: &str) -> Self {
        Self::new(format!("{PREFIX_PREFIX}{priority}.{}", escape(value)))
    }

    /// `suffix.<priority>.<value>`; `value` is escaped.
    pub fn suffix(priority: i32, value: &str) -> Self {
        Self::new(format!("{SUFFIX_PREFIX}{priority}.{}", escape(value)))
    }

    /// `meta.<key>.<value>`; `key` and `value` are escaped.
    pub fn meta(key: &str, value: &str) -> Self {
        Self::new(format!("{META_PREFIX}{}.{}", escape(key), escape(value)))
    }

    pub fn value(mut self, value: bool) -> Self {
        self.value = value;
        self
    }

    pub fn context(mut self, key: &str, value: &str) -> Self {
        self.contexts.insert(key, value);
        self
    }

    /// Replaces the whole context set.
    pub fn contexts(mut self, contexts: ContextSet) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn server(self, server: &str) -> Self {
        self.context(SERVER_KEY, server)
    }

    pub fn world(self, world: &str) -> Self {
        self.context(WORLD_KEY, world)
    }

    pub fn build(self) -> Result<Node, NodeError> {
        let permission = self.permission.trim().to_owned();
        if permission.is_empty() {
            return Err(NodeError::EmptyPermission);
        }
        let lower = permission.to_lowercase();
        let kind = NodeKind::classify(&permission);
        Ok(Node(Arc::new(NodeInner { permission, lower, value: self.value, contexts: self.contexts, kind })))
    }
}
