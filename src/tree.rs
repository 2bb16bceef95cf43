//!
//! Segment trie for tri-state permission lookup.
//!
//! Permissions are split on `.` and lowercased. Each trie position can hold
//! an exact value (a node whose permission is exactly that path) and a
//! wildcard value (a node `<path>.*` anchored at that position). The root can
//! hold the value of a bare `*`.
//!
//! Lookup precedence for `a.b.c`:
//! 1. an exact `a.b.c` node;
//! 2. the deepest wildcard anchored at a strict prefix: `a.b.*`, then `a.*`,
//!    then `*`;
//! 3. otherwise [`Tristate::Undefined`].
//!
//! A wildcard never covers its own anchor: `a.*` applies to `a.b` but not `a`.

use std::collections::HashMap;

use crate::node::Node;
use crate::types::Tristate;

const WILDCARD: &str = "*";

#[derive(Debug, Default, Clone)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    exact: Option<bool>,
    wildcard: Option<bool>,
}

/// Tri-state lookup structure over one (already context-filtered) node set.
///
/// Conflicting entries for the same permission follow "last write wins": the
/// node presented last to [`NodeTree::insert`] / [`NodeTree::from_nodes`]
/// determines the value.
#[derive(Debug, Default, Clone)]
pub struct NodeTree {
    root: TrieNode,
    len: usize,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from nodes in iteration order.
    pub fn from_nodes<'a, I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let mut tree = Self::new();
        for node in nodes {
            tree.insert(node.key(), node.value());
        }
        tree
    }

    /// Builds a tree from raw `(permission, value)` pairs.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: AsRef<str>,
    {
        let mut tree = Self::new();
        for (permission, value) in pairs {
            tree.insert(permission.as_ref(), value);
        }
        tree
    }

    /// Records `permission = value`, overwriting any earlier entry for the
    /// same permission.
    pub fn insert(&mut self, permission: &str, value: bool) {
        let lower = permission.to_lowercase();
        let mut segments: Vec<&str> = lower.split('.').collect();
        let is_wildcard = segments.last() == Some(&WILDCARD);
        if is_wildcard {
            segments.pop();
        }

        let mut cur = &mut self.root;
        for segment in segments {
            cur = cur.children.entry(segment.to_owned()).or_default();
        }

        let slot = if is_wildcard { &mut cur.wildcard } else { &mut cur.exact };
        if slot.replace(value).is_none() {
            self.len += 1;
        }
    }

    /// Resolves `permission` against the tree. See the module docs for the
    /// precedence rules.
    pub fn get(&self, permission: &str) -> Tristate {
        let lower = permission.to_lowercase();
        let segments: Vec<&str> = lower.split('.').collect();
        let last = segments.len() - 1;

        let mut best = self.root.wildcard;
        let mut cur = &self.root;
        for (i, segment) in segments.iter().enumerate() {
            let Some(child) = cur.children.get(*segment) else {
                break;
            };
            if i == last {
                if let Some(exact) = child.exact {
                    return Tristate::from(exact);
                }
            } else if child.wildcard.is_some() {
                best = child.wildcard;
            }
            cur = child;
        }
        Tristate::from(best)
    }

    /// Number of distinct entries (exact and wildcard) recorded.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;

    #[test]
    fn exact_wins_over_wildcard() {
        let tree = NodeTree::from_pairs([("a.*", true), ("a.b", false)]);
        assert_eq!(tree.get("a.b"), Tristate::False);
        assert_eq!(tree.get("a.c"), Tristate::True);
        assert_eq!(tree.get("a.c.d"), Tristate::True);
    }

    #[test]
    fn wildcard_does_not_cover_its_anchor() {
        let tree = NodeTree::from_pairs([("a.*", true)]);
        assert_eq!(tree.get("a"), Tristate::Undefined);
        assert_eq!(tree.get("a.*"), Tristate::True);
    }

    #[test]
    fn deepest_wildcard_wins() {
        let tree = NodeTree::from_pairs([("*", true), ("a.*", false), ("a.b.*", true)]);
        assert_eq!(tree.get("a.b.c"), Tristate::True);
        assert_eq!(tree.get("a.x"), Tristate::False);
        assert_eq!(tree.get("z"), Tristate::True);
        assert_eq!(tree.get("*"), Tristate::True);
    }

    #[test]
    fn root_wildcard_is_lowest_precedence() {
        let tree = NodeTree::from_pairs([("*", true), ("x.y", false)]);
        assert_eq!(tree.get("x.y"), Tristate::False);
        assert_eq!(tree.get("x.z"), Tristate::True);
    }

    #[test]
    fn no_match_is_undefined() {
        let tree = NodeTree::from_pairs([("a.b", true)]);
        assert_eq!(tree.get("a"), Tristate::Undefined);
        assert_eq!(tree.get("a.b.c"), Tristate::Undefined);
        assert_eq!(tree.get("b"), Tristate::Undefined);
        assert_eq!(NodeTree::new().get("anything"), Tristate::Undefined);
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let tree = NodeTree::from_pairs([("Essentials.Fly", true)]);
        assert_eq!(tree.get("essentials.FLY"), Tristate::True);
    }

    #[test]
    fn last_write_wins() {
        let nodes = vec![
            NodeBuilder::new("a.b").value(true).build().unwrap(),
            NodeBuilder::new("A.B").value(false).build().unwrap(),
        ];
        let tree = NodeTree::from_nodes(&nodes);
        assert_eq!(tree.get("a.b"), Tristate::False);
        assert_eq!(tree.len(), 1);

        let reversed: Vec<Node> = nodes.into_iter().rev().collect();
        assert_eq!(NodeTree::from_nodes(&reversed).get("a.b"), Tristate::True);
    }
}
