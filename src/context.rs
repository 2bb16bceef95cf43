//!
//! Context sets and the context filter.
//!
//! A [`ContextSet`] is a multimap from context key to values. A node's context
//! set describes where it applies; a query's context set describes where the
//! check is happening. A node applies iff its set is a subset of the query's.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NodeError;
use crate::node::Node;

/// Well-known context key for the server a node is scoped to.
pub const SERVER_KEY: &str = "server";
/// Well-known context key for the world a node is scoped to.
pub const WORLD_KEY: &str = "world";

/// Key/value scoping conditions. Keys and values are stored lowercase.
///
/// The empty set is the global scope: it is satisfied by any query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextSet(BTreeMap<String, BTreeSet<String>>);

impl ContextSet {
    /// The global (empty) context set.
    pub fn global() -> Self {
        Self::default()
    }

    pub fn singleton(key: &str, value: &str) -> Self {
        let mut set = Self::default();
        set.insert(key, value);
        set
    }

    /// Builder-style [`ContextSet::insert`].
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    /// Adds a key/value pair, returning `true` if it was not already present.
    ///
    /// Blank keys or values are ignored (and `false` is returned); use
    /// [`ContextSet::from_str`] when malformed input must be reported.
    pub fn insert(&mut self, key: &str, value: &str) -> bool {
        let key = key.trim().to_lowercase();
        let value = value.trim().to_lowercase();
        if key.is_empty() || value.is_empty() {
            return false;
        }
        self.0.entry(key).or_default().insert(value)
    }

    /// Drops every value stored under `key`.
    pub fn remove_key(&mut self, key: &str) {
        self.0.remove(&key.to_lowercase());
    }

    pub fn contains(&self, key: &str, value: &str) -> bool {
        self.0
            .get(&key.to_lowercase())
            .is_some_and(|values| values.contains(&value.to_lowercase()))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(&key.to_lowercase())
    }

    /// All values stored under `key`, in sorted order.
    pub fn values<'a>(&'a self, key: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .get(&key.to_lowercase())
            .into_iter()
            .flat_map(|values| values.iter().map(String::as_str))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of key/value pairs (not keys).
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeSet::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Subset test: every pair in `self` must be present in `active`.
    ///
    /// An empty `self` is satisfied by anything.
    pub fn is_satisfied_by(&self, active: &ContextSet) -> bool {
        self.0.iter().all(|(key, values)| {
            active
                .0
                .get(key)
                .is_some_and(|active_values| values.is_subset(active_values))
        })
    }
}

impl<K: AsRef<str>, V: AsRef<str>> FromIterator<(K, V)> for ContextSet {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut set = ContextSet::default();
        for (k, v) in iter {
            set.insert(k.as_ref(), v.as_ref());
        }
        set
    }
}

/// Parses `key=value` pairs separated by commas, e.g. `server=lobby,world=nether`.
/// An empty string parses to the global set.
impl FromStr for ContextSet {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut set = ContextSet::default();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .ok_or_else(|| NodeError::InvalidContext(entry.to_owned()))?;
            if !set.insert(key, value) && (key.trim().is_empty() || value.trim().is_empty()) {
                return Err(NodeError::InvalidContext(entry.to_owned()));
            }
        }
        Ok(set)
    }
}

impl fmt::Display for ContextSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in self.iter() {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
            first = false;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Context filter
// ─────────────────────────────────────────────────────────────────────────────

/// Narrows `nodes` to those applicable under `active`, preserving order.
///
/// Must be evaluated per query: the result is only valid for this exact
/// `active` set.
pub fn filter_nodes<'a, I>(nodes: I, active: &ContextSet) -> Vec<Node>
where
    I: IntoIterator<Item = &'a Node>,
{
    nodes
        .into_iter()
        .filter(|node| node.contexts().is_satisfied_by(active))
        .cloned()
        .collect()
}
