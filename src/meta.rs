//!
//! Meta resolver: prefix, suffix and arbitrary key/value options.
//!
//! Every function takes nodes in resolution order (closest subject first,
//! transient before persistent) and ignores nodes whose value is `false`.
//! Returned strings are unescaped.

use std::collections::BTreeMap;

use crate::escape::unescape;
use crate::node::{Node, NodeKind};

/// Option key for the prefix.
pub const PREFIX_KEY: &str = "prefix";
/// Option key for the suffix.
pub const SUFFIX_KEY: &str = "suffix";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMetaType {
    Prefix,
    Suffix,
}

impl ChatMetaType {
    /// Maps `prefix`/`suffix` (any case) to a chat-meta type.
    pub fn from_option_key(key: &str) -> Option<ChatMetaType> {
        if key.eq_ignore_ascii_case(PREFIX_KEY) {
            Some(ChatMetaType::Prefix)
        } else if key.eq_ignore_ascii_case(SUFFIX_KEY) {
            Some(ChatMetaType::Suffix)
        } else {
            None
        }
    }

    fn entry(self, node: &Node) -> Option<(i32, &str)> {
        match (self, node.kind()) {
            (ChatMetaType::Prefix, NodeKind::Prefix { priority, value }) => Some((*priority, value.as_str())),
            (ChatMetaType::Suffix, NodeKind::Suffix { priority, value }) => Some((*priority, value.as_str())),
            _ => None,
        }
    }
}

/// Highest-priority enabled prefix or suffix.
///
/// On a priority tie the first such node encountered wins.
pub fn resolve_chat_meta<'a, I>(nodes: I, chat_type: ChatMetaType) -> Option<String>
where
    I: IntoIterator<Item = &'a Node>,
{
    let mut best: Option<(i32, &str)> = None;
    for node in nodes.into_iter().filter(|n| n.value()) {
        let Some((priority, value)) = chat_type.entry(node) else {
            continue;
        };
        if best.is_some_and(|(p, _)| p >= priority) {
            continue;
        }
        best = Some((priority, value));
    }
    best.map(|(_, value)| unescape(value))
}

/// Value of the first enabled meta node whose key matches `key`
/// case-insensitively. Later matches are never considered.
pub fn resolve_meta<'a, I>(nodes: I, key: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a Node>,
{
    let wanted = key.to_lowercase();
    nodes.into_iter().filter(|n| n.value()).find_map(|n| match n.kind() {
        NodeKind::Meta { key, value } if unescape(key).to_lowercase() == wanted => Some(unescape(value)),
        _ => None,
    })
}

/// Dispatches an option key: `prefix`/`suffix` to chat meta, anything else
/// to meta lookup.
pub fn resolve_option<'a, I>(nodes: I, key: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a Node>,
{
    match ChatMetaType::from_option_key(key) {
        Some(chat_type) => resolve_chat_meta(nodes, chat_type),
        None => resolve_meta(nodes, key),
    }
}

/// Every resolvable option: meta keys (lowercased, first match wins) plus
/// `prefix`/`suffix` when present.
pub fn collect_options<'a, I>(nodes: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a Node>,
{
    let nodes: Vec<&Node> = nodes.into_iter().collect();
    let mut out = BTreeMap::new();
    for node in nodes.iter().filter(|n| n.value()) {
        if let NodeKind::Meta { key, value } = node.kind() {
            out.entry(unescape(key).to_lowercase()).or_insert_with(|| unescape(value));
        }
    }
    if let Some(prefix) = resolve_chat_meta(nodes.iter().copied(), ChatMetaType::Prefix) {
        out.insert(PREFIX_KEY.to_owned(), prefix);
    }
    if let Some(suffix) = resolve_chat_meta(nodes.iter().copied(), ChatMetaType::Suffix) {
        out.insert(SUFFIX_KEY.to_owned(), suffix);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;

    #[test]
    fn highest_priority_prefix_wins() {
        let nodes = vec![
            NodeBuilder::prefix(10, "[A]").build().unwrap(),
            NodeBuilder::prefix(20, "[B]").build().unwrap(),
        ];
        assert_eq!(resolve_chat_meta(&nodes, ChatMetaType::Prefix).as_deref(), Some("[B]"));
        assert_eq!(resolve_chat_meta(&nodes, ChatMetaType::Suffix), None);
    }

    #[test]
    fn priority_tie_keeps_first() {
        let nodes = vec![
            NodeBuilder::suffix(5, "first").build().unwrap(),
            NodeBuilder::suffix(5, "second").build().unwrap(),
        ];
        assert_eq!(resolve_chat_meta(&nodes, ChatMetaType::Suffix).as_deref(), Some("first"));
    }

    #[test]
    fn disabled_nodes_are_ignored() {
        let nodes = vec![
            NodeBuilder::prefix(50, "[Off]").value(false).build().unwrap(),
            NodeBuilder::prefix(1, "[On]").build().unwrap(),
            NodeBuilder::meta("rank", "off").value(false).build().unwrap(),
        ];
        assert_eq!(resolve_chat_meta(&nodes, ChatMetaType::Prefix).as_deref(), Some("[On]"));
        assert_eq!(resolve_meta(&nodes, "rank"), None);
    }

    #[test]
    fn first_meta_match_wins_case_insensitively() {
        let nodes = vec![
            NodeBuilder::meta("Rank", "gold").build().unwrap(),
            NodeBuilder::meta("rank", "silver").build().unwrap(),
        ];
        assert_eq!(resolve_meta(&nodes, "RANK").as_deref(), Some("gold"));
        assert_eq!(resolve_option(&nodes, "rank").as_deref(), Some("gold"));
    }

    #[test]
    fn values_are_unescaped() {
        let nodes = vec![
            NodeBuilder::meta("motd", "v1.2/beta$").build().unwrap(),
            NodeBuilder::prefix(1, "[Mr.]").build().unwrap(),
        ];
        assert_eq!(resolve_meta(&nodes, "motd").as_deref(), Some("v1.2/beta$"));
        assert_eq!(resolve_option(&nodes, "Prefix").as_deref(), Some("[Mr.]"));
    }

    #[test]
    fn collect_includes_chat_meta() {
        let nodes = vec![
            NodeBuilder::meta("a", "1").build().unwrap(),
            NodeBuilder::meta("A", "2").build().unwrap(),
            NodeBuilder::suffix(3, "!").build().unwrap(),
        ];
        let options = collect_options(&nodes);
        assert_eq!(options.get("a").map(String::as_str), Some("1"));
        assert_eq!(options.get("suffix").map(String::as_str), Some("!"));
        assert!(!options.contains_key("prefix"));
    }
}
