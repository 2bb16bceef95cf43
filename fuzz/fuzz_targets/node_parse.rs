#![no_main]

// Harness: node_parse
// Feed arbitrary serialized node strings through Node::parse and check that
// every accepted node classifies consistently and that escaped meta values
// read back unescaped.

use libfuzzer_sys::fuzz_target;
use arbitrary::Arbitrary;
use warden_core::{meta, ContextSet, Node, NodeBuilder};

#[derive(Arbitrary, Debug)]
struct Input {
    serialized: String,
    value: bool,
    meta_key: String,
    meta_value: String,
}

fuzz_target!(|input: Input| {
    if let Ok(node) = Node::parse(&input.serialized, input.value) {
        assert!(!node.permission().is_empty());
        assert_eq!(node.key(), node.permission().to_lowercase());
        if let Some(name) = node.group_name() {
            assert_eq!(name, name.to_lowercase());
        }
        let _ = node.contexts().is_satisfied_by(&ContextSet::global());
    }

    let key = input.meta_key.trim();
    let value = input.meta_value.trim();
    if key.is_empty() || value.is_empty() {
        return;
    }
    if let Ok(node) = NodeBuilder::meta(key, value).build() {
        assert_eq!(meta::resolve_meta([&node], key).as_deref(), Some(value));
    }
});
