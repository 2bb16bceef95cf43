#![no_main]

// Harness: tree_lookup
// Build a tree from arbitrary (permission, value) pairs and query it with
// arbitrary strings. Lookups must never panic, and an exact entry must
// always answer for itself.

use libfuzzer_sys::fuzz_target;
use arbitrary::Arbitrary;
use warden_core::{NodeTree, Tristate};

#[derive(Arbitrary, Debug)]
struct Input {
    entries: Vec<(String, bool)>,
    queries: Vec<String>,
}

fuzz_target!(|input: Input| {
    let tree = NodeTree::from_pairs(input.entries.iter().map(|(p, v)| (p.as_str(), *v)));
    for query in &input.queries {
        let _ = tree.get(query);
    }
    if let Some((permission, value)) = input.entries.last() {
        if !permission.ends_with('*') {
            assert_eq!(tree.get(permission), Tristate::from(*value));
        }
    }
});
