//!
//! Inheritance walker.
//!
//! Starting from one subject, follows enabled `group.<name>` nodes depth-first
//! (pre-order, in node order) and returns one [`Layer`] of context-filtered
//! nodes per visited subject. A visited-set threaded through the walk makes
//! it terminate on cyclic configurations: a subject that shows up again is
//! skipped, never re-descended. Cycles are logged, not reported as errors.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::context::ContextSet;
use crate::node::Node;
use crate::registry::SubjectRegistry;
use crate::subject::{Group, Subject};
use crate::types::SubjectKind;

type VisitKey = (SubjectKind, String);

/// Context-filtered nodes contributed by one subject.
#[derive(Debug, Clone)]
pub struct Layer {
    pub kind: SubjectKind,
    pub identifier: String,
    pub nodes: Vec<Node>,
}

/// One walk over a registry under a fixed context set.
pub struct InheritanceWalker<'a> {
    registry: &'a dyn SubjectRegistry,
    contexts: &'a ContextSet,
    log_cycles: bool,
}

impl<'a> InheritanceWalker<'a> {
    pub fn new(registry: &'a dyn SubjectRegistry, contexts: &'a ContextSet) -> Self {
        InheritanceWalker { registry, contexts, log_cycles: true }
    }

    pub fn log_cycles(mut self, enabled: bool) -> Self {
        self.log_cycles = enabled;
        self
    }

    /// Names of the groups referenced by enabled group nodes, in node order.
    pub fn parent_names(nodes: &[Node]) -> Vec<String> {
        nodes
            .iter()
            .filter(|n| n.value())
            .filter_map(|n| n.group_name().map(str::to_owned))
            .collect()
    }

    /// Direct parents of `subject`, resolved through the registry.
    pub fn direct_parents(&self, subject: &dyn Subject) -> Vec<Arc<Group>> {
        let nodes = subject.own_nodes(self.contexts);
        Self::parent_names(&nodes)
            .iter()
            .map(|name| self.registry.lookup_group(name))
            .collect()
    }

    /// All layers reachable from `root`, `root` first.
    pub fn walk(&self, root: &dyn Subject) -> Vec<Layer> {
        let mut visited: HashSet<VisitKey> = HashSet::new();
        let mut path: Vec<VisitKey> = Vec::new();
        let mut layers = Vec::new();

        visited.insert((root.kind(), root.identifier().to_owned()));
        self.descend(root, &mut visited, &mut path, &mut layers);
        layers
    }

    fn descend(
        &self,
        subject: &dyn Subject,
        visited: &mut HashSet<VisitKey>,
        path: &mut Vec<VisitKey>,
        layers: &mut Vec<Layer>,
    ) {
        let nodes = subject.own_nodes(self.contexts);
        let parents = Self::parent_names(&nodes);
        layers.push(Layer { kind: subject.kind(), identifier: subject.identifier().to_owned(), nodes });

        path.push((subject.kind(), subject.identifier().to_owned()));
        for name in parents {
            let key = (SubjectKind::Group, name);
            if !visited.insert(key.clone()) {
                if path.contains(&key) {
                    if self.log_cycles {
                        warn!(
                            subject = %subject.identifier(),
                            parent = %key.1,
                            "inheritance cycle detected, skipping parent"
                        );
                    }
                } else {
                    trace!(parent = %key.1, "parent already inherited through another branch");
                }
                continue;
            }
            let group = self.registry.lookup_group(&key.1);
            self.descend(group.as_ref(), visited, path, layers);
        }
        path.pop();
    }
}

/// Flattens layers into one node list in resolution order.
///
/// A node is dropped when a closer layer already defined the same permission
/// (compared lowercase); within a single layer every node is kept so that
/// duplicate entries reach the node tree, where the last one wins.
pub fn flatten(layers: Vec<Layer>) -> Vec<Node> {
    let mut claimed: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for layer in layers {
        let start = out.len();
        out.extend(layer.nodes.into_iter().filter(|n| !claimed.contains(n.key())));
        claimed.extend(out[start..].iter().map(|n| n.key().to_owned()));
    }
    out
}
