//! Graph builders shared by the unit tests.
use crate::store::{Artifact, Column, Edge, HistoryGraph, Node, NodeId, NodeType, WorkloadDag};
use std::sync::Arc;

/// A single-column artifact of `len` bytes.
pub(crate) fn bytes(hash: &str, len: usize) -> Artifact {
    Artifact::Columns(vec![Column { hash: hash.to_string(), data: Arc::from(vec![0u8; len]) }])
}

/// `root -> names[0] -> names[1] -> ...`. The root holds a 100 byte artifact
/// and costs nothing; every other step costs 10. `ids[0]` is the root.
pub(crate) fn chain(names: &[&str]) -> (WorkloadDag, Vec<NodeId>) {
    let mut w = WorkloadDag::new();
    let mut ids = vec![w.add_root(Node::root("root", NodeType::Dataset), bytes("root-col", 100))];
    for name in names {
        let parent = ids[ids.len() - 1].clone();
        let node = Node::new(*name, NodeType::Dataset).with_compute_cost(10.0);
        let id = w.add_operation(&parent, node, Edge::apply(name)).expect("chain edge");
        ids.push(id);
    }
    (w, ids)
}

/// History built from one pass over `w`, then with every `(id, load_cost)`
/// flagged as materialized.
pub(crate) fn history_with(w: &WorkloadDag, materialized: &[(&NodeId, f64)]) -> HistoryGraph {
    let mut h = HistoryGraph::new();
    h.extend(w).expect("extend");
    for (id, load_cost) in materialized {
        let node = h.graph_mut().node_mut(id).expect("materialized node in history");
        node.mat = true;
        node.load_cost = *load_cost;
    }
    h
}
