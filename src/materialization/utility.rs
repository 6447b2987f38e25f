//! Utility (rho) of keeping a node materialized.
use crate::store::{ColumnRef, HistoryGraph, Node, NodeId, NodeType, WorkloadDag};
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Storage-normalized score: `(alpha * potential + (1 - alpha) * cost) / size`.
///
/// A zero-sized artifact costs nothing to keep, so any positive benefit makes
/// it infinitely attractive.
pub fn rho(n_potential: f64, n_recreation_cost: f64, size: f64, alpha: f64) -> f64 {
    let benefit = alpha * n_potential + (1.0 - alpha) * n_recreation_cost;
    if size > 0.0 {
        benefit / size
    } else if benefit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Utility of a single node. Roots are always kept (infinite utility); nodes
/// that cannot or should not be materialized score 0.
pub fn utility(node: &Node, alpha: f64) -> f64 {
    if node.root {
        f64::INFINITY
    } else if excluded(node) {
        0.0
    } else {
        rho(node.n_potential, node.n_recreation_cost, node.size, alpha)
    }
}

fn excluded(node: &Node) -> bool {
    !node.node_type.is_materializable() || node.load_cost > node.recreation_cost
}

/// A ranked materialization candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUtility {
    pub node_id: NodeId,
    pub node_type: NodeType,
    pub normalized_cost: f64,
    pub normalized_potential: f64,
    /// Bytes the node would add to the store. Starts as the declared size and
    /// shrinks once columns it shares are already accounted for.
    pub size: f64,
    pub columns: SmallVec<[ColumnRef; 4]>,
    pub utility_value: f64,
}

impl NodeUtility {
    pub fn new(node: &Node, alpha: f64) -> Self {
        Self {
            node_id: node.id.clone(),
            node_type: node.node_type,
            normalized_cost: node.n_recreation_cost,
            normalized_potential: node.n_potential,
            size: node.size,
            columns: node.columns.clone(),
            utility_value: utility(node, alpha),
        }
    }
}

/// Ranks every history node that is currently materialized or part of the
/// running workload, best first. Ties keep graph insertion order.
pub fn compute_rhos(history: &HistoryGraph, workload: &WorkloadDag, alpha: f64) -> Vec<NodeUtility> {
    let mut rhos: Vec<NodeUtility> = history
        .graph()
        .nodes()
        .filter(|node| !node.root)
        .filter(|node| {
            if excluded(node) {
                tracing::debug!(node = %node.id, kind = ?node.node_type, "skipping node that cannot be materialized or is cheaper to recreate");
                return false;
            }
            node.mat || workload.contains(&node.id)
        })
        .map(|node| NodeUtility::new(node, alpha))
        .collect();

    rhos.sort_by(|a, b| descending(a.utility_value, b.utility_value));
    rhos
}

fn descending(a: f64, b: f64) -> Ordering {
    b.total_cmp(&a)
}
