//! Greedy knapsack selection over ranked candidates.
//!
//! One pass, head to tail, accepting whatever still fits. Not optimal, but
//! linear in the number of candidates.
use super::utility::NodeUtility;
use crate::store::NodeId;
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Already materialized ids first, then accepted candidates in rank order.
    pub selected: Vec<NodeId>,
    /// Candidates that did not fit, still in rank order.
    pub overflow: Vec<NodeUtility>,
}

pub fn select(ranked: Vec<NodeUtility>, budget: f64, materialized_so_far: &[NodeId]) -> Selection {
    let mut selected = materialized_so_far.to_vec();
    let mut taken: HashSet<NodeId> = selected.iter().cloned().collect();
    let mut overflow = Vec::new();
    let mut current_budget = budget;

    for candidate in ranked {
        if taken.contains(&candidate.node_id) {
            continue;
        }
        if current_budget - candidate.size >= 0.0 {
            current_budget -= candidate.size;
            taken.insert(candidate.node_id.clone());
            selected.push(candidate.node_id);
        } else {
            overflow.push(candidate);
        }
    }
    Selection { selected, overflow }
}
