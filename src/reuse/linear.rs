//! Linear-time reuse.
//!
//! A forward pass over the execution subgraph in topological order prices
//! every node: computed nodes are free, others cost their own compute time
//! plus what their inputs cost. A materialized node may instead be loaded, and
//! is loaded only when that is no dearer than rebuilding it. A backward pass
//! from the requested node then keeps the cheapest plan.
use super::{reverse_walk, warmstart, HistoryProbe, ReusePlan, ReuseStrategy, Visit};
use crate::analysis::topology;
use crate::error::Result;
use crate::store::{HistoryGraph, NodeId, NodeType, WorkloadDag};
use petgraph::graph::NodeIndex;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Choice {
    Computed,
    Load,
    Recompute,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LoadPolicy {
    /// Load only when the load cost does not exceed the execution cost.
    Cheaper,
    /// Load every materialized node.
    Always,
}

#[derive(Debug, Default)]
pub struct LinearTimeReuse {
    history_reads: usize,
}

impl LinearTimeReuse {
    pub fn new() -> Self { Self::default() }
}

impl ReuseStrategy for LinearTimeReuse {
    fn name(&self) -> &'static str { "linear" }

    fn run(&mut self, vertex: &NodeId, workload: &WorkloadDag, history: &HistoryGraph) -> Result<ReusePlan> {
        let plan = plan(vertex, workload, history, LoadPolicy::Cheaper)?;
        self.history_reads += plan.history_reads;
        plan.trace(self.name());
        Ok(plan)
    }

    fn history_reads(&self) -> usize { self.history_reads }
}

/// Baseline that loads whatever the history has materialized, with no cost
/// comparison.
#[derive(Debug, Default)]
pub struct AllMaterializedReuse {
    history_reads: usize,
}

impl AllMaterializedReuse {
    pub fn new() -> Self { Self::default() }
}

impl ReuseStrategy for AllMaterializedReuse {
    fn name(&self) -> &'static str { "all_mat" }

    fn run(&mut self, vertex: &NodeId, workload: &WorkloadDag, history: &HistoryGraph) -> Result<ReusePlan> {
        let plan = plan(vertex, workload, history, LoadPolicy::Always)?;
        self.history_reads += plan.history_reads;
        plan.trace(self.name());
        Ok(plan)
    }

    fn history_reads(&self) -> usize { self.history_reads }
}

fn plan(vertex: &NodeId, workload: &WorkloadDag, history: &HistoryGraph, policy: LoadPolicy) -> Result<ReusePlan> {
    let graph = workload.graph();
    let subgraph = workload.compute_execution_subgraph(vertex)?;
    let order = topology::sort_within(graph, &subgraph)?;
    let mut probe = HistoryProbe::new(history);

    let mut cost: HashMap<NodeIndex, f64> = HashMap::with_capacity(order.len());
    let mut choice: HashMap<NodeIndex, Choice> = HashMap::with_capacity(order.len());
    let mut warm_candidates = Vec::new();

    // Forward pass
    for &idx in &order {
        let node = graph.at(idx);
        if node.computed {
            cost.insert(idx, 0.0);
            choice.insert(idx, Choice::Computed);
            continue;
        }

        let known = probe.lookup(&node.id);
        let compute_cost = known.map_or(node.compute_cost, |h| h.compute_cost);
        let inputs: f64 = subgraph.predecessors(graph, idx).map(|p| cost[&p]).sum();
        let execution_cost = compute_cost + inputs;

        let (c, pick) = match known {
            Some(h) if h.mat => match policy {
                LoadPolicy::Always => (h.load_cost, Choice::Load),
                LoadPolicy::Cheaper if h.load_cost <= execution_cost => (h.load_cost, Choice::Load),
                LoadPolicy::Cheaper => (execution_cost, Choice::Recompute),
            },
            _ => {
                if node.node_type == NodeType::SkModel {
                    warm_candidates.push(idx);
                }
                (execution_cost, Choice::Recompute)
            }
        };
        cost.insert(idx, c);
        choice.insert(idx, pick);
    }

    // Backward pass
    let terminal = subgraph.terminal();
    let (materialized, execution) = match choice.get(&terminal).copied() {
        Some(Choice::Computed) => return Ok(single(vertex, false, probe.reads())),
        Some(Choice::Load) => return Ok(single(vertex, true, probe.reads())),
        _ => reverse_walk(graph, &[terminal], |n| subgraph.contains(n), |n| match choice.get(&n) {
            Some(Choice::Computed) => Visit::Stop,
            Some(Choice::Load) => Visit::Load,
            _ => Visit::Expand,
        }),
    };

    let kept = warm_candidates
        .into_iter()
        .filter(|idx| execution.contains(&graph.at(*idx).id));
    let warmstart = warmstart::resolve(kept, workload, &mut probe)?;

    Ok(ReusePlan { materialized, execution, warmstart, history_reads: probe.reads() })
}

fn single(vertex: &NodeId, load: bool, history_reads: usize) -> ReusePlan {
    ReusePlan { history_reads, ..ReusePlan::single(vertex, load) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{chain, history_with};
    use crate::store::{Edge, ModelSpec, Node};
    use std::collections::BTreeSet;

    fn model(random_state: u64) -> ModelSpec {
        ModelSpec { family: "logreg".into(), random_state: Some(random_state), ..Default::default() }
    }

    /// Workload root -> a -> fresh-model, where the history already trained a
    /// compatible model on a materialized `a`.
    fn warm_setup(load_a: f64) -> (WorkloadDag, HistoryGraph) {
        let (mut past, ids) = chain(&["a"]);
        let old = Node::new("old-model", NodeType::SkModel).with_score(0.8);
        past.add_operation(&ids[1], old, Edge::fit(model(7)).warm_startable(true)).unwrap();
        let h = history_with(&past, &[(&ids[1], load_a)]);

        let (mut w, ids) = chain(&["a"]);
        let fresh = Node::new("fresh-model", NodeType::SkModel).with_compute_cost(5.0);
        w.add_operation(&ids[1], fresh, Edge::fit(model(99)).should_warmstart(true)).unwrap();
        (w, h)
    }

    #[test]
    fn test_untrained_model_gets_a_warm_start() {
        let (w, h) = warm_setup(1.0);
        let plan = LinearTimeReuse::new().run(&"fresh-model".into(), &w, &h).unwrap();

        assert_eq!(plan.materialized, BTreeSet::from([NodeId::from("a")]));
        assert_eq!(plan.warmstart.len(), 1);
        let ws = &plan.warmstart[0];
        assert_eq!(ws.dataset, NodeId::from("a"));
        assert_eq!(ws.model_node, NodeId::from("fresh-model"));
        assert_eq!(ws.model, model(99));
    }

    #[test]
    fn test_equal_costs_prefer_loading() {
        // rebuilding `a` costs exactly its compute cost of 10
        let (w, h) = warm_setup(10.0);
        let plan = LinearTimeReuse::new().run(&"a".into(), &w, &h).unwrap();
        assert_eq!(plan.materialized, BTreeSet::from([NodeId::from("a")]));
        assert_eq!(plan.execution, plan.materialized);
    }

    #[test]
    fn test_expensive_load_is_skipped_and_dataset_recomputed() {
        let (w, h) = warm_setup(10.5);
        let plan = LinearTimeReuse::new().run(&"fresh-model".into(), &w, &h).unwrap();
        assert!(plan.materialized.is_empty());
        assert!(plan.execution.contains(&NodeId::from("root")));
        // `a` stays materialized in the history, so the warm start still applies
        assert_eq!(plan.warmstart.len(), 1);
    }

    #[test]
    fn test_all_materialized_loads_regardless_of_cost() {
        let (w, h) = warm_setup(1000.0);
        let plan = AllMaterializedReuse::new().run(&"fresh-model".into(), &w, &h).unwrap();
        assert_eq!(plan.materialized, BTreeSet::from([NodeId::from("a")]));
        assert_eq!(plan.warmstart.len(), 1);
    }
}
