//! Reverse breadth-first search from the requested node. Every reached
//! predecessor joins the plan; the walk stops at computed nodes and loads
//! anything the history has materialized.
use super::{reverse_walk, HistoryProbe, ReusePlan, ReuseStrategy, Visit};
use crate::error::Result;
use crate::store::{ArtifactGraph, HistoryGraph, NodeId, WorkloadDag};
use petgraph::graph::NodeIndex;

/// Walks the reduced execution subgraph.
#[derive(Debug, Default)]
pub struct BottomUpReuse {
    history_reads: usize,
}

impl BottomUpReuse {
    pub fn new() -> Self { Self::default() }
}

impl ReuseStrategy for BottomUpReuse {
    fn name(&self) -> &'static str { "bottomup" }

    fn run(&mut self, vertex: &NodeId, workload: &WorkloadDag, history: &HistoryGraph) -> Result<ReusePlan> {
        let subgraph = workload.compute_execution_subgraph(vertex)?;
        let plan = reverse_bfs(workload.graph(), subgraph.terminal(), |n| subgraph.contains(n), history);
        self.history_reads += plan.history_reads;
        plan.trace(self.name());
        Ok(plan)
    }

    fn history_reads(&self) -> usize { self.history_reads }
}

/// Walks the whole workload graph in place, skipping the subgraph reduction.
/// Same answers as [`BottomUpReuse`].
#[derive(Debug, Default)]
pub struct FastBottomUpReuse {
    history_reads: usize,
}

impl FastBottomUpReuse {
    pub fn new() -> Self { Self::default() }
}

impl ReuseStrategy for FastBottomUpReuse {
    fn name(&self) -> &'static str { "fast_bottomup" }

    fn run(&mut self, vertex: &NodeId, workload: &WorkloadDag, history: &HistoryGraph) -> Result<ReusePlan> {
        let terminal = workload.graph().require(vertex)?;
        let plan = reverse_bfs(workload.graph(), terminal, |_| true, history);
        self.history_reads += plan.history_reads;
        plan.trace(self.name());
        Ok(plan)
    }

    fn history_reads(&self) -> usize { self.history_reads }
}

fn reverse_bfs(
    graph: &ArtifactGraph,
    terminal: NodeIndex,
    member: impl Fn(NodeIndex) -> bool,
    history: &HistoryGraph,
) -> ReusePlan {
    let mut probe = HistoryProbe::new(history);
    let id = &graph.at(terminal).id;

    let mut plan = if graph.at(terminal).computed {
        ReusePlan::single(id, false)
    } else if probe.is_mat(id) {
        ReusePlan::single(id, true)
    } else {
        let (materialized, execution) = reverse_walk(graph, &[terminal], member, |n| {
            let node = graph.at(n);
            if node.computed {
                Visit::Stop
            } else if probe.is_mat(&node.id) {
                Visit::Load
            } else {
                Visit::Expand
            }
        });
        ReusePlan { materialized, execution, ..ReusePlan::default() }
    };
    plan.history_reads = probe.reads();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{chain, history_with};
    use crate::store::{Edge, Node, NodeType};
    use std::collections::HashSet;

    #[test]
    fn test_materialized_terminal_is_loaded_directly() {
        let (w, ids) = chain(&["a", "b"]);
        let h = history_with(&w, &[(&ids[2], 0.0)]);
        let plan = BottomUpReuse::new().run(&ids[2], &w, &h).unwrap();
        assert_eq!(plan.materialized.len(), 1);
        assert_eq!(plan.execution, plan.materialized);
        assert_eq!(plan.history_reads, 1);
    }

    #[test]
    fn test_fast_variant_matches_on_branching_graph() {
        let (mut w, ids) = chain(&["a", "b", "c"]);
        let left = w.add_operation(&ids[2], Node::new("left", NodeType::Feature), Edge::apply("left")).unwrap();
        let merged = w.add_combine(&[ids[3].clone(), left]).unwrap();
        let out = w.add_operation(&merged, Node::new("out", NodeType::Dataset), Edge::apply("concat")).unwrap();
        let h = history_with(&w, &[(&ids[2], 0.5)]);

        let slow = BottomUpReuse::new().run(&out, &w, &h).unwrap();
        let fast = FastBottomUpReuse::new().run(&out, &w, &h).unwrap();
        assert_eq!(slow.materialized, fast.materialized);
        assert_eq!(slow.execution, fast.execution);
    }

    /// Every node left out of the plan must be hidden behind a load point or
    /// a computed node.
    #[test]
    fn test_excluded_nodes_are_unreachable_without_crossing_a_stop() {
        let (mut w, ids) = chain(&["a", "b", "c", "d"]);
        let side = w.add_operation(&ids[1], Node::new("side", NodeType::Feature), Edge::apply("side")).unwrap();
        let merged = w.add_combine(&[ids[4].clone(), side]).unwrap();
        let h = history_with(&w, &[(&ids[3], 0.0)]);
        let plan = BottomUpReuse::new().run(&merged, &w, &h).unwrap();

        let graph = w.graph();
        let mut reachable = HashSet::new();
        let mut stack = vec![graph.index_of(&merged).unwrap()];
        while let Some(n) = stack.pop() {
            if !reachable.insert(n) {
                continue;
            }
            let node = graph.at(n);
            if n == graph.index_of(&merged).unwrap() || !(node.computed || plan.materialized.contains(&node.id)) {
                stack.extend(graph.predecessors(n));
            }
        }
        for n in graph.indices() {
            if !plan.execution.contains(&graph.at(n).id) {
                assert!(!reachable.contains(&n), "{} should be in the plan", graph.at(n).id);
            }
        }
        assert!(!plan.execution.contains(&ids[2]));
    }
}
