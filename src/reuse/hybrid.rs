//! Hybrid reuse: a bottom-up walk near the requested node, switching to the
//! top-down search for the part of the graph above the cutoff.
//!
//! The bottom-up phase expands at most `cutoff` nodes. Whatever is still
//! queued at that point forms the frontier. Everything upstream of the
//! frontier is searched top-down for materialized nodes, and a reverse walk
//! from the frontier cut at those nodes completes the plan.
use super::top_down::{classify, materialized_candidates};
use super::{reverse_walk, HistoryProbe, ReusePlan, ReuseStrategy, Visit};
use crate::analysis::topology;
use crate::error::Result;
use crate::store::{HistoryGraph, NodeId, WorkloadDag};
use petgraph::graph::NodeIndex;
use std::collections::{BTreeSet, HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct HybridReuse {
    /// Nodes expanded bottom-up before switching; half the execution subgraph when unset.
    graph_length_cutoff: Option<usize>,
    history_reads: usize,
}

impl HybridReuse {
    pub fn new(graph_length_cutoff: Option<usize>) -> Self {
        Self { graph_length_cutoff, history_reads: 0 }
    }
}

impl ReuseStrategy for HybridReuse {
    fn name(&self) -> &'static str { "hybrid" }

    fn run(&mut self, vertex: &NodeId, workload: &WorkloadDag, history: &HistoryGraph) -> Result<ReusePlan> {
        let graph = workload.graph();
        let subgraph = workload.compute_execution_subgraph(vertex)?;
        let terminal = subgraph.terminal();
        let cutoff = self.graph_length_cutoff.unwrap_or(subgraph.len() / 2).max(1);
        let mut probe = HistoryProbe::new(history);

        let mut plan = if graph.at(terminal).computed {
            ReusePlan::single(vertex, false)
        } else if probe.is_mat(vertex) {
            ReusePlan::single(vertex, true)
        } else {
            let mut materialized = BTreeSet::new();
            let mut execution = BTreeSet::from([vertex.clone()]);
            let mut seen = HashSet::from([terminal]);
            let mut queue = VecDeque::from([terminal]);
            let mut expanded = 0;

            while expanded < cutoff {
                let Some(current) = queue.pop_front() else { break };
                expanded += 1;
                for prev in subgraph.predecessors(graph, current).collect::<Vec<_>>() {
                    if !seen.insert(prev) {
                        continue;
                    }
                    let node = graph.at(prev);
                    execution.insert(node.id.clone());
                    if node.computed {
                        continue;
                    }
                    if probe.is_mat(&node.id) {
                        materialized.insert(node.id.clone());
                    } else {
                        queue.push_back(prev);
                    }
                }
            }

            let frontier: Vec<NodeIndex> = queue.into_iter().collect();
            if !frontier.is_empty() {
                tracing::debug!(cutoff, frontier = frontier.len(), "switching to top-down search");
                let region = topology::upstream_from(graph, &frontier, |n| subgraph.contains(n));
                let member = |n: NodeIndex| region.contains(&n);
                let roots: Vec<NodeIndex> = subgraph
                    .nodes()
                    .filter(|n| region.contains(n))
                    .filter(|&n| !graph.predecessors(n).any(|p| region.contains(&p)))
                    .collect();
                let candidates = materialized_candidates(graph, &roots, member, &mut probe);
                let (upper_mat, upper_exec) = reverse_walk(graph, &frontier, member, |n| {
                    if seen.contains(&n) && !frontier.contains(&n) {
                        // settled by the bottom-up phase
                        Visit::Stop
                    } else {
                        classify(graph, &candidates, n)
                    }
                });
                materialized.extend(upper_mat);
                execution.extend(upper_exec);
            }
            ReusePlan { materialized, execution, ..ReusePlan::default() }
        };

        plan.history_reads = probe.reads();
        self.history_reads += plan.history_reads;
        plan.trace(self.name());
        Ok(plan)
    }

    fn history_reads(&self) -> usize { self.history_reads }
}
