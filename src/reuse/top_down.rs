//! Top-down reuse: find materialized nodes by walking forward from the roots
//! of the execution subgraph, then cut the reverse walk at them.
use super::{reverse_walk, HistoryProbe, ReusePlan, ReuseStrategy, Visit};
use crate::error::Result;
use crate::store::{ArtifactGraph, HistoryGraph, HistoryStatus, NodeId, WorkloadDag};
use petgraph::graph::NodeIndex;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct TopDownReuse {
    history_reads: usize,
}

impl TopDownReuse {
    pub fn new() -> Self { Self::default() }
}

impl ReuseStrategy for TopDownReuse {
    fn name(&self) -> &'static str { "topdown" }

    fn run(&mut self, vertex: &NodeId, workload: &WorkloadDag, history: &HistoryGraph) -> Result<ReusePlan> {
        let graph = workload.graph();
        let subgraph = workload.compute_execution_subgraph(vertex)?;
        let terminal = subgraph.terminal();
        let mut probe = HistoryProbe::new(history);

        let mut plan = if graph.at(terminal).computed {
            ReusePlan::single(vertex, false)
        } else {
            let member = |n: NodeIndex| subgraph.contains(n);
            let candidates = materialized_candidates(graph, &subgraph.roots(graph), member, &mut probe);
            if candidates.is_empty() {
                ReusePlan { execution: subgraph.ids(graph), ..ReusePlan::default() }
            } else if candidates.contains(&terminal) {
                ReusePlan::single(vertex, true)
            } else {
                let (materialized, execution) =
                    reverse_walk(graph, &[terminal], member, |n| classify(graph, &candidates, n));
                ReusePlan { materialized, execution, ..ReusePlan::default() }
            }
        };
        plan.history_reads = probe.reads();
        self.history_reads += plan.history_reads;
        plan.trace(self.name());
        Ok(plan)
    }

    fn history_reads(&self) -> usize { self.history_reads }
}

pub(crate) fn classify(graph: &ArtifactGraph, candidates: &HashSet<NodeIndex>, n: NodeIndex) -> Visit {
    if graph.at(n).computed {
        Visit::Stop
    } else if candidates.contains(&n) {
        Visit::Load
    } else {
        Visit::Expand
    }
}

/// Forward BFS from every root over `member` nodes. Materialized nodes are
/// collected and walked through, known but unmaterialized nodes are walked
/// through, and nodes the history has never seen end the path: nothing below
/// them can have been stored.
pub(crate) fn materialized_candidates(
    graph: &ArtifactGraph,
    roots: &[NodeIndex],
    member: impl Fn(NodeIndex) -> bool,
    probe: &mut HistoryProbe<'_>,
) -> HashSet<NodeIndex> {
    let mut candidates = HashSet::new();

    for &root in roots {
        match probe.status(&graph.at(root).id) {
            HistoryStatus::Materialized => {
                candidates.insert(root);
            }
            HistoryStatus::Stored => {}
            HistoryStatus::Absent => continue,
        }

        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(current) = queue.pop_front() {
            for next in graph.successors(current).filter(|&s| member(s)) {
                // already reached from an earlier root
                if !visited.insert(next) || candidates.contains(&next) {
                    continue;
                }
                match probe.status(&graph.at(next).id) {
                    HistoryStatus::Materialized => {
                        candidates.insert(next);
                        queue.push_back(next);
                    }
                    HistoryStatus::Stored => queue.push_back(next),
                    HistoryStatus::Absent => {}
                }
            }
        }
    }
    candidates
}
