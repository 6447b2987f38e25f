//! Reuse strategies: given a requested node, decide which workload nodes must
//! run and which of them can be loaded from the history instead.
//!
//! Every strategy answers with a [`ReusePlan`] where `materialized` is a subset
//! of `execution`. Nodes outside `execution` are either already computed in
//! this run or unreachable from the requested node without crossing a load point.

pub mod baseline;
pub mod bottom_up;
pub mod hybrid;
pub mod linear;
pub mod top_down;
pub mod warmstart;

use crate::config::OptimizerConfig;
use crate::error::{OptimizerError, Result};
use crate::store::{ArtifactGraph, HistoryGraph, HistoryStatus, Node, NodeId, WorkloadDag};
use petgraph::graph::NodeIndex;
use std::collections::{BTreeSet, HashSet, VecDeque};

pub use baseline::AllComputeReuse;
pub use bottom_up::{BottomUpReuse, FastBottomUpReuse};
pub use hybrid::HybridReuse;
pub use linear::{AllMaterializedReuse, LinearTimeReuse};
pub use top_down::TopDownReuse;
pub use warmstart::WarmStart;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReusePlan {
    /// Nodes to load from the artifact store.
    pub materialized: BTreeSet<NodeId>,
    /// Nodes that take part in producing the requested node.
    pub execution: BTreeSet<NodeId>,
    pub warmstart: Vec<WarmStart>,
    /// History lookups spent on this plan.
    pub history_reads: usize,
}

impl ReusePlan {
    /// Plan for a node that needs nothing upstream (computed, or loaded itself).
    fn single(id: &NodeId, load: bool) -> Self {
        let execution = BTreeSet::from([id.clone()]);
        let materialized = if load { execution.clone() } else { BTreeSet::new() };
        Self { materialized, execution, ..Self::default() }
    }

    fn trace(&self, strategy: &str) {
        tracing::debug!(
            strategy,
            materialized = self.materialized.len(),
            execution = self.execution.len(),
            warmstart = self.warmstart.len(),
            history_reads = self.history_reads,
            "reuse plan ready"
        );
    }
}

pub trait ReuseStrategy {
    fn name(&self) -> &'static str;

    fn run(&mut self, vertex: &NodeId, workload: &WorkloadDag, history: &HistoryGraph) -> Result<ReusePlan>;

    /// History lookups over every run of this instance.
    fn history_reads(&self) -> usize;
}

/// Counting view of the history graph. Nodes missing from the history are an
/// ordinary answer (`Absent`), never an error.
pub struct HistoryProbe<'h> {
    history: &'h HistoryGraph,
    reads: usize,
}

impl<'h> HistoryProbe<'h> {
    pub fn new(history: &'h HistoryGraph) -> Self { Self { history, reads: 0 } }
    pub fn reads(&self) -> usize { self.reads }
    pub fn history(&self) -> &'h HistoryGraph { self.history }

    pub fn lookup(&mut self, id: &NodeId) -> Option<&'h Node> {
        self.reads += 1;
        self.history.node(id)
    }

    pub fn status(&mut self, id: &NodeId) -> HistoryStatus {
        self.reads += 1;
        self.history.status(id)
    }

    pub fn is_mat(&mut self, id: &NodeId) -> bool {
        self.status(id) == HistoryStatus::Materialized
    }
}

/// What a reverse walk does with a reached predecessor. The node joins the
/// execution set in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visit {
    /// Keep walking upstream.
    Expand,
    /// Load it; its own inputs are not needed.
    Load,
    /// Already available in this run.
    Stop,
}

/// Breadth-first walk over predecessor edges starting from `starts`, limited
/// to `member` nodes. Predecessor lists are re-derived on every pop.
pub(crate) fn reverse_walk(
    graph: &ArtifactGraph,
    starts: &[NodeIndex],
    member: impl Fn(NodeIndex) -> bool,
    mut classify: impl FnMut(NodeIndex) -> Visit,
) -> (BTreeSet<NodeId>, BTreeSet<NodeId>) {
    let mut materialized = BTreeSet::new();
    let mut execution = BTreeSet::new();
    let mut seen: HashSet<NodeIndex> = starts.iter().copied().collect();
    let mut queue: VecDeque<NodeIndex> = starts.iter().copied().collect();
    for &start in starts {
        execution.insert(graph.at(start).id.clone());
    }

    while let Some(current) = queue.pop_front() {
        let prevs: Vec<NodeIndex> = graph.predecessors(current).filter(|&p| member(p)).collect();
        for prev in prevs {
            if !seen.insert(prev) {
                continue;
            }
            let id = graph.at(prev).id.clone();
            match classify(prev) {
                Visit::Expand => queue.push_back(prev),
                Visit::Load => {
                    materialized.insert(id.clone());
                }
                Visit::Stop => {}
            }
            execution.insert(id);
        }
    }
    (materialized, execution)
}

/// Resolves a reuse strategy by name (case-insensitive).
pub fn from_name(name: &str, config: &OptimizerConfig) -> Result<Box<dyn ReuseStrategy>> {
    match name.to_ascii_lowercase().as_str() {
        "all_compute" => Ok(Box::new(AllComputeReuse::new())),
        "all_mat" => Ok(Box::new(AllMaterializedReuse::new())),
        "bottomup" => Ok(Box::new(BottomUpReuse::new())),
        "fast_bottomup" => Ok(Box::new(FastBottomUpReuse::new())),
        "topdown" => Ok(Box::new(TopDownReuse::new())),
        "hybrid" => Ok(Box::new(HybridReuse::new(config.graph_length_cutoff))),
        "linear" => Ok(Box::new(LinearTimeReuse::new())),
        _ => Err(OptimizerError::UnknownReuseStrategy(name.to_string())),
    }
}
