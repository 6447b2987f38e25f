use super::{ReusePlan, ReuseStrategy};
use crate::error::Result;
use crate::store::{HistoryGraph, NodeId, WorkloadDag};

/// Baseline that never loads: the whole execution subgraph runs.
#[derive(Debug, Default)]
pub struct AllComputeReuse {
    history_reads: usize,
}

impl AllComputeReuse {
    pub fn new() -> Self { Self::default() }
}

impl ReuseStrategy for AllComputeReuse {
    fn name(&self) -> &'static str { "all_compute" }

    fn run(&mut self, vertex: &NodeId, workload: &WorkloadDag, _history: &HistoryGraph) -> Result<ReusePlan> {
        let subgraph = workload.compute_execution_subgraph(vertex)?;
        let plan = ReusePlan { execution: subgraph.ids(workload.graph()), ..ReusePlan::default() };
        plan.trace(self.name());
        Ok(plan)
    }

    fn history_reads(&self) -> usize { self.history_reads }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{chain, history_with};

    #[test]
    fn test_ignores_materialized_history() {
        let (w, ids) = chain(&["a", "b"]);
        let h = history_with(&w, &[(&ids[1], 0.0), (&ids[2], 0.0)]);
        let mut reuse = AllComputeReuse::new();
        let plan = reuse.run(&ids[2], &w, &h).unwrap();
        assert!(plan.materialized.is_empty());
        assert_eq!(plan.execution.len(), 3);
        assert_eq!(reuse.history_reads(), 0);
    }
}
