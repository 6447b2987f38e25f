//! Materializers decide which history nodes keep their artifacts, then move
//! artifacts in and out of the store to match.
use super::selector::{select, Selection};
use super::utility::{compute_rhos, NodeUtility};
use crate::error::{OptimizerError, Result};
use crate::store::{ArtifactStore, HistoryGraph, NodeId, WorkloadDag};
use std::collections::HashSet;

/// Nodes whose artifacts moved during `run_and_materialize`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterializationReport {
    pub stored: Vec<NodeId>,
    pub evicted: Vec<NodeId>,
}

pub trait Materializer {
    fn name(&self) -> &'static str;

    /// Ids that should end up materialized. Never touches the store.
    fn run(&self, history: &HistoryGraph, workload: &WorkloadDag) -> Result<Vec<NodeId>>;

    /// `run`, then store or evict artifacts until the history agrees with it.
    fn run_and_materialize(
        &self,
        history: &mut HistoryGraph,
        workload: &WorkloadDag,
        store: &mut dyn ArtifactStore,
    ) -> Result<MaterializationReport> {
        let target = self.run(history, workload)?;
        apply(history, workload, &target, store)
    }
}

/// Materializes every target node that is not yet stored (its artifact comes
/// from the live workload) and unmaterializes every stored node outside the target.
///
/// Artifact sources and evictions are checked before anything moves, so a
/// missing artifact leaves the history and the store untouched. Errors raised
/// by the store itself can still interrupt the moves part way.
pub fn apply(
    history: &mut HistoryGraph,
    workload: &WorkloadDag,
    target: &[NodeId],
    store: &mut dyn ArtifactStore,
) -> Result<MaterializationReport> {
    let target: HashSet<&NodeId> = target.iter().collect();
    let mut to_store = Vec::new();
    let mut to_evict = Vec::new();
    for node in history.graph().nodes() {
        match (target.contains(&node.id), node.mat) {
            (true, false) => to_store.push(node.id.clone()),
            (false, true) => to_evict.push(node.id.clone()),
            _ => {}
        }
    }

    let mut artifacts = Vec::with_capacity(to_store.len());
    for id in to_store {
        match workload.artifact(&id) {
            Some(artifact) => artifacts.push((id, artifact)),
            None if workload.contains(&id) => {
                tracing::debug!(node = %id, "no artifact produced in this run, skipping materialization");
            }
            None => return Err(OptimizerError::MissingArtifact(id)),
        }
    }
    if let Some(id) = to_evict.iter().find(|id| store.fetch(id).is_none()) {
        return Err(OptimizerError::MissingArtifact(id.clone()));
    }

    let mut report = MaterializationReport::default();
    for (id, artifact) in artifacts {
        history.materialize(&id, artifact, store)?;
        tracing::info!(node = %id, bytes = artifact.size(), "materialized node");
        report.stored.push(id);
    }
    for id in to_evict {
        history.unmaterialize(&id, store)?;
        tracing::info!(node = %id, "unmaterialized node");
        report.evicted.push(id);
    }
    Ok(report)
}

/// Root ids in graph order. Roots are always kept and their size is not
/// charged to the budget. A root that is neither stored nor loaded by this
/// run has no artifact to keep, so it is left out.
fn roots(history: &HistoryGraph, workload: &WorkloadDag) -> Vec<NodeId> {
    history
        .graph()
        .nodes()
        .filter(|n| n.root && (n.mat || workload.contains(&n.id)))
        .map(|n| n.id.clone())
        .collect()
}

/// Baseline: keeps every workload node that can be stored, ignoring the budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllMaterializer;

impl Materializer for AllMaterializer {
    fn name(&self) -> &'static str { "all" }

    fn run(&self, history: &HistoryGraph, workload: &WorkloadDag) -> Result<Vec<NodeId>> {
        let mut selected = roots(history, workload);
        let mut seen: HashSet<NodeId> = selected.iter().cloned().collect();
        let from_workload = workload
            .graph()
            .nodes()
            .filter(|n| n.node_type.is_materializable())
            .map(|n| &n.id);
        let already = history.graph().nodes().filter(|n| n.mat).map(|n| &n.id);
        for id in from_workload.chain(already) {
            if seen.insert(id.clone()) {
                selected.push(id.clone());
            }
        }
        Ok(selected)
    }
}

/// One greedy pass over the ranked candidates with declared sizes.
#[derive(Debug, Clone)]
pub struct HeuristicsMaterializer {
    pub storage_budget: f64,
    pub alpha: f64,
}

impl HeuristicsMaterializer {
    pub fn new(storage_budget: f64, alpha: f64) -> Self { Self { storage_budget, alpha } }
}

impl Materializer for HeuristicsMaterializer {
    fn name(&self) -> &'static str { "heuristics" }

    fn run(&self, history: &HistoryGraph, workload: &WorkloadDag) -> Result<Vec<NodeId>> {
        let rhos = compute_rhos(history, workload, self.alpha);
        let Selection { selected, .. } = select(rhos, self.storage_budget, &roots(history, workload));
        tracing::debug!(
            size = history.size_of(&selected),
            nodes = selected.len(),
            "state after heuristics based materialization"
        );
        Ok(selected)
    }
}

/// Repeats the greedy pass, charging shared columns only once, until the
/// selection stops growing.
#[derive(Debug, Clone)]
pub struct StorageAwareMaterializer {
    pub storage_budget: f64,
    pub alpha: f64,
}

impl StorageAwareMaterializer {
    pub fn new(storage_budget: f64, alpha: f64) -> Self { Self { storage_budget, alpha } }
}

impl Materializer for StorageAwareMaterializer {
    fn name(&self) -> &'static str { "storage_aware" }

    fn run(&self, history: &HistoryGraph, workload: &WorkloadDag) -> Result<Vec<NodeId>> {
        let mut overflow = compute_rhos(history, workload, self.alpha);
        let mut candidates = roots(history, workload);
        let mut remaining_budget = self.storage_budget;
        let mut iteration = 1;

        loop {
            let previous_len = candidates.len();
            let selection = select(overflow, remaining_budget, &candidates);
            candidates = selection.selected;
            overflow = selection.overflow;
            // select only appends, so an unchanged length is a fixed point
            if candidates.len() == previous_len {
                break;
            }

            let current_size = recompute_sizes(history, &candidates, &mut overflow);
            remaining_budget = self.storage_budget - current_size;
            tracing::debug!(
                iteration,
                declared_size = history.size_of(&candidates),
                actual_size = current_size,
                remaining_budget,
                nodes = candidates.len(),
                "state after materialization iteration"
            );
            iteration += 1;
        }
        Ok(candidates)
    }
}

/// De-duplicated bytes of the non-root `selected` nodes. Shrinks every
/// columnar candidate in `overflow` to the bytes it would still add.
/// Candidates keep their rank; zero-size ones will simply fit next pass.
fn recompute_sizes(history: &HistoryGraph, selected: &[NodeId], overflow: &mut [NodeUtility]) -> f64 {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut current_size = 0.0;

    for node in selected.iter().filter_map(|id| history.node(id)) {
        let mut added = 0.0;
        if node.node_type.is_columnar() && !node.columns.is_empty() {
            for col in &node.columns {
                if seen.insert(col.hash.as_str()) {
                    added += col.size;
                }
            }
        } else {
            added = node.size;
        }
        if !node.root {
            current_size += added;
        }
    }

    for candidate in overflow.iter_mut() {
        if candidate.node_type.is_columnar() && !candidate.columns.is_empty() {
            candidate.size = candidate
                .columns
                .iter()
                .filter(|c| !seen.contains(c.hash.as_str()))
                .map(|c| c.size)
                .sum();
        }
    }
    current_size
}
