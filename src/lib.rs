// Materialization and reuse optimizer for data-science lineage graphs.
//
// A run builds a `WorkloadDag`, asks a `ReuseStrategy` which nodes to load or
// compute, executes, folds the run into the `HistoryGraph`, annotates costs,
// and lets a `Materializer` decide which artifacts stay in the store.

pub mod analysis;
pub mod config;
pub mod error;
pub mod materialization;
pub mod reuse;
pub mod store;

#[cfg(feature = "python")]
mod bindings;

#[cfg(test)]
pub(crate) mod fixtures;

pub use config::{CostProfile, OptimizerConfig, ALPHA};
pub use error::{OptimizerError, Result};
pub use materialization::{MaterializationReport, Materializer};
pub use reuse::{ReusePlan, ReuseStrategy, WarmStart};
pub use store::{
    Artifact, ArtifactStore, DedupedStore, Edge, HistoryGraph, HistoryStatus, Node, NodeId,
    NodeType, WorkloadDag,
};

// --- Module Definition ---
/// Defines the `_core` Python module. Built only with the `python` feature.
#[cfg(feature = "python")]
#[pyo3::pymodule]
fn _core(m: &pyo3::Bound<'_, pyo3::types::PyModule>) -> pyo3::PyResult<()> {
    bindings::python::register(m)
}
