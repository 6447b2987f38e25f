//! Lineage graphs, their node/edge attributes, and artifact storage.
pub mod artifacts;
pub mod graph;
pub mod history;
pub mod types;
pub mod workload;

pub use artifacts::{Artifact, ArtifactStore, Column, DedupedStore};
pub use graph::ArtifactGraph;
pub use history::{HistoryGraph, HistoryStatus};
pub use types::{ColumnRef, Edge, ModelSpec, Node, NodeId, NodeType, Operation};
pub use workload::{ExecutionSubgraph, WorkloadDag};
