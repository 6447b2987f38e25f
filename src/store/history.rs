//! history.rs
//! The long-lived graph that accumulates every finished workload.

use super::artifacts::{Artifact, ArtifactStore};
use super::graph::ArtifactGraph;
use super::types::{Node, NodeId};
use super::workload::WorkloadDag;
use crate::error::{OptimizerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

/// Where a node stands with respect to the history graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStatus {
    Absent,
    /// Known from an earlier run, but its artifact is not stored.
    Stored,
    Materialized,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryGraph {
    graph: ArtifactGraph,
    roots: BTreeSet<NodeId>,
}

impl HistoryGraph {
    pub fn new() -> Self { Self::default() }
    pub fn graph(&self) -> &ArtifactGraph { &self.graph }
    pub(crate) fn graph_mut(&mut self) -> &mut ArtifactGraph { &mut self.graph }
    pub fn roots(&self) -> &BTreeSet<NodeId> { &self.roots }
    pub fn is_empty(&self) -> bool { self.graph.is_empty() }
    pub fn contains(&self, id: &NodeId) -> bool { self.graph.contains(id) }
    pub fn node(&self, id: &NodeId) -> Option<&Node> { self.graph.node(id) }

    /// Absence is an ordinary answer, not an error.
    pub fn status(&self, id: &NodeId) -> HistoryStatus {
        match self.graph.node(id) {
            None => HistoryStatus::Absent,
            Some(node) if node.mat => HistoryStatus::Materialized,
            Some(_) => HistoryStatus::Stored,
        }
    }

    /// Folds a finished workload into the history. Existing nodes keep their
    /// materialization state and gain one visit; new nodes and edges are inserted.
    pub fn extend(&mut self, workload: &WorkloadDag) -> Result<()> {
        if self.is_empty() {
            tracing::info!(nodes = workload.graph().node_count(), "history graph is empty, initializing a new one");
        } else {
            tracing::info!(nodes = workload.graph().node_count(), "history graph is not empty, extending the existing one");
        }

        let source = workload.graph();
        for idx in source.indices() {
            let incoming = source.at(idx);
            match self.graph.node_mut(&incoming.id) {
                Some(existing) => {
                    existing.meta_freq += 1;
                    if incoming.computed {
                        existing.size = incoming.size;
                        existing.columns = incoming.columns.clone();
                        existing.compute_cost = incoming.compute_cost;
                        if incoming.score.is_some() {
                            existing.score = incoming.score;
                        }
                    }
                }
                None => {
                    let mut node = incoming.clone();
                    node.computed = false;
                    node.mat = false;
                    node.meta_freq = 1;
                    self.graph.insert_node(node);
                }
            }
        }

        for (src, dst, edge) in source.edges() {
            let (s, d) = (&source.at(src).id, &source.at(dst).id);
            self.graph.add_edge(s, d, edge.clone())?;
        }

        self.roots.extend(workload.roots().iter().cloned());
        Ok(())
    }

    /// Persists `artifact` and flags the node as reusable.
    pub fn materialize(&mut self, id: &NodeId, artifact: &Artifact, store: &mut dyn ArtifactStore) -> Result<()> {
        let node = self
            .graph
            .node_mut(id)
            .ok_or_else(|| OptimizerError::NodeNotFound(id.clone()))?;
        store.store(id, artifact)?;
        node.mat = true;
        Ok(())
    }

    pub fn unmaterialize(&mut self, id: &NodeId, store: &mut dyn ArtifactStore) -> Result<()> {
        let node = self
            .graph
            .node_mut(id)
            .ok_or_else(|| OptimizerError::NodeNotFound(id.clone()))?;
        store.evict(id)?;
        node.mat = false;
        Ok(())
    }

    /// Declared sizes of `ids`, without column de-duplication.
    pub fn size_of<'a>(&self, ids: impl IntoIterator<Item = &'a NodeId>) -> f64 {
        ids.into_iter()
            .filter_map(|id| self.graph.node(id))
            .map(|n| n.size)
            .sum()
    }

    pub fn total_size(&self) -> f64 {
        self.graph.nodes().map(|n| n.size).sum()
    }

    /// Bytes held by materialized nodes, counting each shared column once.
    pub fn total_materialized_size(&self) -> f64 {
        let mut seen = HashSet::new();
        let mut total = 0.0;
        for node in self.graph.nodes().filter(|n| n.mat) {
            if node.node_type.is_columnar() && !node.columns.is_empty() {
                for col in &node.columns {
                    if seen.insert(col.hash.as_str()) {
                        total += col.size;
                    }
                }
            } else {
                total += node.size;
            }
        }
        total
    }

    /// Writes the graph metadata (not the artifacts) as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_vec(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reads a snapshot written by `save`. Artifacts are not part of the
    /// snapshot, so a node stays materialized only if `store` still holds it.
    pub fn load(path: impl AsRef<Path>, store: &dyn ArtifactStore) -> Result<Self> {
        let bytes = fs::read(path)?;
        let mut history: Self = serde_json::from_slice(&bytes)?;
        history.graph.rebuild_index();
        history.reconcile(store);
        Ok(history)
    }

    fn reconcile(&mut self, store: &dyn ArtifactStore) {
        let stale: Vec<NodeId> = self
            .graph
            .nodes()
            .filter(|n| n.mat && store.fetch(&n.id).is_none())
            .map(|n| n.id.clone())
            .collect();
        if !stale.is_empty() {
            tracing::warn!(nodes = stale.len(), "artifacts missing from the store, clearing their materialization flag");
        }
        for id in &stale {
            if let Some(node) = self.graph.node_mut(id) {
                node.mat = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{bytes, chain};
    use crate::store::{DedupedStore, Edge, NodeType};
    use tempfile::TempDir;

    #[test]
    fn test_first_extension_copies_workload() {
        let (w, ids) = chain(&["a", "b"]);
        let mut h = HistoryGraph::new();
        h.extend(&w).unwrap();

        assert_eq!(h.graph().node_count(), 3);
        assert_eq!(h.graph().edge_count(), 2);
        assert!(h.roots().contains(&ids[0]));
        assert!(h.graph().nodes().all(|n| n.meta_freq == 1 && !n.computed && !n.mat));
    }

    #[test]
    fn test_second_extension_increments_only_touched_nodes() {
        let (w1, ids) = chain(&["a", "b"]);
        let mut h = HistoryGraph::new();
        h.extend(&w1).unwrap();

        // Second run touches root and `a`, then branches off to `z`.
        let (mut w2, _) = chain(&["a"]);
        w2.add_operation(&ids[1], Node::new("z", NodeType::Feature), Edge::apply("z")).unwrap();
        h.extend(&w2).unwrap();

        assert_eq!(h.node(&ids[0]).unwrap().meta_freq, 2);
        assert_eq!(h.node(&ids[1]).unwrap().meta_freq, 2);
        assert_eq!(h.node(&ids[2]).unwrap().meta_freq, 1);
        assert_eq!(h.node(&"z".into()).unwrap().meta_freq, 1);
        assert_eq!(h.graph().node_count(), 4);
    }

    #[test]
    fn test_extension_never_drops_materialization() {
        let (mut w, ids) = chain(&["a"]);
        w.mark_computed(&ids[1], bytes("a", 8)).unwrap();
        let mut h = HistoryGraph::new();
        let mut store = DedupedStore::new();
        h.extend(&w).unwrap();
        h.materialize(&ids[1], w.artifact(&ids[1]).unwrap(), &mut store).unwrap();

        h.extend(&w).unwrap();
        assert_eq!(h.status(&ids[1]), HistoryStatus::Materialized);
        assert_eq!(h.status(&ids[0]), HistoryStatus::Stored);
        assert_eq!(h.status(&"unknown".into()), HistoryStatus::Absent);
    }

    #[test]
    fn test_unmaterialize_evicts_from_store() {
        let (mut w, ids) = chain(&["a"]);
        w.mark_computed(&ids[1], bytes("a", 8)).unwrap();
        let mut h = HistoryGraph::new();
        let mut store = DedupedStore::new();
        h.extend(&w).unwrap();
        h.materialize(&ids[1], w.artifact(&ids[1]).unwrap(), &mut store).unwrap();
        assert_eq!(store.stored_bytes(), 8);

        h.unmaterialize(&ids[1], &mut store).unwrap();
        assert_eq!(h.status(&ids[1]), HistoryStatus::Stored);
        assert_eq!(store.stored_bytes(), 0);
    }

    #[test]
    fn test_materialized_size_counts_shared_columns_once() {
        let (mut w, ids) = chain(&["a", "b"]);
        w.mark_computed(&ids[1], bytes("shared", 40)).unwrap();
        w.mark_computed(&ids[2], bytes("shared", 40)).unwrap();
        let mut h = HistoryGraph::new();
        let mut store = DedupedStore::new();
        h.extend(&w).unwrap();
        for id in &ids[1..] {
            h.materialize(id, w.artifact(id).unwrap(), &mut store).unwrap();
        }
        assert_eq!(h.size_of(&ids[1..]), 80.0);
        assert_eq!(h.total_size(), 180.0);
        assert_eq!(h.total_materialized_size(), 40.0);
    }

    #[test]
    fn test_load_keeps_only_artifacts_the_store_still_holds() {
        let (mut w, ids) = chain(&["a", "b"]);
        w.mark_computed(&ids[1], bytes("a", 8)).unwrap();
        w.mark_computed(&ids[2], bytes("b", 8)).unwrap();
        let mut h = HistoryGraph::new();
        let mut store = DedupedStore::new();
        h.extend(&w).unwrap();
        for id in &ids[1..] {
            h.materialize(id, w.artifact(id).unwrap(), &mut store).unwrap();
        }

        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("history.json");
        h.save(&path).unwrap();

        let same = HistoryGraph::load(&path, &store).unwrap();
        assert_eq!(same.status(&ids[1]), HistoryStatus::Materialized);
        assert_eq!(same.status(&ids[2]), HistoryStatus::Materialized);

        store.evict(&ids[2]).unwrap();
        let partial = HistoryGraph::load(&path, &store).unwrap();
        assert_eq!(partial.status(&ids[1]), HistoryStatus::Materialized);
        assert_eq!(partial.status(&ids[2]), HistoryStatus::Stored);

        let fresh = HistoryGraph::load(&path, &DedupedStore::new()).unwrap();
        assert!(fresh.graph().nodes().all(|n| !n.mat));
        assert_eq!(fresh.graph().node_count(), 3);
        assert_eq!(fresh.total_materialized_size(), 0.0);
    }
}
