//! workload.rs
//! The per-run DAG of operations requested by the current script.

use super::artifacts::Artifact;
use super::graph::ArtifactGraph;
use super::types::{combine_id, Edge, Node, NodeId, NodeType};
use crate::error::{OptimizerError, Result};
use petgraph::graph::NodeIndex;
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct WorkloadDag {
    graph: ArtifactGraph,
    roots: Vec<NodeId>,
    artifacts: HashMap<NodeId, Artifact>,
}

impl WorkloadDag {
    pub fn new() -> Self { Self::default() }
    pub fn graph(&self) -> &ArtifactGraph { &self.graph }
    pub fn roots(&self) -> &[NodeId] { &self.roots }
    pub fn contains(&self, id: &NodeId) -> bool { self.graph.contains(id) }
    pub fn node(&self, id: &NodeId) -> Option<&Node> { self.graph.node(id) }
    pub fn artifact(&self, id: &NodeId) -> Option<&Artifact> { self.artifacts.get(id) }

    /// Registers an externally loaded input together with its content.
    pub fn add_root(&mut self, mut node: Node, artifact: Artifact) -> NodeId {
        node.root = true;
        let id = node.id.clone();
        let (_, inserted) = self.graph.insert_node(node);
        if inserted {
            self.roots.push(id.clone());
        }
        self.record(&id, artifact);
        id
    }

    /// Adds `node` as the result of applying `edge` to `parent`.
    /// Nodes are content-addressed, so re-adding an existing id reuses it.
    /// An unknown parent leaves the graph unchanged.
    pub fn add_operation(&mut self, parent: &NodeId, node: Node, edge: Edge) -> Result<NodeId> {
        self.graph.require(parent)?;
        let id = node.id.clone();
        self.graph.insert_node(node);
        self.graph.add_edge(parent, &id, edge)?;
        Ok(id)
    }

    /// Routes several inputs through one `SuperNode` so that the downstream
    /// operation edge has a single source.
    pub fn add_combine(&mut self, members: &[NodeId]) -> Result<NodeId> {
        for member in members {
            self.graph.require(member)?;
        }
        let id = combine_id(members);
        self.graph.insert_node(Node::new(id.clone(), NodeType::SuperNode));
        for member in members {
            self.graph.add_edge(member, &id, Edge::combine())?;
        }
        Ok(id)
    }

    /// Records the result of executing `id`. Size and column layout follow the artifact.
    pub fn mark_computed(&mut self, id: &NodeId, artifact: Artifact) -> Result<()> {
        if !self.graph.contains(id) {
            return Err(OptimizerError::NodeNotFound(id.clone()));
        }
        self.record(id, artifact);
        Ok(())
    }

    /// Records the evaluation score of a trained model.
    pub fn set_score(&mut self, id: &NodeId, score: f64) -> Result<()> {
        let node = self
            .graph
            .node_mut(id)
            .ok_or_else(|| OptimizerError::NodeNotFound(id.clone()))?;
        node.score = Some(score);
        Ok(())
    }

    fn record(&mut self, id: &NodeId, artifact: Artifact) {
        if let Some(node) = self.graph.node_mut(id) {
            node.computed = true;
            node.size = artifact.size() as f64;
            node.columns = artifact.column_refs().into_iter().collect();
        }
        self.artifacts.insert(id.clone(), artifact);
    }

    /// The part of the graph that must run to produce `vertex`: every
    /// non-computed ancestor reachable without crossing a computed node, plus
    /// the computed predecessors on that boundary. Always contains `vertex`.
    pub fn compute_execution_subgraph(&self, vertex: &NodeId) -> Result<ExecutionSubgraph> {
        let terminal = self.graph.require(vertex)?;
        let mut members = HashSet::from([terminal]);
        let mut order = vec![terminal];
        let mut stack = Vec::new();

        if !self.graph.at(terminal).computed {
            stack.push(terminal);
        }
        while let Some(node) = stack.pop() {
            for pred in self.graph.predecessors(node) {
                if members.insert(pred) {
                    order.push(pred);
                    if !self.graph.at(pred).computed {
                        stack.push(pred);
                    }
                }
            }
        }
        Ok(ExecutionSubgraph { terminal, members, order })
    }
}

/// A node subset of a workload graph, with traversal restricted to it.
#[derive(Debug, Clone)]
pub struct ExecutionSubgraph {
    terminal: NodeIndex,
    members: HashSet<NodeIndex>,
    // Discovery order, for deterministic iteration.
    order: Vec<NodeIndex>,
}

impl ExecutionSubgraph {
    pub fn terminal(&self) -> NodeIndex { self.terminal }
    pub fn len(&self) -> usize { self.order.len() }
    pub fn is_empty(&self) -> bool { self.order.is_empty() }
    pub fn contains(&self, idx: NodeIndex) -> bool { self.members.contains(&idx) }
    pub fn nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ { self.order.iter().copied() }

    pub fn predecessors<'a>(&'a self, graph: &'a ArtifactGraph, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + 'a {
        graph.predecessors(idx).filter(move |p| self.members.contains(p))
    }

    /// Nodes without predecessors inside the subgraph.
    pub fn roots(&self, graph: &ArtifactGraph) -> Vec<NodeIndex> {
        self.nodes()
            .filter(|&n| self.predecessors(graph, n).next().is_none())
            .collect()
    }

    pub fn ids(&self, graph: &ArtifactGraph) -> BTreeSet<NodeId> {
        self.nodes().map(|n| graph.at(n).id.clone()).collect()
    }
}
