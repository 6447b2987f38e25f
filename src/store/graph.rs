//! graph.rs
//! Id-addressed lineage graph on top of a petgraph `DiGraph`.

use super::types::{Edge, Node, NodeId};
use crate::error::{OptimizerError, Result};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactGraph {
    graph: DiGraph<Node, Edge>,

    // Ephemeral id lookup (Not serialized, rebuilt on load)
    #[serde(skip)]
    index: HashMap<NodeId, NodeIndex>,
}

impl ArtifactGraph {
    pub fn new() -> Self { Self::default() }
    pub fn node_count(&self) -> usize { self.graph.node_count() }
    pub fn edge_count(&self) -> usize { self.graph.edge_count() }
    pub fn is_empty(&self) -> bool { self.graph.node_count() == 0 }

    /// Rebuilds the id lookup after deserialization.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .graph
            .node_indices()
            .map(|idx| (self.graph[idx].id.clone(), idx))
            .collect();
    }

    /// Inserts `node` unless a node with the same id exists.
    /// Returns the index and whether the node was new.
    pub fn insert_node(&mut self, node: Node) -> (NodeIndex, bool) {
        if let Some(&idx) = self.index.get(&node.id) {
            return (idx, false);
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        (idx, true)
    }

    /// Adds `src -> dst`. A repeated edge only bumps its frequency.
    pub fn add_edge(&mut self, src: &NodeId, dst: &NodeId, edge: Edge) -> Result<EdgeIndex> {
        let s = self.require(src)?;
        let d = self.require(dst)?;
        if let Some(existing) = self.graph.find_edge(s, d) {
            self.graph[existing].freq += 1;
            return Ok(existing);
        }
        Ok(self.graph.add_edge(s, d, edge))
    }

    pub fn contains(&self, id: &NodeId) -> bool { self.index.contains_key(id) }
    pub fn index_of(&self, id: &NodeId) -> Option<NodeIndex> { self.index.get(id).copied() }

    pub fn require(&self, id: &NodeId) -> Result<NodeIndex> {
        self.index_of(id).ok_or_else(|| OptimizerError::NodeNotFound(id.clone()))
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        let idx = self.index_of(id)?;
        Some(&mut self.graph[idx])
    }

    #[inline(always)]
    pub fn at(&self, idx: NodeIndex) -> &Node { &self.graph[idx] }

    #[inline(always)]
    pub fn at_mut(&mut self, idx: NodeIndex) -> &mut Node { &mut self.graph[idx] }

    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ { self.graph.node_indices() }
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ { self.graph.node_weights() }

    pub fn predecessors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Incoming)
    }

    pub fn successors(&self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(idx, Direction::Outgoing)
    }

    /// Outgoing edges of `idx` as `(target, edge)` pairs.
    pub fn outgoing(&self, idx: NodeIndex) -> impl Iterator<Item = (NodeIndex, &Edge)> + '_ {
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
    }

    /// All edges as `(source, target, edge)`.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &Edge)> + '_ {
        self.graph
            .edge_references()
            .map(|e| (e.source(), e.target(), e.weight()))
    }

    pub fn edge_between(&self, src: NodeIndex, dst: NodeIndex) -> Option<&Edge> {
        self.graph.find_edge(src, dst).map(|e| &self.graph[e])
    }
}
