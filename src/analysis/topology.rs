use crate::error::{OptimizerError, Result};
use crate::store::{ArtifactGraph, ExecutionSubgraph};
use petgraph::graph::NodeIndex;
use std::collections::{HashMap, HashSet, VecDeque};

/// Performs a Topological Sort of the whole graph using Depth-First Search (DFS).
///
/// Returns node indices where every producer appears before its consumers.
pub fn sort(graph: &ArtifactGraph) -> Result<Vec<NodeIndex>> {
    let nodes: Vec<NodeIndex> = graph.indices().collect();
    sort_filtered(graph, &nodes, |_| true)
}

/// Topological order of the nodes of `subgraph`, following only edges inside it.
pub fn sort_within(graph: &ArtifactGraph, subgraph: &ExecutionSubgraph) -> Result<Vec<NodeIndex>> {
    let nodes: Vec<NodeIndex> = subgraph.nodes().collect();
    sort_filtered(graph, &nodes, |n| subgraph.contains(n))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    Visiting, // Used for cycle detection
    Visited,
}

/// DFS post-order on predecessor edges gives [Parent, ..., Child].
/// The walk keeps an explicit stack of (node, pending parents) so long
/// pipelines do not recurse.
fn sort_filtered(
    graph: &ArtifactGraph,
    nodes: &[NodeIndex],
    member: impl Fn(NodeIndex) -> bool,
) -> Result<Vec<NodeIndex>> {
    let mut order = Vec::with_capacity(nodes.len());
    let mut state: HashMap<NodeIndex, VisitState> = HashMap::with_capacity(nodes.len());

    for &start in nodes {
        if state.contains_key(&start) {
            continue;
        }
        state.insert(start, VisitState::Visiting);
        let mut stack = vec![(start, parents_of(graph, start, &member))];

        while let Some((node, pending)) = stack.last_mut() {
            match pending.pop() {
                Some(parent) => match state.get(&parent) {
                    Some(VisitState::Visited) => {}
                    Some(VisitState::Visiting) => {
                        return Err(OptimizerError::CycleDetected(graph.at(parent).id.clone()));
                    }
                    None => {
                        state.insert(parent, VisitState::Visiting);
                        let next = parents_of(graph, parent, &member);
                        stack.push((parent, next));
                    }
                },
                None => {
                    let done = *node;
                    state.insert(done, VisitState::Visited);
                    order.push(done);
                    stack.pop();
                }
            }
        }
    }
    Ok(order)
}

fn parents_of(graph: &ArtifactGraph, node: NodeIndex, member: &impl Fn(NodeIndex) -> bool) -> Vec<NodeIndex> {
    graph.predecessors(node).filter(|&p| member(p)).collect()
}

/// Identifies every node from which one of `start_nodes` can be reached
/// (the start nodes included), restricted to `member` nodes.
pub fn upstream_from(
    graph: &ArtifactGraph,
    start_nodes: &[NodeIndex],
    member: impl Fn(NodeIndex) -> bool,
) -> HashSet<NodeIndex> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from(start_nodes.to_vec());

    while let Some(node) = queue.pop_front() {
        if visited.insert(node) {
            queue.extend(graph.predecessors(node).filter(|&p| member(p)));
        }
    }
    visited
}
