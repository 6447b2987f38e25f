//! Recreation cost and reuse potential of history nodes.
//!
//! `execution_cost(v) = compute_cost(v) + Σ execution_cost(parent)` is the time
//! to rebuild `v` from the raw inputs. Weighting it by how often `v` was
//! requested gives the recreation cost. The potential of `v` is the best model
//! score reachable downstream of it. Both are normalized to [0, 1] by their
//! maxima so that the utility ranking can mix them.

use super::topology;
use crate::config::CostProfile;
use crate::error::Result;
use crate::store::{HistoryGraph, NodeType};

pub fn annotate(history: &mut HistoryGraph, profile: &CostProfile) -> Result<()> {
    let order = topology::sort(history.graph())?;
    let graph = history.graph_mut();

    let mut execution = vec![0.0; graph.node_count()];
    for &idx in &order {
        let upstream: f64 = graph.predecessors(idx).map(|p| execution[p.index()]).sum();
        execution[idx.index()] = graph.at(idx).compute_cost + upstream;
    }

    let mut potential = vec![0.0_f64; graph.node_count()];
    for &idx in order.iter().rev() {
        let node = graph.at(idx);
        let own = match (node.node_type, node.score) {
            (NodeType::SkModel, Some(score)) => score,
            _ => 0.0,
        };
        let downstream = graph
            .successors(idx)
            .map(|s| potential[s.index()])
            .fold(0.0, f64::max);
        potential[idx.index()] = own.max(downstream);
    }

    let mut max_cost = 0.0_f64;
    let mut max_potential = 0.0_f64;
    for &idx in &order {
        let node = graph.at_mut(idx);
        node.recreation_cost = f64::from(node.meta_freq.max(1)) * execution[idx.index()];
        node.load_cost = profile.load_cost(node.size);
        max_cost = max_cost.max(node.recreation_cost);
        max_potential = max_potential.max(potential[idx.index()]);
    }

    for &idx in &order {
        let node = graph.at_mut(idx);
        node.n_recreation_cost = if max_cost > 0.0 { node.recreation_cost / max_cost } else { 0.0 };
        node.n_potential = if max_potential > 0.0 { potential[idx.index()] / max_potential } else { 0.0 };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::chain;
    use crate::store::{Edge, ModelSpec, Node};

    #[test]
    fn test_recreation_cost_accumulates_along_lineage() {
        // root -> a -> b, compute cost 10 each (root: 0)
        let (w, ids) = chain(&["a", "b"]);
        let mut h = HistoryGraph::new();
        h.extend(&w).unwrap();
        h.extend(&w).unwrap();

        annotate(&mut h, &CostProfile::default()).unwrap();
        let a = h.node(&ids[1]).unwrap();
        let b = h.node(&ids[2]).unwrap();
        // b was requested twice and needs 20 units from scratch
        assert_eq!(b.recreation_cost, 40.0);
        assert_eq!(a.recreation_cost, 20.0);
        assert_eq!(b.n_recreation_cost, 1.0);
        assert_eq!(a.n_recreation_cost, 0.5);
    }

    #[test]
    fn test_potential_flows_upstream_from_models() {
        let (mut w, ids) = chain(&["a"]);
        let weak = Node::new("weak", NodeType::SkModel).with_score(0.4);
        let strong = Node::new("strong", NodeType::SkModel).with_score(0.8);
        let model = ModelSpec { family: "lgbm".into(), ..Default::default() };
        w.add_operation(&ids[1], weak, Edge::fit(model.clone())).unwrap();
        w.add_operation(&ids[0], strong, Edge::fit(model)).unwrap();

        let mut h = HistoryGraph::new();
        h.extend(&w).unwrap();
        annotate(&mut h, &CostProfile::default()).unwrap();

        assert_eq!(h.node(&ids[0]).unwrap().n_potential, 1.0);
        assert_eq!(h.node(&ids[1]).unwrap().n_potential, 0.5);
        assert_eq!(h.node(&"weak".into()).unwrap().n_potential, 0.5);
    }

    #[test]
    fn test_load_cost_follows_profile() {
        let (w, ids) = chain(&["a"]);
        let mut h = HistoryGraph::new();
        h.extend(&w).unwrap();
        let profile = CostProfile { load_cost_per_byte: 0.5, load_latency: 1.0 };
        annotate(&mut h, &profile).unwrap();
        // the root artifact in the fixture is 100 bytes
        assert_eq!(h.node(&ids[0]).unwrap().load_cost, 51.0);
    }
}
