//! Warm starting model training from a compatible historical model.
use super::HistoryProbe;
use crate::error::{OptimizerError, Result};
use crate::store::{HistoryStatus, ModelSpec, NodeId, Operation, WorkloadDag};
use petgraph::graph::NodeIndex;

/// Train `model_node` on `dataset` starting from `model`.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmStart {
    pub dataset: NodeId,
    pub model_node: NodeId,
    /// Best compatible historical model, with the requested random state.
    pub model: ModelSpec,
}

/// Looks up a warm start for each model-training node in `candidates`.
/// Nodes without a compatible historical model are trained from scratch and
/// produce nothing.
pub(crate) fn resolve(
    candidates: impl IntoIterator<Item = NodeIndex>,
    workload: &WorkloadDag,
    probe: &mut HistoryProbe<'_>,
) -> Result<Vec<WarmStart>> {
    let graph = workload.graph();
    let mut found = Vec::new();

    for model_idx in candidates {
        let model_id = &graph.at(model_idx).id;
        let parents: Vec<NodeIndex> = graph.predecessors(model_idx).collect();
        let &[dataset_idx] = parents.as_slice() else {
            return Err(OptimizerError::invariant(
                model_id,
                format!("a trained model needs exactly one training dataset, found {}", parents.len()),
            ));
        };
        let Some(requested) = graph.edge_between(dataset_idx, model_idx) else {
            continue;
        };
        if !requested.should_warmstart {
            continue;
        }

        let dataset = &graph.at(dataset_idx).id;
        if probe.status(dataset) != HistoryStatus::Materialized {
            continue;
        }
        let history = probe.history().graph();
        let Some(h_dataset) = history.index_of(dataset) else {
            continue;
        };

        let best = history
            .outgoing(h_dataset)
            .filter(|(_, e)| {
                e.oper == Operation::Fit
                    && e.warm_startable
                    && e.no_random_state_model == requested.no_random_state_model
            })
            .filter_map(|(target, e)| {
                let model = e.model.as_ref()?;
                let score = history.at(target).score.unwrap_or(f64::NEG_INFINITY);
                Some((score, model))
            })
            .max_by(|a, b| a.0.total_cmp(&b.0));

        if let Some((score, model)) = best {
            tracing::debug!(model = %model_id, dataset = %dataset, score, "warm start candidate found");
            found.push(WarmStart {
                dataset: dataset.clone(),
                model_node: model_id.clone(),
                model: model.with_random_state(requested.random_state),
            });
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{chain, history_with};
    use crate::store::{Edge, HistoryGraph, Node, NodeType};

    fn spec(params: serde_json::Value, random_state: u64) -> ModelSpec {
        let params = params.as_object().cloned().unwrap_or_default();
        ModelSpec { family: "lgbm".into(), params, random_state: Some(random_state) }
    }

    /// History with two compatible models trained on `a` (scores 0.7 and 0.9)
    /// and one trained with different parameters (score 0.95).
    fn trained_history() -> (HistoryGraph, Vec<NodeId>) {
        let (mut w, ids) = chain(&["a"]);
        let runs = [
            ("m-low", serde_json::json!({ "depth": 3 }), 0.7),
            ("m-high", serde_json::json!({ "depth": 3 }), 0.9),
            ("m-other", serde_json::json!({ "depth": 8 }), 0.95),
        ];
        for (i, (name, params, score)) in runs.into_iter().enumerate() {
            let node = Node::new(name, NodeType::SkModel).with_score(score);
            let edge = Edge::fit(spec(params, i as u64)).warm_startable(true);
            w.add_operation(&ids[1], node, edge).unwrap();
        }
        (history_with(&w, &[(&ids[1], 0.0)]), ids)
    }

    fn request(should_warmstart: bool) -> (WorkloadDag, NodeIndex) {
        let (mut w, ids) = chain(&["a"]);
        let edge = Edge::fit(spec(serde_json::json!({ "depth": 3 }), 42)).should_warmstart(should_warmstart);
        let id = w.add_operation(&ids[1], Node::new("m-new", NodeType::SkModel), edge).unwrap();
        let idx = w.graph().index_of(&id).unwrap();
        (w, idx)
    }

    #[test]
    fn test_best_compatible_model_is_cloned_with_requested_seed() {
        let (h, ids) = trained_history();
        let (w, model) = request(true);
        let mut probe = HistoryProbe::new(&h);
        let found = resolve([model], &w, &mut probe).unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].dataset, ids[1]);
        assert_eq!(found[0].model_node, NodeId::from("m-new"));
        assert_eq!(found[0].model.params["depth"], 3);
        assert_eq!(found[0].model.random_state, Some(42));
        assert_eq!(probe.reads(), 1);
    }

    #[test]
    fn test_no_warm_start_unless_requested() {
        let (h, _) = trained_history();
        let (w, model) = request(false);
        let found = resolve([model], &w, &mut HistoryProbe::new(&h)).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_unmaterialized_dataset_has_no_warm_start() {
        let (mut h, ids) = trained_history();
        h.graph_mut().node_mut(&ids[1]).unwrap().mat = false;
        let (w, model) = request(true);
        assert!(resolve([model], &w, &mut HistoryProbe::new(&h)).unwrap().is_empty());
    }

    #[test]
    fn test_model_with_two_training_inputs_is_rejected() {
        let (mut w, ids) = chain(&["a"]);
        let edge = Edge::fit(ModelSpec::default()).should_warmstart(true);
        let model = w.add_operation(&ids[1], Node::new("m", NodeType::SkModel), edge.clone()).unwrap();
        w.add_operation(&ids[0], Node::new("m", NodeType::SkModel), edge).unwrap();
        let idx = w.graph().index_of(&model).unwrap();

        let err = resolve([idx], &w, &mut HistoryProbe::new(&HistoryGraph::new())).unwrap_err();
        assert!(matches!(err, OptimizerError::InvariantViolation { .. }));
    }
}
