use crate::analysis::cost;
use crate::config::{CostProfile, OptimizerConfig};
use crate::error::OptimizerError;
use crate::store::{
    Artifact, ArtifactStore, Column, DedupedStore, Edge, HistoryGraph, HistoryStatus, ModelSpec, Node,
    NodeId, NodeType, WorkloadDag,
};
use pyo3::exceptions::{PyIOError, PyKeyError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::Arc;

fn to_py_err(err: OptimizerError) -> PyErr {
    match err {
        OptimizerError::UnknownReuseStrategy(_) | OptimizerError::UnknownMaterializer(_) => {
            PyValueError::new_err(err.to_string())
        }
        OptimizerError::NodeNotFound(_) => PyKeyError::new_err(err.to_string()),
        OptimizerError::Io(_) => PyIOError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn parse_node_type(name: &str) -> PyResult<NodeType> {
    match name {
        "Dataset" => Ok(NodeType::Dataset),
        "Feature" => Ok(NodeType::Feature),
        "GroupBy" => Ok(NodeType::GroupBy),
        "Agg" => Ok(NodeType::Agg),
        "SKModel" | "SkModel" => Ok(NodeType::SkModel),
        "SuperNode" => Ok(NodeType::SuperNode),
        _ => Err(PyValueError::new_err(format!("Invalid node type: {}", name))),
    }
}

fn columns(cols: Vec<(String, Vec<u8>)>) -> Artifact {
    Artifact::Columns(cols.into_iter().map(|(hash, data)| Column { hash, data: Arc::from(data) }).collect())
}

fn ids(set: impl IntoIterator<Item = NodeId>) -> Vec<String> {
    set.into_iter().map(|id| id.0).collect()
}

#[pyclass(name = "_WorkloadDag")]
#[derive(Debug, Clone, Default)]
pub struct PyWorkloadDag {
    pub inner: WorkloadDag,
}

#[pymethods]
impl PyWorkloadDag {
    #[new]
    pub fn new() -> Self { Self::default() }

    pub fn add_root(&mut self, id: String, node_type: &str, cols: Vec<(String, Vec<u8>)>) -> PyResult<String> {
        let node = Node::root(id, parse_node_type(node_type)?);
        Ok(self.inner.add_root(node, columns(cols)).0)
    }

    #[pyo3(signature = (parent, id, node_type, oper, compute_cost=0.0))]
    pub fn add_operation(&mut self, parent: String, id: String, node_type: &str, oper: &str, compute_cost: f64) -> PyResult<String> {
        let node = Node::new(id, parse_node_type(node_type)?).with_compute_cost(compute_cost);
        self.inner
            .add_operation(&parent.into(), node, Edge::apply(oper))
            .map(|id| id.0)
            .map_err(to_py_err)
    }

    #[pyo3(signature = (parent, id, family, params_json="{}", random_state=None, warm_startable=false, should_warmstart=false, compute_cost=0.0))]
    #[allow(clippy::too_many_arguments)]
    pub fn add_model(
        &mut self,
        parent: String,
        id: String,
        family: String,
        params_json: &str,
        random_state: Option<u64>,
        warm_startable: bool,
        should_warmstart: bool,
        compute_cost: f64,
    ) -> PyResult<String> {
        let params = serde_json::from_str(params_json).map_err(|e| PyValueError::new_err(e.to_string()))?;
        let edge = Edge::fit(ModelSpec { family, params, random_state })
            .warm_startable(warm_startable)
            .should_warmstart(should_warmstart);
        let node = Node::new(id, NodeType::SkModel).with_compute_cost(compute_cost);
        self.inner
            .add_operation(&parent.into(), node, edge)
            .map(|id| id.0)
            .map_err(to_py_err)
    }

    pub fn add_combine(&mut self, members: Vec<String>) -> PyResult<String> {
        let members: Vec<NodeId> = members.into_iter().map(NodeId::from).collect();
        self.inner.add_combine(&members).map(|id| id.0).map_err(to_py_err)
    }

    pub fn mark_computed(&mut self, id: String, cols: Vec<(String, Vec<u8>)>) -> PyResult<()> {
        self.inner.mark_computed(&id.into(), columns(cols)).map_err(to_py_err)
    }

    /// Records a non-columnar result (a trained model, an aggregate) and its score.
    #[pyo3(signature = (id, payload, score=None))]
    pub fn mark_computed_object(&mut self, id: String, payload: Vec<u8>, score: Option<f64>) -> PyResult<()> {
        let id = NodeId::from(id);
        self.inner.mark_computed(&id, Artifact::Object(Arc::from(payload))).map_err(to_py_err)?;
        if let Some(score) = score {
            self.inner.set_score(&id, score).map_err(to_py_err)?;
        }
        Ok(())
    }

    pub fn execution_subgraph(&self, id: String) -> PyResult<Vec<String>> {
        let sub = self.inner.compute_execution_subgraph(&id.into()).map_err(to_py_err)?;
        Ok(ids(sub.ids(self.inner.graph())))
    }

    pub fn node_count(&self) -> usize { self.inner.graph().node_count() }
}

#[pyclass(name = "_HistoryGraph")]
#[derive(Debug, Clone, Default)]
pub struct PyHistoryGraph {
    inner: HistoryGraph,
    store: DedupedStore,
}

#[pymethods]
impl PyHistoryGraph {
    #[new]
    pub fn new() -> Self { Self::default() }

    pub fn extend(&mut self, workload: &PyWorkloadDag) -> PyResult<()> {
        self.inner.extend(&workload.inner).map_err(to_py_err)
    }

    /// "absent", "stored" or "materialized".
    pub fn status(&self, id: String) -> &'static str {
        match self.inner.status(&id.into()) {
            HistoryStatus::Absent => "absent",
            HistoryStatus::Stored => "stored",
            HistoryStatus::Materialized => "materialized",
        }
    }

    pub fn fetch(&self, id: String) -> Option<Vec<u8>> {
        match self.store.fetch(&id.into())? {
            Artifact::Object(bytes) => Some(bytes.to_vec()),
            Artifact::Columns(cols) => Some(cols.iter().flat_map(|c| c.data.iter().copied()).collect()),
        }
    }

    pub fn total_materialized_size(&self) -> f64 { self.inner.total_materialized_size() }
    pub fn stored_bytes(&self) -> usize { self.store.stored_bytes() }
    pub fn node_count(&self) -> usize { self.inner.graph().node_count() }

    /// Saves the graph metadata; stored artifacts are not written, so a
    /// reloaded graph starts with nothing materialized.
    pub fn save(&self, path: &str) -> PyResult<()> {
        self.inner.save(path).map_err(to_py_err)
    }

    #[staticmethod]
    pub fn load(path: &str) -> PyResult<Self> {
        let store = DedupedStore::new();
        let inner = HistoryGraph::load(path, &store).map_err(to_py_err)?;
        Ok(Self { inner, store })
    }
}

/// Returns `(materialized, execution, warmstarts, history_reads)` for `vertex`.
/// Each warm start is `(dataset, model_node, model_json)`.
#[pyfunction]
#[pyo3(signature = (vertex, workload, history, strategy="linear"))]
pub fn plan_reuse(
    vertex: String,
    workload: &PyWorkloadDag,
    history: &PyHistoryGraph,
    strategy: &str,
) -> PyResult<(Vec<String>, Vec<String>, Vec<(String, String, String)>, usize)> {
    let config = OptimizerConfig { reuse: strategy.to_string(), ..Default::default() };
    let mut reuse = config.reuse_strategy().map_err(to_py_err)?;
    let plan = reuse.run(&vertex.into(), &workload.inner, &history.inner).map_err(to_py_err)?;

    let mut warm = Vec::with_capacity(plan.warmstart.len());
    for ws in plan.warmstart {
        let model = serde_json::to_string(&ws.model).map_err(|e| PyRuntimeError::new_err(e.to_string()))?;
        warm.push((ws.dataset.0, ws.model_node.0, model));
    }
    Ok((ids(plan.materialized), ids(plan.execution), warm, plan.history_reads))
}

/// Annotates costs, runs the configured materializer and moves artifacts.
/// Returns `(stored, evicted)`.
#[pyfunction]
#[pyo3(signature = (history, workload, config_json=None))]
pub fn select_materialization(
    history: &mut PyHistoryGraph,
    workload: &PyWorkloadDag,
    config_json: Option<&str>,
) -> PyResult<(Vec<String>, Vec<String>)> {
    let config = match config_json {
        Some(json) => OptimizerConfig::from_json_str(json).map_err(to_py_err)?,
        None => OptimizerConfig::default(),
    };
    let materializer = config.materializer().map_err(to_py_err)?;
    cost::annotate(&mut history.inner, &config.cost_profile).map_err(to_py_err)?;
    let PyHistoryGraph { inner, store } = history;
    let report = materializer
        .run_and_materialize(inner, &workload.inner, store)
        .map_err(to_py_err)?;
    Ok((ids(report.stored), ids(report.evicted)))
}

/// Default load cost estimate for an artifact of `size` bytes.
#[pyfunction]
pub fn estimate_load_cost(size: f64) -> f64 {
    CostProfile::default().load_cost(size)
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyWorkloadDag>()?;
    m.add_class::<PyHistoryGraph>()?;
    m.add_function(wrap_pyfunction!(plan_reuse, m)?)?;
    m.add_function(wrap_pyfunction!(select_materialization, m)?)?;
    m.add_function(wrap_pyfunction!(estimate_load_cost, m)?)?;
    Ok(())
}
