//! Node and edge attributes shared by workload and history graphs.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::hash::Hasher;

/// A stable, content-addressed identifier for a graph node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self { Self(s) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Dataset,
    Feature,
    GroupBy,
    Agg,
    SkModel,
    /// Synthetic n-ary combine point. Its predecessors are the combined inputs;
    /// it has no artifact of its own.
    SuperNode,
}

impl NodeType {
    /// Column-backed artifacts take part in de-duplicated size accounting.
    pub fn is_columnar(&self) -> bool {
        matches!(self, NodeType::Dataset | NodeType::Feature)
    }

    /// SuperNodes have nothing to store and GroupBy objects are excluded by policy.
    pub fn is_materializable(&self) -> bool {
        !matches!(self, NodeType::SuperNode | NodeType::GroupBy)
    }
}

/// The operation carried by an edge, resolved when the graph is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Routes one of several inputs into a `SuperNode`. Never executed.
    Combine,
    /// Trains a model on the source dataset.
    Fit,
    /// Any other dataframe or model operation, keyed by name (e.g. "merge").
    Apply(String),
}

impl Operation {
    pub fn name(&self) -> &str {
        match self {
            Operation::Combine => "combine",
            Operation::Fit => "fit",
            Operation::Apply(name) => name,
        }
    }
}

/// A column slice of a columnar artifact, used for de-duplicated size accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub hash: String,
    pub size: f64,
}

/// A trained model configuration that can be cloned for warm starting.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSpec {
    pub family: String,
    pub params: serde_json::Map<String, serde_json::Value>,
    pub random_state: Option<u64>,
}

impl ModelSpec {
    pub fn with_random_state(&self, random_state: Option<u64>) -> Self {
        Self { random_state, ..self.clone() }
    }
}

/// A vertex of the lineage graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    /// Only meaningful inside one workload run.
    #[serde(skip)]
    pub computed: bool,
    pub mat: bool,
    pub root: bool,
    pub size: f64,
    pub load_cost: f64,
    pub recreation_cost: f64,
    pub compute_cost: f64,
    pub n_recreation_cost: f64,
    pub n_potential: f64,
    pub meta_freq: u32,
    pub columns: SmallVec<[ColumnRef; 4]>,
    /// Quality score recorded for trained models.
    pub score: Option<f64>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            computed: false,
            mat: false,
            root: false,
            size: 0.0,
            load_cost: 0.0,
            recreation_cost: 0.0,
            compute_cost: 0.0,
            n_recreation_cost: 0.0,
            n_potential: 0.0,
            meta_freq: 0,
            columns: SmallVec::new(),
            score: None,
        }
    }

    /// An externally loaded input. Roots are computed as soon as they exist.
    pub fn root(id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self { root: true, computed: true, ..Self::new(id, node_type) }
    }

    pub fn with_size(mut self, size: f64) -> Self { self.size = size; self }
    pub fn with_compute_cost(mut self, cost: f64) -> Self { self.compute_cost = cost; self }
    pub fn with_load_cost(mut self, cost: f64) -> Self { self.load_cost = cost; self }
    pub fn with_score(mut self, score: f64) -> Self { self.score = Some(score); self }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub oper: Operation,
    pub args: serde_json::Value,
    /// Content hash of `oper` and `args`; identical computations share it.
    pub hash: String,
    pub freq: u32,
    pub warm_startable: bool,
    pub should_warmstart: bool,
    /// Model configuration with the random state stripped, used to match
    /// compatible historical training runs.
    pub no_random_state_model: Option<String>,
    pub random_state: Option<u64>,
    pub model: Option<ModelSpec>,
}

impl Edge {
    pub fn new(oper: Operation, args: serde_json::Value) -> Self {
        let hash = edge_hash(&oper, &args);
        Self {
            oper,
            args,
            hash,
            freq: 1,
            warm_startable: false,
            should_warmstart: false,
            no_random_state_model: None,
            random_state: None,
            model: None,
        }
    }

    pub fn apply(name: &str) -> Self {
        Self::new(Operation::Apply(name.to_string()), serde_json::Value::Null)
    }

    pub fn combine() -> Self {
        Self::new(Operation::Combine, serde_json::Value::Null)
    }

    /// A model training edge. `no_random_state_model` is derived from the model
    /// family and parameters so compatible runs hash identically.
    pub fn fit(model: ModelSpec) -> Self {
        let args = serde_json::json!({ "family": model.family, "params": model.params });
        let mut edge = Self::new(Operation::Fit, args.clone());
        edge.no_random_state_model = Some(args.to_string());
        edge.random_state = model.random_state;
        edge.model = Some(model);
        edge
    }

    pub fn warm_startable(mut self, flag: bool) -> Self { self.warm_startable = flag; self }
    pub fn should_warmstart(mut self, flag: bool) -> Self { self.should_warmstart = flag; self }
}

pub(crate) fn edge_hash(oper: &Operation, args: &serde_json::Value) -> String {
    let mut hasher = seahash::SeaHasher::new();
    hasher.write(oper.name().as_bytes());
    hasher.write(args.to_string().as_bytes());
    format!("{:016x}", hasher.finish())
}

/// Identifier of the `SuperNode` combining `members`, independent of their order.
pub(crate) fn combine_id(members: &[NodeId]) -> NodeId {
    let mut sorted: Vec<&NodeId> = members.iter().collect();
    sorted.sort();
    let mut hasher = seahash::SeaHasher::new();
    for m in sorted {
        hasher.write(m.as_str().as_bytes());
        hasher.write_u8(0);
    }
    NodeId(format!("combine-{:016x}", hasher.finish()))
}
