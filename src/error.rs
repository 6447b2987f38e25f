//! Error types for the optimizer.
use crate::store::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OptimizerError>;

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Undefined reuse type: {0}")]
    UnknownReuseStrategy(String),
    #[error("Invalid materializer type: {0}")]
    UnknownMaterializer(String),
    /// The graph handed to the optimizer breaks a structural assumption.
    #[error("Invariant violated at node '{node}': {message}")]
    InvariantViolation { node: NodeId, message: String },
    #[error("Node '{0}' is not part of the graph")]
    NodeNotFound(NodeId),
    #[error("Cycle detected involving node '{0}'")]
    CycleDetected(NodeId),
    #[error("No artifact available to materialize node '{0}'")]
    MissingArtifact(NodeId),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OptimizerError {
    pub(crate) fn invariant(node: &NodeId, message: impl Into<String>) -> Self {
        Self::InvariantViolation { node: node.clone(), message: message.into() }
    }
}
