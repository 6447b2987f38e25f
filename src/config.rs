//! Optimizer configuration, loadable from JSON.

use crate::error::Result;
use crate::materialization::{self, Materializer};
use crate::reuse::{self, ReuseStrategy};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default weight of reuse potential against recreation cost.
pub const ALPHA: f64 = 0.5;

/// Storage characteristics used to estimate load costs from artifact sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostProfile {
    /// Cost units per stored byte read back.
    pub load_cost_per_byte: f64,
    /// Fixed cost of any load.
    pub load_latency: f64,
}

impl Default for CostProfile {
    fn default() -> Self {
        Self {
            load_cost_per_byte: 1e-6,
            load_latency: 0.0,
        }
    }
}

impl CostProfile {
    pub fn load_cost(&self, size: f64) -> f64 {
        self.load_latency + self.load_cost_per_byte * size
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub alpha: f64,
    /// Storage budget in bytes.
    pub storage_budget: f64,
    pub materializer: String,
    pub reuse: String,
    /// Hybrid search switch point; half the execution subgraph when unset.
    pub graph_length_cutoff: Option<usize>,
    pub cost_profile: CostProfile,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            alpha: ALPHA,
            storage_budget: 8.0 * 1024.0 * 1024.0,
            materializer: "storage_aware".to_string(),
            reuse: "linear".to_string(),
            graph_length_cutoff: None,
            cost_profile: CostProfile::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Resolves the configured reuse strategy; unknown names fail here.
    pub fn reuse_strategy(&self) -> Result<Box<dyn ReuseStrategy>> {
        reuse::from_name(&self.reuse, self)
    }

    pub fn materializer(&self) -> Result<Box<dyn Materializer>> {
        materialization::from_name(&self.materializer, self)
    }
}
