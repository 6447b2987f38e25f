//! Choosing which artifacts to keep under a storage budget.
pub mod materializer;
pub mod selector;
pub mod utility;

use crate::config::OptimizerConfig;
use crate::error::{OptimizerError, Result};

pub use materializer::{
    apply, AllMaterializer, HeuristicsMaterializer, MaterializationReport, Materializer,
    StorageAwareMaterializer,
};
pub use selector::{select, Selection};
pub use utility::{compute_rhos, rho, utility, NodeUtility};

/// Resolves a materializer by name (case-insensitive).
pub fn from_name(name: &str, config: &OptimizerConfig) -> Result<Box<dyn Materializer>> {
    let budget = config.storage_budget;
    let alpha = config.alpha;
    match name.to_ascii_lowercase().as_str() {
        "all" => Ok(Box::new(AllMaterializer)),
        "heuristics" | "simple" => Ok(Box::new(HeuristicsMaterializer::new(budget, alpha))),
        "storage_aware" => Ok(Box::new(StorageAwareMaterializer::new(budget, alpha))),
        _ => Err(OptimizerError::UnknownMaterializer(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("all", "all")]
    #[case("heuristics", "heuristics")]
    #[case("simple", "heuristics")]
    #[case("Storage_Aware", "storage_aware")]
    fn test_registry_names(#[case] name: &str, #[case] expected: &str) {
        let m = from_name(name, &OptimizerConfig::default()).unwrap();
        assert_eq!(m.name(), expected);
    }
}
