//! Graph algorithms shared by the reuse and materialization passes.
pub mod cost;
pub mod topology;
