//! # Sylva Core
//!
//! Core engine for robust prize-collecting Steiner forest analysis of
//! weighted interactomes: seeded input perturbation, external-solver
//! orchestration, consensus merging, and k-fold cross-validation.

pub mod config;
pub mod engine;
pub mod io;

// Re-export commonly used types
pub use engine::crossval::{cross_validate, cross_validate_repeated, CrossValReport};
pub use engine::errors::ForestError;
pub use engine::graph::{Interactome, PrizeVector};
pub use engine::merge::{merge_forests, ConsensusGraph};
pub use engine::oracle::{ForestOracle, ForestResult, SolverParams};
pub use engine::perturb::{perturb, PerturbKind, Scenario};
pub use engine::runs::{run_many, BatchReport};
