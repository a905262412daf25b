//! The randomized-run orchestration engine.
//!
//! This module provides:
//! - **errors**: Error types for orchestration failures
//! - **graph**: Immutable interactome graph model and per-node prize vectors
//! - **perturb**: Seeded perturbation generators (edge noise, prize shuffle,
//!   terminal randomization)
//! - **oracle**: The opaque solver contract and per-run forest results
//! - **msgsteiner**: Concrete adapter that shells out to the msgsteiner binary
//! - **runs**: Multi-run orchestration over perturbed inputs
//! - **merge**: Consensus merging of forests with robustness statistics
//! - **crossval**: k-fold cross-validation over terminal assignment

pub mod crossval;
pub mod errors;
pub mod graph;
pub mod merge;
pub mod msgsteiner;
pub mod oracle;
pub mod perturb;
pub mod runs;
