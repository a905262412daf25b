//! k-fold cross-validation over terminal assignment.
//!
//! Partitions the terminal set into k seeded folds, re-solves the instance
//! with each fold's prizes held out, and reports how well the held-out
//! terminals are recovered by the resulting forest. Folds run under the
//! same worker-pool policy as randomized batches; one fold's solver
//! failure is recorded in its report and never aborts the others.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::engine::errors::ForestError;
use crate::engine::graph::{Interactome, NodeId, PrizeVector};
use crate::engine::oracle::{ForestOracle, ForestResult, SolverParams};
use crate::engine::perturb::{perturb, run_seed, PerturbKind};
use crate::engine::runs::dispatch;

/// Outcome of one fold's held-out run.
#[derive(Debug)]
pub enum FoldOutcome {
    /// The fold's training run solved; recovery of the held-out terminals
    /// is measured by their presence in the resulting forest.
    Solved {
        /// Held-out terminals that re-appeared in the forest, sorted.
        recovered: Vec<String>,
        /// `recovered / held_out`.
        recovery_fraction: f64,
        /// The fold's full forest result.
        result: ForestResult,
    },
    /// The fold's solver invocation failed.
    Failed { error: ForestError },
}

/// Report for one cross-validation fold.
#[derive(Debug)]
pub struct FoldReport {
    pub fold: u32,
    /// Names of the terminals held out of this fold's training prizes,
    /// sorted.
    pub held_out: Vec<String>,
    pub outcome: FoldOutcome,
}

impl FoldReport {
    pub fn is_solved(&self) -> bool {
        matches!(self.outcome, FoldOutcome::Solved { .. })
    }
}

/// Report for one full cross-validation pass.
#[derive(Debug)]
pub struct CrossValReport {
    pub k: u32,
    pub folds: Vec<FoldReport>,
}

impl CrossValReport {
    pub fn succeeded(&self) -> u32 {
        self.folds.iter().filter(|f| f.is_solved()).count() as u32
    }

    pub fn requested(&self) -> u32 {
        self.folds.len() as u32
    }

    /// Mean recovery fraction over the solved folds, or `None` if every
    /// fold failed.
    pub fn mean_recovery(&self) -> Option<f64> {
        let solved: Vec<f64> = self
            .folds
            .iter()
            .filter_map(|f| match &f.outcome {
                FoldOutcome::Solved {
                    recovery_fraction, ..
                } => Some(*recovery_fraction),
                FoldOutcome::Failed { .. } => None,
            })
            .collect();
        if solved.is_empty() {
            None
        } else {
            Some(solved.iter().sum::<f64>() / solved.len() as f64)
        }
    }
}

/// Partitions the terminal set into k disjoint, non-empty folds.
///
/// Terminals are ordered by name, shuffled with a generator seeded from
/// `seed`, and dealt round-robin, so the partition is reproducible and
/// every fold gets at least one terminal. Fails with
/// [`ForestError::InvalidFoldCount`] when k < 2 or k exceeds the terminal
/// count.
pub fn partition_terminals(
    graph: &Interactome,
    prizes: &PrizeVector,
    k: u32,
    seed: u64,
) -> Result<Vec<Vec<NodeId>>, ForestError> {
    if k < 2 {
        return Err(ForestError::InvalidFoldCount(format!(
            "k must be at least 2, got {}",
            k
        )));
    }
    let mut terminals = prizes.terminals();
    if (k as usize) > terminals.len() {
        return Err(ForestError::InvalidFoldCount(format!(
            "k = {} exceeds the {} terminals; folds would be empty",
            k,
            terminals.len()
        )));
    }
    terminals.sort_by(|x, y| graph.node_name(*x).cmp(graph.node_name(*y)));
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    terminals.shuffle(&mut rng);

    let mut folds: Vec<Vec<NodeId>> = vec![Vec::new(); k as usize];
    for (i, terminal) in terminals.into_iter().enumerate() {
        folds[i % k as usize].push(terminal);
    }
    Ok(folds)
}

/// Runs k-fold cross-validation over the terminal set.
///
/// For each fold: the fold's terminals are zeroed out of the training
/// prizes, the unperturbed instance is solved once, and the held-out
/// terminals found in the forest count as recovered.
pub fn cross_validate(
    oracle: &dyn ForestOracle,
    graph: &Arc<Interactome>,
    prizes: &PrizeVector,
    k: u32,
    seed: u64,
    params: &SolverParams,
    workers: usize,
) -> Result<CrossValReport, ForestError> {
    let folds = partition_terminals(graph, prizes, k, seed)?;
    oracle.preflight()?;

    let run_fold = |fold_index: u32| -> Result<ForestResult, ForestError> {
        let held_out = &folds[fold_index as usize];
        let mut training = prizes.clone();
        for &id in held_out {
            training.clear(id);
        }
        let scenario = perturb(graph, &training, PerturbKind::None, seed, 0.0)?;
        let started = std::time::Instant::now();
        let solution = oracle.solve(&scenario, params)?;
        ForestResult::from_solution(
            fold_index,
            &scenario,
            solution,
            started.elapsed(),
            params.clone(),
        )
    };

    let slots = dispatch(k, workers, run_fold)?;

    let mut reports = Vec::with_capacity(k as usize);
    for (fold_index, outcome) in slots.into_iter().enumerate() {
        let mut held_out: Vec<String> = folds[fold_index]
            .iter()
            .map(|id| graph.node_name(*id).to_string())
            .collect();
        held_out.sort_unstable();
        let outcome = match outcome {
            Ok(result) => {
                let recovered: Vec<String> = held_out
                    .iter()
                    .filter(|name| result.contains_node(name))
                    .cloned()
                    .collect();
                let recovery_fraction = recovered.len() as f64 / held_out.len() as f64;
                FoldOutcome::Solved {
                    recovered,
                    recovery_fraction,
                    result,
                }
            }
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("fold {} failed: {}", fold_index, error);
                FoldOutcome::Failed { error }
            }
        };
        reports.push(FoldReport {
            fold: fold_index as u32,
            held_out,
            outcome,
        });
    }

    Ok(CrossValReport { k, folds: reports })
}

/// Runs `reps` independent cross-validation passes with per-repetition
/// seeds derived from the base seed, so repeated executions reproduce the
/// same sequence of partitions.
#[allow(clippy::too_many_arguments)]
pub fn cross_validate_repeated(
    oracle: &dyn ForestOracle,
    graph: &Arc<Interactome>,
    prizes: &PrizeVector,
    k: u32,
    reps: u32,
    seed: u64,
    params: &SolverParams,
    workers: usize,
) -> Result<Vec<CrossValReport>, ForestError> {
    if reps == 0 {
        return Err(ForestError::Config(
            "cross-validation repeat count must be at least 1".into(),
        ));
    }
    (0..reps)
        .map(|rep| {
            cross_validate(
                oracle,
                graph,
                prizes,
                k,
                run_seed(seed, rep),
                params,
                workers,
            )
        })
        .collect()
}
