//! Multi-run orchestration over perturbed inputs.
//!
//! Drives N independent oracle invocations, one per perturbed scenario.
//! Runs are embarrassingly parallel: each run derives its own seed,
//! perturbs privately, and writes its tagged result into its own slot of a
//! fixed-size results array, so aggregation never depends on completion
//! order. A single run's failure is recorded and excluded from merging;
//! the batch carries on.
//!
//! ## Feature gating
//!
//! With the `parallel` feature (default) runs execute on a bounded rayon
//! pool; without it they execute sequentially. Output is identical either
//! way.

use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::engine::errors::ForestError;
use crate::engine::graph::{Interactome, PrizeVector};
use crate::engine::oracle::{ForestOracle, ForestResult, SolverParams};
use crate::engine::perturb::{perturb, run_seed, PerturbKind};

/// One failed run, preserved for the batch report.
#[derive(Debug)]
pub struct RunFailure {
    pub run_index: u32,
    pub error: ForestError,
}

/// Outcome of a batch of randomized runs.
///
/// `results` and `failures` partition the requested run indices; both are
/// ordered by run index regardless of completion order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub kind: PerturbKind,
    pub requested: u32,
    pub results: Vec<ForestResult>,
    pub failures: Vec<RunFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> u32 {
        self.results.len() as u32
    }

    /// Human-readable outcome line, e.g. `7 of 10 noisyEdges runs succeeded`.
    pub fn summary(&self) -> String {
        format!(
            "{} of {} {} runs succeeded",
            self.succeeded(),
            self.requested,
            self.kind.label()
        )
    }
}

/// Runs `n` independent randomized invocations of the oracle.
///
/// For `n == 0` this is a no-op returning an empty report. The oracle's
/// preflight runs first: a missing backend refuses the whole batch before
/// any work is dispatched. `workers` bounds the worker pool (0 uses the
/// library default).
///
/// Seed discipline: run `i` perturbs with `run_seed(base_seed, i)`, so a
/// batch repeated with the same base seed reproduces identical scenarios
/// whatever the scheduling.
#[allow(clippy::too_many_arguments)]
pub fn run_many(
    oracle: &dyn ForestOracle,
    graph: &Arc<Interactome>,
    prizes: &PrizeVector,
    kind: PerturbKind,
    n: u32,
    base_seed: u64,
    noise_sd: f64,
    params: &SolverParams,
    workers: usize,
) -> Result<BatchReport, ForestError> {
    if n == 0 {
        return Ok(BatchReport {
            kind,
            ..BatchReport::default()
        });
    }
    oracle.preflight()?;
    if kind == PerturbKind::EdgeNoise && (!noise_sd.is_finite() || noise_sd < 0.0) {
        return Err(ForestError::Config(format!(
            "edge-noise standard deviation {} must be finite and non-negative",
            noise_sd
        )));
    }

    let run_one = |run_index: u32| -> Result<ForestResult, ForestError> {
        let seed = run_seed(base_seed, run_index);
        let scenario = perturb(graph, prizes, kind, seed, noise_sd)?;
        let started = Instant::now();
        let solution = oracle.solve(&scenario, params)?;
        ForestResult::from_solution(
            run_index,
            &scenario,
            solution,
            started.elapsed(),
            params.clone(),
        )
    };

    // One slot per run index, written exactly once, read after the join.
    let slots = dispatch(n, workers, run_one)?;

    let mut report = BatchReport {
        kind,
        requested: n,
        ..BatchReport::default()
    };
    for (run_index, outcome) in slots.into_iter().enumerate() {
        match outcome {
            Ok(result) => report.results.push(result),
            Err(error) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("{} run {} failed: {}", kind.label(), run_index, error);
                report.failures.push(RunFailure {
                    run_index: run_index as u32,
                    error,
                });
            }
        }
    }
    #[cfg(feature = "tracing")]
    tracing::debug!("{}", report.summary());
    Ok(report)
}

/// Executes `run_one` for every run index on a bounded pool, returning
/// per-index slots in index order.
#[cfg(feature = "parallel")]
pub(crate) fn dispatch<T, F>(
    n: u32,
    workers: usize,
    run_one: F,
) -> Result<Vec<Result<T, ForestError>>, ForestError>
where
    T: Send,
    F: Fn(u32) -> Result<T, ForestError> + Send + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| ForestError::Internal(format!("failed to build worker pool: {}", e)))?;
    Ok(pool.install(|| (0..n).into_par_iter().map(run_one).collect()))
}

/// Sequential fallback when the `parallel` feature is disabled.
#[cfg(not(feature = "parallel"))]
pub(crate) fn dispatch<T, F>(
    n: u32,
    _workers: usize,
    run_one: F,
) -> Result<Vec<Result<T, ForestError>>, ForestError>
where
    T: Send,
    F: Fn(u32) -> Result<T, ForestError> + Send + Sync,
{
    Ok((0..n).map(run_one).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::EdgeDirection;
    use crate::engine::oracle::OracleSolution;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn base() -> (Arc<Interactome>, PrizeVector) {
        let mut b = Interactome::builder();
        b.add_edge("A", "B", 0.2, EdgeDirection::Undirected).unwrap();
        b.add_edge("B", "C", 0.5, EdgeDirection::Undirected).unwrap();
        let graph = Arc::new(b.build());
        let mut prizes = PrizeVector::zeros(graph.node_count());
        prizes.set(graph.node_by_name("A").unwrap(), 1.0).unwrap();
        prizes.set(graph.node_by_name("C").unwrap(), 2.0).unwrap();
        (graph, prizes)
    }

    /// Selects every edge of the scenario; optionally fails on chosen runs.
    struct EveryEdgeOracle {
        fail_first: u32,
        calls: AtomicU32,
    }

    impl EveryEdgeOracle {
        fn new() -> Self {
            EveryEdgeOracle {
                fail_first: 0,
                calls: AtomicU32::new(0),
            }
        }

        fn failing_first(n: u32) -> Self {
            EveryEdgeOracle {
                fail_first: n,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl ForestOracle for EveryEdgeOracle {
        fn solve(
            &self,
            scenario: &crate::engine::perturb::Scenario,
            _params: &SolverParams,
        ) -> Result<OracleSolution, ForestError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                return Err(ForestError::Oracle("synthetic failure".into()));
            }
            Ok(OracleSolution {
                edges: scenario.graph.edges().iter().map(|e| e.id).collect(),
                root_attached: vec![],
                objective: 1.0,
            })
        }
    }

    #[test]
    fn zero_runs_is_a_noop() {
        let (graph, prizes) = base();
        let oracle = EveryEdgeOracle::new();
        let report = run_many(
            &oracle,
            &graph,
            &prizes,
            PerturbKind::PrizeShuffle,
            0,
            7,
            0.0,
            &SolverParams::default(),
            1,
        )
        .unwrap();
        assert_eq!(report.requested, 0);
        assert_eq!(report.succeeded(), 0);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn results_are_tagged_and_ordered_by_run_index() {
        let (graph, prizes) = base();
        let oracle = EveryEdgeOracle::new();
        let report = run_many(
            &oracle,
            &graph,
            &prizes,
            PerturbKind::PrizeShuffle,
            5,
            7,
            0.0,
            &SolverParams::default(),
            4,
        )
        .unwrap();
        assert_eq!(report.succeeded(), 5);
        let indices: Vec<u32> = report.results.iter().map(|r| r.run_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn failures_are_recorded_without_aborting_the_batch() {
        let (graph, prizes) = base();
        let oracle = EveryEdgeOracle::failing_first(3);
        let report = run_many(
            &oracle,
            &graph,
            &prizes,
            PerturbKind::None,
            10,
            0,
            0.0,
            &SolverParams::default(),
            1,
        )
        .unwrap();
        assert_eq!(report.requested, 10);
        assert_eq!(report.succeeded(), 7);
        assert_eq!(report.failures.len(), 3);
        assert_eq!(report.summary(), "7 of 10 base runs succeeded");
    }

    #[test]
    fn preflight_failure_refuses_the_batch() {
        struct Unavailable;
        impl ForestOracle for Unavailable {
            fn preflight(&self) -> Result<(), ForestError> {
                Err(ForestError::OracleUnavailable("missing".into()))
            }
            fn solve(
                &self,
                _: &crate::engine::perturb::Scenario,
                _: &SolverParams,
            ) -> Result<OracleSolution, ForestError> {
                unreachable!("must not be dispatched")
            }
        }
        let (graph, prizes) = base();
        let err = run_many(
            &Unavailable,
            &graph,
            &prizes,
            PerturbKind::None,
            3,
            0,
            0.0,
            &SolverParams::default(),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, ForestError::OracleUnavailable(_)));
    }

    #[test]
    fn identical_base_seed_reproduces_identical_results() {
        let (graph, prizes) = base();
        let oracle = EveryEdgeOracle::new();
        let params = SolverParams::default();
        let r1 = run_many(
            &oracle,
            &graph,
            &prizes,
            PerturbKind::PrizeShuffle,
            4,
            42,
            0.0,
            &params,
            2,
        )
        .unwrap();
        let r2 = run_many(
            &oracle,
            &graph,
            &prizes,
            PerturbKind::PrizeShuffle,
            4,
            42,
            0.0,
            &params,
            2,
        )
        .unwrap();
        for (a, b) in r1.results.iter().zip(&r2.results) {
            assert_eq!(a.nodes, b.nodes);
            assert_eq!(a.edges, b.edges);
        }
    }
}
