//! Shared fixtures: small graphs and stub oracles.

// Each test binary compiles this module separately and uses a subset.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use sylva_core::engine::graph::{EdgeDirection, Interactome, NodeId, PrizeVector};
use sylva_core::engine::oracle::{OracleSolution, SolverParams};
use sylva_core::engine::perturb::Scenario;
use sylva_core::{ForestError, ForestOracle};

/// A path graph N0 - N1 - ... - N(n-1) with uniform weights.
pub fn line_graph(n: usize) -> Arc<Interactome> {
    let mut b = Interactome::builder();
    for i in 0..n - 1 {
        b.add_edge(
            &format!("N{:02}", i),
            &format!("N{:02}", i + 1),
            0.5,
            EdgeDirection::Undirected,
        )
        .unwrap();
    }
    Arc::new(b.build())
}

/// A hub with `k` spokes T00..T(k-1), each spoke a terminal.
pub fn star_instance(k: usize) -> (Arc<Interactome>, PrizeVector) {
    let mut b = Interactome::builder();
    for i in 0..k {
        b.add_edge("HUB", &format!("T{:02}", i), 0.5, EdgeDirection::Undirected)
            .unwrap();
    }
    let graph = Arc::new(b.build());
    let mut prizes = PrizeVector::zeros(graph.node_count());
    for i in 0..k {
        let id = graph.node_by_name(&format!("T{:02}", i)).unwrap();
        prizes.set(id, 1.0 + i as f64).unwrap();
    }
    (graph, prizes)
}

/// Marks the given node indices as terminals with prize `1 + index`.
pub fn prizes_on(graph: &Interactome, indices: &[u32]) -> PrizeVector {
    let mut prizes = PrizeVector::zeros(graph.node_count());
    for &i in indices {
        prizes.set(NodeId(i), 1.0 + f64::from(i)).unwrap();
    }
    prizes
}

/// Selects every edge of the scenario's graph.
pub struct EveryEdgeOracle;

impl ForestOracle for EveryEdgeOracle {
    fn solve(
        &self,
        scenario: &Scenario,
        _params: &SolverParams,
    ) -> Result<OracleSolution, ForestError> {
        Ok(OracleSolution {
            edges: scenario.graph.edges().iter().map(|e| e.id).collect(),
            root_attached: vec![],
            objective: scenario.prizes.values().iter().sum(),
        })
    }
}

/// Selects exactly the edges with at least one terminal endpoint, so
/// held-out (zero-prize) terminals are never part of the forest.
pub struct TerminalEdgeOracle;

impl ForestOracle for TerminalEdgeOracle {
    fn solve(
        &self,
        scenario: &Scenario,
        _params: &SolverParams,
    ) -> Result<OracleSolution, ForestError> {
        let edges = scenario
            .graph
            .edges()
            .iter()
            .filter(|e| scenario.prizes.is_terminal(e.a) || scenario.prizes.is_terminal(e.b))
            .map(|e| e.id)
            .collect();
        Ok(OracleSolution {
            edges,
            root_attached: vec![],
            objective: 0.0,
        })
    }
}

/// Fails every invocation with an oracle error.
pub struct FailingOracle;

impl ForestOracle for FailingOracle {
    fn solve(
        &self,
        _scenario: &Scenario,
        _params: &SolverParams,
    ) -> Result<OracleSolution, ForestError> {
        Err(ForestError::Oracle("stub failure".into()))
    }
}

/// Fails the first `n` invocations, then behaves like [`EveryEdgeOracle`].
pub struct FlakyOracle {
    remaining_failures: AtomicU32,
}

impl FlakyOracle {
    pub fn failing_first(n: u32) -> Self {
        FlakyOracle {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

impl ForestOracle for FlakyOracle {
    fn solve(
        &self,
        scenario: &Scenario,
        params: &SolverParams,
    ) -> Result<OracleSolution, ForestError> {
        let claimed_failure = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok();
        if claimed_failure {
            return Err(ForestError::Oracle("flaky failure".into()));
        }
        EveryEdgeOracle.solve(scenario, params)
    }
}
