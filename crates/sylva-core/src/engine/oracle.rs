//! The optimization oracle contract.
//!
//! The prize-collecting Steiner forest solver is an external black box
//! behind [`ForestOracle`]: orchestration code sees only the
//! request/response contract and can swap backends without change. The
//! shipped backend is [`crate::engine::msgsteiner::MsgSteinerOracle`];
//! tests substitute stub implementations.

use std::time::Duration;

use rustc_hash::FxHashMap;

use crate::engine::errors::ForestError;
use crate::engine::graph::{EdgeDirection, EdgeId, NodeId};
use crate::engine::perturb::Scenario;

/// Which interactome nodes the synthetic root is connected to in the
/// solver request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DummyMode {
    /// Root attaches to every terminal (the default).
    Terminals,
    /// Root attaches to every non-terminal.
    Others,
    /// Root attaches to every node.
    All,
}

/// Numeric solver tuning knobs, passed through to the backend opaquely.
///
/// `w` is the root-edge cost, `b` the prize scaling factor, `d` the depth
/// bound, `mu` the hub degree penalty; `g` and `r` are backend-specific
/// message-passing knobs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SolverParams {
    pub w: f64,
    pub b: f64,
    pub d: u32,
    pub mu: f64,
    pub g: f64,
    pub r: f64,
    pub dummy_mode: DummyMode,
}

impl Default for SolverParams {
    fn default() -> Self {
        SolverParams {
            w: 1.0,
            b: 1.0,
            d: 10,
            mu: 0.0,
            g: 0.001,
            r: 0.0,
            dummy_mode: DummyMode::Terminals,
        }
    }
}

/// The raw outcome of one solver invocation, in terms of the scenario's
/// graph instance.
#[derive(Debug, Clone)]
pub struct OracleSolution {
    /// Edges of the optimal forest.
    pub edges: Vec<EdgeId>,
    /// Nodes the solver attached directly to the synthetic root
    /// (diagnostic only, not part of the forest).
    pub root_attached: Vec<NodeId>,
    /// Objective value reported by the solver.
    pub objective: f64,
}

/// The external optimization procedure.
///
/// Implementations must be safe to call from multiple worker threads at
/// once; each call owns its scenario and must not retain state across
/// calls.
pub trait ForestOracle: Send + Sync {
    /// Verifies the backend can run at all (binary present, linkable,
    /// etc.). Called once before a batch is dispatched so a missing
    /// backend refuses the whole batch up front.
    fn preflight(&self) -> Result<(), ForestError> {
        Ok(())
    }

    /// Solves one scenario. Returns `ForestError::Oracle` for
    /// unparsable or infeasible responses and timeouts; such failures are
    /// recorded per-run by the orchestrator and never abort a batch.
    fn solve(&self, scenario: &Scenario, params: &SolverParams)
        -> Result<OracleSolution, ForestError>;
}

/// A node selected by one run, with the prize it carried in that run's
/// scenario.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectedNode {
    pub name: String,
    pub prize: f64,
}

/// An edge selected by one run, with the weight it carried in that run's
/// scenario. Undirected endpoints are stored in lexicographic order so the
/// pair is canonical across graph instances.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectedEdge {
    pub a: String,
    pub b: String,
    pub directed: bool,
    pub weight: f64,
}

impl SelectedEdge {
    /// Key identifying this edge across runs and graph instances.
    pub fn key(&self) -> (String, String, bool) {
        (self.a.clone(), self.b.clone(), self.directed)
    }
}

/// The immutable result of one oracle invocation, tagged with its run
/// index at creation.
///
/// Names and per-run attribute values are snapshotted out of the scenario
/// here, so merging never needs the (possibly perturbed) graph instances
/// again.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForestResult {
    /// Index of this run within its batch; assigned by the orchestrator.
    pub run_index: u32,
    /// Edges of the optimal forest, canonically named.
    pub edges: Vec<SelectedEdge>,
    /// Union of the selected edges' endpoints, sorted by name.
    pub nodes: Vec<SelectedNode>,
    /// Names of nodes the solver attached to the synthetic root
    /// (diagnostic forest).
    pub root_attached: Vec<String>,
    /// Objective value reported by the solver.
    pub objective: f64,
    /// Wall-clock duration of the invocation.
    pub runtime: Duration,
    /// Parameters the run was invoked with.
    pub params: SolverParams,
}

impl ForestResult {
    /// Snapshots a solver solution against its scenario.
    pub fn from_solution(
        run_index: u32,
        scenario: &Scenario,
        solution: OracleSolution,
        runtime: Duration,
        params: SolverParams,
    ) -> Result<Self, ForestError> {
        let graph = &scenario.graph;
        let mut edges = Vec::with_capacity(solution.edges.len());
        let mut endpoint_prizes: FxHashMap<&str, f64> = FxHashMap::default();
        for id in &solution.edges {
            let edge = graph.edge(*id).ok_or_else(|| {
                ForestError::Internal(format!("solution references unknown edge {:?}", id))
            })?;
            let (a, b) = (graph.node_name(edge.a), graph.node_name(edge.b));
            let directed = edge.direction == EdgeDirection::Directed;
            // Canonicalize undirected pairs by name; directed edges keep
            // their orientation.
            let (a, b) = if !directed && b < a { (b, a) } else { (a, b) };
            edges.push(SelectedEdge {
                a: a.to_string(),
                b: b.to_string(),
                directed,
                weight: edge.weight,
            });
            endpoint_prizes.insert(graph.node_name(edge.a), scenario.prizes.get(edge.a));
            endpoint_prizes.insert(graph.node_name(edge.b), scenario.prizes.get(edge.b));
        }
        edges.sort_by(|x, y| x.key().cmp(&y.key()));
        edges.dedup();

        let mut nodes: Vec<SelectedNode> = endpoint_prizes
            .into_iter()
            .map(|(name, prize)| SelectedNode {
                name: name.to_string(),
                prize,
            })
            .collect();
        nodes.sort_by(|x, y| x.name.cmp(&y.name));

        let mut root_attached: Vec<String> = solution
            .root_attached
            .iter()
            .map(|id| {
                graph
                    .node(*id)
                    .map(|n| n.name.to_string())
                    .ok_or_else(|| {
                        ForestError::Internal(format!(
                            "solution references unknown node {:?}",
                            id
                        ))
                    })
            })
            .collect::<Result<_, _>>()?;
        root_attached.sort_unstable();
        root_attached.dedup();

        Ok(ForestResult {
            run_index,
            edges,
            nodes,
            root_attached,
            objective: solution.objective,
            runtime,
            params,
        })
    }

    /// Whether the forest contains a node of the given name.
    pub fn contains_node(&self, name: &str) -> bool {
        self.nodes.binary_search_by(|n| n.name.as_str().cmp(name)).is_ok()
    }
}
