//! Consensus merging of per-run forests.
//!
//! Reduces N forest results to one consensus graph: every node and edge
//! that appeared in at least one run, annotated with its occurrence
//! frequency and the mean/variance of its per-run numeric attribute
//! (node prize, selected edge weight) over the runs that selected it.
//!
//! Determinism: inputs are processed in run-index order and output is
//! sorted by element key, so merging the same multiset of results yields
//! an identical value whatever order the runs completed in. The merge is
//! single-threaded, performs no I/O, and runs after the batch's join
//! barrier.

use rustc_hash::FxHashMap;

use crate::engine::errors::ForestError;
use crate::engine::oracle::ForestResult;

/// Occurrence count plus running first/second moments of one element's
/// per-run attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementStats {
    count: u32,
    sum: f64,
    sum_sq: f64,
}

impl ElementStats {
    fn record(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    /// How many runs selected this element. Always in [1, N] on a merged
    /// element; zero-count elements are never materialized.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// `count / n_successful`; in (0, 1] on a merged element.
    pub fn frequency(&self, n_successful: u32) -> f64 {
        f64::from(self.count) / f64::from(n_successful)
    }

    /// Mean of the attribute over the selecting runs.
    pub fn mean(&self) -> f64 {
        self.sum / f64::from(self.count)
    }

    /// Population variance of the attribute over the selecting runs
    /// (0 for a single selecting run).
    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        (self.sum_sq / f64::from(self.count) - mean * mean).max(0.0)
    }
}

/// A node of the consensus graph with its robustness statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsensusNode {
    pub name: String,
    /// Statistics over the per-run prizes of the selecting runs.
    pub prize: ElementStats,
}

/// An edge of the consensus graph with its robustness statistics.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsensusEdge {
    pub a: String,
    pub b: String,
    pub directed: bool,
    /// Statistics over the per-run selected weights of the selecting runs.
    pub weight: ElementStats,
}

/// The merged, robustness-annotated union of all input forests.
///
/// Nodes are sorted by name and edges by endpoint pair; two merges of the
/// same result multiset compare equal.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsensusGraph {
    /// Number of successful runs the frequencies are relative to.
    pub n_successful: u32,
    pub nodes: Vec<ConsensusNode>,
    pub edges: Vec<ConsensusEdge>,
}

impl ConsensusGraph {
    /// Looks up a node by name.
    pub fn node(&self, name: &str) -> Option<&ConsensusNode> {
        self.nodes
            .binary_search_by(|n| n.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// Looks up an edge by its canonical endpoint names.
    pub fn edge(&self, a: &str, b: &str) -> Option<&ConsensusEdge> {
        self.edges
            .iter()
            .find(|e| e.a == a && e.b == b)
    }

    /// Frequency of a node, or 0 if it never appeared.
    pub fn node_frequency(&self, name: &str) -> f64 {
        self.node(name)
            .map(|n| n.prize.frequency(self.n_successful))
            .unwrap_or(0.0)
    }

    /// Frequency of an edge, or 0 if it never appeared.
    pub fn edge_frequency(&self, a: &str, b: &str) -> f64 {
        self.edge(a, b)
            .map(|e| e.weight.frequency(self.n_successful))
            .unwrap_or(0.0)
    }
}

/// Merges the successful results of a batch into a consensus graph.
///
/// Fails with [`ForestError::EmptyMergeSet`] when given zero results, so a
/// batch whose runs all failed surfaces as an error instead of an empty
/// graph. Frequencies are relative to the number of *successful* runs;
/// failed runs never deflate robustness scores.
pub fn merge_forests(results: &[ForestResult]) -> Result<ConsensusGraph, ForestError> {
    if results.is_empty() {
        return Err(ForestError::EmptyMergeSet);
    }

    // Accumulate in run-index order: float sums are order-sensitive, and
    // callers may hand results in completion order.
    let mut ordered: Vec<&ForestResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.run_index);

    let mut node_stats: FxHashMap<&str, ElementStats> = FxHashMap::default();
    let mut edge_stats: FxHashMap<(&str, &str, bool), ElementStats> = FxHashMap::default();
    for result in &ordered {
        for node in &result.nodes {
            node_stats
                .entry(node.name.as_str())
                .or_default()
                .record(node.prize);
        }
        for edge in &result.edges {
            edge_stats
                .entry((edge.a.as_str(), edge.b.as_str(), edge.directed))
                .or_default()
                .record(edge.weight);
        }
    }

    let mut nodes: Vec<ConsensusNode> = node_stats
        .into_iter()
        .map(|(name, prize)| ConsensusNode {
            name: name.to_string(),
            prize,
        })
        .collect();
    nodes.sort_by(|x, y| x.name.cmp(&y.name));

    let mut edges: Vec<ConsensusEdge> = edge_stats
        .into_iter()
        .map(|((a, b, directed), weight)| ConsensusEdge {
            a: a.to_string(),
            b: b.to_string(),
            directed,
            weight,
        })
        .collect();
    edges.sort_by(|x, y| (&x.a, &x.b, x.directed).cmp(&(&y.a, &y.b, y.directed)));

    #[cfg(feature = "tracing")]
    tracing::debug!(
        "merged {} runs into {} nodes / {} edges",
        ordered.len(),
        nodes.len(),
        edges.len()
    );

    Ok(ConsensusGraph {
        n_successful: ordered.len() as u32,
        nodes,
        edges,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::oracle::{SelectedEdge, SelectedNode, SolverParams};
    use std::time::Duration;

    fn result(run_index: u32, edges: &[(&str, &str, f64)]) -> ForestResult {
        let mut nodes: Vec<SelectedNode> = edges
            .iter()
            .flat_map(|(a, b, _)| [*a, *b])
            .map(|name| SelectedNode {
                name: name.to_string(),
                prize: 1.0,
            })
            .collect();
        nodes.sort_by(|x, y| x.name.cmp(&y.name));
        nodes.dedup_by(|x, y| x.name == y.name);
        let mut selected: Vec<SelectedEdge> = edges
            .iter()
            .map(|(a, b, w)| SelectedEdge {
                a: a.to_string(),
                b: b.to_string(),
                directed: false,
                weight: *w,
            })
            .collect();
        selected.sort_by(|x, y| x.key().cmp(&y.key()));
        ForestResult {
            run_index,
            edges: selected,
            nodes,
            root_attached: vec![],
            objective: 0.0,
            runtime: Duration::ZERO,
            params: SolverParams::default(),
        }
    }

    #[test]
    fn empty_merge_set_is_an_error() {
        assert!(matches!(
            merge_forests(&[]),
            Err(ForestError::EmptyMergeSet)
        ));
    }

    #[test]
    fn frequencies_follow_occurrence_counts() {
        // The three-run scenario over edges (A,B), (B,C), (C,D).
        let runs = vec![
            result(0, &[("A", "B", 0.2), ("B", "C", 0.5)]),
            result(1, &[("A", "B", 0.2)]),
            result(2, &[("B", "C", 0.5), ("C", "D", 0.1)]),
        ];
        let merged = merge_forests(&runs).unwrap();
        assert_eq!(merged.n_successful, 3);
        assert!((merged.edge_frequency("A", "B") - 2.0 / 3.0).abs() < 1e-12);
        assert!((merged.edge_frequency("B", "C") - 2.0 / 3.0).abs() < 1e-12);
        assert!((merged.edge_frequency("C", "D") - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(merged.edge_frequency("A", "D"), 0.0);
        assert!((merged.node_frequency("B") - 1.0).abs() < 1e-12);
        assert!((merged.node_frequency("D") - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn merge_is_order_independent() {
        let r0 = result(0, &[("A", "B", 0.3)]);
        let r1 = result(1, &[("A", "B", 0.4), ("B", "C", 0.6)]);
        let r2 = result(2, &[("B", "C", 0.9)]);
        let forward = merge_forests(&[r0.clone(), r1.clone(), r2.clone()]).unwrap();
        let shuffled = merge_forests(&[r2, r0, r1]).unwrap();
        assert_eq!(forward, shuffled);
    }

    #[test]
    fn merge_is_idempotent_over_a_repeated_result() {
        let repeated = vec![
            result(0, &[("A", "B", 0.3)]),
            result(1, &[("A", "B", 0.3)]),
            result(2, &[("A", "B", 0.3)]),
        ];
        let merged = merge_forests(&repeated).unwrap();
        assert_eq!(merged.nodes.len(), 2);
        assert_eq!(merged.edges.len(), 1);
        assert_eq!(merged.edge_frequency("A", "B"), 1.0);
        assert_eq!(merged.node_frequency("A"), 1.0);
        assert_eq!(merged.edges[0].weight.variance(), 0.0);
    }

    #[test]
    fn statistics_cover_only_selecting_runs() {
        // (A,B) appears in two of three runs with weights 0.2 and 0.4.
        let runs = vec![
            result(0, &[("A", "B", 0.2)]),
            result(1, &[("A", "B", 0.4)]),
            result(2, &[("B", "C", 0.5)]),
        ];
        let merged = merge_forests(&runs).unwrap();
        let ab = merged.edge("A", "B").unwrap();
        assert_eq!(ab.weight.count(), 2);
        assert!((ab.weight.mean() - 0.3).abs() < 1e-12);
        assert!((ab.weight.variance() - 0.01).abs() < 1e-12);
    }
}
