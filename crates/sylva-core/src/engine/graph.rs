//! # Interactome Graph Model
//!
//! Immutable in-memory representation of a weighted interactome plus the
//! per-node prize assignment the optimization is rewarded for collecting.
//!
//! ## Design
//!
//! - **Interactome**: nodes and edges in insertion order, with O(1) lookups
//!   via name and pair indexes. Constructed once from validated input and
//!   never mutated afterwards; perturbation builds a new instance. Shared
//!   across concurrent runs behind an `Arc` without locking.
//! - **PrizeVector**: dense per-node prize assignment, separate from the
//!   graph so runs can swap prizes without copying topology. A node is a
//!   *terminal* iff its prize is strictly positive.
//!
//! Iteration over `nodes()` / `edges()` is deterministic (insertion order);
//! anything that must be stable across graph instances keys on node names
//! instead of ids.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::errors::ForestError;

/// A unique identifier for a node within one `Interactome`.
///
/// NodeId implements Ord/PartialOrd for stable, deterministic iteration.
/// Ids are dense indices into the node table and are not comparable across
/// graph instances.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

/// A unique identifier for an edge within one `Interactome`.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(pub u32);

/// Directionality of an interaction edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EdgeDirection {
    /// Symmetric interaction (the default for interactome edges).
    Undirected,
    /// Directed interaction from `a` to `b`.
    Directed,
}

/// A node of the interactome.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub id: NodeId,
    /// Protein identifier, unique within the graph.
    pub name: Arc<str>,
}

/// A weighted interaction between two nodes.
#[derive(Debug, Clone)]
pub struct EdgeData {
    pub id: EdgeId,
    pub a: NodeId,
    pub b: NodeId,
    /// Confidence weight in [0,1]; the oracle contract fixes its cost
    /// semantics.
    pub weight: f64,
    pub direction: EdgeDirection,
}

/// Canonical unordered form of a node pair, used for duplicate detection
/// and for keys that must not depend on load order.
pub fn canonical_pair(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// The immutable interactome: node set, edge set, and lookup indexes.
#[derive(Debug, Clone, Default)]
pub struct Interactome {
    nodes: Vec<NodeData>,
    edges: Vec<EdgeData>,
    name_index: FxHashMap<Arc<str>, NodeId>,
    pair_index: FxHashMap<(NodeId, NodeId), EdgeId>,
    adjacency: Vec<SmallVec<[EdgeId; 4]>>,
    degrees: Vec<u32>,
}

impl Interactome {
    /// Starts building a new interactome.
    pub fn builder() -> InteractomeBuilder {
        InteractomeBuilder::default()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> &[NodeData] {
        &self.nodes
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[EdgeData] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Looks up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.0 as usize)
    }

    /// Looks up an edge by id.
    pub fn edge(&self, id: EdgeId) -> Option<&EdgeData> {
        self.edges.get(id.0 as usize)
    }

    /// Looks up a node id by name.
    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.name_index.get(name).copied()
    }

    /// Name of a node. Panics only on ids from a different graph, which is
    /// an internal misuse; public callers always hold ids from `self`.
    pub fn node_name(&self, id: NodeId) -> &str {
        &self.nodes[id.0 as usize].name
    }

    /// The edge between two nodes, if present, irrespective of the order
    /// the endpoints are given in.
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.pair_index.get(&canonical_pair(a, b)).copied()
    }

    /// Edge ids incident to `id`, in ascending edge order.
    pub fn incident_edges(&self, id: NodeId) -> &[EdgeId] {
        &self.adjacency[id.0 as usize]
    }

    /// Number of edges incident to `id`.
    pub fn degree(&self, id: NodeId) -> u32 {
        self.degrees[id.0 as usize]
    }

    /// Builds a copy of this graph with the same topology but new edge
    /// weights, given one weight per edge in edge order.
    ///
    /// Used by edge-noise perturbation: indexes, ids, and the node set are
    /// reused unchanged, so the copy is cheap relative to a full rebuild.
    pub fn with_edge_weights(&self, weights: &[f64]) -> Result<Interactome, ForestError> {
        if weights.len() != self.edges.len() {
            return Err(ForestError::Internal(format!(
                "weight vector length {} does not match edge count {}",
                weights.len(),
                self.edges.len()
            )));
        }
        let mut copy = self.clone();
        for (edge, &w) in copy.edges.iter_mut().zip(weights) {
            edge.weight = w;
        }
        Ok(copy)
    }
}

/// Incremental constructor for `Interactome`.
///
/// Nodes are interned by name on first reference; edges are validated as
/// they arrive (weight range, self-loops, duplicate pairs) so a finished
/// builder always yields a graph satisfying the model invariants.
#[derive(Debug, Default)]
pub struct InteractomeBuilder {
    nodes: Vec<NodeData>,
    edges: Vec<EdgeData>,
    name_index: FxHashMap<Arc<str>, NodeId>,
    pair_index: FxHashMap<(NodeId, NodeId), EdgeId>,
}

impl InteractomeBuilder {
    /// Interns a node by name, returning the existing id when already seen.
    pub fn add_node(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.name_index.get(name) {
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.nodes.push(NodeData {
            id,
            name: Arc::clone(&name),
        });
        self.name_index.insert(name, id);
        id
    }

    /// Adds an interaction between two named nodes, interning them as
    /// needed.
    ///
    /// Fails on self-loops, non-finite or out-of-range weights, and on a
    /// second edge between the same unordered pair (multi-edges are
    /// disallowed regardless of direction flags).
    pub fn add_edge(
        &mut self,
        a: &str,
        b: &str,
        weight: f64,
        direction: EdgeDirection,
    ) -> Result<EdgeId, ForestError> {
        if a == b {
            return Err(ForestError::Input(format!("self-loop on node '{}'", a)));
        }
        if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
            return Err(ForestError::Input(format!(
                "edge ({}, {}) has weight {} outside [0,1]",
                a, b, weight
            )));
        }
        let a = self.add_node(a);
        let b = self.add_node(b);
        let pair = canonical_pair(a, b);
        if self.pair_index.contains_key(&pair) {
            return Err(ForestError::Input(format!(
                "duplicate edge between '{}' and '{}'",
                self.nodes[a.0 as usize].name, self.nodes[b.0 as usize].name
            )));
        }
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(EdgeData {
            id,
            a,
            b,
            weight,
            direction,
        });
        self.pair_index.insert(pair, id);
        Ok(id)
    }

    /// Finalizes the graph, computing adjacency lists and degrees.
    pub fn build(self) -> Interactome {
        let mut adjacency: Vec<SmallVec<[EdgeId; 4]>> =
            vec![SmallVec::new(); self.nodes.len()];
        for edge in &self.edges {
            adjacency[edge.a.0 as usize].push(edge.id);
            adjacency[edge.b.0 as usize].push(edge.id);
        }
        // Insertion already yields ascending EdgeIds per list; sort anyway so
        // the invariant survives future construction paths.
        for list in &mut adjacency {
            list.sort_unstable();
        }
        let degrees = adjacency.iter().map(|l| l.len() as u32).collect();
        Interactome {
            nodes: self.nodes,
            edges: self.edges,
            name_index: self.name_index,
            pair_index: self.pair_index,
            adjacency,
            degrees,
        }
    }
}

/// Dense per-node prize assignment for one graph instance.
///
/// Prizes are non-negative finite reals; nodes without an assigned prize
/// hold 0 and are non-terminals.
#[derive(Debug, Clone, PartialEq)]
pub struct PrizeVector {
    values: Vec<f64>,
}

impl PrizeVector {
    /// An all-zero assignment for a graph with `len` nodes.
    pub fn zeros(len: usize) -> Self {
        PrizeVector {
            values: vec![0.0; len],
        }
    }

    /// Builds a prize vector from raw values, validating every entry.
    pub fn from_values(values: Vec<f64>) -> Result<Self, ForestError> {
        for (i, v) in values.iter().enumerate() {
            if !v.is_finite() || *v < 0.0 {
                return Err(ForestError::Input(format!(
                    "prize {} for node index {} is not a finite non-negative number",
                    v, i
                )));
            }
        }
        Ok(PrizeVector { values })
    }

    /// Internal constructor for values already known to be valid (e.g. a
    /// permutation of an existing vector).
    pub(crate) fn from_values_unchecked(values: Vec<f64>) -> Self {
        PrizeVector { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, id: NodeId) -> f64 {
        self.values[id.0 as usize]
    }

    /// Sets a single prize, validating the value.
    pub fn set(&mut self, id: NodeId, prize: f64) -> Result<(), ForestError> {
        if !prize.is_finite() || prize < 0.0 {
            return Err(ForestError::Input(format!(
                "prize {} is not a finite non-negative number",
                prize
            )));
        }
        self.values[id.0 as usize] = prize;
        Ok(())
    }

    /// Zeroes the prize of a node (used to hold terminals out).
    pub fn clear(&mut self, id: NodeId) {
        self.values[id.0 as usize] = 0.0;
    }

    /// A node is a terminal iff its prize is strictly positive.
    pub fn is_terminal(&self, id: NodeId) -> bool {
        self.values[id.0 as usize] > 0.0
    }

    /// Terminal node ids in ascending id order.
    pub fn terminals(&self) -> Vec<NodeId> {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.0)
            .map(|(i, _)| NodeId(i as u32))
            .collect()
    }

    pub fn terminal_count(&self) -> usize {
        self.values.iter().filter(|v| **v > 0.0).count()
    }

    /// Raw values in node-id order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc_graph() -> Interactome {
        let mut b = Interactome::builder();
        b.add_edge("A", "B", 0.2, EdgeDirection::Undirected).unwrap();
        b.add_edge("B", "C", 0.5, EdgeDirection::Undirected).unwrap();
        b.build()
    }

    #[test]
    fn builder_interns_nodes_by_name() {
        let g = abc_graph();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.node_by_name("B"), Some(NodeId(1)));
        assert_eq!(g.node_name(NodeId(2)), "C");
    }

    #[test]
    fn duplicate_edge_is_rejected_in_either_orientation() {
        let mut b = Interactome::builder();
        b.add_edge("A", "B", 0.2, EdgeDirection::Undirected).unwrap();
        let err = b
            .add_edge("B", "A", 0.9, EdgeDirection::Directed)
            .unwrap_err();
        assert!(matches!(err, ForestError::Input(_)), "got {err}");
    }

    #[test]
    fn self_loops_and_bad_weights_are_rejected() {
        let mut b = Interactome::builder();
        assert!(b.add_edge("A", "A", 0.5, EdgeDirection::Undirected).is_err());
        assert!(b.add_edge("A", "B", 1.5, EdgeDirection::Undirected).is_err());
        assert!(b
            .add_edge("A", "B", f64::NAN, EdgeDirection::Undirected)
            .is_err());
    }

    #[test]
    fn degrees_and_adjacency_match_topology() {
        let g = abc_graph();
        let b = g.node_by_name("B").unwrap();
        assert_eq!(g.degree(b), 2);
        assert_eq!(g.incident_edges(b), &[EdgeId(0), EdgeId(1)]);
        assert_eq!(g.degree(g.node_by_name("A").unwrap()), 1);
    }

    #[test]
    fn edge_between_is_orientation_insensitive() {
        let g = abc_graph();
        let a = g.node_by_name("A").unwrap();
        let b = g.node_by_name("B").unwrap();
        assert_eq!(g.edge_between(a, b), g.edge_between(b, a));
        assert!(g
            .edge_between(a, g.node_by_name("C").unwrap())
            .is_none());
    }

    #[test]
    fn with_edge_weights_preserves_topology() {
        let g = abc_graph();
        let g2 = g.with_edge_weights(&[0.9, 0.1]).unwrap();
        assert_eq!(g2.edge_count(), g.edge_count());
        assert_eq!(g2.edges()[0].weight, 0.9);
        assert_eq!(g2.edges()[0].a, g.edges()[0].a);
        assert!(g.with_edge_weights(&[0.9]).is_err());
    }

    #[test]
    fn prize_vector_derives_terminals() {
        let mut p = PrizeVector::zeros(3);
        p.set(NodeId(1), 2.5).unwrap();
        assert!(p.is_terminal(NodeId(1)));
        assert!(!p.is_terminal(NodeId(0)));
        assert_eq!(p.terminals(), vec![NodeId(1)]);
        assert_eq!(p.terminal_count(), 1);
        p.clear(NodeId(1));
        assert_eq!(p.terminal_count(), 0);
    }

    #[test]
    fn prize_vector_rejects_negative_and_non_finite() {
        assert!(PrizeVector::from_values(vec![0.0, -1.0]).is_err());
        assert!(PrizeVector::from_values(vec![f64::INFINITY]).is_err());
        let mut p = PrizeVector::zeros(1);
        assert!(p.set(NodeId(0), -0.5).is_err());
    }
}
