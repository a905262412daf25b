//! Seeded perturbation generators.
//!
//! Each generator is a pure function from `(graph, prizes, kind, seed)` to a
//! fresh [`Scenario`]; the base graph and prize vector are never mutated.
//! All randomness flows through an explicit `ChaCha8Rng` seeded from the
//! `seed` argument, so a call repeated with identical arguments is
//! bit-identical. Per-run seeds are derived from a single base seed with
//! [`run_seed`], never from ambient generator state.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rustc_hash::FxHashMap;

use crate::engine::errors::ForestError;
use crate::engine::graph::{Interactome, NodeId, PrizeVector};

/// The supported input perturbations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PerturbKind {
    /// Pass the base input through unchanged.
    #[default]
    None,
    /// Resample every edge weight around its original value.
    EdgeNoise,
    /// Permute the complete prize vector over the fixed node set.
    PrizeShuffle,
    /// Draw a degree-matched replacement terminal set.
    TerminalRandomize,
}

impl PerturbKind {
    /// Short label used in artifact file names and log lines.
    pub fn label(&self) -> &'static str {
        match self {
            PerturbKind::None => "base",
            PerturbKind::EdgeNoise => "noisyEdges",
            PerturbKind::PrizeShuffle => "shuffledPrizes",
            PerturbKind::TerminalRandomize => "randomTerminals",
        }
    }
}

/// Derives the seed for run `run_index` of a batch from the batch's base
/// seed.
///
/// Pure and stable across executions: repeating a batch with the same base
/// seed reproduces the exact perturbation sequence, whatever order the
/// scheduler runs it in.
pub fn run_seed(base_seed: u64, run_index: u32) -> u64 {
    base_seed.wrapping_add(u64::from(run_index))
}

/// One (graph, prizes) instance ready for the oracle: either the base pair
/// or a perturbed private copy.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub graph: Arc<Interactome>,
    pub prizes: PrizeVector,
}

/// Produces a perturbed scenario from the base input.
///
/// `noise_sd` is only consulted for [`PerturbKind::EdgeNoise`]; it is the
/// standard deviation of the additive gaussian resampling and must be a
/// finite non-negative number.
pub fn perturb(
    graph: &Arc<Interactome>,
    prizes: &PrizeVector,
    kind: PerturbKind,
    seed: u64,
    noise_sd: f64,
) -> Result<Scenario, ForestError> {
    if prizes.len() != graph.node_count() {
        return Err(ForestError::Internal(format!(
            "prize vector length {} does not match node count {}",
            prizes.len(),
            graph.node_count()
        )));
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    match kind {
        PerturbKind::None => Ok(Scenario {
            graph: Arc::clone(graph),
            prizes: prizes.clone(),
        }),
        PerturbKind::EdgeNoise => {
            let perturbed = noisy_edges(graph, noise_sd, &mut rng)?;
            Ok(Scenario {
                graph: Arc::new(perturbed),
                prizes: prizes.clone(),
            })
        }
        PerturbKind::PrizeShuffle => Ok(Scenario {
            graph: Arc::clone(graph),
            prizes: shuffled_prizes(prizes, &mut rng),
        }),
        PerturbKind::TerminalRandomize => Ok(Scenario {
            graph: Arc::clone(graph),
            prizes: random_terminals(graph, prizes, &mut rng),
        }),
    }
}

/// Resamples every edge weight as `clamp(w + N(0, noise_sd), 0, 1)`.
///
/// The node set and edge topology are untouched; only weights change.
fn noisy_edges(
    graph: &Interactome,
    noise_sd: f64,
    rng: &mut ChaCha8Rng,
) -> Result<Interactome, ForestError> {
    if !noise_sd.is_finite() || noise_sd < 0.0 {
        return Err(ForestError::Config(format!(
            "edge-noise standard deviation {} must be finite and non-negative",
            noise_sd
        )));
    }
    let normal = Normal::new(0.0, noise_sd)
        .map_err(|e| ForestError::Config(format!("bad edge-noise distribution: {}", e)))?;
    let weights: Vec<f64> = graph
        .edges()
        .iter()
        .map(|e| (e.weight + normal.sample(rng)).clamp(0.0, 1.0))
        .collect();
    graph.with_edge_weights(&weights)
}

/// Permutes the complete prize vector, zeros included, over the fixed node
/// set.
///
/// Shuffling the full vector keeps the terminal-set size stable instead of
/// inflating it by only redistributing the positive entries.
fn shuffled_prizes(prizes: &PrizeVector, rng: &mut ChaCha8Rng) -> PrizeVector {
    let mut values = prizes.values().to_vec();
    values.shuffle(rng);
    PrizeVector::from_values_unchecked(values)
}

/// Draws a replacement terminal set of the same size with an approximately
/// matched degree distribution, then reassigns the original prize values
/// positionally.
///
/// Nodes are stratified into log2-degree buckets; each original terminal
/// (taken in name order for determinism) draws its replacement uniformly
/// from its own bucket, falling back to the nearest non-empty bucket once
/// a bucket is exhausted. Replacements are distinct, so the new terminal
/// set has exactly the original size.
fn random_terminals(
    graph: &Interactome,
    prizes: &PrizeVector,
    rng: &mut ChaCha8Rng,
) -> PrizeVector {
    let mut originals: Vec<NodeId> = prizes.terminals();
    originals.sort_by(|x, y| graph.node_name(*x).cmp(graph.node_name(*y)));

    // Bucket every node by floor(log2(degree + 1)).
    let mut buckets: FxHashMap<u32, Vec<NodeId>> = FxHashMap::default();
    for node in graph.nodes() {
        let bucket = (graph.degree(node.id) + 1).ilog2();
        buckets.entry(bucket).or_default().push(node.id);
    }
    let max_bucket = buckets.keys().copied().max().unwrap_or(0);

    let mut values = vec![0.0; prizes.len()];
    let mut taken: Vec<bool> = vec![false; prizes.len()];
    for &original in &originals {
        let home = (graph.degree(original) + 1).ilog2();
        let chosen = draw_from_nearest_bucket(&buckets, home, max_bucket, &taken, rng)
            .unwrap_or(original);
        taken[chosen.0 as usize] = true;
        values[chosen.0 as usize] = prizes.get(original);
    }
    PrizeVector::from_values_unchecked(values)
}

/// Picks an untaken node from bucket `home`, widening the search to
/// neighboring buckets (lower first) until one has a free node.
fn draw_from_nearest_bucket(
    buckets: &FxHashMap<u32, Vec<NodeId>>,
    home: u32,
    max_bucket: u32,
    taken: &[bool],
    rng: &mut ChaCha8Rng,
) -> Option<NodeId> {
    for distance in 0..=max_bucket {
        for candidate_bucket in [home.checked_sub(distance), home.checked_add(distance)] {
            let Some(bucket) = candidate_bucket else {
                continue;
            };
            if distance > 0 && bucket == home {
                continue;
            }
            let Some(members) = buckets.get(&bucket) else {
                continue;
            };
            let free: Vec<NodeId> = members
                .iter()
                .copied()
                .filter(|id| !taken[id.0 as usize])
                .collect();
            if !free.is_empty() {
                return Some(free[rng.gen_range(0..free.len())]);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::EdgeDirection;

    fn line_graph(n: usize) -> Arc<Interactome> {
        let mut b = Interactome::builder();
        for i in 0..n - 1 {
            b.add_edge(
                &format!("N{}", i),
                &format!("N{}", i + 1),
                0.5,
                EdgeDirection::Undirected,
            )
            .unwrap();
        }
        Arc::new(b.build())
    }

    fn some_prizes(len: usize) -> PrizeVector {
        let mut p = PrizeVector::zeros(len);
        p.set(NodeId(0), 3.0).unwrap();
        p.set(NodeId(2), 1.5).unwrap();
        p
    }

    #[test]
    fn run_seed_is_pure_and_distinct_per_index() {
        assert_eq!(run_seed(7, 3), run_seed(7, 3));
        let seeds: Vec<u64> = (0..100).map(|i| run_seed(42, i)).collect();
        let mut dedup = seeds.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), seeds.len());
    }

    #[test]
    fn perturb_is_reproducible_for_every_kind() {
        let g = line_graph(6);
        let p = some_prizes(6);
        for kind in [
            PerturbKind::None,
            PerturbKind::EdgeNoise,
            PerturbKind::PrizeShuffle,
            PerturbKind::TerminalRandomize,
        ] {
            let s1 = perturb(&g, &p, kind, 99, 0.2).unwrap();
            let s2 = perturb(&g, &p, kind, 99, 0.2).unwrap();
            assert_eq!(s1.prizes, s2.prizes, "{:?} prizes differ", kind);
            let w1: Vec<f64> = s1.graph.edges().iter().map(|e| e.weight).collect();
            let w2: Vec<f64> = s2.graph.edges().iter().map(|e| e.weight).collect();
            assert_eq!(w1, w2, "{:?} weights differ", kind);
        }
    }

    #[test]
    fn distinct_seeds_give_distinct_noise() {
        let g = line_graph(6);
        let p = some_prizes(6);
        let s1 = perturb(&g, &p, PerturbKind::EdgeNoise, 1, 0.2).unwrap();
        let s2 = perturb(&g, &p, PerturbKind::EdgeNoise, 2, 0.2).unwrap();
        let w1: Vec<f64> = s1.graph.edges().iter().map(|e| e.weight).collect();
        let w2: Vec<f64> = s2.graph.edges().iter().map(|e| e.weight).collect();
        assert_ne!(w1, w2);
    }

    #[test]
    fn edge_noise_changes_only_weights() {
        let g = line_graph(6);
        let p = some_prizes(6);
        let s = perturb(&g, &p, PerturbKind::EdgeNoise, 5, 0.3).unwrap();
        assert_eq!(s.graph.node_count(), g.node_count());
        assert_eq!(s.graph.edge_count(), g.edge_count());
        for (orig, noisy) in g.edges().iter().zip(s.graph.edges()) {
            assert_eq!(orig.a, noisy.a);
            assert_eq!(orig.b, noisy.b);
            assert!((0.0..=1.0).contains(&noisy.weight));
        }
        assert_eq!(s.prizes, p);
    }

    #[test]
    fn edge_noise_rejects_negative_sd() {
        let g = line_graph(4);
        let p = some_prizes(4);
        let err = perturb(&g, &p, PerturbKind::EdgeNoise, 5, -0.1).unwrap_err();
        assert!(matches!(err, ForestError::Config(_)));
    }

    #[test]
    fn prize_shuffle_preserves_the_complete_multiset() {
        let g = line_graph(8);
        let mut p = PrizeVector::zeros(8);
        p.set(NodeId(1), 2.0).unwrap();
        p.set(NodeId(4), 2.0).unwrap();
        p.set(NodeId(6), 7.5).unwrap();
        let s = perturb(&g, &p, PerturbKind::PrizeShuffle, 11, 0.0).unwrap();

        let mut before = p.values().to_vec();
        let mut after = s.prizes.values().to_vec();
        before.sort_by(f64::total_cmp);
        after.sort_by(f64::total_cmp);
        assert_eq!(before, after);
        assert_eq!(s.prizes.terminal_count(), p.terminal_count());
    }

    #[test]
    fn random_terminals_keeps_size_and_prize_values() {
        let g = line_graph(30);
        let mut p = PrizeVector::zeros(30);
        for i in [0u32, 7, 14, 21] {
            p.set(NodeId(i), 1.0 + f64::from(i)).unwrap();
        }
        let s = perturb(&g, &p, PerturbKind::TerminalRandomize, 3, 0.0).unwrap();
        assert_eq!(s.prizes.terminal_count(), 4);

        let mut before: Vec<f64> = p.values().iter().copied().filter(|v| *v > 0.0).collect();
        let mut after: Vec<f64> = s
            .prizes
            .values()
            .iter()
            .copied()
            .filter(|v| *v > 0.0)
            .collect();
        before.sort_by(f64::total_cmp);
        after.sort_by(f64::total_cmp);
        assert_eq!(before, after);
    }

    #[test]
    fn mismatched_prize_length_is_an_internal_error() {
        let g = line_graph(4);
        let p = PrizeVector::zeros(3);
        let err = perturb(&g, &p, PerturbKind::None, 0, 0.0).unwrap_err();
        assert!(matches!(err, ForestError::Internal(_)));
    }
}
