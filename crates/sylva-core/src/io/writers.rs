//! Output artifact writers.
//!
//! Emits the classic visualization-friendly artifact shapes from the
//! structured results: `.sif` edge lists (one interaction per line,
//! `A pp B` undirected / `A pd B` directed), tab-separated node/edge
//! attribute tables, and a plain-text run-info summary.

use std::io::Write;
use std::path::Path;

use crate::engine::crossval::{CrossValReport, FoldOutcome};
use crate::engine::errors::ForestError;
use crate::engine::merge::ConsensusGraph;
use crate::engine::oracle::ForestResult;
use crate::engine::runs::BatchReport;

fn interaction_tag(directed: bool) -> &'static str {
    if directed {
        "pd"
    } else {
        "pp"
    }
}

/// Writes one forest as a `.sif` edge list.
pub fn write_forest_sif(path: &Path, result: &ForestResult) -> Result<(), ForestError> {
    let mut out = std::fs::File::create(path)?;
    for edge in &result.edges {
        writeln!(out, "{}\t{}\t{}", edge.a, interaction_tag(edge.directed), edge.b)?;
    }
    Ok(())
}

/// Writes the consensus graph as a `.sif` edge list.
pub fn write_consensus_sif(path: &Path, merged: &ConsensusGraph) -> Result<(), ForestError> {
    let mut out = std::fs::File::create(path)?;
    for edge in &merged.edges {
        writeln!(out, "{}\t{}\t{}", edge.a, interaction_tag(edge.directed), edge.b)?;
    }
    Ok(())
}

/// Writes the per-node attribute table of a consensus graph.
pub fn write_node_attributes(path: &Path, merged: &ConsensusGraph) -> Result<(), ForestError> {
    let mut out = std::fs::File::create(path)?;
    writeln!(out, "Node\tFrequency\tPrizeMean\tPrizeVariance")?;
    for node in &merged.nodes {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            node.name,
            node.prize.frequency(merged.n_successful),
            node.prize.mean(),
            node.prize.variance()
        )?;
    }
    Ok(())
}

/// Writes the per-edge attribute table of a consensus graph.
pub fn write_edge_attributes(path: &Path, merged: &ConsensusGraph) -> Result<(), ForestError> {
    let mut out = std::fs::File::create(path)?;
    writeln!(out, "NodeA\tNodeB\tFrequency\tWeightMean\tWeightVariance")?;
    for edge in &merged.edges {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}",
            edge.a,
            edge.b,
            edge.weight.frequency(merged.n_successful),
            edge.weight.mean(),
            edge.weight.variance()
        )?;
    }
    Ok(())
}

/// Writes the plain-text summary for a base run plus randomized batches.
pub fn write_run_info(
    path: &Path,
    base: Option<&ForestResult>,
    batches: &[&BatchReport],
    crossval: Option<&CrossValReport>,
) -> Result<(), ForestError> {
    let mut out = std::fs::File::create(path)?;
    if let Some(base) = base {
        writeln!(out, "objective\t{}", base.objective)?;
        writeln!(out, "runtime_ms\t{}", base.runtime.as_millis())?;
        writeln!(out, "forest_nodes\t{}", base.nodes.len())?;
        writeln!(out, "forest_edges\t{}", base.edges.len())?;
        writeln!(out, "root_attached\t{}", base.root_attached.len())?;
    }
    for batch in batches {
        writeln!(out, "{}", batch.summary())?;
    }
    if let Some(report) = crossval {
        writeln!(
            out,
            "cross-validation: {} of {} folds solved",
            report.succeeded(),
            report.requested()
        )?;
        for fold in &report.folds {
            match &fold.outcome {
                FoldOutcome::Solved {
                    recovered,
                    recovery_fraction,
                    ..
                } => writeln!(
                    out,
                    "fold {}\trecovered {}/{}\t{:.3}",
                    fold.fold,
                    recovered.len(),
                    fold.held_out.len(),
                    recovery_fraction
                )?,
                FoldOutcome::Failed { error } => {
                    writeln!(out, "fold {}\tfailed\t{}", fold.fold, error)?
                }
            }
        }
    }
    Ok(())
}
