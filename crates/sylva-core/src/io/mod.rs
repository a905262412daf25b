//! Input file loading.
//!
//! File formats follow the established tool conventions:
//! - prize file: two tab-separated columns `name\tprize`;
//! - edge file: three or four tab-separated columns
//!   `a\tb\tweight[\tU|D]`, weight in [0,1], undirected by default.
//!
//! Lines that are empty or start with `#` are skipped. Prize entries for
//! nodes absent from the interactome are skipped (the interactome defines
//! the node universe); duplicate prize entries keep the last value.

pub mod writers;

use std::path::Path;
use std::sync::Arc;

use crate::engine::errors::ForestError;
use crate::engine::graph::{EdgeDirection, Interactome, PrizeVector};

/// One parsed edge-file record.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRecord {
    pub a: String,
    pub b: String,
    pub weight: f64,
    pub direction: EdgeDirection,
}

/// Parses a prize file into (name, prize) entries.
pub fn read_prize_entries(path: &Path) -> Result<Vec<(String, f64)>, ForestError> {
    let text = std::fs::read_to_string(path)?;
    parse_prize_entries(&text)
}

fn parse_prize_entries(text: &str) -> Result<Vec<(String, f64)>, ForestError> {
    let mut entries = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 2 {
            return Err(ForestError::Input(format!(
                "prize line {}: expected 2 tab-separated columns, got {}",
                lineno + 1,
                fields.len()
            )));
        }
        let prize: f64 = fields[1].trim().parse().map_err(|_| {
            ForestError::Input(format!(
                "prize line {}: unparsable prize value '{}'",
                lineno + 1,
                fields[1]
            ))
        })?;
        if !prize.is_finite() || prize < 0.0 {
            return Err(ForestError::Input(format!(
                "prize line {}: prize {} must be finite and non-negative",
                lineno + 1,
                prize
            )));
        }
        entries.push((fields[0].trim().to_string(), prize));
    }
    Ok(entries)
}

/// Parses an edge file into records.
pub fn read_edge_records(path: &Path) -> Result<Vec<EdgeRecord>, ForestError> {
    let text = std::fs::read_to_string(path)?;
    parse_edge_records(&text)
}

fn parse_edge_records(text: &str) -> Result<Vec<EdgeRecord>, ForestError> {
    let mut records = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 3 && fields.len() != 4 {
            return Err(ForestError::Input(format!(
                "edge line {}: expected 3 or 4 tab-separated columns, got {}",
                lineno + 1,
                fields.len()
            )));
        }
        let weight: f64 = fields[2].trim().parse().map_err(|_| {
            ForestError::Input(format!(
                "edge line {}: unparsable weight '{}'",
                lineno + 1,
                fields[2]
            ))
        })?;
        let direction = match fields.get(3).map(|f| f.trim()) {
            None | Some("U") => EdgeDirection::Undirected,
            Some("D") => EdgeDirection::Directed,
            Some(other) => {
                return Err(ForestError::Input(format!(
                    "edge line {}: direction flag must be U or D, got '{}'",
                    lineno + 1,
                    other
                )))
            }
        };
        records.push(EdgeRecord {
            a: fields[0].trim().to_string(),
            b: fields[1].trim().to_string(),
            weight,
            direction,
        });
    }
    Ok(records)
}

/// Loads the interactome and base prize assignment from the two input
/// files, excluding any knocked-out node names and their incident edges.
///
/// Returns the graph behind an `Arc` since it is shared read-only across
/// all concurrent runs.
pub fn load_instance(
    edge_path: &Path,
    prize_path: &Path,
    knockouts: &[String],
) -> Result<(Arc<Interactome>, PrizeVector), ForestError> {
    let records = read_edge_records(edge_path)?;
    let entries = read_prize_entries(prize_path)?;
    build_instance(&records, &entries, knockouts)
}

/// Assembles the graph and prize vector from parsed inputs.
pub fn build_instance(
    records: &[EdgeRecord],
    entries: &[(String, f64)],
    knockouts: &[String],
) -> Result<(Arc<Interactome>, PrizeVector), ForestError> {
    let mut builder = Interactome::builder();
    for record in records {
        if knockouts.iter().any(|k| k == &record.a || k == &record.b) {
            continue;
        }
        builder.add_edge(&record.a, &record.b, record.weight, record.direction)?;
    }
    let graph = Arc::new(builder.build());

    let mut prizes = PrizeVector::zeros(graph.node_count());
    let mut skipped = 0usize;
    for (name, prize) in entries {
        match graph.node_by_name(name) {
            Some(id) => prizes.set(id, *prize)?,
            None => skipped += 1,
        }
    }
    #[cfg(feature = "tracing")]
    if skipped > 0 {
        tracing::debug!("{} prize entries named nodes absent from the interactome", skipped);
    }
    #[cfg(not(feature = "tracing"))]
    let _ = skipped;
    Ok((graph, prizes))
}
