//! Sylva CLI - robust prize-collecting forests from a weighted interactome
//!
//! Usage:
//!   sylva -p prizes.txt -e edges.txt -c conf.txt          # single solve
//!   sylva ... --noisy-edges 10 --shuffled-prizes 10       # randomized batches
//!   sylva ... --cv 5 --cv-reps 3                          # cross-validation

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;

use sylva_core::config::ForestConfig;
use sylva_core::engine::crossval::{cross_validate_repeated, FoldOutcome};
use sylva_core::engine::msgsteiner::MsgSteinerOracle;
use sylva_core::engine::perturb::PerturbKind;
use sylva_core::engine::runs::{run_many, BatchReport};
use sylva_core::io::writers;
use sylva_core::io::load_instance;
use sylva_core::{merge_forests, ForestError, Interactome, PrizeVector};

#[derive(Parser)]
#[command(name = "sylva")]
#[command(version)]
#[command(about = "Find robust pathways in an interactome via prize-collecting Steiner forests")]
struct Cli {
    /// Tab-separated prize file: "name<TAB>prize"
    #[arg(short, long, value_name = "FILE")]
    prize: PathBuf,

    /// Tab-separated edge file: "a<TAB>b<TAB>weight[<TAB>U|D]"
    #[arg(short, long, value_name = "FILE")]
    edge: PathBuf,

    /// Configuration file with solver parameters (w, b, D required)
    #[arg(short, long, value_name = "FILE", default_value = "conf.txt")]
    conf: PathBuf,

    /// Directory for output artifacts
    #[arg(long, value_name = "DIR", default_value = ".")]
    outpath: PathBuf,

    /// Prefix for output artifact names
    #[arg(long, value_name = "LABEL", default_value = "result")]
    outlabel: String,

    /// Node names to remove from the interactome before solving
    #[arg(long, value_name = "NODE")]
    knockout: Vec<String>,

    /// Number of edge-noise randomized runs
    #[arg(long, value_name = "N", default_value_t = 0)]
    noisy_edges: u32,

    /// Number of prize-shuffle randomized runs
    #[arg(long, value_name = "N", default_value_t = 0)]
    shuffled_prizes: u32,

    /// Number of random-terminal randomized runs
    #[arg(long, value_name = "N", default_value_t = 0)]
    random_terminals: u32,

    /// Fold count for k-fold cross-validation over terminals
    #[arg(long, value_name = "K")]
    cv: Option<u32>,

    /// Number of cross-validation repetitions (requires --cv)
    #[arg(long, value_name = "R", default_value_t = 1)]
    cv_reps: u32,

    /// Base seed for all randomization
    #[arg(short, long, value_name = "SEED", default_value_t = 0)]
    seed: u64,

    /// Output format: summary or json
    #[arg(short, long, default_value = "summary", value_name = "FORMAT")]
    output: String,
}

fn main() {
    let cli = Cli::parse();

    if cli.cv.is_none() && cli.cv_reps != 1 {
        eprintln!("Error: --cv-reps requires --cv");
        process::exit(1);
    }
    if !cli.outpath.is_dir() {
        eprintln!("Error: outpath '{}' is not a directory", cli.outpath.display());
        process::exit(1);
    }

    // Locate the solver before spending time parsing the input files.
    let oracle = match MsgSteinerOracle::locate() {
        Ok(oracle) => oracle,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let config = match ForestConfig::from_file(&cli.conf) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error reading config '{}': {}", cli.conf.display(), e);
            process::exit(1);
        }
    };
    let oracle = oracle.with_timeout(config.timeout);

    let (graph, prizes) = match load_instance(&cli.edge, &cli.prize, &cli.knockout) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("Error loading inputs: {}", e);
            process::exit(1);
        }
    };

    match run(&cli, &oracle, &config, &graph, &prizes) {
        Ok(failures) if failures == 0 => {}
        Ok(failures) => {
            eprintln!("{} batch(es) produced no usable results", failures);
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Drives the full pipeline; returns the number of batches that yielded
/// nothing mergeable.
fn run(
    cli: &Cli,
    oracle: &MsgSteinerOracle,
    config: &ForestConfig,
    graph: &Arc<Interactome>,
    prizes: &PrizeVector,
) -> Result<u32, ForestError> {
    let mut summary = serde_json::Map::new();
    let mut empty_batches = 0u32;

    // Base solve.
    let base_batch = run_many(
        oracle,
        graph,
        prizes,
        PerturbKind::None,
        1,
        cli.seed,
        config.noise_sd,
        &config.params,
        config.workers,
    )?;
    let base = base_batch.results.first().ok_or_else(|| {
        let detail = base_batch
            .failures
            .first()
            .map(|f| f.error.to_string())
            .unwrap_or_else(|| "no run was dispatched".into());
        ForestError::Oracle(format!("base run failed: {}", detail))
    })?;
    writers::write_forest_sif(
        &cli.outpath.join(format!("{}_optimalForest.sif", cli.outlabel)),
        base,
    )?;
    if cli.output == "summary" {
        println!(
            "base solve: {} nodes, {} edges, objective {}",
            base.nodes.len(),
            base.edges.len(),
            base.objective
        );
    }
    summary.insert(
        "base".into(),
        serde_json::json!({
            "nodes": base.nodes.len(),
            "edges": base.edges.len(),
            "objective": base.objective,
        }),
    );

    // Randomized batches.
    let requested: [(PerturbKind, u32); 3] = [
        (PerturbKind::EdgeNoise, cli.noisy_edges),
        (PerturbKind::PrizeShuffle, cli.shuffled_prizes),
        (PerturbKind::TerminalRandomize, cli.random_terminals),
    ];
    let mut batches: Vec<BatchReport> = Vec::new();
    for (kind, n) in requested {
        if n == 0 {
            continue;
        }
        let batch = run_many(
            oracle,
            graph,
            prizes,
            kind,
            n,
            cli.seed,
            config.noise_sd,
            &config.params,
            config.workers,
        )?;
        if cli.output == "summary" {
            println!("{}", batch.summary());
        }
        match merge_forests(&batch.results) {
            Ok(merged) => {
                let label = format!("{}_{}", cli.outlabel, kind.label());
                writers::write_consensus_sif(
                    &cli.outpath.join(format!("{}_consensus.sif", label)),
                    &merged,
                )?;
                writers::write_node_attributes(
                    &cli.outpath.join(format!("{}_nodeattributes.tsv", label)),
                    &merged,
                )?;
                writers::write_edge_attributes(
                    &cli.outpath.join(format!("{}_edgeattributes.tsv", label)),
                    &merged,
                )?;
                summary.insert(
                    kind.label().into(),
                    serde_json::json!({
                        "requested": batch.requested,
                        "succeeded": batch.succeeded(),
                        "consensus_nodes": merged.nodes.len(),
                        "consensus_edges": merged.edges.len(),
                    }),
                );
            }
            Err(e) => {
                eprintln!("{} batch: {}", kind.label(), e);
                empty_batches += 1;
            }
        }
        batches.push(batch);
    }

    // Cross-validation.
    let mut cv_reports = None;
    if let Some(k) = cli.cv {
        let reports = cross_validate_repeated(
            oracle,
            graph,
            prizes,
            k,
            cli.cv_reps,
            cli.seed,
            &config.params,
            config.workers,
        )?;
        let mut rep_summaries = Vec::new();
        for (rep, report) in reports.iter().enumerate() {
            if cli.output == "summary" {
                println!(
                    "cross-validation rep {}: {} of {} folds solved, mean recovery {}",
                    rep,
                    report.succeeded(),
                    report.requested(),
                    report
                        .mean_recovery()
                        .map(|f| format!("{:.3}", f))
                        .unwrap_or_else(|| "n/a".into())
                );
                for fold in &report.folds {
                    if let FoldOutcome::Solved {
                        recovered,
                        recovery_fraction,
                        ..
                    } = &fold.outcome
                    {
                        println!(
                            "  fold {}: recovered {}/{} held-out terminals ({:.3})",
                            fold.fold,
                            recovered.len(),
                            fold.held_out.len(),
                            recovery_fraction
                        );
                    } else {
                        println!("  fold {}: failed", fold.fold);
                    }
                }
            }
            if report.succeeded() == 0 {
                empty_batches += 1;
            }
            rep_summaries.push(serde_json::json!({
                "succeeded": report.succeeded(),
                "requested": report.requested(),
                "mean_recovery": report.mean_recovery(),
            }));
        }
        summary.insert("cross_validation".into(), serde_json::json!(rep_summaries));
        cv_reports = Some(reports);
    }

    let batch_refs: Vec<&BatchReport> = batches.iter().collect();
    writers::write_run_info(
        &cli.outpath.join(format!("{}_info.txt", cli.outlabel)),
        Some(base),
        &batch_refs,
        cv_reports.as_ref().and_then(|r| r.first()),
    )?;

    if cli.output == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::Value::Object(summary))
                .map_err(|e| ForestError::Internal(format!("json encoding failed: {}", e)))?
        );
    }
    Ok(empty_batches)
}
