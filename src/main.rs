use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use raidsna::episode::{load_batch, LoadedBatch};
use raidsna::graph::export::{self, ComparisonDocument, GraphDocument, Presentation};
use raidsna::graph::{
    build_graph, build_windowed, compute_metrics, compute_with_links, top_by, EdgeKind, EpisodePoint,
    GraphBuild, Granularity, InteractionGraph, NodeMetrics, Provenance, WindowedNetwork,
};
use raidsna::{Config, SnaError};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

const DEFAULT_TITLE: &str = "Damage & Healing Network in Boss Fight";

#[derive(Parser, Debug)]
#[command(name = "raidsna", version)]
#[command(about = "Build damage/heal/threat/taunt interaction graphs from boss-fight episode logs")]
struct Args {
    /// Episode JSON file, or a directory of episode_*.json files
    #[arg(short, long)]
    input: PathBuf,

    /// Output path: `.json` writes the graph export, anything else the text report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report title
    #[arg(short, long)]
    title: Option<String>,

    /// Node granularity: role or agent
    #[arg(long, default_value = "role")]
    granularity: Granularity,

    /// Layout hint recorded in the JSON export
    #[arg(long)]
    layout: Option<String>,

    /// Style hint recorded in the JSON export
    #[arg(long, value_parser = ["fixed", "organic"])]
    style: Option<String>,

    /// Early training episode range (inclusive)
    #[arg(long, num_args = 2, value_names = ["FIRST", "LAST"])]
    early_range: Option<Vec<i64>>,

    /// Late training episode range (inclusive)
    #[arg(long, num_args = 2, value_names = ["FIRST", "LAST"])]
    late_range: Option<Vec<i64>>,

    /// Compare the early and late ranges side by side
    #[arg(long)]
    compare: bool,

    /// Build the role × training-window network
    #[arg(long)]
    dense: bool,

    /// Number of training windows for --dense
    #[arg(short, long, default_value_t = 5)]
    windows: usize,

    /// Config file (overrides RAIDSNA_CONFIG and ./raidsna.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    // Usage errors exit with 1 like every other failure
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let config = Config::load_from(args.config.as_deref())?;

    let batch = match load_batch(&args.input) {
        Ok(batch) => batch,
        Err(SnaError::NoEpisodes(source)) => {
            println!("No episodes loaded from {}; nothing to analyze.", source);
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load {}", args.input.display()))
        }
    };
    log::info!("Loaded {} episodes", batch.episodes.len());

    let title = args.title.clone().unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let presentation = Presentation {
        layout: args.layout.clone(),
        style: args.style.clone(),
    };

    if args.dense {
        let network = build_windowed(&batch.episodes, args.windows, &config.inference)?;
        if network.graph.is_empty() {
            return no_edges(&batch);
        }
        let report = dense_report(&title, &network, config.report.top_n);
        let document = GraphDocument::from_windowed(&title, &network, presentation);
        return emit(args.output.as_deref(), &document, &report);
    }

    if args.compare {
        let (early_range, late_range) = match (&args.early_range, &args.late_range) {
            (Some(early), Some(late)) => (parse_range(early, "--early-range")?, parse_range(late, "--late-range")?),
            _ => {
                return Err(SnaError::InvalidInput(
                    "--compare requires both --early-range and --late-range".to_string(),
                )
                .into())
            }
        };

        let early = build_graph(&batch.episodes, Some(early_range.clone()), &config.inference, args.granularity);
        let late = build_graph(&batch.episodes, Some(late_range.clone()), &config.inference, args.granularity);
        if early.graph.is_empty() && late.graph.is_empty() {
            return no_edges(&batch);
        }

        let early_title = format!("Early Training (Episodes {}-{})", early_range.start(), early_range.end());
        let late_title = format!("Late Training (Episodes {}-{})", late_range.start(), late_range.end());
        let mut report = format!("=== {} ===\n\n", title);
        report.push_str(&graph_report(&early_title, &early, config.report.top_n));
        report.push('\n');
        report.push_str(&graph_report(&late_title, &late, config.report.top_n));

        let document = ComparisonDocument {
            title: title.clone(),
            early: GraphDocument::from_build(&early_title, &early, args.granularity, presentation.clone()),
            late: GraphDocument::from_build(&late_title, &late, args.granularity, presentation),
        };
        return emit(args.output.as_deref(), &document, &report);
    }

    let range = match (&args.early_range, &args.late_range) {
        (Some(_), Some(_)) => {
            return Err(SnaError::InvalidInput(
                "both --early-range and --late-range given; add --compare to compare them".to_string(),
            )
            .into())
        }
        (Some(bounds), None) => Some(parse_range(bounds, "--early-range")?),
        (None, Some(bounds)) => Some(parse_range(bounds, "--late-range")?),
        (None, None) => None,
    };

    let build = build_graph(&batch.episodes, range, &config.inference, args.granularity);
    if build.graph.is_empty() {
        return no_edges(&batch);
    }

    let report = graph_report(&title, &build, config.report.top_n);
    let document = GraphDocument::from_build(&title, &build, args.granularity, presentation);
    emit(args.output.as_deref(), &document, &report)
}

fn parse_range(bounds: &[i64], flag: &str) -> Result<RangeInclusive<i64>> {
    match bounds {
        [first, last] if first <= last => Ok(*first..=*last),
        [first, last] => Err(SnaError::InvalidInput(format!(
            "{} start {} is after end {}",
            flag, first, last
        ))
        .into()),
        _ => Err(SnaError::InvalidInput(format!("{} takes exactly two values", flag)).into()),
    }
}

/// Empty graphs are fatal for a single episode and a notice for batches.
fn no_edges(batch: &LoadedBatch) -> Result<()> {
    if batch.single_episode {
        return Err(SnaError::EmptyGraph(
            "the episode has no combat events and no attack/heal actions".to_string(),
        )
        .into());
    }
    println!("No interaction edges found in {} episodes; no data to report.", batch.episodes.len());
    Ok(())
}

/// Write the JSON export or the text report to `output`, or print the report.
fn emit<T: serde::Serialize>(output: Option<&Path>, document: &T, report: &str) -> Result<()> {
    match output {
        Some(path) if is_json(path) => {
            export::write_json(document, path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved graph export to {}", path.display());
        }
        Some(path) => {
            std::fs::write(path, report)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved report to {}", path.display());
        }
        None => print!("{}", report),
    }
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

fn graph_report(title: &str, build: &GraphBuild, top_n: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} [{}] ===", title, build.provenance);
    let _ = writeln!(
        out,
        "Episodes: {}  Nodes: {}  Edges: {}",
        build.episodes_used,
        build.graph.node_count(),
        build.graph.edge_count()
    );
    if build.provenance == Provenance::Inferred || build.provenance == Provenance::Mixed {
        let _ = writeln!(out, "Note: some or all edges are inferred from untargeted actions");
    }
    if build.discarded > 0 {
        let _ = writeln!(out, "Discarded interactions: {}", build.discarded);
    }
    write_timeline(&mut out, &build.timeline);

    write_edges(&mut out, &build.graph);
    write_class_selections(&mut out, &build.class_selections);
    write_centrality(&mut out, &compute_metrics(&build.graph), top_n);
    out
}

fn dense_report(title: &str, network: &WindowedNetwork, top_n: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} [{}] ===", title, network.provenance);
    let _ = writeln!(out, "Windows: {}", network.window_names().join(", "));
    let _ = writeln!(out, "\n{:<12} {:>9} {:>14} {:>7}", "Window", "Episodes", "Range", "Edges");
    let _ = writeln!(out, "{:-<45}", "");
    for slice in &network.slices {
        let range = match (slice.first_episode, slice.last_episode) {
            (Some(first), Some(last)) => format!("{}-{}", first, last),
            _ => "-".to_string(),
        };
        let _ = writeln!(
            out,
            "{:<12} {:>9} {:>14} {:>7}",
            slice.window.name,
            slice.build.episodes_used,
            range,
            slice.build.graph.edge_count()
        );
    }

    let timeline: Vec<EpisodePoint> = network
        .slices
        .iter()
        .flat_map(|slice| slice.build.timeline.iter().cloned())
        .collect();
    write_timeline(&mut out, &timeline);

    write_edges(&mut out, &network.graph);
    let _ = writeln!(out, "\nContinuity links: {}", network.continuity.len());
    write_centrality(&mut out, &compute_with_links(&network.graph, &network.continuity), top_n);
    out
}

fn write_timeline(out: &mut String, timeline: &[EpisodePoint]) {
    let (Some(first), Some(last)) = (timeline.first(), timeline.last()) else {
        return;
    };
    let attacks: usize = timeline.iter().map(|p| p.attacks).sum();
    let _ = writeln!(
        out,
        "Training: episodes {}-{}, learning progress {:.3} -> {:.3}, {:.1} attacks/episode",
        first.episode,
        last.episode,
        first.learning_progress,
        last.learning_progress,
        attacks as f64 / timeline.len() as f64
    );

    let mut by_agent: BTreeMap<&str, usize> = BTreeMap::new();
    for point in timeline {
        for (agent, count) in &point.attacks_by_agent {
            *by_agent.entry(agent.as_str()).or_insert(0) += count;
        }
    }
    if !by_agent.is_empty() {
        let _ = writeln!(out, "Attacks by agent:");
        for (agent, count) in by_agent {
            let _ = writeln!(out, "  {:<22} {:>8}", agent, count);
        }
    }
}

fn write_edges(out: &mut String, graph: &InteractionGraph) {
    let _ = writeln!(out, "\n{:<22} {:<22} {:<7} {:>10} {:>6} {:>9}", "Source", "Target", "Kind", "Weight", "First", "Episodes");
    let _ = writeln!(out, "{:-<81}", "");
    for edge in graph.edges() {
        let first = edge
            .first_seen
            .map(|ep| ep.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<22} {:<22} {:<7} {:>10.3} {:>6} {:>9}",
            edge.source, edge.target, edge.kind, edge.weight, first, edge.episode_count
        );
    }

    let _ = writeln!(out, "\nTotals by kind:");
    for kind in EdgeKind::ALL {
        let _ = writeln!(out, "  {:<7} {:>12.3}", kind, graph.total_weight(kind));
    }
}

fn write_class_selections(out: &mut String, selections: &BTreeMap<raidsna::Role, usize>) {
    if selections.is_empty() {
        return;
    }
    let _ = writeln!(out, "\nClass selections:");
    for (role, count) in selections {
        let _ = writeln!(out, "  {:<10} {:>6}", role, count);
    }
}

fn write_centrality(out: &mut String, metrics: &[NodeMetrics], top_n: usize) {
    let rankings: [(&str, fn(&NodeMetrics) -> f64); 3] = [
        ("strength", |m| m.strength),
        ("betweenness", |m| m.betweenness),
        ("closeness", |m| m.closeness),
    ];
    for (label, key) in rankings {
        let _ = writeln!(out, "\nTop {} by {}:", top_n, label);
        for node in top_by(metrics, top_n, key) {
            let _ = writeln!(out, "  {:<22} {:>10.3}", node.node, key(node));
        }
    }
}
