use anyhow::{Context, Result};
use clap::Parser;
use raidsna::config::Config;
use raidsna::episode::load_batch;
use raidsna::graph::export::write_json;
use raidsna::stats::{class_performance, summarize, threat_table, BatchSummary, ClassStats, ThreatEntry};
use raidsna::{Role, SnaError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stats")]
#[command(about = "Win rates, class performance and threat for a batch of episodes")]
struct Args {
    /// Episode JSON file or directory of episode_*.json files
    #[arg(short, long)]
    input: PathBuf,

    /// Write the full report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Serialize)]
struct StatsReport {
    summary: BatchSummary,
    class_performance: BTreeMap<Role, ClassStats>,
    threat: Vec<ThreatEntry>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let config = Config::load_from(args.config.as_deref())?;

    let batch = match load_batch(&args.input) {
        Ok(batch) => batch,
        Err(SnaError::NoEpisodes(source)) => {
            println!("No valid episodes loaded from {}.", source);
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to load {}", args.input.display())),
    };

    let report = StatsReport {
        summary: summarize(&batch.episodes, &config.inference),
        class_performance: class_performance(&batch.episodes),
        threat: threat_table(&batch.episodes, &config.inference),
    };

    println!("\n=== Episode Statistics ===\n");
    println!(
        "Loaded {} episodes from {} files ({} skipped, {} duplicates)",
        report.summary.episodes,
        batch.files_loaded,
        batch.skipped.len(),
        batch.duplicates
    );
    for (path, reason) in &batch.skipped {
        println!("  skipped {}: {}", path.display(), reason);
    }

    print_summary(&report.summary);
    print_class_performance(&report.class_performance);
    print_threat(&report.threat, config.report.top_n);
    println!();

    if let Some(path) = &args.output {
        write_json(&report, path).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved statistics to {}", path.display());
    }

    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!("\nWin Conditions:\n");
    println!("{:-<50}", "");
    println!("{:<20} {:>10} {:>12}", "Condition", "Episodes", "Rate (%)");
    println!("{:-<50}", "");
    for (condition, count, rate) in summary.win_condition_rates() {
        println!("{:<20} {:>10} {:>12.1}", condition, count, rate);
    }
    println!("{:-<50}", "");

    if let Some(duration) = summary.duration {
        println!(
            "\nDuration: avg {:.2}s, min {:.2}s, max {:.2}s",
            duration.average, duration.min, duration.max
        );
    }

    println!("\nClass Distribution:");
    for (role, count) in &summary.class_distribution {
        println!("  {:<12} {:>8}", role, count);
    }

    println!("\nAction Distribution:");
    for (branch, count) in &summary.action_distribution {
        println!("  {:<18} {:>10}", branch, count);
    }
}

fn print_class_performance(stats: &BTreeMap<Role, ClassStats>) {
    println!("\nClass Performance:\n");
    println!("{:-<80}", "");
    println!(
        "{:<12} {:>10} {:>8} {:>12} {:>10} {:>8} {:>14}",
        "Class", "Episodes", "Wins", "Win Rate (%)", "Attacks", "Heals", "Threat Boosts"
    );
    println!("{:-<80}", "");
    for (role, row) in stats {
        println!(
            "{:<12} {:>10} {:>8} {:>12.1} {:>10} {:>8} {:>14}",
            role,
            row.episodes,
            row.wins,
            row.win_rate(),
            row.attacks,
            row.heals,
            row.threat_boosts
        );
    }
    println!("{:-<80}", "");
}

fn print_threat(rows: &[ThreatEntry], top_n: usize) {
    if rows.is_empty() {
        println!("\nNo threat-generating actions recorded.");
        return;
    }

    println!("\nThreat (top {}):\n", top_n);
    println!("{:-<80}", "");
    println!(
        "{:<22} {:<12} {:>9} {:>7} {:>9} {:>12}",
        "Agent", "Class", "Attacks", "Heals", "Boosts", "Threat"
    );
    println!("{:-<80}", "");
    for row in rows.iter().take(top_n) {
        println!(
            "{:<22} {:<12} {:>9} {:>7} {:>9} {:>12.1}",
            row.agent, row.role, row.attacks, row.heals, row.threat_boosts, row.threat
        );
    }
    println!("{:-<80}", "");
}
