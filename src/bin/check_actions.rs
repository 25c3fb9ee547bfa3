use anyhow::{bail, Context, Result};
use clap::Parser;
use raidsna::config::Config;
use raidsna::episode::load_episodes;
use raidsna::stats::{audit_actions, ActionAudit};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "check_actions")]
#[command(about = "Check whether an episode recorded any real (non-zero) actions")]
struct Args {
    /// Episode JSON file
    episode: PathBuf,

    /// Config file
    #[arg(long)]
    config: Option<PathBuf>,
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
    let episodes = load_episodes(&args.episode)
        .with_context(|| format!("Failed to read {}", args.episode.display()))?;
    let Some(episode) = episodes.first() else {
        bail!("No episode found in {}", args.episode.display());
    };
    if episodes.len() > 1 {
        log::warn!(
            "{} holds {} episodes; checking the first",
            args.episode.display(),
            episodes.len()
        );
    }

    let audit = audit_actions(episode, &config.inference, config.report.sample_actions);
    print_audit(&audit, config.report.sample_actions);
    Ok(())
}

fn print_audit(audit: &ActionAudit, sample_size: usize) {
    println!("Episode: {}", audit.episode);
    println!("Duration: {:.2}s", audit.duration);
    println!("Win Condition: {}", audit.win_condition);
    println!("\nTotal actions: {}", audit.total);
    println!("Non-zero actions: {}", audit.non_zero);
    println!("Real actions (excluding invalid class_selection): {}", audit.real);
    println!("Zero actions: {}", audit.zero);
    println!("Percentage real actions: {:.2}%", audit.percent_real);

    if !audit.has_real_actions() {
        println!("\nWARNING: No real actions found! The episode only recorded zeros or invalid class selections.");
        println!("This means either:");
        println!("  1. Agents weren't in HeuristicOnly mode");
        println!("  2. Agents weren't selected via ManualControlManager");
        println!("  3. No input was provided during recording");
        println!("  4. Actions were recorded but all were zero (no keys pressed)");
        return;
    }

    println!("\nFirst {} real actions:", sample_size);
    for action in &audit.sample {
        println!(
            "  Frame {}: {} - {} = {}",
            action.frame, action.agent_id, action.branch, action.value
        );
    }

    println!("\nReal actions by agent:");
    for (agent, branches) in &audit.by_agent {
        let count: usize = branches.values().sum();
        println!("  {}: {} non-zero actions", agent, count);
        for (branch, count) in branches {
            println!("    {}: {} actions", branch, count);
        }
    }
}
