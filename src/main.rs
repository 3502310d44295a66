// src/main.rs
//
// Fund scenario simulator.
// Deploys a protocol and one fund from a TOML config, plays the scripted
// actions and prints the resulting fund state.

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::Parser;
use fund_engine::config::{default_config_template, Config};
use fund_engine::scenario::{ScenarioResult, ScenarioRunner};
use std::fs::File;
use std::io::{BufWriter, Write};

#[derive(Parser)]
#[command(name = "fund-sim")]
#[command(about = "Simulates a pooled investment fund: shares, fees, policies and adapter trades")]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(long, short)]
    config: Option<String>,

    /// Write the full event log to this file (JSONL)
    #[arg(long)]
    events_out: Option<String>,

    /// Print the summary as JSON instead of text
    #[arg(long, default_value = "false")]
    json: bool,

    /// Generate a default configuration file
    #[arg(long)]
    generate_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.generate_config {
        println!("{}", default_config_template());
        return;
    }

    let config = match &args.config {
        Some(path) => match Config::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                eprintln!("Use --generate-config to create a template.");
                std::process::exit(1);
            }
        },
        None => {
            eprintln!("No config file specified. Use --config <path>");
            eprintln!("Use --generate-config to create a template.");
            std::process::exit(1);
        }
    };

    // RUST_LOG wins over the config's level
    let level = config.protocol.log_level.as_deref().unwrap_or("info");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&args, config) {
        eprintln!("Scenario failed: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args, config: Config) -> Result<()> {
    let mut runner = ScenarioRunner::new(config).context("Failed to deploy fund")?;
    let result = runner.run().context("Failed to run scenario")?;

    if let Some(path) = &args.events_out {
        let file = File::create(path).with_context(|| format!("Failed to create {}", path))?;
        let mut out = BufWriter::new(file);
        for event in runner.protocol().events().all() {
            serde_json::to_writer(&mut out, event)?;
            writeln!(out)?;
        }
        out.flush()?;
        println!("Wrote {} events to {}", runner.protocol().events().len(), path);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn format_timestamp(ts: u64) -> String {
    i64::try_from(ts)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn print_summary(result: &ScenarioResult) {
    println!("\n=== Steps ===");
    for step in &result.steps {
        let marker = if step.ok { "ok" } else { "REVERTED" };
        println!(
            "  #{:<3} [{}] {:<26} {:<8} {}",
            step.index,
            format_timestamp(step.timestamp),
            step.action,
            marker,
            step.detail
        );
    }

    println!("\n=== Fund: {} ===", result.fund_name);
    println!("  Comptroller:       {}", result.comptroller);
    println!("  Vault:             {}", result.vault);
    println!("  Status:            {}", result.status);
    println!("  Time:              {}", format_timestamp(result.final_timestamp));
    println!("  GAV:               {} {}", result.gav, result.denomination_symbol);
    println!(
        "  Share value:       {} {}",
        result.gross_share_value, result.denomination_symbol
    );
    println!("  Total supply:      {}", result.total_supply);

    println!("\n  Holders:");
    for holder in &result.holders {
        println!("    {}  {}", holder.holder, holder.shares);
    }
    println!("\n  Tracked assets:");
    for asset in &result.tracked_assets {
        println!("    {:<8} {}  {}", asset.symbol, asset.asset, asset.balance);
    }

    println!(
        "\n{} steps, {} reverted, {} events",
        result.steps.len(),
        result.failed_steps(),
        result.event_count
    );
}
