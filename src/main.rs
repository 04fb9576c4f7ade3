use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod air;
mod buildup;
mod bulletin;
mod config;
mod error;
mod history;
mod hull;
mod models;
mod naval;
mod region;
mod report;
mod run;
mod signals;
mod snapshot;
mod sources;

use crate::air::CarrierAirScorer;
use crate::bulletin::BulletinScanner;
use crate::config::ScoringConfig;
use crate::run::RunOptions;
use crate::snapshot::Snapshot;

#[derive(Parser)]
#[command(name = "strike-risk")]
#[command(about = "Composite strike risk monitor driven by naval posture and open signals", long_about = None)]
struct Cli {
    /// JSON file overriding the built-in scoring tables
    #[arg(long, global = true, env = "RISK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score all signals once and rewrite the snapshot
    Run {
        #[arg(long, env = "RISK_SNAPSHOT", default_value = "frontend/data.json")]
        snapshot: PathBuf,
        /// JSON document with collaborator outputs
        #[arg(long, env = "RISK_INPUTS")]
        inputs: Option<PathBuf>,
        /// Fleet tracker bulletin HTML
        #[arg(long, env = "RISK_BULLETIN")]
        bulletin: Option<PathBuf>,
    },
    /// Score a single fleet tracker bulletin without touching state
    ScoreBulletin {
        #[arg(long)]
        html: PathBuf,
    },
    /// Generate a markdown report from the snapshot
    Report {
        #[arg(long, env = "RISK_SNAPSHOT", default_value = "frontend/data.json")]
        snapshot: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ScoringConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            snapshot,
            inputs,
            bulletin,
        } => {
            let options = RunOptions {
                snapshot,
                inputs,
                bulletin,
            };
            let written = run::run_once(&options, &config).await?;
            println!(
                "Total risk {} ({} elevated signals) written to {}.",
                written.total_risk.risk,
                written.total_risk.elevated_count,
                options.snapshot.display()
            );
        }
        Commands::ScoreBulletin { html } => {
            let raw = tokio::fs::read_to_string(&html)
                .await
                .with_context(|| format!("failed to read {}", html.display()))?;
            let scanner = BulletinScanner::new(&config.naval)?;
            let carrier_air = CarrierAirScorer::new(&config.air)?;
            let sections = scanner.parse(&raw);
            let naval = naval::score_sections(&sections, &config.naval);

            println!("Sections scored: {}", sections.len());
            for section in &sections {
                println!(
                    "- {} [{}] x{}: {} hulls",
                    section.region.name,
                    section.region.relevance,
                    section.region.multiplier,
                    section.hulls.len()
                );
                for hull in &section.hulls {
                    println!("    {} ({})", hull.ships_name, hull.hull_code);
                }
            }
            println!(
                "Weighted points {:.1}, force risk {}",
                naval.total_weighted_points, naval.force_risk
            );
            println!(
                "{} carriers, {} destroyers near CENTCOM ({} of {} ships counted)",
                naval.carriers_in_centcom,
                naval.destroyers_in_centcom,
                naval.counted_ships,
                naval.total_ships_parsed
            );
            println!("Carrier air risk {}", carrier_air.score(&sections));
        }
        Commands::Report { snapshot, out } => {
            let state = Snapshot::load(&snapshot);
            let report = report::build_report(&state);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
