//! Headless Glest game runner.
//!
//! # Usage
//!
//! ```bash
//! # Two magic players for two minutes of game time, as fast as possible
//! glest-headless run techs/megapack --faction magic --faction magic --seconds 120
//!
//! # Same game at wall-clock speed, summary as JSON
//! glest-headless run techs/megapack --faction magic --faction magic --realtime --json
//! ```
//!
//! Logs go to stderr; the summary goes to stdout.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use glest_core::world::WorldSettings;
use glest_headless::runner::{run_pack, RunConfig, RunSummary};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "glest-headless")]
#[command(about = "Headless Glest game runner")]
#[command(version)]
struct Cli {
    /// Enable debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a pack and run a game with it
    Run {
        /// Path to the pack directory (techs/<pack>)
        pack: PathBuf,

        /// Faction for each player; repeat once per player
        #[arg(short, long = "faction", required = true)]
        factions: Vec<String>,

        /// Game seconds to simulate
        #[arg(short, long, default_value = "60")]
        seconds: u32,

        /// Map width
        #[arg(long, default_value = "128")]
        width: i32,

        /// Map height
        #[arg(long, default_value = "128")]
        height: i32,

        /// Disable fog of war
        #[arg(long)]
        no_fog: bool,

        /// Tick at wall-clock rate on the simulation thread
        #[arg(long)]
        realtime: bool,

        /// Skip model, texture and image checks
        #[arg(long)]
        skip_assets: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn print_summary(summary: &RunSummary) {
    println!(
        "{}: {} ticks, {:.2}s game time in {} ms ({} overruns)",
        summary.pack, summary.ticks, summary.game_time, summary.wall_ms, summary.controller.overruns
    );
    for player in &summary.players {
        let resources: Vec<String> = player
            .resources
            .iter()
            .map(|(name, amount)| format!("{name}={amount}"))
            .collect();
        println!(
            "  {} [{}]{}: {} units, {} buildings, {} created, {} lost; {}",
            player.name,
            player.faction,
            if player.active { "" } else { " (defeated)" },
            player.units,
            player.buildings,
            player.units_created,
            player.units_lost,
            resources.join(" ")
        );
    }
    match summary.winner {
        Some(id) => println!("  winner: player {id}"),
        None => println!("  no winner"),
    }
    println!("  state hash: {:016x}", summary.state_hash);
}

fn main() {
    let cli = Cli::parse();

    // Logs to stderr; stdout carries the summary
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            pack,
            factions,
            seconds,
            width,
            height,
            no_fog,
            realtime,
            skip_assets,
            json,
        } => {
            let mut config = RunConfig::new(pack, factions);
            config.seconds = seconds;
            config.settings = WorldSettings {
                fog_of_war: !no_fog,
                ..WorldSettings::with_size(width, height)
            };
            config.realtime = realtime;
            config.skip_assets = skip_assets;

            let summary = match run_pack(&config) {
                Ok(summary) => summary,
                Err(e) => {
                    tracing::error!(kind = e.kind(), "Run failed: {e}");
                    std::process::exit(1);
                }
            };

            if json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        tracing::error!("Failed to serialize summary: {e}");
                        std::process::exit(2);
                    }
                }
            } else {
                print_summary(&summary);
            }
        }
    }
}
