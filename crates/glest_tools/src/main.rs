//! Glest Development Tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use glest_tools::inspect::inspect_model;
use glest_tools::validate::{Severity, Validator, ValidatorConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "glest-tools")]
#[command(about = "Development tools for Glest content packs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a content pack
    Validate {
        /// Path to the pack directory (techs/<pack>)
        pack: PathBuf,

        /// Skip model, texture and image checks
        #[arg(long)]
        skip_assets: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Run rules one after another
        #[arg(long)]
        serial: bool,

        /// Only report issues at or above this severity (info, warning, error)
        #[arg(long, default_value = "info")]
        min_severity: String,
    },

    /// Print a summary of a G3D model
    InspectModel {
        /// Path to the model file
        file: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_severity(name: &str) -> Option<Severity> {
    match name.to_ascii_lowercase().as_str() {
        "info" => Some(Severity::Info),
        "warning" | "warn" => Some(Severity::Warning),
        "error" => Some(Severity::Error),
        _ => None,
    }
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate {
            pack,
            skip_assets,
            json,
            serial,
            min_severity,
        } => {
            let Some(min) = parse_severity(&min_severity) else {
                tracing::error!("Unknown severity: {min_severity}");
                std::process::exit(2);
            };
            tracing::info!("Validating content pack: {}", pack.display());
            let validator = Validator::new(ValidatorConfig {
                skip_assets,
                parallel: !serial,
            });
            let full = validator.validate(&pack);
            let report = full.filtered(min);

            if json {
                match report.to_json() {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        tracing::error!("Failed to serialize report: {e}");
                        std::process::exit(2);
                    }
                }
            } else {
                print!("{}", report.to_text());
            }

            if full.has_errors() {
                std::process::exit(1);
            }
        }
        Commands::InspectModel { file, json } => match inspect_model(&file) {
            Ok(summary) => {
                if json {
                    match serde_json::to_string_pretty(&summary) {
                        Ok(text) => println!("{text}"),
                        Err(e) => {
                            tracing::error!("Failed to serialize summary: {e}");
                            std::process::exit(2);
                        }
                    }
                } else {
                    print!("{summary}");
                }
            }
            Err(e) => {
                tracing::error!("Failed to inspect model: {e}");
                std::process::exit(1);
            }
        },
    }
}
