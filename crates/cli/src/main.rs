//! ForgeBOM CLI: the main entry point.
//!
//! Commands:
//! - `onboard`   Initialize config, output directory, and starter CAD library
//! - `fuse`      Pick the best listing for one part type
//! - `validate`  Render and collision-check a BOM against an assembly plan
//! - `config`    Validate, show, or locate the configuration
//! - `doctor`    Diagnose setup

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "forgebom",
    about = "ForgeBOM: drone BOM candidate fusion and assembly validation",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration, output directory, and CAD library
    Onboard,

    /// Search, evaluate, and rank listings for one part type
    Fuse {
        /// Part type, e.g. Propellers, Motors, FC_Stack
        part_type: String,

        /// Search query
        query: String,

        /// Maximum search results to consider
        #[arg(short, long)]
        limit: Option<usize>,

        /// Minimum vision confidence for an attribute to be kept
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Use registry defaults instead of the vision service
        #[arg(long)]
        safe_mode: bool,

        /// Insert the winner into this BOM file (created if missing)
        #[arg(long)]
        bom: Option<PathBuf>,
    },

    /// Render parts and check the assembled scene for collisions
    Validate {
        /// BOM JSON file (array of part rows)
        #[arg(long)]
        bom: PathBuf,

        /// Assembly plan JSON file; a standard quad plan when omitted
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Project id used in artifact names
        #[arg(long)]
        project_id: Option<String>,

        /// Skip the collision check (report is marked unchecked)
        #[arg(long)]
        no_collision: bool,

        /// Write the full report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose system health
    Doctor,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Load and validate the config file
    Validate,
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Fuse {
            part_type,
            query,
            limit,
            min_confidence,
            safe_mode,
            bom,
        } => {
            commands::fuse::run(commands::fuse::FuseArgs {
                part_type,
                query,
                limit,
                min_confidence,
                safe_mode,
                bom,
            })
            .await?
        }
        Commands::Validate {
            bom,
            plan,
            project_id,
            no_collision,
            report,
        } => {
            commands::validate::run(commands::validate::ValidateArgs {
                bom,
                plan,
                project_id,
                no_collision,
                report,
            })
            .await?
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
