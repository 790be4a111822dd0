//! Sluice - row-streaming pipeline and workflow engine
//!
//! Main entry point for the Sluice CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod logging;

use commands::{config, generate, resolve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Sluice - row-streaming pipeline and workflow engine
#[derive(Parser)]
#[command(name = "sluice")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// User config directory (default: platform config dir)
    #[arg(long, global = true, env = "SLUICE_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect configuration
    Config(config::ConfigArgs),

    /// Resolve ${VAR} placeholders in a piece of text
    Resolve(resolve::ResolveArgs),

    /// Run a generate-and-count pipeline
    Generate(generate::GenerateArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = sluice_config::load_config_with_options(None, cli.config_dir.as_deref())?;
    let _guard = logging::init(&loaded.config.logging(), cli.verbose)?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir: cli.config_dir,
        loaded,
    };

    match cli.command {
        Commands::Config(args) => config::run(args, &ctx).await,
        Commands::Resolve(args) => resolve::run(args, &ctx).await,
        Commands::Generate(args) => generate::run(args, &ctx).await,
    }
}
