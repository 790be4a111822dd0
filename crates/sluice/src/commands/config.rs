//! Config command - configuration inspection.

use anyhow::Result;
use clap::{Args, Subcommand};
use console::style;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Show the user configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
        ConfigCommand::Path => cmd_path(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;
    let config = &loaded.config;

    if ctx.json_output {
        let output = serde_json::json!({
            "sources": loaded.loaded_from(),
            "warnings": loaded.warnings,
            "engine": config.engine(),
            "workflow": config.workflow(),
            "logging": config.logging(),
            "variables": config.variables,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("# Sluice Configuration\n");

    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }
    for warning in &loaded.warnings {
        println!("{} {}", style("warning:").yellow(), warning);
    }

    let engine = config.engine();
    println!("Engine:");
    println!("  rowset_size     {}", engine.rowset_size);
    println!("  input_poll_ms   {}", engine.input_poll_ms);

    let workflow = config.workflow();
    println!("Workflow:");
    println!("  aggregation        {}", workflow.aggregation);
    println!("  single_hop_always  {}", workflow.single_hop_always);

    let logging = config.logging();
    println!("Logging:");
    println!("  level      {}", logging.level);
    println!(
        "  directory  {}",
        logging.directory.as_deref().unwrap_or("(console only)")
    );

    if !config.variables.is_empty() {
        println!("Variables:");
        for (name, value) in &config.variables {
            println!("  {} = {}", style(name).cyan(), value);
        }
    }
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = &ctx.loaded;

    println!("Config file search order (later overrides earlier):\n");
    for source in &loaded.sources {
        let status = if source.loaded {
            style("✓ loaded").green()
        } else {
            style("· not found").dim()
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }
    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    let path = match &ctx.config_dir {
        Some(dir) => Some(dir.join(sluice_config::discovery::USER_CONFIG_FILE)),
        None => sluice_config::user_config_path(),
    };
    match path {
        Some(path) => println!("{}", path.display()),
        None => eprintln!("Could not determine config directory"),
    }
    Ok(())
}
