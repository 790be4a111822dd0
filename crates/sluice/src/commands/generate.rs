//! Generate command - run a RowGenerator → Dummy pipeline and report counts.

use anyhow::{Result, bail};
use clap::Args;
use console::style;
use sluice_pipeline::{
    GeneratorField, Pipeline, PipelineMeta, PipelineResult, RowGeneratorMeta, Status,
    TransformConfig,
};
use sluice_types::ValueType;

use super::{Context, parse_var};

/// Arguments for the generate command.
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Number of rows; may reference variables, e.g. '${ROW_LIMIT}'
    #[arg(long, default_value = "10")]
    pub limit: String,

    /// Constant field to emit (repeatable)
    #[arg(long = "field", value_name = "NAME:TYPE=VALUE", value_parser = parse_field)]
    pub fields: Vec<GeneratorField>,

    /// Set a variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Row set capacity (default from [engine] config)
    #[arg(long)]
    pub rowset_size: Option<usize>,
}

/// Parse a `NAME:TYPE=VALUE` field argument.
fn parse_field(s: &str) -> Result<GeneratorField, String> {
    let (head, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME:TYPE=VALUE, got '{}'", s))?;
    let (name, type_name) = head
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:TYPE=VALUE, got '{}'", s))?;
    if name.is_empty() {
        return Err(format!("field name missing in '{}'", s));
    }
    let value_type: ValueType = type_name.parse().map_err(|e| format!("{}", e))?;
    Ok(GeneratorField::new(name, value_type, value))
}

fn build_meta(args: &GenerateArgs) -> PipelineMeta {
    let generator = RowGeneratorMeta {
        fields: args.fields.clone(),
        ..RowGeneratorMeta::with_limit(args.limit.clone())
    };
    let mut meta = PipelineMeta::new("generate");
    meta.add_transform("Generate rows", TransformConfig::RowGenerator(generator))
        .add_transform("Count", TransformConfig::Dummy)
        .add_hop("Generate rows", "Count");
    meta
}

/// Run the generate command.
pub async fn run(args: GenerateArgs, ctx: &Context) -> Result<()> {
    let mut engine = ctx.loaded.config.engine();
    if let Some(size) = args.rowset_size {
        engine.rowset_size = size;
    }
    engine.validate()?;

    let pipeline = Pipeline::with_config(build_meta(&args), ctx.variables(&args.vars), engine);
    let result = tokio::task::spawn_blocking(move || -> Result<PipelineResult> {
        pipeline.execute()?;
        pipeline.wait_until_finished();
        Ok(pipeline.result())
    })
    .await??;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result, ctx.verbose);
    }

    if result.status == Status::Failed {
        bail!(
            "pipeline failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_result(result: &PipelineResult, verbose: bool) {
    let status = match result.status {
        Status::Finished => style(result.status.as_str()).green(),
        Status::Stopped => style(result.status.as_str()).yellow(),
        _ => style(result.status.as_str()).red(),
    };
    println!("Pipeline '{}' {}", result.name, status);
    println!();
    println!("  {:<16} {:>10} {:>10}  {}", "TRANSFORM", "READ", "WRITTEN", "STATUS");
    for transform in &result.transforms {
        println!(
            "  {:<16} {:>10} {:>10}  {}",
            transform.name, transform.lines_read, transform.lines_written, transform.status
        );
        if let Some(error) = &transform.error {
            println!("    {}", style(error).red());
        }
    }

    if verbose
        && let (Some(start), Some(end)) = (result.started_at, result.finished_at)
    {
        println!();
        println!("  elapsed: {} ms", (end - start).num_milliseconds());
    }
}
