//! Resolve command - placeholder substitution against the variable scope.

use anyhow::{Context as _, Result};
use clap::Args;

use super::{Context, parse_var};

/// Arguments for the resolve command.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Text containing ${NAME} or ${NAME:-default} placeholders
    pub text: String,

    /// Set a variable (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Leave unknown placeholders as they are instead of failing
    #[arg(long)]
    pub lenient: bool,
}

/// Run the resolve command.
pub async fn run(args: ResolveArgs, ctx: &Context) -> Result<()> {
    let variables = ctx.variables(&args.vars);
    let resolved = if args.lenient {
        variables.substitute(&args.text)
    } else {
        variables
            .resolve(&args.text)
            .with_context(|| format!("cannot resolve '{}'", args.text))?
    };

    if ctx.json_output {
        let output = serde_json::json!({
            "text": args.text,
            "resolved": resolved,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", resolved);
    }
    Ok(())
}
