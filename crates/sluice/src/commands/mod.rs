//! CLI command handlers.

pub mod config;
pub mod generate;
pub mod resolve;

use std::path::PathBuf;
use std::sync::Arc;

use sluice_config::{LoadedConfig, Variables};

/// Shared context for all commands.
#[derive(Debug)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// `--config-dir` override, if given.
    pub config_dir: Option<PathBuf>,
    /// Effective configuration and the layers it came from.
    pub loaded: LoadedConfig,
}

impl Context {
    /// Environment, then `[variables]` from config, then `--var` overrides
    /// in a child scope.
    pub fn variables(&self, overrides: &[(String, String)]) -> Variables {
        let mut root = Variables::from_env();
        root.inject_variables(self.loaded.config.variables.clone());
        let mut scope = Variables::with_parent(Arc::new(root));
        scope.inject_variables(overrides.iter().cloned());
        scope
    }
}

/// Parse a `NAME=VALUE` argument.
pub fn parse_var(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got '{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("ROW_LIMIT=1440").unwrap(),
            ("ROW_LIMIT".to_string(), "1440".to_string())
        );
        assert_eq!(parse_var("EMPTY=").unwrap().1, "");
        assert_eq!(parse_var("A=b=c").unwrap().1, "b=c");
        assert!(parse_var("=x").is_err());
        assert!(parse_var("novalue").is_err());
    }
}
