//! Tracing setup: a console layer on stderr plus an optional daily-rolling
//! file layer.

use anyhow::Result;
use sluice_config::LoggingConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

const CRATES: &[&str] = &[
    "sluice",
    "sluice_config",
    "sluice_injection",
    "sluice_pipeline",
    "sluice_workflow",
];

fn directives(level: &str) -> String {
    let mut parts: Vec<String> = CRATES.iter().map(|c| format!("{}={}", c, level)).collect();
    parts.push("warn".to_string());
    parts.join(",")
}

/// Console filter: `RUST_LOG` wins, then `--verbose`, then the configured level.
fn console_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = if verbose { "debug" } else { config.level.as_str() };
    EnvFilter::new(directives(level))
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// so buffered file output is flushed.
pub fn init(config: &LoggingConfig, verbose: bool) -> Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_filter(console_filter(config, verbose));

    let Some(directory) = &config.directory else {
        tracing_subscriber::registry().with(console).try_init()?;
        return Ok(None);
    };

    let file_appender = tracing_appender::rolling::daily(directory, "sluice.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_filter = EnvFilter::new(directives("trace"));

    if config.json {
        tracing_subscriber::registry()
            .with(console)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_filter(file_filter),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(console)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(non_blocking)
                    .with_filter(file_filter),
            )
            .try_init()?;
    }
    Ok(Some(guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_cover_every_crate() {
        let d = directives("debug");
        assert!(d.starts_with("sluice=debug,"));
        assert!(d.contains("sluice_pipeline=debug"));
        assert!(d.ends_with(",warn"));
    }
}
