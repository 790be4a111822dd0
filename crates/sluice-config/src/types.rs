//! Configuration types mapping to the TOML file structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default RowSet capacity.
pub const DEFAULT_ROWSET_SIZE: usize = 10_000;

/// Default wait between polls when a transform reads from several inputs.
pub const DEFAULT_INPUT_POLL_MS: u64 = 50;

// ─────────────────────────────────────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Maps directly to the TOML file format:
/// ```toml
/// [engine]
/// rowset_size = 10000
/// input_poll_ms = 50
///
/// [workflow]
/// aggregation = "exclude_error_handled"
/// single_hop_always = true
///
/// [logging]
/// level = "info"
/// directory = "/var/log/sluice"
///
/// [variables]
/// ROW_LIMIT = "1440"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SluiceConfig {
    /// Pipeline engine tuning.
    pub engine: Option<EngineConfig>,
    /// Workflow executor policy.
    pub workflow: Option<WorkflowConfig>,
    /// Logging configuration.
    pub logging: Option<LoggingConfig>,
    /// Default variables seeding the root scope.
    pub variables: BTreeMap<String, String>,
}

impl SluiceConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        let config: SluiceConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections present in `other` replace ours wholesale; variables merge
    /// key by key.
    pub fn merge(&mut self, other: SluiceConfig) {
        if other.engine.is_some() {
            self.engine = other.engine;
        }

        if other.workflow.is_some() {
            self.workflow = other.workflow;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }

        for (name, value) in other.variables {
            self.variables.insert(name, value);
        }
    }

    /// Effective engine settings (defaults when the section is absent).
    pub fn engine(&self) -> EngineConfig {
        self.engine.clone().unwrap_or_default()
    }

    /// Effective workflow settings.
    pub fn workflow(&self) -> WorkflowConfig {
        self.workflow.clone().unwrap_or_default()
    }

    /// Effective logging settings.
    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    fn validate(&self) -> crate::Result<()> {
        if let Some(engine) = &self.engine {
            engine.validate()?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────────────────

/// Pipeline engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of every RowSet allocated by a pipeline.
    pub rowset_size: usize,
    /// Poll interval (ms) for transforms that read from more than one input.
    pub input_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rowset_size: DEFAULT_ROWSET_SIZE,
            input_poll_ms: DEFAULT_INPUT_POLL_MS,
        }
    }
}

impl EngineConfig {
    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.rowset_size == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.rowset_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Workflow
// ─────────────────────────────────────────────────────────────────────────────

/// How parallel branch outcomes combine into the workflow result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BranchAggregation {
    /// AND over branches that were not diverted through an error hop.
    #[default]
    ExcludeErrorHandled,
    /// AND over every branch's terminal result.
    AllBranches,
    /// AND over every action executed in the run.
    Strict,
}

impl BranchAggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExcludeErrorHandled => "exclude_error_handled",
            Self::AllBranches => "all_branches",
            Self::Strict => "strict",
        }
    }
}

impl std::fmt::Display for BranchAggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow executor policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Branch aggregation policy.
    pub aggregation: BranchAggregation,
    /// Take a lone outgoing hop regardless of its evaluation flags.
    pub single_hop_always: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            aggregation: BranchAggregation::default(),
            single_hop_always: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily-rolling log files. No file output when unset.
    pub directory: Option<String>,
    /// Write the file layer as JSON lines.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
            json: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
