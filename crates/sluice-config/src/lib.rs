//! Configuration system for the Sluice engine.
//!
//! Provides:
//! - TOML-based engine configuration (`[engine]`, `[workflow]`, `[logging]`,
//!   `[variables]`) with every section optional so layers can merge
//! - Config file layering (user config dir + project-local `sluice.toml`)
//! - [`Variables`], the hierarchical name → value scope used to resolve
//!   `${NAME}` placeholders when transforms and actions initialize

pub mod discovery;
pub mod error;
pub mod types;
pub mod variables;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result, VariableError};
pub use types::{BranchAggregation, EngineConfig, LoggingConfig, SluiceConfig, WorkflowConfig};
pub use variables::Variables;
