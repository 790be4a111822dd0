//! Built-in transforms and the configuration enum that selects them.

mod dummy;
mod normaliser;
mod row_generator;

use std::fmt;
use std::sync::Arc;

use sluice_config::Variables;
use sluice_types::Registry;

use crate::error::Result;
use crate::transform::TransformLogic;

pub use dummy::Dummy;
pub use normaliser::{Normaliser, NormaliserField, NormaliserMeta};
pub use row_generator::{GeneratorField, RowGenerator, RowGeneratorMeta};

pub const ROW_GENERATOR_ID: &str = "RowGenerator";
pub const DUMMY_ID: &str = "Dummy";
pub const NORMALISER_ID: &str = "Normaliser";

/// A transform supplied from outside this crate.
pub trait TransformPlugin: Send + Sync {
    fn id(&self) -> &str;

    /// Whether the transform is meaningless without an incoming hop.
    fn requires_input(&self) -> bool {
        false
    }

    /// Resolve configuration against `variables` and build the runnable logic.
    fn init(&self, variables: &Variables) -> Result<Box<dyn TransformLogic>>;
}

/// Static configuration of one transform, one variant per kind.
#[derive(Clone)]
pub enum TransformConfig {
    RowGenerator(RowGeneratorMeta),
    Dummy,
    Normaliser(NormaliserMeta),
    Plugin(Arc<dyn TransformPlugin>),
}

impl TransformConfig {
    pub fn plugin(plugin: impl TransformPlugin + 'static) -> Self {
        Self::Plugin(Arc::new(plugin))
    }

    pub fn plugin_id(&self) -> &str {
        match self {
            Self::RowGenerator(_) => ROW_GENERATOR_ID,
            Self::Dummy => DUMMY_ID,
            Self::Normaliser(_) => NORMALISER_ID,
            Self::Plugin(p) => p.id(),
        }
    }

    pub fn requires_input(&self) -> bool {
        match self {
            Self::RowGenerator(_) | Self::Dummy => false,
            Self::Normaliser(_) => true,
            Self::Plugin(p) => p.requires_input(),
        }
    }

    /// Resolve variables and build the transform's runnable logic.
    pub fn init(&self, variables: &Variables) -> Result<Box<dyn TransformLogic>> {
        Ok(match self {
            Self::RowGenerator(meta) => Box::new(RowGenerator::new(meta, variables)?),
            Self::Dummy => Box::new(Dummy),
            Self::Normaliser(meta) => Box::new(Normaliser::new(meta, variables)?),
            Self::Plugin(p) => p.init(variables)?,
        })
    }
}

impl fmt::Debug for TransformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowGenerator(meta) => f.debug_tuple("RowGenerator").field(meta).finish(),
            Self::Dummy => f.write_str("Dummy"),
            Self::Normaliser(meta) => f.debug_tuple("Normaliser").field(meta).finish(),
            Self::Plugin(p) => f.debug_tuple("Plugin").field(&p.id()).finish(),
        }
    }
}

/// Registry of the built-in transform kinds, keyed by plugin id.
pub fn builtin_transforms() -> Registry<TransformConfig> {
    let mut registry = Registry::new();
    registry.register(ROW_GENERATOR_ID, "Generate rows", || {
        TransformConfig::RowGenerator(RowGeneratorMeta::default())
    });
    registry.register(DUMMY_ID, "Dummy (do nothing)", || TransformConfig::Dummy);
    registry.register(NORMALISER_ID, "Row Normaliser", || {
        TransformConfig::Normaliser(NormaliserMeta::default())
    });
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_types::MetadataProvider;

    #[test]
    fn test_builtin_registry() {
        let registry = builtin_transforms();
        assert_eq!(registry.len(), 3);

        let config = registry.create(ROW_GENERATOR_ID).unwrap();
        assert_eq!(config.plugin_id(), ROW_GENERATOR_ID);
        assert!(!config.requires_input());

        let normaliser = registry.lookup(NORMALISER_ID).unwrap();
        assert!(normaliser.requires_input());

        assert!(registry.lookup("TableOutput").is_none());
        assert_eq!(
            registry.find_by_name("Dummy (do nothing)").unwrap().id,
            DUMMY_ID
        );
    }
}
