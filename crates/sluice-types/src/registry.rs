//! Typed plugin registry.
//!
//! Maps a stable plugin id to a constructor that produces a fresh value of
//! `T` (a transform or action configuration). Nothing is looked up by class
//! name: callers ask for an id, the registry calls the constructor.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::TypeError;

/// Constructor stored for a plugin id.
pub type Constructor<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Something that can hand out plugin definitions by id.
pub trait MetadataProvider<T> {
    /// Look up a fresh definition for `id`, or `None` if unknown.
    fn lookup(&self, id: &str) -> Option<T>;
}

/// Id and display name of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
}

struct Entry<T> {
    name: String,
    constructor: Constructor<T>,
}

/// Registry of plugin constructors keyed by id.
pub struct Registry<T> {
    entries: BTreeMap<String, Entry<T>>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Register (or replace) the constructor for `id`.
    pub fn register<F>(&mut self, id: impl Into<String>, name: impl Into<String>, constructor: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.entries.insert(
            id.into(),
            Entry {
                name: name.into(),
                constructor: Arc::new(constructor),
            },
        );
    }

    /// Create a fresh value for `id`.
    pub fn create(&self, id: &str) -> Result<T, TypeError> {
        self.entries
            .get(id)
            .map(|e| (e.constructor)())
            .ok_or_else(|| TypeError::PluginNotFound(id.to_string()))
    }

    /// Find a plugin by its display name.
    pub fn find_by_name(&self, name: &str) -> Option<PluginDescriptor> {
        self.entries
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(id, e)| PluginDescriptor {
                id: id.clone(),
                name: e.name.clone(),
            })
    }

    pub fn descriptor(&self, id: &str) -> Option<PluginDescriptor> {
        self.entries.get(id).map(|e| PluginDescriptor {
            id: id.to_string(),
            name: e.name.clone(),
        })
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MetadataProvider<T> for Registry<T> {
    fn lookup(&self, id: &str) -> Option<T> {
        self.create(id).ok()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("ids", &self.ids())
            .finish()
    }
}
