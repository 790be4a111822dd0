//! Hierarchical variable scopes and `${NAME}` placeholder substitution.
//!
//! A scope holds its own name → value map plus an optional shared parent.
//! Lookups walk the chain, so a child shadows its parent without copying it.
//!
//! Supported placeholder forms:
//! - `${NAME}`: the variable's value
//! - `${NAME:-fallback}`: the value, or `fallback` when `NAME` is undefined
//!
//! Substitution is a single left-to-right pass: values inserted for a
//! placeholder are never themselves re-scanned.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::VariableError;

const OPEN: &str = "${";
const CLOSE: char = '}';
const DEFAULT_SEPARATOR: &str = ":-";

/// A variable scope with an optional parent.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: HashMap<String, String>,
    parent: Option<Arc<Variables>>,
}

impl Variables {
    /// An empty root scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty scope whose lookups fall back to `parent`.
    pub fn with_parent(parent: Arc<Variables>) -> Self {
        Self {
            values: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// A root scope seeded from the process environment.
    pub fn from_env() -> Self {
        let mut vars = Self::new();
        vars.inject_variables(std::env::vars());
        vars
    }

    pub fn parent(&self) -> Option<&Arc<Variables>> {
        self.parent.as_ref()
    }

    /// Set a variable in this scope.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Set many variables at once, overriding existing entries in this scope.
    pub fn inject_variables<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in vars {
            self.set(name, value);
        }
    }

    /// Look a variable up in this scope, then in each ancestor.
    pub fn get(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(value) => Some(value.as_str()),
            None => self.parent.as_ref().and_then(|p| p.get(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Every visible variable name, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        self.collect_names(&mut names);
        names.into_iter().collect()
    }

    fn collect_names(&self, names: &mut BTreeSet<String>) {
        names.extend(self.values.keys().cloned());
        if let Some(parent) = &self.parent {
            parent.collect_names(names);
        }
    }

    /// Resolve every placeholder in `text`, failing on undefined or malformed ones.
    pub fn resolve(&self, text: &str) -> Result<String, VariableError> {
        self.expand(text, true)
    }

    /// Resolve what can be resolved; unknown or malformed placeholders stay verbatim.
    pub fn substitute(&self, text: &str) -> String {
        // Lenient expansion never returns an error.
        self.expand(text, false).unwrap_or_else(|_| text.to_string())
    }

    fn expand(&self, text: &str, strict: bool) -> Result<String, VariableError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after = &rest[start + OPEN.len()..];

            let Some(end) = after.find(CLOSE) else {
                if strict {
                    return Err(VariableError::Malformed(text.to_string()));
                }
                out.push_str(&rest[start..]);
                return Ok(out);
            };

            let inner = &after[..end];
            let (name, fallback) = match inner.split_once(DEFAULT_SEPARATOR) {
                Some((name, fallback)) => (name, Some(fallback)),
                None => (inner, None),
            };

            if name.is_empty() {
                if strict {
                    return Err(VariableError::Malformed(text.to_string()));
                }
                out.push_str(&rest[start..start + OPEN.len() + end + 1]);
            } else {
                match self.get(name).or(fallback) {
                    Some(value) => out.push_str(value),
                    None if strict => {
                        return Err(VariableError::Undefined {
                            name: name.to_string(),
                            text: text.to_string(),
                        });
                    }
                    None => out.push_str(&rest[start..start + OPEN.len() + end + 1]),
                }
            }

            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Variables::new();
        vars.inject_variables(iter);
        vars
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
