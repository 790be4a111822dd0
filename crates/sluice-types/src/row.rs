//! Row schemas and row records.

use std::collections::BTreeMap;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::value::{Value, ValueType};

/// Metadata describing one field of a row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueMeta {
    pub name: String,
    pub value_type: ValueType,
    /// Display length, `None` when unspecified.
    #[serde(default)]
    pub length: Option<u32>,
    /// Display precision, `None` when unspecified.
    #[serde(default)]
    pub precision: Option<u32>,
    /// Free-form per-field attributes (format masks, origin transform, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ValueMeta {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            length: None,
            precision: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Ordered schema of a row. Field names are unique.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowMeta {
    fields: Vec<ValueMeta>,
}

impl RowMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row meta from a list of fields, rejecting duplicate names.
    pub fn from_fields(fields: impl IntoIterator<Item = ValueMeta>) -> Result<Self, TypeError> {
        let mut meta = Self::new();
        for field in fields {
            meta.add_value_meta(field)?;
        }
        Ok(meta)
    }

    /// Append a field. Fails if a field with the same name already exists.
    pub fn add_value_meta(&mut self, meta: ValueMeta) -> Result<(), TypeError> {
        if self.index_of(&meta.name).is_some() {
            return Err(TypeError::DuplicateField(meta.name));
        }
        self.fields.push(meta);
        Ok(())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn search_value_meta(&self, name: &str) -> Option<&ValueMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn value_meta(&self, index: usize) -> Option<&ValueMeta> {
        self.fields.get(index)
    }

    pub fn fields(&self) -> &[ValueMeta] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// One streamed record, positionally aligned with a [`RowMeta`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Look up a value by field name through its row meta.
    pub fn get_by_name<'a>(&'a self, meta: &RowMeta, name: &str) -> Result<&'a Value, TypeError> {
        meta.index_of(name)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| TypeError::UnknownField(name.to_string()))
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Index<usize> for Row {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self { values }
    }
}
