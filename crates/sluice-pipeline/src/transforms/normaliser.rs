//! Row normaliser: turns repeated column groups into one row per group.
//!
//! With fields `(pr_sl → value "Product1", norm "sales")` and
//! `(pr_sh → value "Product1", norm "ships")`, each input row yields one
//! output row per distinct value: the untouched columns, the type field
//! holding the value (`Product1`), then a `sales` and a `ships` column.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sluice_config::Variables;
use sluice_injection::{Injectable, InjectionCatalog};
use sluice_types::{Row, RowMeta, Value, ValueMeta, ValueType};

use crate::error::{PipelineError, Result};
use crate::transform::{Flow, TransformIo, TransformLogic};

/// One input column folded into the normalised output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormaliserField {
    /// Input column name.
    pub name: String,
    /// Group the column belongs to; becomes the type field's value.
    pub value: String,
    /// Output column receiving the input column's value.
    pub norm: String,
}

impl NormaliserField {
    pub fn new(name: impl Into<String>, value: impl Into<String>, norm: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            norm: norm.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormaliserMeta {
    /// Name of the output column holding each group's value.
    pub type_field: String,
    pub normaliser_fields: Vec<NormaliserField>,
}

impl Default for NormaliserMeta {
    fn default() -> Self {
        Self {
            type_field: "type".to_string(),
            normaliser_fields: Vec::new(),
        }
    }
}

impl Injectable for NormaliserMeta {
    fn catalog() -> InjectionCatalog<Self> {
        InjectionCatalog::<Self>::new()
            .key(
                "TYPE_FIELD",
                ValueType::String,
                |m, _, v| m.type_field = v.to_string(),
                |m, _| Some(Value::from(m.type_field.as_str())),
            )
            .group(
                "FIELDS",
                |m| m.normaliser_fields.len(),
                |m, n| m.normaliser_fields.resize_with(n, NormaliserField::default),
            )
            .group_key(
                "FIELDS",
                "NAME",
                ValueType::String,
                |m, i, v| {
                    if let Some(f) = m.normaliser_fields.get_mut(i) {
                        f.name = v.to_string();
                    }
                },
                |m, i| m.normaliser_fields.get(i).map(|f| Value::from(f.name.as_str())),
            )
            .group_key(
                "FIELDS",
                "VALUE",
                ValueType::String,
                |m, i, v| {
                    if let Some(f) = m.normaliser_fields.get_mut(i) {
                        f.value = v.to_string();
                    }
                },
                |m, i| m.normaliser_fields.get(i).map(|f| Value::from(f.value.as_str())),
            )
            .group_key(
                "FIELDS",
                "NORMALISED",
                ValueType::String,
                |m, i, v| {
                    if let Some(f) = m.normaliser_fields.get_mut(i) {
                        f.norm = v.to_string();
                    }
                },
                |m, i| m.normaliser_fields.get(i).map(|f| Value::from(f.norm.as_str())),
            )
    }
}

/// Output layout derived from the first input row meta.
#[derive(Debug)]
struct Layout {
    meta: Arc<RowMeta>,
    /// Input indices copied verbatim into every output row.
    kept: Vec<usize>,
    /// Per group: its value and, per norm column, the input index feeding it.
    groups: Vec<(String, Vec<Option<usize>>)>,
}

#[derive(Debug)]
pub struct Normaliser {
    name: String,
    type_field: String,
    fields: Vec<NormaliserField>,
    layout: Option<Layout>,
}

impl Normaliser {
    pub fn new(config: &NormaliserMeta, variables: &Variables) -> Result<Self> {
        let type_field = variables.resolve(&config.type_field)?;
        if type_field.is_empty() {
            return Err(PipelineError::Configuration(
                "normaliser type field cannot be empty".into(),
            ));
        }
        if config.normaliser_fields.is_empty() {
            return Err(PipelineError::Configuration(
                "normaliser needs at least one field".into(),
            ));
        }
        Ok(Self {
            name: super::NORMALISER_ID.to_string(),
            type_field,
            fields: config.normaliser_fields.clone(),
            layout: None,
        })
    }

    fn build_layout(&self, input: &RowMeta) -> Result<Layout> {
        let mut indices = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let index = input.index_of(&field.name).ok_or_else(|| {
                PipelineError::execution(
                    &self.name,
                    format!("field '{}' not found in the input row", field.name),
                )
            })?;
            indices.push(index);
        }

        let mut values: Vec<&str> = Vec::new();
        let mut norms: Vec<&str> = Vec::new();
        for field in &self.fields {
            if !values.contains(&field.value.as_str()) {
                values.push(&field.value);
            }
            if !norms.contains(&field.norm.as_str()) {
                norms.push(&field.norm);
            }
        }

        let kept: Vec<usize> = (0..input.len()).filter(|i| !indices.contains(i)).collect();

        let mut meta = RowMeta::new();
        for &index in &kept {
            if let Some(value_meta) = input.value_meta(index) {
                meta.add_value_meta(value_meta.clone())?;
            }
        }
        meta.add_value_meta(ValueMeta::new(&self.type_field, ValueType::String))?;
        for norm in &norms {
            let value_type = self
                .fields
                .iter()
                .zip(&indices)
                .find(|(f, _)| f.norm == *norm)
                .and_then(|(_, &i)| input.value_meta(i))
                .map(|m| m.value_type)
                .unwrap_or(ValueType::String);
            meta.add_value_meta(ValueMeta::new(*norm, value_type))?;
        }

        let groups = values
            .iter()
            .map(|value| {
                let columns = norms
                    .iter()
                    .map(|norm| {
                        self.fields
                            .iter()
                            .zip(&indices)
                            .find(|(f, _)| f.value == *value && f.norm == *norm)
                            .map(|(_, &i)| i)
                    })
                    .collect();
                (value.to_string(), columns)
            })
            .collect();

        Ok(Layout {
            meta: Arc::new(meta),
            kept,
            groups,
        })
    }
}

impl TransformLogic for Normaliser {
    fn process_row(&mut self, io: &mut TransformIo) -> Result<Flow> {
        let Some((input_meta, row)) = io.get_row()? else {
            return Ok(Flow::Finished);
        };

        if self.layout.is_none() {
            self.name = io.name().to_string();
            self.layout = Some(self.build_layout(&input_meta)?);
        }
        let Some(layout) = &self.layout else {
            return Ok(Flow::Finished);
        };

        for (value, columns) in &layout.groups {
            let mut out = Row::with_capacity(layout.meta.len());
            for &index in &layout.kept {
                out.push(row.get(index).cloned().unwrap_or_default());
            }
            out.push(Value::from(value.as_str()));
            for column in columns {
                out.push(
                    column
                        .and_then(|index| row.get(index).cloned())
                        .unwrap_or_default(),
                );
            }
            io.put_row(&layout.meta, out)?;
        }
        Ok(Flow::Continue)
    }
}
