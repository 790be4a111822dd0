//! Generates a fixed number of identical rows (or an endless stream).

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sluice_config::Variables;
use sluice_injection::{Injectable, InjectionCatalog};
use sluice_types::{Row, RowMeta, Value, ValueMeta, ValueType};

use crate::error::{PipelineError, Result};
use crate::transform::{Flow, TransformIo, TransformLogic};

/// One constant output column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorField {
    pub name: String,
    /// Type name (`string`, `integer`, `number`, `boolean`), checked at init.
    pub field_type: String,
    pub value: String,
}

impl GeneratorField {
    pub fn new(name: impl Into<String>, value_type: ValueType, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: value_type.to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowGeneratorMeta {
    /// Number of rows; may reference variables (`${ROW_LIMIT}`).
    pub row_limit: String,
    /// Ignore the limit and produce rows until stopped.
    pub never_ending: bool,
    /// Pause between rows in milliseconds; may reference variables.
    pub interval_ms: String,
    pub fields: Vec<GeneratorField>,
}

impl Default for RowGeneratorMeta {
    fn default() -> Self {
        Self {
            row_limit: "10".to_string(),
            never_ending: false,
            interval_ms: "0".to_string(),
            fields: Vec::new(),
        }
    }
}

impl RowGeneratorMeta {
    pub fn with_limit(row_limit: impl Into<String>) -> Self {
        Self {
            row_limit: row_limit.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, field: GeneratorField) -> Self {
        self.fields.push(field);
        self
    }
}

fn text(value: Value) -> String {
    value.to_string()
}

impl Injectable for RowGeneratorMeta {
    fn catalog() -> InjectionCatalog<Self> {
        InjectionCatalog::<Self>::new()
            .key(
                "ROW_LIMIT",
                ValueType::String,
                |m, _, v| m.row_limit = text(v),
                |m, _| Some(Value::from(m.row_limit.as_str())),
            )
            .key(
                "NEVER_ENDING",
                ValueType::Boolean,
                |m, _, v| m.never_ending = v.as_bool().unwrap_or(false),
                |m, _| Some(Value::Boolean(m.never_ending)),
            )
            .key(
                "INTERVAL_IN_MS",
                ValueType::String,
                |m, _, v| m.interval_ms = text(v),
                |m, _| Some(Value::from(m.interval_ms.as_str())),
            )
            .group(
                "FIELDS",
                |m| m.fields.len(),
                |m, n| m.fields.resize_with(n, GeneratorField::default),
            )
            .group_key(
                "FIELDS",
                "FIELD_NAME",
                ValueType::String,
                |m, i, v| {
                    if let Some(f) = m.fields.get_mut(i) {
                        f.name = text(v);
                    }
                },
                |m, i| m.fields.get(i).map(|f| Value::from(f.name.as_str())),
            )
            .group_key(
                "FIELDS",
                "FIELD_TYPE",
                ValueType::String,
                |m, i, v| {
                    if let Some(f) = m.fields.get_mut(i) {
                        f.field_type = text(v);
                    }
                },
                |m, i| m.fields.get(i).map(|f| Value::from(f.field_type.as_str())),
            )
            .group_key(
                "FIELDS",
                "FIELD_VALUE",
                ValueType::String,
                |m, i, v| {
                    if let Some(f) = m.fields.get_mut(i) {
                        f.value = text(v);
                    }
                },
                |m, i| m.fields.get(i).map(|f| Value::from(f.value.as_str())),
            )
    }
}

/// Runtime state of a row generator.
#[derive(Debug)]
pub struct RowGenerator {
    limit: u64,
    never_ending: bool,
    interval: Duration,
    meta: Arc<RowMeta>,
    row: Row,
    produced: u64,
}

impl RowGenerator {
    /// Resolve the configuration: limit and interval through `variables`,
    /// field values into typed constants.
    pub fn new(config: &RowGeneratorMeta, variables: &Variables) -> Result<Self> {
        let limit = parse_count("row limit", &variables.resolve(&config.row_limit)?)?;
        let interval = parse_count("interval", &variables.resolve(&config.interval_ms)?)?;

        let mut meta = RowMeta::new();
        let mut row = Row::with_capacity(config.fields.len());
        for field in &config.fields {
            let value_type: ValueType = field.field_type.parse().map_err(|_| {
                PipelineError::Configuration(format!(
                    "field '{}' has unknown type '{}'",
                    field.name, field.field_type
                ))
            })?;
            let value = value_type.parse(&field.value).map_err(|e| {
                PipelineError::Configuration(format!("field '{}': {}", field.name, e))
            })?;
            meta.add_value_meta(ValueMeta::new(&field.name, value_type))
                .map_err(|e| PipelineError::Configuration(e.to_string()))?;
            row.push(value);
        }

        Ok(Self {
            limit,
            never_ending: config.never_ending,
            interval: Duration::from_millis(interval),
            meta: Arc::new(meta),
            row,
            produced: 0,
        })
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn row_meta(&self) -> &Arc<RowMeta> {
        &self.meta
    }
}

fn parse_count(what: &str, text: &str) -> Result<u64> {
    text.trim().parse().map_err(|_| {
        PipelineError::Configuration(format!("{} '{}' is not a non-negative integer", what, text))
    })
}

impl TransformLogic for RowGenerator {
    fn process_row(&mut self, io: &mut TransformIo) -> Result<Flow> {
        if !self.never_ending && self.produced >= self.limit {
            return Ok(Flow::Finished);
        }
        if self.produced > 0 && !self.interval.is_zero() {
            std::thread::sleep(self.interval);
        }
        io.put_row(&self.meta, self.row.clone())?;
        self.produced += 1;
        Ok(Flow::Continue)
    }
}
