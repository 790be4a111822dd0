//! Typed cell values and their type tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Declared type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ValueType {
    /// Stable lower-case name, as used in configuration and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
        }
    }

    /// Parse text into a value of this type.
    ///
    /// Empty text yields [`Value::Null`] for every type except `String`.
    pub fn parse(&self, text: &str) -> Result<Value, TypeError> {
        let conversion = || TypeError::Conversion {
            value: text.to_string(),
            target: self.as_str().to_string(),
        };

        match self {
            ValueType::String => Ok(Value::String(text.to_string())),
            _ if text.trim().is_empty() => Ok(Value::Null),
            ValueType::Integer => text
                .trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| conversion()),
            ValueType::Number => text
                .trim()
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| conversion()),
            ValueType::Boolean => parse_bool(text).map(Value::Boolean).ok_or_else(conversion),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" | "str" => Ok(ValueType::String),
            "integer" | "int" => Ok(ValueType::Integer),
            "number" | "float" => Ok(ValueType::Number),
            "boolean" | "bool" => Ok(ValueType::Boolean),
            _ => Err(TypeError::Conversion {
                value: s.to_string(),
                target: "value type".to_string(),
            }),
        }
    }
}

/// Accepts `Y/N`, `true/false`, `yes/no` and `1/0`, case-insensitively.
fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Some(true),
        "n" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// A single typed cell of a [`Row`](crate::Row).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type tag of this value, or `None` for `Null`.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Value::Null => None,
            Value::String(_) => Some(ValueType::String),
            Value::Integer(_) => Some(ValueType::Integer),
            Value::Number(_) => Some(ValueType::Number),
            Value::Boolean(_) => Some(ValueType::Boolean),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Coerce this value to `target`.
    ///
    /// Strings are parsed; numeric types widen or truncate where lossless
    /// enough to be unsurprising (`Integer` → `Number`, whole `Number` →
    /// `Integer`). `Null` stays `Null`.
    pub fn convert(&self, target: ValueType) -> Result<Value, TypeError> {
        let mismatch = || TypeError::Conversion {
            value: self.to_string(),
            target: target.as_str().to_string(),
        };

        match (self, target) {
            (Value::Null, _) => Ok(Value::Null),
            (Value::String(s), t) => t.parse(s),
            (v, ValueType::String) => Ok(Value::String(v.to_string())),
            (Value::Integer(i), ValueType::Integer) => Ok(Value::Integer(*i)),
            (Value::Integer(i), ValueType::Number) => Ok(Value::Number(*i as f64)),
            (Value::Integer(i), ValueType::Boolean) => match *i {
                0 => Ok(Value::Boolean(false)),
                1 => Ok(Value::Boolean(true)),
                _ => Err(mismatch()),
            },
            (Value::Number(n), ValueType::Number) => Ok(Value::Number(*n)),
            (Value::Number(n), ValueType::Integer) if n.fract() == 0.0 => {
                Ok(Value::Integer(*n as i64))
            }
            (Value::Boolean(b), ValueType::Boolean) => Ok(Value::Boolean(*b)),
            _ => Err(mismatch()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::String(s) => f.write_str(s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Number(n) => write!(f, "{}", n),
            Value::Boolean(b) => f.write_str(if *b { "Y" } else { "N" }),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}
