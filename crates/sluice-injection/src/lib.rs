//! Metadata injection for Sluice.
//!
//! A configuration type opts in by implementing [`Injectable`], which
//! describes its injectable fields as an [`InjectionCatalog`]: plain keys
//! (`ROW_LIMIT`) and keys that belong to a repeated group (`FIELDS` →
//! `NAME`, `VALUE`, ...). The engine then sets those fields from rows of
//! key/value pairs, coercing each value to the key's declared type.
//!
//! Groups grow on demand to fit the index being written and are never
//! truncated.

pub mod catalog;
pub mod engine;
pub mod error;

pub use catalog::{
    Getter, Grow, Injectable, InjectionCatalog, InjectionGroup, InjectionKey, Len, Setter,
};
pub use engine::{MAX_GROUP_LEN, extract, inject, inject_from_row_meta, inject_rows};
pub use error::{InjectionError, Result};
