//! Applying metadata rows to an [`Injectable`] target.

use sluice_types::{Row, RowMeta, Value};
use tracing::debug;

use crate::catalog::{Injectable, InjectionCatalog, InjectionKey};
use crate::error::{InjectionError, Result};

/// Largest number of entries a group is grown to.
pub const MAX_GROUP_LEN: usize = 1 << 16;

/// Set one field. `index` selects the group entry for grouped keys and is
/// ignored for plain keys. The group grows to `index + 1` entries if needed,
/// up to [`MAX_GROUP_LEN`].
pub fn inject<T: Injectable>(target: &mut T, key: &str, index: usize, value: Value) -> Result<()> {
    let catalog = T::catalog();
    apply(&catalog, target, key, index, value)
}

/// Apply rows of key/value pairs: row `i` feeds entry `i` of every group it
/// touches. Plain keys are applied in row order, so the last row wins.
pub fn inject_rows<T, R, K>(target: &mut T, rows: impl IntoIterator<Item = R>) -> Result<()>
where
    T: Injectable,
    R: IntoIterator<Item = (K, Value)>,
    K: AsRef<str>,
{
    let catalog = T::catalog();
    for (index, row) in rows.into_iter().enumerate() {
        for (key, value) in row {
            apply(&catalog, target, key.as_ref(), index, value)?;
        }
    }
    Ok(())
}

/// Apply tabular metadata: each column name is a key, row `i` feeds group entry `i`.
pub fn inject_from_row_meta<T: Injectable>(
    target: &mut T,
    row_meta: &RowMeta,
    rows: &[Row],
) -> Result<()> {
    let catalog = T::catalog();

    // Reject unknown columns before touching the target.
    for name in row_meta.field_names() {
        if catalog.find_key(name).is_none() {
            return Err(InjectionError::NoSuchField(name.to_string()));
        }
    }

    for (index, row) in rows.iter().enumerate() {
        if row.len() != row_meta.len() {
            return Err(InjectionError::RowShape {
                row: index,
                expected: row_meta.len(),
                actual: row.len(),
            });
        }
        for (meta, value) in row_meta.fields().iter().zip(row.values()) {
            apply(&catalog, target, &meta.name, index, value.clone())?;
        }
    }
    Ok(())
}

/// Read the current value of a field, `None` if the group entry does not exist.
pub fn extract<T: Injectable>(target: &T, key: &str, index: usize) -> Result<Option<Value>> {
    let catalog = T::catalog();
    let key = lookup(&catalog, key)?;
    let index = if key.group.is_some() { index } else { 0 };
    Ok((key.getter)(target, index))
}

fn lookup<'c, T>(catalog: &'c InjectionCatalog<T>, key: &str) -> Result<&'c InjectionKey<T>> {
    catalog
        .find_key(key)
        .ok_or_else(|| InjectionError::NoSuchField(key.to_string()))
}

fn apply<T>(
    catalog: &InjectionCatalog<T>,
    target: &mut T,
    key: &str,
    index: usize,
    value: Value,
) -> Result<()> {
    let field = lookup(catalog, key)?;

    let coerced = value
        .convert(field.value_type)
        .map_err(|_| InjectionError::TypeMismatch {
            field: field.name.to_string(),
            value: value.to_string(),
            expected: field.value_type.to_string(),
        })?;

    let index = match field.group {
        Some(group_name) => {
            let group = catalog
                .find_group(group_name)
                .ok_or_else(|| InjectionError::UnknownGroup {
                    field: field.name.to_string(),
                    group: group_name.to_string(),
                })?;
            if (group.len)(target) <= index {
                let size = index
                    .checked_add(1)
                    .filter(|size| *size <= MAX_GROUP_LEN)
                    .ok_or_else(|| InjectionError::IndexOutOfRange {
                        field: field.name.to_string(),
                        index,
                        limit: MAX_GROUP_LEN,
                    })?;
                debug!(group = group_name, size, "growing injection group");
                (group.grow)(target, size);
            }
            index
        }
        None => 0,
    };

    debug!(key = field.name, index, "injecting metadata value");
    (field.setter)(target, index, coerced);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_types::{ValueMeta, ValueType};

    #[derive(Debug, Default)]
    struct SplitMeta {
        limit: i64,
        strict: bool,
        parts: Vec<Part>,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Part {
        name: String,
        value: String,
        norm: String,
    }

    fn text(value: Value) -> String {
        value.to_string()
    }

    impl Injectable for SplitMeta {
        fn catalog() -> InjectionCatalog<Self> {
            InjectionCatalog::<Self>::new()
                .key(
                    "LIMIT",
                    ValueType::Integer,
                    |m, _, v| m.limit = v.as_i64().unwrap_or_default(),
                    |m, _| Some(Value::Integer(m.limit)),
                )
                .key(
                    "STRICT",
                    ValueType::Boolean,
                    |m, _, v| m.strict = v.as_bool().unwrap_or_default(),
                    |m, _| Some(Value::Boolean(m.strict)),
                )
                .group(
                    "PARTS",
                    |m| m.parts.len(),
                    |m, n| m.parts.resize_with(n, Part::default),
                )
                .group_key(
                    "PARTS",
                    "NAME",
                    ValueType::String,
                    |m, i, v| {
                        if let Some(p) = m.parts.get_mut(i) {
                            p.name = text(v);
                        }
                    },
                    |m, i| m.parts.get(i).map(|p| Value::from(p.name.as_str())),
                )
                .group_key(
                    "PARTS",
                    "VALUE",
                    ValueType::String,
                    |m, i, v| {
                        if let Some(p) = m.parts.get_mut(i) {
                            p.value = text(v);
                        }
                    },
                    |m, i| m.parts.get(i).map(|p| Value::from(p.value.as_str())),
                )
                .group_key(
                    "PARTS",
                    "NORMALISED",
                    ValueType::String,
                    |m, i, v| {
                        if let Some(p) = m.parts.get_mut(i) {
                            p.norm = text(v);
                        }
                    },
                    |m, i| m.parts.get(i).map(|p| Value::from(p.norm.as_str())),
                )
        }
    }

    #[test]
    fn test_inject_into_empty_group_grows_it() {
        let mut meta = SplitMeta::default();
        inject(&mut meta, "NAME", 0, "a".into()).unwrap();
        inject(&mut meta, "VALUE", 0, "b".into()).unwrap();
        inject(&mut meta, "NORMALISED", 0, "n".into()).unwrap();

        assert_eq!(meta.parts.len(), 1);
        assert_eq!(
            meta.parts[0],
            Part {
                name: "a".into(),
                value: "b".into(),
                norm: "n".into()
            }
        );
    }

    #[test]
    fn test_inject_sparse_index_fills_gap() {
        let mut meta = SplitMeta::default();
        inject(&mut meta, "NAME", 2, "third".into()).unwrap();
        assert_eq!(meta.parts.len(), 3);
        assert_eq!(meta.parts[2].name, "third");
        assert_eq!(meta.parts[0], Part::default());
    }

    #[test]
    fn test_group_is_never_truncated() {
        let mut meta = SplitMeta {
            parts: vec![Part::default(); 4],
            ..Default::default()
        };
        inject(&mut meta, "VALUE", 1, "x".into()).unwrap();
        assert_eq!(meta.parts.len(), 4);
        assert_eq!(meta.parts[1].value, "x");
    }

    #[test]
    fn test_index_past_group_limit_is_rejected() {
        let mut meta = SplitMeta::default();
        for index in [usize::MAX, MAX_GROUP_LEN] {
            let err = inject(&mut meta, "NAME", index, "a".into()).unwrap_err();
            assert!(matches!(
                err,
                InjectionError::IndexOutOfRange { ref field, index: i, .. } if field == "NAME" && i == index
            ));
        }
        assert!(meta.parts.is_empty());

        inject(&mut meta, "NAME", MAX_GROUP_LEN - 1, "last".into()).unwrap();
        assert_eq!(meta.parts.len(), MAX_GROUP_LEN);
    }

    #[test]
    fn test_plain_key_coerces_string() {
        let mut meta = SplitMeta::default();
        inject(&mut meta, "LIMIT", 0, "1440".into()).unwrap();
        inject(&mut meta, "STRICT", 0, "Y".into()).unwrap();
        assert_eq!(meta.limit, 1440);
        assert!(meta.strict);
    }

    #[test]
    fn test_unknown_key() {
        let mut meta = SplitMeta::default();
        let err = inject(&mut meta, "BOGUS", 0, "1".into()).unwrap_err();
        assert_eq!(err, InjectionError::NoSuchField("BOGUS".into()));
    }

    #[test]
    fn test_type_mismatch_names_field_and_value() {
        let mut meta = SplitMeta::default();
        let err = inject(&mut meta, "LIMIT", 0, "lots".into()).unwrap_err();
        match err {
            InjectionError::TypeMismatch { field, value, .. } => {
                assert_eq!(field, "LIMIT");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(meta.limit, 0);
    }

    #[test]
    fn test_inject_rows_indexes_by_row() {
        let mut meta = SplitMeta::default();
        inject_rows(
            &mut meta,
            [
                vec![("NAME", Value::from("pr_sl")), ("VALUE", Value::from("Product1"))],
                vec![("NAME", Value::from("pr_sh")), ("VALUE", Value::from("Product2"))],
            ],
        )
        .unwrap();

        assert_eq!(meta.parts.len(), 2);
        assert_eq!(meta.parts[1].name, "pr_sh");
        assert_eq!(meta.parts[1].value, "Product2");
    }

    #[test]
    fn test_inject_from_row_meta() {
        let row_meta = RowMeta::from_fields([
            ValueMeta::new("NAME", ValueType::String),
            ValueMeta::new("NORMALISED", ValueType::String),
        ])
        .unwrap();
        let rows = vec![
            Row::new(vec!["pr_sl".into(), "sales".into()]),
            Row::new(vec!["pr_sh".into(), "ships".into()]),
        ];

        let mut meta = SplitMeta::default();
        inject_from_row_meta(&mut meta, &row_meta, &rows).unwrap();
        assert_eq!(meta.parts[0].norm, "sales");
        assert_eq!(meta.parts[1].name, "pr_sh");
    }

    #[test]
    fn test_inject_from_row_meta_rejects_unknown_column_untouched() {
        let row_meta = RowMeta::from_fields([
            ValueMeta::new("NAME", ValueType::String),
            ValueMeta::new("COLOUR", ValueType::String),
        ])
        .unwrap();
        let rows = vec![Row::new(vec!["a".into(), "red".into()])];

        let mut meta = SplitMeta::default();
        let err = inject_from_row_meta(&mut meta, &row_meta, &rows).unwrap_err();
        assert!(matches!(err, InjectionError::NoSuchField(ref k) if k == "COLOUR"));
        assert!(meta.parts.is_empty());
    }

    #[test]
    fn test_extract() {
        let mut meta = SplitMeta::default();
        inject(&mut meta, "NAME", 0, "a".into()).unwrap();
        assert_eq!(extract(&meta, "NAME", 0).unwrap(), Some(Value::from("a")));
        assert_eq!(extract(&meta, "NAME", 5).unwrap(), None);
        assert_eq!(extract(&meta, "LIMIT", 9).unwrap(), Some(Value::Integer(0)));
        assert!(extract(&meta, "NOPE", 0).is_err());
    }
}
