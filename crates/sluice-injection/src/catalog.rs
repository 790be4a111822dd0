//! Injectable field descriptors.

use sluice_types::{Value, ValueType};

/// Writes a coerced value into the target at a group index (0 for plain keys).
pub type Setter<T> = fn(&mut T, usize, Value);

/// Reads the current value at a group index, or `None` when out of range.
pub type Getter<T> = fn(&T, usize) -> Option<Value>;

/// Current number of entries in a group.
pub type Len<T> = fn(&T) -> usize;

/// Resizes a group to hold at least the given number of entries.
pub type Grow<T> = fn(&mut T, usize);

/// A configuration type whose fields can be populated by metadata injection.
pub trait Injectable: Sized {
    fn catalog() -> InjectionCatalog<Self>;
}

/// A repeated section of a configuration object (a list of field specs, say).
pub struct InjectionGroup<T> {
    pub name: &'static str,
    pub len: Len<T>,
    pub grow: Grow<T>,
}

/// One injectable field.
pub struct InjectionKey<T> {
    pub name: &'static str,
    /// Group this key belongs to; indexed keys address one entry of it.
    pub group: Option<&'static str>,
    pub value_type: ValueType,
    pub setter: Setter<T>,
    pub getter: Getter<T>,
}

/// Every injectable key and group of a configuration type, in declaration order.
pub struct InjectionCatalog<T> {
    groups: Vec<InjectionGroup<T>>,
    keys: Vec<InjectionKey<T>>,
}

impl<T> InjectionCatalog<T> {
    pub fn new() -> Self {
        Self {
            groups: Vec::new(),
            keys: Vec::new(),
        }
    }

    /// Declare a repeated group.
    pub fn group(mut self, name: &'static str, len: Len<T>, grow: Grow<T>) -> Self {
        self.groups.push(InjectionGroup { name, len, grow });
        self
    }

    /// Declare a plain (non-indexed) key.
    pub fn key(
        mut self,
        name: &'static str,
        value_type: ValueType,
        setter: Setter<T>,
        getter: Getter<T>,
    ) -> Self {
        self.keys.push(InjectionKey {
            name,
            group: None,
            value_type,
            setter,
            getter,
        });
        self
    }

    /// Declare a key that addresses one entry of `group`.
    pub fn group_key(
        mut self,
        group: &'static str,
        name: &'static str,
        value_type: ValueType,
        setter: Setter<T>,
        getter: Getter<T>,
    ) -> Self {
        self.keys.push(InjectionKey {
            name,
            group: Some(group),
            value_type,
            setter,
            getter,
        });
        self
    }

    pub fn find_key(&self, name: &str) -> Option<&InjectionKey<T>> {
        self.keys.iter().find(|k| k.name == name)
    }

    pub fn find_group(&self, name: &str) -> Option<&InjectionGroup<T>> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn keys(&self) -> &[InjectionKey<T>] {
        &self.keys
    }

    pub fn groups(&self) -> &[InjectionGroup<T>] {
        &self.groups
    }

    /// Names of all declared keys, in declaration order.
    pub fn key_names(&self) -> Vec<&'static str> {
        self.keys.iter().map(|k| k.name).collect()
    }
}

impl<T> Default for InjectionCatalog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for InjectionCatalog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectionCatalog")
            .field("groups", &self.groups.iter().map(|g| g.name).collect::<Vec<_>>())
            .field("keys", &self.key_names())
            .finish()
    }
}
