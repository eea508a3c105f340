//! Layered (type, name) lookup over binding keys.

use std::collections::HashMap;

use crate::key::{BindingKey, Type, TypeQuery};

/// Map keyed by [`BindingKey`] with the container's fallback lookup.
///
/// Lookup precedence for a single candidate type `C` and name `N`:
///
/// 1. exact `(C, N)`
/// 2. type-only `(C, None)` when `N` is present
/// 3. name-only `(None, N)` when `C` is present
///
/// Union queries run this for each candidate in declared order and stop at
/// the first hit.
///
/// # Examples
///
/// ```rust
/// use dibox::{BindingKey, KeyMap, Type, TypeQuery};
///
/// struct Bar;
/// struct Rando;
///
/// let mut map = KeyMap::new();
/// map.insert(BindingKey::new(Some(Type::of::<Bar>()), None), "bar/none");
/// map.insert(BindingKey::new(None, Some("arg")), "none/arg");
///
/// let (value, key) = map.find_match(&TypeQuery::of::<Bar>(), Some("other")).unwrap();
/// assert_eq!(*value, "bar/none");
/// assert_eq!(key, BindingKey::new(Some(Type::of::<Bar>()), None));
///
/// let (value, _) = map.find_match(&TypeQuery::of::<Rando>(), Some("arg")).unwrap();
/// assert_eq!(*value, "none/arg");
///
/// assert!(map.find_match(&TypeQuery::of::<Rando>(), Some("rando")).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct KeyMap<V> {
    entries: HashMap<BindingKey, V>,
}

impl<V> KeyMap<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Inserts a value, returning the one it replaced.
    pub fn insert(&mut self, key: BindingKey, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    pub fn get(&self, key: &BindingKey) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &BindingKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &BindingKey) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds the first matching entry and the key it was stored under.
    pub fn find_match(&self, query: &TypeQuery, name: Option<&str>) -> Option<(&V, BindingKey)> {
        query
            .candidates()
            .into_iter()
            .find_map(|candidate| self.find_single(candidate, name))
    }

    fn find_single(&self, ty: Option<&Type>, name: Option<&str>) -> Option<(&V, BindingKey)> {
        let exact = BindingKey::new(ty.copied(), name);
        if let Some(value) = self.entries.get(&exact) {
            return Some((value, exact));
        }
        if name.is_some() {
            let type_only = BindingKey::new(ty.copied(), None);
            if let Some(value) = self.entries.get(&type_only) {
                return Some((value, type_only));
            }
        }
        if ty.is_some() {
            let name_only = BindingKey::new(None, name);
            if let Some(value) = self.entries.get(&name_only) {
                return Some((value, name_only));
            }
        }
        None
    }
}

impl<V> Default for KeyMap<V> {
    fn default() -> Self {
        Self::new()
    }
}
