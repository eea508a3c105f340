//! Binding registry: exact bindings, predicate bindings and implicit
//! self-construction.

use std::sync::Arc;

use crate::binding::{BindingRecord, Selector, TypePredicate};
use crate::error::{DiError, DiResult};
use crate::key::{BindingKey, TypeQuery};
use crate::matcher::KeyMap;

/// All registered bindings of a container.
///
/// Exact bindings live in a [`KeyMap`]; predicate bindings are kept in
/// registration order and only consulted after every exact fallback
/// missed.
#[derive(Default)]
pub struct Registry {
    exact: KeyMap<Arc<BindingRecord>>,
    predicates: Vec<(TypePredicate, Arc<BindingRecord>)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a normalized binding.
    ///
    /// An exact binding replaces any previous binding under the same key;
    /// a predicate binding is appended after the existing ones.
    pub fn insert(&mut self, selector: Selector, name: Option<String>, record: BindingRecord) {
        let record = Arc::new(record);
        match selector {
            Selector::Type(ty) => {
                self.exact.insert(
                    BindingKey {
                        ty: Some(ty),
                        name,
                    },
                    record,
                );
            }
            Selector::Absent => {
                self.exact.insert(BindingKey { ty: None, name }, record);
            }
            Selector::Predicate(predicate) => self.predicates.push((predicate, record)),
        }
    }

    /// Picks the binding for a request and the key its instance is cached
    /// under.
    ///
    /// Order: the layered exact lookup, then predicates in registration
    /// order, then implicit self-construction when `implicit` is set. The
    /// last two only apply to single-type requests and use the key
    /// `(requested, None)`.
    pub fn find_binding(
        &self,
        query: &TypeQuery,
        name: Option<&str>,
        implicit: bool,
    ) -> DiResult<(Arc<BindingRecord>, BindingKey)> {
        if let Some((record, key)) = self.exact.find_match(query, name) {
            return Ok((record.clone(), key));
        }

        let not_found = || DiError::NoBindingFound {
            type_name: query.to_string(),
            name: name.map(str::to_owned),
        };
        let ty = match query {
            TypeQuery::Type(ty) => *ty,
            _ => return Err(not_found()),
        };
        let key = BindingKey::new(Some(ty), None);

        if let Some((_, record)) = self.predicates.iter().find(|(predicate, _)| predicate(&ty)) {
            return Ok((record.clone(), key));
        }

        if implicit {
            if let Some(record) = ty.self_binding() {
                return Ok((Arc::new(record), key));
            }
        }

        Err(not_found())
    }

    pub fn exact_count(&self) -> usize {
        self.exact.len()
    }

    pub fn predicate_count(&self) -> usize {
        self.predicates.len()
    }

    pub fn len(&self) -> usize {
        self.exact_count() + self.predicate_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
