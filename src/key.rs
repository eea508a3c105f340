//! Type tokens, type queries and binding keys.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::binding::{BindingRecord, Factory};
use crate::instance::Injectable;

/// Type-erased Arc for storage
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Produces the implicit self-construction record of an instantiable type.
pub(crate) type SelfConstructor = fn() -> BindingRecord;

/// Runtime token for a requested or bound type.
///
/// A `Type` is identified by its `TypeId`; the type name is kept for
/// diagnostics and predicate matching. Types implementing [`Injectable`]
/// additionally carry a self-constructor, which makes them usable as their
/// own factory when nothing else is bound for them.
///
/// # Examples
///
/// ```rust
/// use dibox::Type;
///
/// struct DbConfig;
///
/// let ty = Type::of::<DbConfig>();
/// assert_eq!(ty.short_name(), "DbConfig");
/// assert!(ty.is::<DbConfig>());
/// assert!(!ty.is_instantiable());
/// assert_eq!(ty, Type::of::<DbConfig>());
/// ```
#[derive(Clone, Copy)]
pub struct Type {
    id: TypeId,
    name: &'static str,
    ctor: Option<SelfConstructor>,
}

impl Type {
    /// Token for any `'static` type, including trait objects.
    ///
    /// The resulting token is not instantiable.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            ctor: None,
        }
    }

    /// Token for an [`Injectable`] type, carrying its self-constructor.
    pub fn injectable<T: Injectable>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            ctor: Some(self_construction::<T>),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name as reported by `std::any::type_name`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name without module path or generic arguments.
    ///
    /// ```rust
    /// use dibox::Type;
    ///
    /// assert_eq!(Type::of::<Vec<String>>().short_name(), "Vec");
    /// assert_eq!(Type::of::<u32>().short_name(), "u32");
    /// ```
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }

    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Whether the type can construct itself without an explicit binding.
    pub fn is_instantiable(&self) -> bool {
        self.ctor.is_some()
    }

    pub(crate) fn self_binding(&self) -> Option<BindingRecord> {
        self.ctor.map(|ctor| ctor())
    }
}

fn self_construction<T: Injectable>() -> BindingRecord {
    BindingRecord::from_factory(Factory::from_injectable::<T>(), Vec::new())
}

// Identity is the TypeId alone: a token built with `of` and one built with
// `injectable` for the same type are the same key.
impl PartialEq for Type {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Type {}

impl Hash for Type {
    #[inline(always)]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Type").field(&self.name).finish()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// The type axis of a request.
///
/// A query is either absent, a single type, or an ordered union of
/// candidate types. Union candidates are tried in their declared order.
///
/// ```rust
/// use dibox::{Type, TypeQuery};
///
/// struct Foo;
/// struct Bar;
///
/// let query = TypeQuery::union([Type::of::<Foo>(), Type::of::<Bar>()]);
/// assert!(query.is_union());
/// assert_eq!(query.candidates().len(), 2);
///
/// // A union of one collapses to the type itself
/// assert_eq!(TypeQuery::union([Type::of::<Foo>()]), TypeQuery::of::<Foo>());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeQuery {
    /// No type requested
    #[default]
    Absent,
    /// A single concrete type
    Type(Type),
    /// Ordered candidate types
    Union(Vec<Type>),
}

impl TypeQuery {
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeQuery::Type(Type::of::<T>())
    }

    pub fn injectable<T: Injectable>() -> Self {
        TypeQuery::Type(Type::injectable::<T>())
    }

    /// Builds a union query; empty unions are absent and single-member
    /// unions collapse to that member.
    pub fn union(types: impl IntoIterator<Item = Type>) -> Self {
        let mut members: Vec<Type> = Vec::new();
        for ty in types {
            if !members.contains(&ty) {
                members.push(ty);
            }
        }
        match members.len() {
            0 => TypeQuery::Absent,
            1 => TypeQuery::Type(members[0]),
            _ => TypeQuery::Union(members),
        }
    }

    /// Candidates to try in order; `None` stands for the absent type.
    pub fn candidates(&self) -> Vec<Option<&Type>> {
        match self {
            TypeQuery::Absent => vec![None],
            TypeQuery::Type(ty) => vec![Some(ty)],
            TypeQuery::Union(types) => types.iter().map(Some).collect(),
        }
    }

    /// The requested type when the query names exactly one.
    pub fn concrete(&self) -> Option<&Type> {
        match self {
            TypeQuery::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn is_union(&self) -> bool {
        matches!(self, TypeQuery::Union(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, TypeQuery::Absent)
    }
}

impl From<Type> for TypeQuery {
    fn from(ty: Type) -> Self {
        TypeQuery::Type(ty)
    }
}

impl From<Option<Type>> for TypeQuery {
    fn from(ty: Option<Type>) -> Self {
        ty.map_or(TypeQuery::Absent, TypeQuery::Type)
    }
}

impl fmt::Display for TypeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeQuery::Absent => f.write_str("None"),
            TypeQuery::Type(ty) => f.write_str(ty.name()),
            TypeQuery::Union(types) => {
                let names: Vec<&str> = types.iter().map(Type::name).collect();
                f.write_str(&names.join(" | "))
            }
        }
    }
}

/// Key for binding and instance storage.
///
/// Both components may be absent and absence is itself a matchable value:
/// `(None, Some("db"))` is a name-only binding, `(Some(T), None)` a
/// type-only one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    pub ty: Option<Type>,
    pub name: Option<String>,
}

impl BindingKey {
    pub fn new(ty: Option<Type>, name: Option<&str>) -> Self {
        Self {
            ty,
            name: name.map(str::to_owned),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.ty.as_ref().map_or("None", Type::name)
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})",
            self.type_name(),
            self.name.as_deref().unwrap_or("None")
        )
    }
}
