//! Binding specs, factories and their canonical record form.
//!
//! Every way of registering a binding (implementation type, factory, async
//! factory, pre-built instance) is normalized into one [`BindingRecord`]:
//! an optional sync factory, an optional async factory and a static
//! parameter descriptor.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::instance::{Injectable, Instance, InstanceBuilder};
use crate::key::{AnyArc, Type, TypeQuery};

/// Boxed future used by async factories and recursive resolution.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type SyncFactoryFn = Arc<dyn Fn(Args) -> DiResult<Instance> + Send + Sync>;
type AsyncFactoryFn = Arc<dyn Fn(Args) -> BoxFuture<'static, DiResult<Instance>> + Send + Sync>;

/// Type predicate used by predicate bindings.
pub type TypePredicate = Arc<dyn Fn(&Type) -> bool + Send + Sync>;

/// What a factory parameter expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKind {
    /// No declared type; receives the matched type when it is the first
    /// parameter, otherwise it is never resolved.
    Untyped,
    /// Declared as "a type value"; receives the matched type when it is the
    /// first parameter.
    TypeArg,
    /// A dependency resolved from the container.
    Dependency(TypeQuery),
}

/// One entry of a factory's dependency descriptor.
///
/// # Examples
///
/// ```rust
/// use dibox::{Param, ParamKind, TypeQuery};
///
/// let port = Param::value::<u16>("port").optional();
/// assert!(!port.is_required());
/// assert_eq!(port.kind(), &ParamKind::Dependency(TypeQuery::of::<u16>()));
///
/// let ty = Param::type_arg("config_type");
/// assert_eq!(ty.kind(), &ParamKind::TypeArg);
/// ```
#[derive(Debug, Clone)]
pub struct Param {
    name: &'static str,
    kind: ParamKind,
    required: bool,
    variadic: bool,
}

impl Param {
    fn with_kind(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            variadic: false,
        }
    }

    /// Dependency on an [`Injectable`] type, which may be built implicitly.
    pub fn dependency<T: Injectable>(name: &'static str) -> Self {
        Self::with_kind(name, ParamKind::Dependency(TypeQuery::injectable::<T>()))
    }

    /// Dependency on any bound value type.
    pub fn value<T: Send + Sync + 'static>(name: &'static str) -> Self {
        Self::with_kind(name, ParamKind::Dependency(TypeQuery::of::<T>()))
    }

    /// Dependency on a bound trait object.
    pub fn trait_object<T: ?Sized + Send + Sync + 'static>(name: &'static str) -> Self {
        Self::with_kind(name, ParamKind::Dependency(TypeQuery::of::<T>()))
    }

    /// Dependency described by an arbitrary query, e.g. a union.
    pub fn query(name: &'static str, query: TypeQuery) -> Self {
        Self::with_kind(name, ParamKind::Dependency(query))
    }

    pub fn untyped(name: &'static str) -> Self {
        Self::with_kind(name, ParamKind::Untyped)
    }

    pub fn type_arg(name: &'static str) -> Self {
        Self::with_kind(name, ParamKind::TypeArg)
    }

    /// Marks the parameter as having a default; the container leaves it alone.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Marks the parameter as variadic; the container leaves it alone.
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Whether this parameter can take the matched type as its value.
    pub(crate) fn accepts_type(&self) -> bool {
        matches!(self.kind, ParamKind::Untyped | ParamKind::TypeArg)
    }

    /// The query to resolve for this parameter, if the container should.
    pub(crate) fn resolvable(&self) -> Option<&TypeQuery> {
        match &self.kind {
            ParamKind::Dependency(query) if self.required && !self.variadic => Some(query),
            _ => None,
        }
    }
}

/// Named arguments handed to a factory.
///
/// Values are looked up by parameter name; a missing name surfaces as
/// [`DiError::MissingRequiredArgument`], a value of the wrong type as
/// [`DiError::TypeMismatch`].
pub struct Args {
    factory: &'static str,
    values: HashMap<String, AnyArc>,
}

impl Args {
    pub fn new(factory: &'static str) -> Self {
        Self {
            factory,
            values: HashMap::new(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: AnyArc) {
        self.values.insert(name.into(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Label of the factory these arguments are for.
    pub fn factory(&self) -> &'static str {
        self.factory
    }

    pub fn get_any(&self, name: &str) -> DiResult<AnyArc> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| DiError::MissingRequiredArgument {
                param: name.to_owned(),
                factory: self.factory,
            })
    }

    pub fn get<T: Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        self.get_any(name)?
            .downcast::<T>()
            .map_err(|_| self.mismatch::<T>(name))
    }

    /// Like [`get`](Self::get) but an absent argument is `None`.
    pub fn get_optional<T: Send + Sync + 'static>(&self, name: &str) -> DiResult<Option<Arc<T>>> {
        match self.values.get(name) {
            Some(value) => value
                .clone()
                .downcast::<T>()
                .map(Some)
                .map_err(|_| self.mismatch::<T>(name)),
            None => Ok(None),
        }
    }

    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        self.get_any(name)?
            .downcast::<Arc<T>>()
            .map(|boxed| (*boxed).clone())
            .map_err(|_| self.mismatch::<T>(name))
    }

    /// Clones a plain value out of its `Arc`, handy for bound settings.
    pub fn cloned<T: Clone + Send + Sync + 'static>(&self, name: &str) -> DiResult<T> {
        self.get::<T>(name).map(|value| (*value).clone())
    }

    /// The type bound to a type-argument parameter.
    pub fn type_arg(&self, name: &str) -> DiResult<Type> {
        self.cloned::<Type>(name)
    }

    fn mismatch<T: ?Sized>(&self, name: &str) -> DiError {
        DiError::TypeMismatch {
            expected: std::any::type_name::<T>(),
            param: name.to_owned(),
        }
    }
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Args")
            .field("factory", &self.factory)
            .field("names", &names)
            .finish()
    }
}

/// A factory callable together with its dependency descriptor.
///
/// # Examples
///
/// ```
/// use dibox::{Factory, Instance, Param};
///
/// struct Settings { url: String }
/// struct Client { url: String }
///
/// let sync = Factory::new([Param::value::<Settings>("settings")], |args| {
///     let settings = args.get::<Settings>("settings")?;
///     Ok(Instance::new(Client { url: settings.url.clone() }))
/// });
/// assert!(!sync.is_async());
///
/// let asynchronous = Factory::new_async([], |_args| async {
///     Ok(Instance::new(Client { url: "memory://".into() }))
/// });
/// assert!(asynchronous.is_async());
/// ```
#[derive(Clone)]
pub struct Factory {
    label: &'static str,
    params: Vec<Param>,
    sync: Option<SyncFactoryFn>,
    asynchronous: Option<AsyncFactoryFn>,
}

impl Factory {
    /// Synchronous factory.
    pub fn new<F>(params: impl IntoIterator<Item = Param>, factory: F) -> Self
    where
        F: Fn(Args) -> DiResult<Instance> + Send + Sync + 'static,
    {
        Self {
            label: std::any::type_name::<F>(),
            params: params.into_iter().collect(),
            sync: Some(Arc::new(factory)),
            asynchronous: None,
        }
    }

    /// Asynchronous factory; it cannot be invoked synchronously.
    pub fn new_async<F, Fut>(params: impl IntoIterator<Item = Param>, factory: F) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DiResult<Instance>> + Send + 'static,
    {
        let factory: AsyncFactoryFn =
            Arc::new(move |args: Args| -> BoxFuture<'static, DiResult<Instance>> {
                Box::pin(factory(args))
            });
        Self {
            label: std::any::type_name::<F>(),
            params: params.into_iter().collect(),
            sync: None,
            asynchronous: Some(factory),
        }
    }

    /// Uses an [`Injectable`] type as its own factory.
    pub fn from_injectable<T: Injectable>() -> Self {
        Self::new(T::dependencies(), |args| {
            let value = T::construct(args)?;
            Ok(T::lifecycle(InstanceBuilder::new(value)).build())
        })
        .label(std::any::type_name::<T>())
    }

    /// Uses an [`Injectable`] type as the implementation of a trait object.
    pub fn from_injectable_as<T, S>(upcast: fn(Arc<T>) -> Arc<S>) -> Self
    where
        T: Injectable,
        S: ?Sized + Send + Sync + 'static,
    {
        Self::new(T::dependencies(), move |args| {
            let value = T::construct(args)?;
            Ok(T::lifecycle(InstanceBuilder::new(value)).build_as(upcast))
        })
        .label(std::any::type_name::<T>())
    }

    /// Overrides the label used in diagnostics and error messages.
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn is_async(&self) -> bool {
        self.sync.is_none() && self.asynchronous.is_some()
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("label", &self.label)
            .field("params", &self.params)
            .field("is_async", &self.is_async())
            .finish()
    }
}

/// Canonical internal form of a binding.
pub struct BindingRecord {
    label: &'static str,
    params: Vec<Param>,
    sync: Option<SyncFactoryFn>,
    asynchronous: Option<AsyncFactoryFn>,
    bound: Vec<(String, AnyArc)>,
}

impl BindingRecord {
    /// Normalizes a factory, partially applying `bound` arguments.
    ///
    /// Parameters covered by a bound argument become optional, so the
    /// container does not resolve them.
    pub(crate) fn from_factory(factory: Factory, bound: Vec<(String, AnyArc)>) -> Self {
        let params = factory
            .params
            .into_iter()
            .map(|param| {
                if bound.iter().any(|(name, _)| name == param.name) {
                    param.optional()
                } else {
                    param
                }
            })
            .collect();
        Self {
            label: factory.label,
            params,
            sync: factory.sync,
            asynchronous: factory.asynchronous,
            bound,
        }
    }

    /// Wraps a pre-built instance as a zero-parameter sync factory.
    pub(crate) fn from_instance(instance: Instance) -> Self {
        let label = instance.type_name();
        let factory: SyncFactoryFn = Arc::new(move |_: Args| -> DiResult<Instance> { Ok(instance.clone()) });
        Self {
            label,
            params: Vec::new(),
            sync: Some(factory),
            asynchronous: None,
            bound: Vec::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn is_async_only(&self) -> bool {
        self.sync.is_none()
    }

    /// Fresh argument set with the partially applied arguments filled in.
    pub fn prepare_args(&self) -> Args {
        let mut args = Args::new(self.label);
        for (name, value) in &self.bound {
            args.insert(name.clone(), value.clone());
        }
        args
    }

    /// Invokes the sync factory.
    pub fn call_sync(&self, args: Args) -> DiResult<Instance> {
        match &self.sync {
            Some(factory) => factory(args),
            None => Err(DiError::SyncCallOnAsyncFactory(self.label.to_owned())),
        }
    }

    /// Invokes the sync factory if present, otherwise awaits the async one.
    pub async fn call_async(&self, args: Args) -> DiResult<Instance> {
        if self.sync.is_some() {
            return self.call_sync(args);
        }
        match &self.asynchronous {
            Some(factory) => factory(args).await,
            None => Err(DiError::Factory(format!(
                "no factory function is available for {}",
                self.label
            ))),
        }
    }
}

impl fmt::Debug for BindingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRecord")
            .field("label", &self.label)
            .field("params", &self.params)
            .field("is_async_only", &self.is_async_only())
            .field("bound", &self.bound.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

/// A generic binding target.
#[derive(Debug, Clone)]
pub enum Target {
    /// Something callable: a factory or an implementation type.
    Factory(Factory),
    /// A pre-built value.
    Instance(Instance),
}

impl Target {
    /// An [`Injectable`] implementation type.
    pub fn implementation<T: Injectable>() -> Self {
        Target::Factory(Factory::from_injectable::<T>())
    }

    /// An [`Injectable`] implementation of a trait object.
    pub fn implementation_as<T, S>(upcast: fn(Arc<T>) -> Arc<S>) -> Self
    where
        T: Injectable,
        S: ?Sized + Send + Sync + 'static,
    {
        Target::Factory(Factory::from_injectable_as(upcast))
    }
}

impl From<Factory> for Target {
    fn from(factory: Factory) -> Self {
        Target::Factory(factory)
    }
}

impl From<Instance> for Target {
    fn from(instance: Instance) -> Self {
        Target::Instance(instance)
    }
}

/// Which requests a binding applies to.
#[derive(Clone)]
pub enum Selector {
    /// A concrete type.
    Type(Type),
    /// The absent type; used for name-only bindings.
    Absent,
    /// Any requested type the predicate accepts.
    Predicate(TypePredicate),
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Type(ty) => f.debug_tuple("Type").field(ty).finish(),
            Selector::Absent => f.write_str("Absent"),
            Selector::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Builder for a `bind` call.
///
/// Pick a selector, optionally a name, then exactly one of
/// [`to`](Self::to), [`factory`](Self::factory) or
/// [`instance`](Self::instance). Extra [`arg`](Self::arg)s are partially
/// applied to the factory.
///
/// # Examples
///
/// ```
/// use dibox::{Bind, Factory, Instance, Target};
///
/// struct Database { url: String }
///
/// // Named instance binding
/// let primary = Bind::ty::<Database>()
///     .name("primary")
///     .instance(Instance::new(Database { url: "postgres://primary".into() }));
///
/// // Predicate binding
/// let configs = Bind::predicate(|ty| ty.short_name().ends_with("Config"))
///     .factory(Factory::new([], |_| Ok(Instance::new(()))));
/// ```
#[derive(Debug)]
pub struct Bind {
    selector: Selector,
    name: Option<String>,
    target: Option<Target>,
    factory: Option<Factory>,
    instance: Option<Instance>,
    args: Vec<(String, AnyArc)>,
}

impl Bind {
    pub fn selector(selector: Selector) -> Self {
        Self {
            selector,
            name: None,
            target: None,
            factory: None,
            instance: None,
            args: Vec::new(),
        }
    }

    /// Binds a concrete type or trait object.
    pub fn ty<T: ?Sized + 'static>() -> Self {
        Self::selector(Selector::Type(Type::of::<T>()))
    }

    /// Binds the absent type; combine with [`name`](Self::name).
    pub fn untyped() -> Self {
        Self::selector(Selector::Absent)
    }

    /// Name-only binding.
    pub fn named(name: impl Into<String>) -> Self {
        Self::untyped().name(name)
    }

    pub fn predicate<P>(predicate: P) -> Self
    where
        P: Fn(&Type) -> bool + Send + Sync + 'static,
    {
        Self::selector(Selector::Predicate(Arc::new(predicate)))
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn to(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn factory(mut self, factory: Factory) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn instance(mut self, instance: Instance) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Partially applies a named argument to the factory.
    pub fn arg<V: Send + Sync + 'static>(mut self, name: impl Into<String>, value: V) -> Self {
        self.args.push((name.into(), Arc::new(value)));
        self
    }

    /// Validates the spec and produces its canonical record.
    pub(crate) fn normalize(self) -> DiResult<(Selector, Option<String>, BindingRecord)> {
        let supplied = [
            self.target.is_some(),
            self.factory.is_some(),
            self.instance.is_some(),
        ]
        .into_iter()
        .filter(|supplied| *supplied)
        .count();
        if supplied == 0 {
            return Err(DiError::AmbiguousBindingSpec(
                "either target, factory, or instance must be provided",
            ));
        }
        if supplied > 1 {
            return Err(DiError::AmbiguousBindingSpec(
                "exactly one of target, factory, or instance must be provided",
            ));
        }
        if matches!(self.selector, Selector::Predicate(_)) && self.name.is_some() {
            return Err(DiError::AmbiguousBindingSpec(
                "argname is not allowed when binding a predicate",
            ));
        }

        let record = match (self.target, self.factory, self.instance) {
            (Some(Target::Factory(factory)), _, _) | (_, Some(factory), _) => {
                BindingRecord::from_factory(factory, self.args)
            }
            (Some(Target::Instance(instance)), _, _) | (_, _, Some(instance)) => {
                if !self.args.is_empty() {
                    return Err(DiError::AmbiguousBindingSpec(
                        "cannot pass extra arguments when binding an instance",
                    ));
                }
                BindingRecord::from_instance(instance)
            }
            (None, None, None) => unreachable!("checked above"),
        };
        Ok((self.selector, self.name, record))
    }
}
