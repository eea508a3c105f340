//! The container: binding registration, recursive resolution and teardown.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::binding::{Args, Bind, BindingRecord, BoxFuture};
use crate::config::ContainerOptions;
use crate::error::{DiError, DiResult};
use crate::instance::Injectable;
use crate::key::{AnyArc, BindingKey, Type, TypeQuery};
use crate::registry::Registry;
use crate::store::InstanceStore;

/// Dependency injection container.
///
/// A `Container` owns the registered bindings and every instance it has
/// built. Each resolved binding key yields exactly one shared instance;
/// dependencies of a factory are resolved recursively from its declared
/// [`Param`](crate::Param)s the first time the instance is requested.
///
/// Handles are cheap to clone and can be moved into spawned tasks. Call
/// [`close`](Self::close) (or use [`scoped`](Self::scoped)) to tear the
/// instances down in reverse creation order.
///
/// # Examples
///
/// ```
/// use dibox::{Args, Bind, Container, DiResult, Injectable, Instance, Param};
/// use std::sync::Arc;
///
/// struct Settings {
///     url: String,
/// }
///
/// struct Repository {
///     settings: Arc<Settings>,
/// }
///
/// impl Injectable for Repository {
///     fn dependencies() -> Vec<Param> {
///         vec![Param::value::<Settings>("settings")]
///     }
///
///     fn construct(args: Args) -> DiResult<Self> {
///         Ok(Repository { settings: args.get("settings")? })
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> DiResult<()> {
/// let container = Container::new();
/// container.bind(Bind::ty::<Settings>().instance(Instance::new(Settings {
///     url: "sqlite::memory:".into(),
/// })))?;
///
/// let repo = container.provide::<Repository>().await?;
/// assert_eq!(repo.settings.url, "sqlite::memory:");
/// assert!(Arc::ptr_eq(&repo, &container.get::<Repository>()?));
///
/// container.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

struct ContainerInner {
    registry: RwLock<Registry>,
    store: InstanceStore,
    options: ContainerOptions,
}

impl Container {
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry: RwLock::new(Registry::new()),
                store: InstanceStore::new(),
                options,
            }),
        }
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.inner.options
    }

    /// Registers a binding.
    ///
    /// A binding for an already bound key replaces the previous one;
    /// instances that were already created are not affected.
    ///
    /// # Errors
    ///
    /// [`DiError::AmbiguousBindingSpec`] when the spec does not name
    /// exactly one target, passes extra arguments with an instance, or
    /// names a predicate binding.
    pub fn bind(&self, bind: Bind) -> DiResult<()> {
        let (selector, name, record) = bind.normalize()?;
        debug!(
            selector = ?selector,
            name = ?name,
            factory = record.label(),
            "registering binding"
        );
        self.inner.registry.write().insert(selector, name, record);
        Ok(())
    }

    /// Provides the shared instance of an [`Injectable`] type.
    ///
    /// Falls back to building the type from its own dependencies when
    /// nothing is bound for it.
    pub async fn provide<T: Injectable>(&self) -> DiResult<Arc<T>> {
        let value = self.provide_any(&TypeQuery::injectable::<T>(), None).await?;
        downcast::<T>(value, None)
    }

    /// Like [`provide`](Self::provide) for a named request.
    pub async fn provide_named<T: Injectable>(&self, name: &str) -> DiResult<Arc<T>> {
        let value = self
            .provide_any(&TypeQuery::injectable::<T>(), Some(name))
            .await?;
        downcast::<T>(value, Some(name))
    }

    /// Provides a value of any type; it must be bound explicitly or by a
    /// predicate.
    pub async fn provide_value<T: Send + Sync + 'static>(&self, name: Option<&str>) -> DiResult<Arc<T>> {
        let value = self.provide_any(&TypeQuery::of::<T>(), name).await?;
        downcast::<T>(value, name)
    }

    /// Provides a trait object bound with [`Bind::ty::<dyn Trait>()`](Bind::ty).
    pub async fn provide_trait<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: Option<&str>,
    ) -> DiResult<Arc<T>> {
        let value = self.provide_any(&TypeQuery::of::<T>(), name).await?;
        downcast_trait::<T>(value, name)
    }

    /// Provides the type-erased instance matching `query` and `name`,
    /// building it and its dependencies on first request.
    ///
    /// A cached instance is returned without awaiting anything.
    ///
    /// The cache is consulted before the bindings, with the same layered
    /// fallback. Once `(Bar, None)` holds an instance, a request for
    /// `(Bar, "arg")` returns it even if `(Bar, "arg")` has its own exact
    /// binding, so which binding wins can depend on request order.
    ///
    /// # Errors
    ///
    /// [`DiError::NoBindingFound`] when nothing matches the request or one
    /// of its required dependencies; any error raised by a factory or a
    /// start capability. A failed request leaves no instance behind.
    pub fn provide_any<'a>(
        &'a self,
        query: &'a TypeQuery,
        name: Option<&'a str>,
    ) -> BoxFuture<'a, DiResult<AnyArc>> {
        Box::pin(async move {
            if let Some(value) = self.inner.store.get(query, name) {
                trace!(query = %query, name = ?name, "instance cache hit");
                return Ok(value);
            }

            let found = {
                let registry = self.inner.registry.read();
                registry.find_binding(query, name, self.inner.options.implicit_construction)
            };
            let (record, key) = found?;
            let matched = key.ty.or_else(|| query.concrete().copied());

            self.inner
                .store
                .create(key.clone(), || async {
                    debug!(key = %key, factory = record.label(), "creating instance");
                    let args = self.resolve_args(&record, matched).await?;
                    let instance = record.call_async(args).await?;
                    debug!(key = %key, instance = instance.type_name(), "created instance");
                    Ok::<_, DiError>(instance)
                })
                .await
        })
    }

    /// Builds the factory arguments of `record`.
    ///
    /// Bound arguments come first, then the resolved dependencies in
    /// declaration order; a leading type parameter receives `matched` last.
    async fn resolve_args(&self, record: &BindingRecord, matched: Option<Type>) -> DiResult<Args> {
        let mut args = record.prepare_args();
        let mut type_arg = None;

        for (index, param) in record.params().iter().enumerate() {
            if index == 0 && param.accepts_type() {
                type_arg = matched.map(|ty| (param.name(), ty));
                continue;
            }
            let Some(query) = param.resolvable() else {
                continue;
            };
            if args.contains(param.name()) {
                continue;
            }
            let value = self.provide_any(query, Some(param.name())).await?;
            args.insert(param.name(), value);
        }

        if let Some((name, ty)) = type_arg {
            args.insert(name, Arc::new(ty));
        }
        Ok(args)
    }

    /// Returns an already created instance of `T`; never builds anything.
    pub fn get<T: Send + Sync + 'static>(&self) -> DiResult<Arc<T>> {
        let value = self.get_any(&TypeQuery::of::<T>(), None)?;
        downcast::<T>(value, None)
    }

    pub fn get_named<T: Send + Sync + 'static>(&self, name: &str) -> DiResult<Arc<T>> {
        let value = self.get_any(&TypeQuery::of::<T>(), Some(name))?;
        downcast::<T>(value, Some(name))
    }

    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self, name: Option<&str>) -> DiResult<Arc<T>> {
        let value = self.get_any(&TypeQuery::of::<T>(), name)?;
        downcast_trait::<T>(value, name)
    }

    /// Lookup-only access with the layered (type, name) fallback.
    ///
    /// Predicate bindings and implicit construction are not consulted.
    pub fn get_any(&self, query: &TypeQuery, name: Option<&str>) -> DiResult<AnyArc> {
        self.inner
            .store
            .get(query, name)
            .ok_or_else(|| DiError::NotFound {
                type_name: query.to_string(),
                name: name.map(str::to_owned),
            })
    }

    /// Tears down every created instance in reverse creation order.
    ///
    /// The container stays usable: bindings are kept and later requests
    /// build fresh instances.
    pub async fn close(&self) -> DiResult<()> {
        debug!(instances = self.inner.store.len(), "closing container");
        self.inner.store.close().await
    }

    /// Runs `f` with this container and closes it afterwards, also when
    /// `f` fails.
    ///
    /// An error from `f` takes precedence over a teardown error.
    ///
    /// ```
    /// use dibox::{Bind, Container, DiResult, Instance};
    ///
    /// struct Greeting(&'static str);
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() -> DiResult<()> {
    /// let container = Container::new();
    /// container.bind(Bind::ty::<Greeting>().instance(Instance::new(Greeting("hi"))))?;
    ///
    /// let text = container
    ///     .scoped(|c| async move {
    ///         let greeting = c.provide_value::<Greeting>(None).await?;
    ///         Ok(greeting.0)
    ///     })
    ///     .await?;
    ///
    /// assert_eq!(text, "hi");
    /// assert_eq!(container.instance_count(), 0);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scoped<F, Fut, R>(&self, f: F) -> DiResult<R>
    where
        F: FnOnce(Container) -> Fut,
        Fut: Future<Output = DiResult<R>>,
    {
        let result = f(self.clone()).await;
        let closed = self.close().await;
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(error = %close_err, "teardown failed after scoped error");
                Err(err)
            }
        }
    }

    /// Number of registered exact and predicate bindings.
    pub fn registered_count(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Number of live instances.
    pub fn instance_count(&self) -> usize {
        self.inner.store.len()
    }

    /// Keys of the live instances in creation order.
    pub fn instance_keys(&self) -> Vec<BindingKey> {
        self.inner.store.keys()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.registered_count())
            .field("instances", &self.instance_count())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl Drop for ContainerInner {
    fn drop(&mut self) {
        if self.options.warn_on_undisposed && !self.store.is_empty() {
            warn!(
                instances = self.store.len(),
                "container dropped with undisposed instances; call close().await before dropping"
            );
        }
    }
}

fn downcast<T: Send + Sync + 'static>(value: AnyArc, name: Option<&str>) -> DiResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| mismatch::<T>(name))
}

fn downcast_trait<T: ?Sized + Send + Sync + 'static>(value: AnyArc, name: Option<&str>) -> DiResult<Arc<T>> {
    value
        .downcast::<Arc<T>>()
        .map(|boxed| (*boxed).clone())
        .map_err(|_| mismatch::<T>(name))
}

fn mismatch<T: ?Sized>(name: Option<&str>) -> DiError {
    DiError::TypeMismatch {
        expected: std::any::type_name::<T>(),
        param: name.unwrap_or("None").to_owned(),
    }
}
