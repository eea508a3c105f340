//! Constructed instances and the types that can construct themselves.

use std::fmt;
use std::sync::Arc;

use crate::binding::{Args, Param};
use crate::error::DiResult;
use crate::key::AnyArc;
use crate::lifecycle::{AsyncClose, AsyncStart, Close, CloseHook, Hooks, Start, StartHook};

/// A constructed, type-erased value together with its lifecycle capabilities.
///
/// Factories return an `Instance`; the container caches its value and runs
/// the declared capabilities at creation and teardown.
///
/// Values are stored as `Arc<T>`. Trait objects built with
/// [`Instance::from_trait`] are stored as `Arc<Arc<dyn Trait>>`, which is the
/// shape [`Container::provide_trait`](crate::Container::provide_trait)
/// expects.
#[derive(Clone)]
pub struct Instance {
    value: AnyArc,
    type_name: &'static str,
    hooks: Hooks,
}

impl Instance {
    /// Wraps a plain value without lifecycle capabilities.
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        InstanceBuilder::new(value).build()
    }

    /// Wraps an already shared value without lifecycle capabilities.
    pub fn shared<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        InstanceBuilder::from_arc(value).build()
    }

    /// Wraps a trait object.
    ///
    /// ```rust
    /// use dibox::Instance;
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> String;
    /// }
    ///
    /// struct English;
    /// impl Greeter for English {
    ///     fn greet(&self) -> String { "hello".into() }
    /// }
    ///
    /// let instance = Instance::from_trait::<dyn Greeter>(Arc::new(English));
    /// assert!(instance.type_name().contains("Greeter"));
    /// ```
    pub fn from_trait<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
            hooks: Hooks::default(),
        }
    }

    /// Starts a builder for declaring lifecycle capabilities.
    pub fn builder<T: Send + Sync + 'static>(value: T) -> InstanceBuilder<T> {
        InstanceBuilder::new(value)
    }

    pub fn value(&self) -> &AnyArc {
        &self.value
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn has_start(&self) -> bool {
        self.hooks.start().is_some()
    }

    pub fn has_close(&self) -> bool {
        self.hooks.close().is_some()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("has_start", &self.has_start())
            .field("has_close", &self.has_close())
            .finish()
    }
}

/// Builder that declares which lifecycle capabilities an instance exposes.
///
/// # Examples
///
/// ```
/// use dibox::{Close, DiResult, Instance};
///
/// struct Cache;
///
/// impl Close for Cache {
///     fn close(&self) -> DiResult<()> {
///         Ok(())
///     }
/// }
///
/// let instance = Instance::builder(Cache).with_close().build();
/// assert!(instance.has_close());
/// assert!(!instance.has_start());
/// ```
pub struct InstanceBuilder<T> {
    value: Arc<T>,
    hooks: Hooks,
}

impl<T: Send + Sync + 'static> InstanceBuilder<T> {
    pub fn new(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc(value: Arc<T>) -> Self {
        Self {
            value,
            hooks: Hooks::default(),
        }
    }

    pub fn value(&self) -> &Arc<T> {
        &self.value
    }

    pub fn with_async_start(mut self) -> Self
    where
        T: AsyncStart,
    {
        self.hooks.offer_start(StartHook::Async(self.value.clone()));
        self
    }

    pub fn with_start(mut self) -> Self
    where
        T: Start,
    {
        self.hooks.offer_start(StartHook::Sync(self.value.clone()));
        self
    }

    pub fn with_async_close(mut self) -> Self
    where
        T: AsyncClose,
    {
        self.hooks.offer_close(CloseHook::Async(self.value.clone()));
        self
    }

    pub fn with_close(mut self) -> Self
    where
        T: Close,
    {
        self.hooks.offer_close(CloseHook::Sync(self.value.clone()));
        self
    }

    pub fn build(self) -> Instance {
        Instance {
            value: self.value,
            type_name: std::any::type_name::<T>(),
            hooks: self.hooks,
        }
    }

    /// Builds the instance as a trait object while keeping the capabilities
    /// declared on the concrete type.
    pub fn build_as<S>(self, upcast: impl FnOnce(Arc<T>) -> Arc<S>) -> Instance
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let hooks = self.hooks;
        let mut instance = Instance::from_trait::<S>(upcast(self.value));
        instance.hooks = hooks;
        instance
    }
}

/// A type that can construct itself from resolved dependencies.
///
/// Implementing `Injectable` makes a type usable as a binding target and
/// lets the container build it implicitly when nothing is bound for it.
///
/// # Examples
///
/// ```
/// use dibox::{Args, DiResult, Injectable, Param};
/// use std::sync::Arc;
///
/// #[derive(Default)]
/// struct Database;
/// impl Injectable for Database {
///     fn construct(_args: Args) -> DiResult<Self> {
///         Ok(Database)
///     }
/// }
///
/// struct UserRepository {
///     db: Arc<Database>,
/// }
///
/// impl Injectable for UserRepository {
///     fn dependencies() -> Vec<Param> {
///         vec![Param::dependency::<Database>("db")]
///     }
///
///     fn construct(args: Args) -> DiResult<Self> {
///         Ok(UserRepository { db: args.get::<Database>("db")? })
///     }
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Dependency descriptor of [`construct`](Self::construct).
    fn dependencies() -> Vec<Param> {
        Vec::new()
    }

    fn construct(args: Args) -> DiResult<Self>;

    /// Declares lifecycle capabilities of a freshly constructed value.
    fn lifecycle(instance: InstanceBuilder<Self>) -> InstanceBuilder<Self> {
        instance
    }
}
