//! Instance store: memoized instances and their ordered lifecycle.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{DiError, DiResult};
use crate::instance::Instance;
use crate::key::{AnyArc, BindingKey, TypeQuery};
use crate::matcher::KeyMap;

/// Cache of constructed instances keyed by their resolved binding key.
///
/// Creation is single-flight per key: concurrent requests for a key that
/// is not cached yet share one in-flight construction, and share its
/// failure too. A failed attempt is forgotten, so a later request starts a
/// new one. Entries remember
/// their creation order and [`close`](Self::close) tears them down in
/// exact reverse of it.
///
/// # Examples
///
/// ```
/// use dibox::{BindingKey, Instance, InstanceStore, Type, TypeQuery};
///
/// struct Clock;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> dibox::DiResult<()> {
/// let store = InstanceStore::new();
/// let key = BindingKey::new(Some(Type::of::<Clock>()), None);
///
/// assert!(store.get(&TypeQuery::of::<Clock>(), None).is_none());
/// let created = store.create(key, || async { Ok(Instance::new(Clock)) }).await?;
/// let cached = store.get(&TypeQuery::of::<Clock>(), Some("clock")).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&created, &cached));
///
/// store.close().await?;
/// assert!(store.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct InstanceStore {
    state: Mutex<StoreState>,
}

#[derive(Default)]
struct StoreState {
    ready: KeyMap<AnyArc>,
    pending: HashMap<BindingKey, Arc<OnceCell<DiResult<AnyArc>>>>,
    created: Vec<(BindingKey, Instance)>,
}

impl InstanceStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Looks up a cached instance with the layered (type, name) fallback.
    ///
    /// Never constructs anything.
    pub fn get(&self, query: &TypeQuery, name: Option<&str>) -> Option<AnyArc> {
        let state = self.state.lock();
        state.ready.find_match(query, name).map(|(value, _)| value.clone())
    }

    /// Returns the instance cached under `key`, creating it with `init` if
    /// needed.
    ///
    /// After `init` produces the instance, its start capability (if any) is
    /// run. Only then is the instance cached and appended to the creation
    /// order. A failure at any step leaves the key uncached; callers that
    /// were waiting on the same attempt receive the same error.
    ///
    /// A waiter whose shared instance was closed before it got to see it
    /// starts over instead of returning the closed instance.
    pub async fn create<F, Fut>(&self, key: BindingKey, init: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DiResult<Instance>>,
    {
        let mut init = Some(init);
        loop {
            let cell = {
                let mut state = self.state.lock();
                if let Some(existing) = state.ready.get(&key) {
                    return Ok(existing.clone());
                }
                state
                    .pending
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new()))
                    .clone()
            };

            let result = cell
                .get_or_init(|| self.construct(&key, init.take()))
                .await
                .clone();

            // `init` is still there only if another caller led the attempt
            match result {
                Ok(value) if init.is_some() && !self.is_live(&key, &value) => {
                    debug!(key = %key, "shared instance was closed before use, retrying");
                }
                other => return other,
            }
        }
    }

    async fn construct<F, Fut>(&self, key: &BindingKey, init: Option<F>) -> DiResult<AnyArc>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DiResult<Instance>>,
    {
        let started = match init {
            Some(init) => Self::start(key, init).await,
            None => Err(DiError::factory(format!("construction of {key} was already attempted"))),
        };

        let mut state = self.state.lock();
        state.pending.remove(key);
        let instance = started?;
        let value = instance.value().clone();
        state.ready.insert(key.clone(), value.clone());
        state.created.push((key.clone(), instance));
        Ok(value)
    }

    async fn start<F, Fut>(key: &BindingKey, init: F) -> DiResult<Instance>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DiResult<Instance>>,
    {
        let instance = init().await?;
        if let Some(hook) = instance.hooks().start() {
            debug!(key = %key, "starting instance");
            hook.run()
                .await
                .map_err(|err| DiError::lifecycle(instance.type_name(), "start", &err))?;
        }
        Ok(instance)
    }

    fn is_live(&self, key: &BindingKey, value: &AnyArc) -> bool {
        let state = self.state.lock();
        state
            .ready
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, value))
    }

    /// Tears down every created instance, newest first, then forgets them.
    ///
    /// All instances are attempted even when some fail to close; failures
    /// are returned together as [`DiError::Teardown`]. A second call has
    /// nothing left to tear down.
    pub async fn close(&self) -> DiResult<()> {
        let created = std::mem::take(&mut self.state.lock().created);
        let mut errors = Vec::new();

        for (key, instance) in created.iter().rev() {
            if let Some(hook) = instance.hooks().close() {
                debug!(key = %key, "closing instance");
                if let Err(err) = hook.run().await {
                    warn!(key = %key, error = %err, "failed to close instance");
                    errors.push(DiError::lifecycle(instance.type_name(), "close", &err));
                }
            }
        }

        {
            let mut state = self.state.lock();
            for (key, _) in &created {
                state.ready.remove(key);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiError::Teardown(errors))
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().created.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().created.is_empty()
    }

    /// Keys of the cached instances in creation order.
    pub fn keys(&self) -> Vec<BindingKey> {
        self.state
            .lock()
            .created
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl Default for InstanceStore {
    fn default() -> Self {
        Self::new()
    }
}
