//! Lifecycle capabilities for constructed instances.
//!
//! An instance may declare start and close capabilities when it is built
//! (see [`InstanceBuilder`](crate::InstanceBuilder)). The instance store runs
//! the start capability right after construction and the close capability
//! during teardown. When several capabilities of one kind are declared, the
//! asynchronous one takes priority over the synchronous one.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DiResult;

/// Asynchronous startup, e.g. opening a connection pool.
///
/// # Examples
///
/// ```
/// use dibox::{AsyncStart, DiResult};
/// use async_trait::async_trait;
///
/// struct Pool;
///
/// #[async_trait]
/// impl AsyncStart for Pool {
///     async fn start(&self) -> DiResult<()> {
///         // connect...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncStart: Send + Sync + 'static {
    async fn start(&self) -> DiResult<()>;
}

/// Synchronous startup.
pub trait Start: Send + Sync + 'static {
    fn start(&self) -> DiResult<()>;
}

/// Asynchronous teardown, e.g. graceful connection shutdown.
#[async_trait]
pub trait AsyncClose: Send + Sync + 'static {
    async fn close(&self) -> DiResult<()>;
}

/// Synchronous teardown, e.g. flushing a buffer.
pub trait Close: Send + Sync + 'static {
    fn close(&self) -> DiResult<()>;
}

#[derive(Clone)]
pub(crate) enum StartHook {
    Async(Arc<dyn AsyncStart>),
    Sync(Arc<dyn Start>),
}

impl StartHook {
    fn rank(&self) -> u8 {
        match self {
            StartHook::Async(_) => 0,
            StartHook::Sync(_) => 1,
        }
    }

    pub(crate) async fn run(&self) -> DiResult<()> {
        match self {
            StartHook::Async(hook) => hook.start().await,
            StartHook::Sync(hook) => hook.start(),
        }
    }
}

#[derive(Clone)]
pub(crate) enum CloseHook {
    Async(Arc<dyn AsyncClose>),
    Sync(Arc<dyn Close>),
}

impl CloseHook {
    fn rank(&self) -> u8 {
        match self {
            CloseHook::Async(_) => 0,
            CloseHook::Sync(_) => 1,
        }
    }

    pub(crate) async fn run(&self) -> DiResult<()> {
        match self {
            CloseHook::Async(hook) => hook.close().await,
            CloseHook::Sync(hook) => hook.close(),
        }
    }
}

/// The capabilities selected for one instance.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    start: Option<StartHook>,
    close: Option<CloseHook>,
}

impl Hooks {
    /// Keeps the highest-priority start capability seen so far.
    pub(crate) fn offer_start(&mut self, hook: StartHook) {
        if self.start.as_ref().map_or(true, |current| hook.rank() < current.rank()) {
            self.start = Some(hook);
        }
    }

    /// Keeps the highest-priority close capability seen so far.
    pub(crate) fn offer_close(&mut self, hook: CloseHook) {
        if self.close.as_ref().map_or(true, |current| hook.rank() < current.rank()) {
            self.close = Some(hook);
        }
    }

    pub(crate) fn start(&self) -> Option<&StartHook> {
        self.start.as_ref()
    }

    pub(crate) fn close(&self) -> Option<&CloseHook> {
        self.close.as_ref()
    }
}
