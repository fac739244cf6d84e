//! # Async facade
//!
//! The collector is synchronous: `emit()` takes a lock and returns, while
//! `collect()`, `block_until()` and wait handles park the calling thread.
//! [`AsyncCollector`] moves the parking calls onto tokio's blocking pool so
//! async tests can wait on traces without stalling a worker thread.
//!
//! ```text
//! async task ──emit()──────────────► TraceCollector (direct, non-blocking)
//!     │
//!     └─collect()/block_until()──► spawn_blocking ──► TraceCollector
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kaffe_core::runtime::AsyncCollector;
//!
//! #[tokio::main]
//! async fn main() -> kaffe_core::Result<()> {
//!     let collector = AsyncCollector::new(TraceCollector::new());
//!     collector.start()?;
//!
//!     let waiter = collector.register_wait(Pattern::kind("ready"))?;
//!     tokio::spawn({
//!         let c = collector.clone();
//!         async move { c.emit(TracePoint::new("ready")) }
//!     });
//!     collector.await_wait(waiter, Duration::from_secs(1)).await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TraceError};
use crate::matching::EventFilter;
use crate::trace::{Event, PendingWait, Trace, TraceCollector, TracePoint};

/// Cloneable async handle on a shared collector
#[derive(Debug, Clone)]
pub struct AsyncCollector {
    inner: Arc<TraceCollector>,
}

impl AsyncCollector {
    pub fn new(collector: TraceCollector) -> Self {
        Self {
            inner: Arc::new(collector),
        }
    }

    /// Wrap an already shared collector
    pub fn from_shared(inner: Arc<TraceCollector>) -> Self {
        Self { inner }
    }

    /// The underlying collector, for synchronous producers
    pub fn collector(&self) -> &Arc<TraceCollector> {
        &self.inner
    }

    pub fn start(&self) -> Result<()> {
        self.inner.start()
    }

    /// Emit without leaving the task; `emit()` never parks
    pub fn emit(&self, point: TracePoint) -> Result<()> {
        self.inner.emit(point)
    }

    pub fn stop(&self) {
        self.inner.stop()
    }

    /// Register a wait for events emitted from now on
    pub fn register_wait<F>(&self, filter: F) -> Result<PendingWait>
    where
        F: EventFilter + 'static,
    {
        self.inner.register_wait(filter)
    }

    pub async fn collect(&self, timeout: Duration) -> Result<Trace> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.collect(timeout)).await
    }

    pub async fn block_until<F>(
        &self,
        filter: F,
        timeout: Duration,
        scan_backlog: bool,
    ) -> Result<Event>
    where
        F: EventFilter + 'static,
    {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.block_until(filter, timeout, scan_backlog)).await
    }

    pub async fn await_wait(&self, pending: PendingWait, timeout: Duration) -> Result<Event> {
        let inner = Arc::clone(&self.inner);
        blocking(move || inner.await_wait(pending, timeout)).await
    }

    /// Async form of `wait_async_action`: the wait is registered before
    /// `action` is polled
    pub async fn wait_async_action<T, Fut, F>(
        &self,
        action: Fut,
        filter: F,
        timeout: Duration,
    ) -> Result<(T, Event)>
    where
        Fut: std::future::Future<Output = T>,
        F: EventFilter + 'static,
    {
        let pending = self.register_wait(filter)?;
        let output = action.await;
        let event = self.await_wait(pending, timeout).await?;
        Ok((output, event))
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TraceError::InternalError {
            reason: format!("blocking collector task failed: {}", e),
        })?
}
