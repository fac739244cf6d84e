//! Trace Collector
//!
//! The collector is the single serialization point for a run. Every
//! `emit()` takes the state lock, consults the fault engine, assigns the
//! next arrival index, appends the event and completes any pending waits,
//! all before releasing the lock. Arrival order is therefore total and is
//! the order every query sees.

use std::fmt;
use std::mem;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};

use crate::config::CollectorConfig;
use crate::error::{Result, TraceError};
use crate::matching::{EventFilter, Pattern};
use crate::nemesis::{FaultEngine, RuleId, Scenario};

use super::event::{Event, Trace};
use super::point::TracePoint;

/// Collector lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Never started
    Idle,
    /// Recording emissions
    Running,
    /// `collect()` is waiting for quiescence; emissions are still recorded
    Draining,
    /// Collected or stopped; ready for another `start()`
    Stopped,
}

impl Phase {
    fn is_live(self) -> bool {
        matches!(self, Phase::Running | Phase::Draining)
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Draining => "draining",
            Phase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered wait: filter plus one-shot completion slot
struct WaitCondition {
    id: u64,
    filter: Box<dyn EventFilter>,
    slot: Sender<Event>,
}

/// Handle on a registered wait, consumed by [`TraceCollector::await_wait`]
#[derive(Debug)]
pub struct PendingWait {
    id: u64,
    slot: Receiver<Event>,
}

/// Removes a wait if the thread unwinds while it is in scope
struct CancelOnUnwind<'a> {
    collector: &'a TraceCollector,
    id: u64,
}

impl Drop for CancelOnUnwind<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.collector.cancel_wait(self.id);
        }
    }
}

struct CollectorState {
    phase: Phase,
    run: u64,
    buffer: Vec<Event>,
    waits: Vec<WaitCondition>,
    next_wait_id: u64,
    last_activity: Instant,
    total_emitted: u64,
    total_intercepted: u64,
}

impl CollectorState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            run: 0,
            buffer: Vec::new(),
            waits: Vec::new(),
            next_wait_id: 0,
            last_activity: Instant::now(),
            total_emitted: 0,
            total_intercepted: 0,
        }
    }

    /// Append at the next arrival index and complete satisfied waits
    ///
    /// Waits are tested in registration order. A completed wait is removed,
    /// so its slot receives at most one event.
    fn append(&mut self, point: TracePoint) -> &Event {
        let event = Event::record(point, self.buffer.len() as u64);

        self.waits.retain(|wait| {
            if wait.filter.test(&event) {
                // the waiter may have timed out already; nothing to deliver to
                let _ = wait.slot.try_send(event.clone());
                false
            } else {
                true
            }
        });

        self.last_activity = Instant::now();
        self.total_emitted += 1;
        self.buffer.push(event);
        &self.buffer[self.buffer.len() - 1]
    }
}

/// Point-in-time collector statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorStats {
    pub phase: Phase,
    pub buffered: usize,
    pub pending_waits: usize,
    pub total_emitted: u64,
    pub total_intercepted: u64,
    pub active_rules: usize,
}

/// Trace Collector
///
/// An explicit context object: construct one per test, share it as
/// `Arc<TraceCollector>` with producers, tear it down with `stop()`.
///
/// ```rust
/// use std::time::Duration;
/// use kaffe_core::{TraceCollector, TracePoint};
///
/// let collector = TraceCollector::new();
/// collector.start().unwrap();
/// collector.emit(TracePoint::new("started").attr("node", 1)).unwrap();
///
/// let trace = collector.collect(Duration::ZERO).unwrap();
/// assert_eq!(trace.len(), 1);
/// assert_eq!(trace.events()[0].timestamp, 0);
/// ```
pub struct TraceCollector {
    state: Mutex<CollectorState>,
    activity: Condvar,
    faults: FaultEngine,
    config: CollectorConfig,

    /// Optional callback invoked with each recorded event (for streaming/export)
    on_record: Option<Box<dyn Fn(&Event) + Send + Sync>>,
}

impl fmt::Debug for TraceCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraceCollector")
            .field("stats", &self.stats())
            .field("config", &self.config)
            .field("on_record", &self.on_record.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for TraceCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceCollector {
    /// Create a collector with the default configuration
    pub fn new() -> Self {
        Self::with_config(CollectorConfig::default())
    }

    /// Create a collector from a configuration
    pub fn with_config(config: CollectorConfig) -> Self {
        Self {
            state: Mutex::new(CollectorState::new()),
            activity: Condvar::new(),
            faults: FaultEngine::new(config.seed),
            config,
            on_record: None,
        }
    }

    /// Attach a callback run on every recorded event
    ///
    /// The callback runs while the collector lock is held, in arrival
    /// order. It must not call back into the collector.
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.on_record = Some(Box::new(callback));
        self
    }

    /// Configuration this collector was built with
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    /// Begin a run with an empty buffer
    pub fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        match state.phase {
            Phase::Idle | Phase::Stopped => {
                state.phase = Phase::Running;
                state.run += 1;
                state.buffer.clear();
                state.last_activity = Instant::now();
                tracing::debug!(run = state.run, "trace collector started");
                Ok(())
            }
            Phase::Running | Phase::Draining => Err(TraceError::AlreadyRunning),
        }
    }

    /// Record a trace point
    ///
    /// Outside of a run the point is dropped and `Ok(())` is returned, so
    /// instrumented code behaves the same with or without a live collector.
    /// If a fault rule fires, a `snabbkaffe_crash` event is recorded in
    /// place of the point and the crash is returned as
    /// [`TraceError::InjectedCrash`].
    pub fn emit(&self, point: TracePoint) -> Result<()> {
        let mut state = self.state.lock();
        if !state.phase.is_live() {
            tracing::trace!(
                kind = %point.kind,
                phase = %state.phase,
                "trace point dropped outside of a run"
            );
            return Ok(());
        }

        let crash = self.faults.intercept(&point);
        let record = match &crash {
            Some(crash) => {
                tracing::warn!(
                    kind = %crash.kind,
                    reason = %crash.reason,
                    rule_id = %crash.rule_id,
                    "injected crash"
                );
                state.total_intercepted += 1;
                crash.to_trace_point()
            }
            None => point,
        };

        let event = state.append(record);
        if let Some(ref callback) = self.on_record {
            callback(event);
        }
        self.activity.notify_all();

        match crash {
            Some(crash) => Err(crash.into_error()),
            None => Ok(()),
        }
    }

    /// Wait for quiescence and drain the trace
    ///
    /// Returns once no emission has happened for `timeout`; a zero timeout
    /// drains immediately. Pending waits are dropped.
    pub fn collect(&self, timeout: Duration) -> Result<Trace> {
        let mut state = self.state.lock();
        if state.phase != Phase::Running {
            return Err(TraceError::NotRunning);
        }
        state.phase = Phase::Draining;
        let run = state.run;
        tracing::debug!(run, timeout_ms = timeout.as_millis() as u64, "draining trace");

        loop {
            let idle = state.last_activity.elapsed();
            if idle >= timeout {
                break;
            }
            self.activity.wait_for(&mut state, timeout - idle);
            if state.phase != Phase::Draining || state.run != run {
                // stopped while draining
                return Err(TraceError::NotRunning);
            }
        }

        state.phase = Phase::Stopped;
        state.waits.clear();
        let trace = Trace::new(mem::take(&mut state.buffer));
        tracing::debug!(run, events = trace.len(), "trace collected");
        Ok(trace)
    }

    /// [`collect`](Self::collect) with the configured quiescence timeout
    pub fn collect_default(&self) -> Result<Trace> {
        self.collect(self.config.quiescence_timeout())
    }

    /// Discard everything and return to `Stopped`, whatever the phase
    ///
    /// Pending waiters return `NotRunning`; fault rules are removed.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        let discarded = state.buffer.len();
        state.phase = Phase::Stopped;
        state.buffer.clear();
        state.waits.clear();
        self.faults.clear();
        self.activity.notify_all();
        tracing::debug!(run = state.run, discarded, "trace collector stopped");
    }

    /// Block until an event satisfies `filter`
    ///
    /// With `scan_backlog` an already-recorded match is returned at once;
    /// otherwise only events emitted after this call count.
    pub fn block_until<F>(
        &self,
        filter: F,
        timeout: Duration,
        scan_backlog: bool,
    ) -> Result<Event>
    where
        F: EventFilter + 'static,
    {
        let pending = {
            let mut state = self.state.lock();
            if !state.phase.is_live() {
                return Err(TraceError::NotRunning);
            }
            if scan_backlog {
                if let Some(event) = state.buffer.iter().find(|e| filter.test(e)) {
                    return Ok(event.clone());
                }
            }
            Self::register(&mut state, Box::new(filter))
        };
        self.await_wait(pending, timeout)
    }

    /// Run `action` with a wait for `filter` already in place
    ///
    /// The wait is registered before the action starts, so an event the
    /// action emits synchronously is never missed.
    /// If `action` panics, the wait is removed before the panic continues.
    pub fn wait_async_action<T, A, F>(
        &self,
        action: A,
        filter: F,
        timeout: Duration,
    ) -> Result<(T, Event)>
    where
        A: FnOnce() -> T,
        F: EventFilter + 'static,
    {
        let pending = self.register_wait(filter)?;
        let output = {
            let _unwind = CancelOnUnwind {
                collector: self,
                id: pending.id,
            };
            action()
        };
        let event = self.await_wait(pending, timeout)?;
        Ok((output, event))
    }

    /// Register a wait for events emitted from now on
    pub fn register_wait<F>(&self, filter: F) -> Result<PendingWait>
    where
        F: EventFilter + 'static,
    {
        let mut state = self.state.lock();
        if !state.phase.is_live() {
            return Err(TraceError::NotRunning);
        }
        Ok(Self::register(&mut state, Box::new(filter)))
    }

    fn register(state: &mut CollectorState, filter: Box<dyn EventFilter>) -> PendingWait {
        let (slot, receiver) = channel::bounded(1);
        let id = state.next_wait_id;
        state.next_wait_id += 1;
        state.waits.push(WaitCondition { id, filter, slot });
        PendingWait { id, slot: receiver }
    }

    /// Block on a registered wait
    ///
    /// On timeout the wait is removed under the lock and the slot is polled
    /// once more, so a completion that raced the deadline is still returned.
    pub fn await_wait(&self, pending: PendingWait, timeout: Duration) -> Result<Event> {
        match pending.slot.recv_timeout(timeout) {
            Ok(event) => Ok(event),
            Err(RecvTimeoutError::Disconnected) => Err(TraceError::NotRunning),
            Err(RecvTimeoutError::Timeout) => {
                self.cancel_wait(pending.id);
                pending.slot.try_recv().map_err(|_| TraceError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    fn cancel_wait(&self, id: u64) {
        self.state.lock().waits.retain(|w| w.id != id);
    }

    /// Copy of the events recorded so far in this run
    pub fn snapshot(&self) -> Trace {
        Trace::new(self.state.lock().buffer.clone())
    }

    /// Register a fault rule; see [`FaultEngine::inject_crash`]
    pub fn inject_crash(
        &self,
        pattern: Pattern,
        scenario: Scenario,
        reason: Option<&str>,
    ) -> Result<RuleId> {
        self.faults.inject_crash(pattern, scenario, reason)
    }

    /// Remove a fault rule; false if it was not active
    pub fn fix_crash(&self, id: &RuleId) -> bool {
        self.faults.fix_crash(id)
    }

    /// The fault engine consulted by `emit()`
    pub fn faults(&self) -> &FaultEngine {
        &self.faults
    }

    /// Current statistics
    pub fn stats(&self) -> CollectorStats {
        let state = self.state.lock();
        CollectorStats {
            phase: state.phase,
            buffered: state.buffer.len(),
            pending_waits: state.waits.len(),
            total_emitted: state.total_emitted,
            total_intercepted: state.total_intercepted,
            active_rules: self.faults.active_rules(),
        }
    }
}
