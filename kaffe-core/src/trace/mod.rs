//! Trace model and collection
//!
//! Instrumented code builds a [`TracePoint`] and hands it to
//! [`TraceCollector::emit`]. The collector serializes concurrent emissions
//! into one ordered buffer and assigns each recorded [`Event`] its arrival
//! index. At the end of the run stage `collect()` drains the buffer into an
//! immutable [`Trace`] for the check stage.
//!
//! ## Architecture
//!
//! ```text
//! producers               collector (one lock)              check stage
//! ─────────               ────────────────────              ───────────
//! emit(point) ──────────► fault engine ──crash──► snabbkaffe_crash
//!                             │ pass
//!                             ▼
//!                         append (timestamp = arrival index)
//!                             │
//!                             ├─► complete matching waits
//!                             └─► notify quiescence watcher
//!
//! collect(timeout) ──────► drain buffer ───────────────────► Trace
//! ```

mod collector;
mod event;
mod point;
mod store;

pub use collector::{CollectorStats, PendingWait, Phase, TraceCollector};
pub(crate) use event::lookup;
pub use event::{Attributes, Event, Level, Trace};
pub use point::TracePoint;
pub use store::{read_jsonl_file, write_jsonl_file};
