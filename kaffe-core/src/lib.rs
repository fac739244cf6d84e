//! # Kaffe Core - trace-based testing of concurrent code
//!
//! A test is split into two stages:
//!
//! - **Run stage**: the code under test emits structured trace points while
//!   it runs. A [`TraceCollector`] serializes them, from any number of
//!   threads, into one ordered trace.
//! - **Check stage**: the drained [`Trace`] is checked against declarative
//!   assertions: projections, cause → effect pairing, uniqueness.
//!
//! Between the two sits the **nemesis**: fault rules that turn matching
//! trace points into injected crashes, on a deterministic or seeded random
//! schedule, so the code's own error handling gets exercised.
//!
//! ## Core Principle
//!
//! > Ordering is arrival order at the collector.
//!
//! Every timestamp is an arrival index; it says nothing about wall-clock
//! causality between producers beyond what the collector serialized.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use kaffe_core::{Guard, PairQuery, Pattern, Scenario, TraceCollector, TracePoint};
//!
//! let collector = TraceCollector::new();
//! collector.start().unwrap();
//!
//! // Crash the first write, let the retry through
//! collector
//!     .inject_crash(Pattern::kind("write"), Scenario::RecoverAfter { n: 1 }, None)
//!     .unwrap();
//!
//! collector.emit(TracePoint::new("request").attr("id", 1)).unwrap();
//! assert!(collector.emit(TracePoint::new("write").attr("id", 1)).is_err());
//! collector.emit(TracePoint::new("write").attr("id", 1)).unwrap();
//!
//! let trace = collector.collect(Duration::ZERO).unwrap();
//!
//! // Every write answers an earlier request with the same id
//! let query = PairQuery::new(
//!     Pattern::kind("request").bind("req", "id"),
//!     Pattern::kind("write").bind("wr", "id"),
//! )
//! .with_guard(Guard::equal("req", "wr"))
//! .unwrap();
//! let pairs = query.strict_causality(&trace).unwrap();
//! assert_eq!(pairs.len(), 1);
//! assert_eq!(trace.kinds(), vec!["request", "snabbkaffe_crash", "write"]);
//! ```

pub mod causality;
pub mod config;
pub mod emitter;
pub mod error;
pub mod harness;
pub mod matching;
pub mod nemesis;
pub mod trace;

#[cfg(feature = "async-runtime")]
pub mod runtime;

// Re-export main types
pub use causality::{
    causality, find_pairs, pair_max_depth, strict_causality, strictly_increasing, unique,
    PairMatch, PairQuery, Role,
};
pub use config::{CollectorConfig, EmitMode, RunConfig};
pub use emitter::Emitter;
pub use error::{ErrorCategory, ErrorDetail, ErrorResponse, Result, TraceError};
pub use harness::run_and_check;
pub use matching::{filter_by_kind, project, project_one, Bindings, EventFilter, Guard, Pattern};
pub use nemesis::{FaultEngine, RuleId, Scenario, CRASH_KIND};
pub use trace::{
    read_jsonl_file, write_jsonl_file, Attributes, CollectorStats, Event, Level, Phase, Trace,
    TraceCollector, TracePoint,
};

#[doc(hidden)]
pub use serde_json as __serde_json;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
