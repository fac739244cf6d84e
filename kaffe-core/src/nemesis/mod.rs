//! Fault injection ("nemesis")
//!
//! Every emission is checked against the active fault rules before it is
//! recorded. A rule pairs a [`Pattern`](crate::Pattern) with a
//! [`Scenario`] that decides, per matching attempt, whether to crash.
//!
//! ```text
//! emit(point) ──► FaultEngine::intercept ──┬─► no crash ──► record point
//!                   │ (per-rule state)     │
//!                   │                      └─► crash ─────► record snabbkaffe_crash
//!                   ▼                                       return Err(InjectedCrash)
//!             rule 1 ─ rule 2 ─ ... (each with its own schedule)
//! ```
//!
//! Rules never share scheduling state, even when their patterns are
//! identical.

mod engine;
mod scenario;

pub use engine::{Crash, FaultEngine, FaultRule, RuleId, CRASH_KIND, DEFAULT_CRASH_REASON};
pub use scenario::{Scenario, ScenarioState};
