//! Matching & Projection
//!
//! A [`Pattern`] compiles to a set of required fields plus a binder: matching
//! an event either fails or yields a [`Bindings`] environment. A [`Guard`]
//! is a pure function over the environments of a cause and an effect match;
//! it is checked against the patterns' bound variables when a pairing query
//! is built.
//!
//! Projections pull attribute values out of a trace. Events that lack a
//! requested key are skipped, since traces are expected to be heterogeneous.

mod guard;
mod pattern;
mod projection;

pub use guard::Guard;
pub use pattern::{Bindings, EventFilter, Pattern};
pub use projection::{filter_by_kind, project, project_one};
