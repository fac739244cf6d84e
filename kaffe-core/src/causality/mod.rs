//! Causality checks over a collected trace
//!
//! A pairing query names a cause pattern, an effect pattern and optionally
//! a [`Guard`] relating their bindings. [`PairQuery::find_pairs`] rebuilds
//! cause → effect pairs in one scan; since an effect can only take a cause
//! already seen, an effect is never paired with a later cause.
//!
//! | Check              | Effect without cause | Cause without effect |
//! |--------------------|----------------------|----------------------|
//! | `causality`        | `OrderViolation`     | tolerated            |
//! | `strict_causality` | `OrderViolation`     | `UnmatchedCause`     |

mod checks;
mod pairs;

pub use checks::{pair_max_depth, strictly_increasing, unique};
pub use pairs::{PairMatch, PairQuery, Role};

use crate::error::Result;
use crate::matching::{Guard, Pattern};
use crate::trace::Trace;

fn query(cause: Pattern, effect: Pattern, guard: Option<Guard>) -> Result<PairQuery> {
    let query = PairQuery::new(cause, effect);
    match guard {
        Some(guard) => query.with_guard(guard),
        None => Ok(query),
    }
}

/// Pair causes with effects; see [`PairQuery::find_pairs`]
pub fn find_pairs(
    cause: Pattern,
    effect: Pattern,
    guard: Option<Guard>,
    trace: &Trace,
) -> Result<Vec<PairMatch>> {
    Ok(query(cause, effect, guard)?.find_pairs(trace))
}

/// Assert every effect has a preceding cause
pub fn causality(
    cause: Pattern,
    effect: Pattern,
    guard: Option<Guard>,
    trace: &Trace,
) -> Result<Vec<PairMatch>> {
    query(cause, effect, guard)?.causality(trace)
}

/// Assert every effect has a preceding cause and every cause an effect
pub fn strict_causality(
    cause: Pattern,
    effect: Pattern,
    guard: Option<Guard>,
    trace: &Trace,
) -> Result<Vec<PairMatch>> {
    query(cause, effect, guard)?.strict_causality(trace)
}
