//! Cause/effect pair reconstruction

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};
use crate::matching::{Bindings, Guard, Pattern};
use crate::trace::{Event, Trace};

/// Which side of a pairing query an event satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Cause,
    Effect,
}

/// One element of a pairing result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PairMatch {
    /// A cause and the effect it was paired with
    Pair { cause: Event, effect: Event },
    /// An event left without a partner
    Singleton { event: Event, role: Role },
}

impl PairMatch {
    pub fn is_pair(&self) -> bool {
        matches!(self, PairMatch::Pair { .. })
    }

    /// The cause, paired or not
    pub fn cause(&self) -> Option<&Event> {
        match self {
            PairMatch::Pair { cause, .. } => Some(cause),
            PairMatch::Singleton { event, role: Role::Cause } => Some(event),
            PairMatch::Singleton { .. } => None,
        }
    }

    /// The effect, paired or not
    pub fn effect(&self) -> Option<&Event> {
        match self {
            PairMatch::Pair { effect, .. } => Some(effect),
            PairMatch::Singleton { event, role: Role::Effect } => Some(event),
            PairMatch::Singleton { .. } => None,
        }
    }

    /// The lone event if this is a singleton of the given role
    pub fn unmatched(&self, wanted: Role) -> Option<&Event> {
        match self {
            PairMatch::Singleton { event, role } if *role == wanted => Some(event),
            _ => None,
        }
    }
}

/// A cause/effect pairing query
///
/// ```rust
/// use kaffe_core::{Event, Guard, PairQuery, Pattern, Trace};
///
/// let trace = Trace::new(vec![
///     Event::new("req", 0).attr("id", 1),
///     Event::new("resp", 1).attr("id", 1),
/// ]);
///
/// let query = PairQuery::new(
///     Pattern::kind("req").bind("req_id", "id"),
///     Pattern::kind("resp").bind("resp_id", "id"),
/// )
/// .with_guard(Guard::equal("req_id", "resp_id"))
/// .unwrap();
///
/// let pairs = query.strict_causality(&trace).unwrap();
/// assert!(pairs[0].is_pair());
/// ```
#[derive(Debug, Clone)]
pub struct PairQuery {
    cause: Pattern,
    effect: Pattern,
    guard: Option<Guard>,
}

impl PairQuery {
    /// Pair any cause with the earliest open one
    pub fn new(cause: Pattern, effect: Pattern) -> Self {
        Self {
            cause,
            effect,
            guard: None,
        }
    }

    /// Only pair when the guard holds over the two bindings
    ///
    /// Fails if the guard reads a variable its pattern does not bind.
    pub fn with_guard(mut self, guard: Guard) -> Result<Self> {
        guard.validate(&self.cause, &self.effect)?;
        self.guard = Some(guard);
        Ok(self)
    }

    fn admits(&self, cause: &Bindings, effect: &Bindings) -> bool {
        self.guard.as_ref().map_or(true, |g| g.holds(cause, effect))
    }

    /// Reconstruct pairs in one scan of the trace
    ///
    /// Open causes wait in a FIFO queue. An effect takes the first queued
    /// cause its guard admits, or becomes an effect singleton. An event
    /// matching both patterns counts as an effect. Causes still open after
    /// the scan follow as cause singletons, oldest first.
    pub fn find_pairs(&self, trace: &Trace) -> Vec<PairMatch> {
        let mut open: VecDeque<(&Event, Bindings)> = VecDeque::new();
        let mut matches = Vec::new();

        for event in trace {
            if let Some(effect_env) = self.effect.bind_event(event) {
                let partner = open
                    .iter()
                    .position(|(_, cause_env)| self.admits(cause_env, &effect_env))
                    .and_then(|i| open.remove(i));
                matches.push(match partner {
                    Some((cause, _)) => PairMatch::Pair {
                        cause: cause.clone(),
                        effect: event.clone(),
                    },
                    None => PairMatch::Singleton {
                        event: event.clone(),
                        role: Role::Effect,
                    },
                });
            } else if let Some(cause_env) = self.cause.bind_event(event) {
                open.push_back((event, cause_env));
            }
        }

        matches.extend(open.into_iter().map(|(event, _)| PairMatch::Singleton {
            event: event.clone(),
            role: Role::Cause,
        }));
        matches
    }

    /// Pair and assert
    ///
    /// An effect without a preceding cause always fails with
    /// `OrderViolation`. When `strict`, a cause without an effect fails
    /// with `UnmatchedCause`.
    pub fn assert_pairs(&self, strict: bool, trace: &Trace) -> Result<Vec<PairMatch>> {
        let matches = self.find_pairs(trace);

        if let Some(effect) = matches.iter().find_map(|m| m.unmatched(Role::Effect)) {
            return Err(TraceError::OrderViolation {
                kind: effect.kind.clone(),
                timestamp: effect.timestamp,
            });
        }
        if strict {
            if let Some(cause) = matches.iter().find_map(|m| m.unmatched(Role::Cause)) {
                return Err(TraceError::UnmatchedCause {
                    kind: cause.kind.clone(),
                    timestamp: cause.timestamp,
                });
            }
        }
        Ok(matches)
    }

    /// Every effect has a preceding cause
    pub fn causality(&self, trace: &Trace) -> Result<Vec<PairMatch>> {
        self.assert_pairs(false, trace)
    }

    /// Every effect has a preceding cause and every cause has an effect
    pub fn strict_causality(&self, trace: &Trace) -> Result<Vec<PairMatch>> {
        self.assert_pairs(true, trace)
    }
}
