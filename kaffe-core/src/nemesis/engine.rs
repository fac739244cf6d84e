//! Fault rule registry and interception

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TraceError};
use crate::matching::Pattern;
use crate::trace::{Level, TracePoint};

use super::scenario::{Scenario, ScenarioState};

/// Kind of the event recorded in place of a crashed trace point
pub const CRASH_KIND: &str = "snabbkaffe_crash";

/// Reason used when `inject_crash` is given none
pub const DEFAULT_CRASH_REASON: &str = "notmyday";

/// Identifier of a registered fault rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(String);

impl RuleId {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered fault injection rule
#[derive(Debug)]
pub struct FaultRule {
    id: RuleId,
    pattern: Pattern,
    reason: String,
    state: Mutex<ScenarioState>,
}

impl FaultRule {
    /// Rule identifier
    pub fn id(&self) -> &RuleId {
        &self.id
    }

    /// Reason reported when this rule crashes
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Pattern selecting the trace points this rule applies to
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Run the scenario if the point matches; true means crash
    fn evaluate(&self, point: &TracePoint) -> bool {
        if !self.pattern.matches_point(point) {
            return false;
        }
        self.state.lock().decide()
    }
}

/// A crash decided by a fault rule
#[derive(Debug, Clone, PartialEq)]
pub struct Crash {
    /// Rule that fired
    pub rule_id: RuleId,
    /// Kind of the trace point that was suppressed
    pub kind: String,
    /// Failure reason handed to the caller
    pub reason: String,
}

impl Crash {
    /// The `snabbkaffe_crash` record that replaces the suppressed point
    pub fn to_trace_point(&self) -> TracePoint {
        TracePoint::new(CRASH_KIND)
            .with_level(Level::Error)
            .attr("crash_kind", self.kind.clone())
            .attr("reason", self.reason.clone())
            .attr("rule_id", self.rule_id.as_str())
    }

    /// The error raised at the instrumented call site
    pub fn into_error(self) -> TraceError {
        TraceError::InjectedCrash {
            kind: self.kind,
            reason: self.reason,
        }
    }
}

/// Registry of active fault rules
///
/// The rule list is behind a read/write lock; each rule's scheduling state
/// has its own mutex, so concurrent attempts on one rule are serialized
/// while different rules never contend.
pub struct FaultEngine {
    rules: RwLock<Vec<Arc<FaultRule>>>,
    seed: u64,
    registered: AtomicU64,
}

impl FaultEngine {
    /// Create an engine whose random scenarios derive from `seed`
    pub fn new(seed: u64) -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            seed,
            registered: AtomicU64::new(0),
        }
    }

    /// Register a new, independently scheduled rule
    ///
    /// Random scenarios draw from their own ChaCha stream (engine seed,
    /// registration index), so a fixed seed reproduces the crash schedule.
    pub fn inject_crash(
        &self,
        pattern: Pattern,
        scenario: Scenario,
        reason: Option<&str>,
    ) -> Result<RuleId> {
        scenario.validate()?;

        let index = self.registered.fetch_add(1, Ordering::SeqCst);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(index);

        let rule = FaultRule {
            id: RuleId::generate(),
            pattern,
            reason: reason.unwrap_or(DEFAULT_CRASH_REASON).to_string(),
            state: Mutex::new(scenario.into_state(rng)),
        };
        let id = rule.id.clone();

        tracing::debug!(rule_id = %id, reason = %rule.reason, "fault rule registered");
        self.rules.write().push(Arc::new(rule));
        Ok(id)
    }

    /// Remove a rule and its scheduling state; false if it was not active
    pub fn fix_crash(&self, id: &RuleId) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| r.id != *id);
        let removed = rules.len() != before;
        if removed {
            tracing::debug!(rule_id = %id, "fault rule removed");
        }
        removed
    }

    /// Remove every rule
    pub fn clear(&self) {
        self.rules.write().clear();
    }

    /// Number of active rules
    pub fn active_rules(&self) -> usize {
        self.rules.read().len()
    }

    /// Identifiers of active rules, in registration order
    pub fn rule_ids(&self) -> Vec<RuleId> {
        self.rules.read().iter().map(|r| r.id.clone()).collect()
    }

    /// Look up an active rule
    pub fn rule(&self, id: &RuleId) -> Option<Arc<FaultRule>> {
        self.rules.read().iter().find(|r| r.id == *id).cloned()
    }

    /// Decide whether a trace point is crashed
    ///
    /// Every matching rule is evaluated (advancing its own state); the
    /// first one, in registration order, that decides to crash supplies
    /// the reason.
    pub fn intercept(&self, point: &TracePoint) -> Option<Crash> {
        let rules = self.rules.read();
        let mut crash = None;
        for rule in rules.iter() {
            if rule.evaluate(point) && crash.is_none() {
                crash = Some(Crash {
                    rule_id: rule.id.clone(),
                    kind: point.kind.clone(),
                    reason: rule.reason.clone(),
                });
            }
        }
        crash
    }
}

impl Default for FaultEngine {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SEED)
    }
}

impl fmt::Debug for FaultEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultEngine")
            .field("rules", &self.active_rules())
            .field("seed", &self.seed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(kind: &str) -> TracePoint {
        TracePoint::new(kind)
    }

    #[test]
    fn test_no_rules_no_crash() {
        let engine = FaultEngine::new(1);
        assert!(engine.intercept(&point("write")).is_none());
    }

    #[test]
    fn test_inject_and_fix() {
        let engine = FaultEngine::new(1);
        let id = engine
            .inject_crash(Pattern::kind("write"), Scenario::AlwaysCrash, None)
            .unwrap();

        let crash = engine.intercept(&point("write")).unwrap();
        assert_eq!(crash.reason, DEFAULT_CRASH_REASON);
        assert_eq!(crash.kind, "write");
        assert_eq!(crash.rule_id, id);
        assert!(engine.intercept(&point("read")).is_none());

        let rule = engine.rule(&id).unwrap();
        assert_eq!(rule.reason(), DEFAULT_CRASH_REASON);
        assert!(rule.pattern().matches_point(&point("write")));

        assert!(engine.fix_crash(&id));
        assert!(!engine.fix_crash(&id));
        assert!(engine.rule(&id).is_none());
        assert!(engine.intercept(&point("write")).is_none());
    }

    #[test]
    fn test_rules_have_independent_state() {
        let engine = FaultEngine::new(1);
        engine
            .inject_crash(Pattern::kind("write"), Scenario::RecoverAfter { n: 2 }, Some("first"))
            .unwrap();

        // first rule consumes both of its crashes
        assert_eq!(engine.intercept(&point("write")).unwrap().reason, "first");
        assert_eq!(engine.intercept(&point("write")).unwrap().reason, "first");
        assert!(engine.intercept(&point("write")).is_none());

        // an identical rule registered later starts its own countdown
        engine
            .inject_crash(Pattern::kind("write"), Scenario::RecoverAfter { n: 2 }, Some("second"))
            .unwrap();
        assert_eq!(engine.intercept(&point("write")).unwrap().reason, "second");
        assert_eq!(engine.intercept(&point("write")).unwrap().reason, "second");
        assert!(engine.intercept(&point("write")).is_none());
    }

    #[test]
    fn test_all_matching_rules_advance() {
        let engine = FaultEngine::new(1);
        engine
            .inject_crash(Pattern::kind("write"), Scenario::AlwaysCrash, Some("always"))
            .unwrap();
        let counted = engine
            .inject_crash(Pattern::kind("write"), Scenario::RecoverAfter { n: 1 }, Some("once"))
            .unwrap();

        // the first rule wins the reason, but the second still spends its crash
        assert_eq!(engine.intercept(&point("write")).unwrap().reason, "always");
        engine.fix_crash(&engine.rule_ids()[0]);
        assert!(engine.intercept(&point("write")).is_none());
        assert_eq!(engine.rule_ids(), vec![counted]);
    }

    #[test]
    fn test_invalid_scenario_rejected() {
        let engine = FaultEngine::new(1);
        let err = engine
            .inject_crash(Pattern::any(), Scenario::RandomCrash { probability: 2.0 }, None)
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
        assert_eq!(engine.active_rules(), 0);
    }

    #[test]
    fn test_crash_record() {
        let crash = Crash {
            rule_id: RuleId("r-1".to_string()),
            kind: "write".to_string(),
            reason: "disk on fire".to_string(),
        };
        let record = crash.to_trace_point();
        assert_eq!(record.kind, CRASH_KIND);
        assert_eq!(record.level, Level::Error);
        assert_eq!(record.get("crash_kind").unwrap(), "write");
        assert_eq!(record.get("reason").unwrap(), "disk on fire");

        let err = crash.into_error();
        assert!(err.is_injected());
    }

    #[test]
    fn test_random_rules_are_reproducible() {
        let schedule = |seed| {
            let engine = FaultEngine::new(seed);
            engine
                .inject_crash(Pattern::any(), Scenario::RandomCrash { probability: 0.5 }, None)
                .unwrap();
            (0..32)
                .map(|_| engine.intercept(&point("k")).is_some())
                .collect::<Vec<_>>()
        };
        assert_eq!(schedule(7), schedule(7));
    }
}
