//! Crash scheduling policies

use std::f64::consts::PI;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};

/// When a fault rule decides to crash
///
/// This is the configuration form; each registered rule turns it into its
/// own [`ScenarioState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scenario {
    /// Crash on every matching attempt
    AlwaysCrash,

    /// Crash on the first `n` matching attempts, then never again
    RecoverAfter { n: u64 },

    /// Crash with the given probability (0.0 = never, 1.0 = always)
    RandomCrash { probability: f64 },

    /// Crash periodically
    ///
    /// Out of every `period` attempts, the first `floor(duty_cycle * period)`
    /// pass and the rest crash. `phase` (radians) shifts the cycle.
    PeriodicCrash {
        period: u64,
        duty_cycle: f64,
        #[serde(default)]
        phase: f64,
    },
}

impl Scenario {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        match *self {
            Scenario::AlwaysCrash | Scenario::RecoverAfter { .. } => Ok(()),
            Scenario::RandomCrash { probability } => {
                if !(0.0..=1.0).contains(&probability) {
                    return Err(TraceError::config(format!(
                        "crash probability must be within [0, 1], got {}",
                        probability
                    )));
                }
                Ok(())
            }
            Scenario::PeriodicCrash {
                period,
                duty_cycle,
                phase,
            } => {
                if period == 0 {
                    return Err(TraceError::config("crash period must be positive"));
                }
                if !(0.0..=1.0).contains(&duty_cycle) {
                    return Err(TraceError::config(format!(
                        "duty cycle must be within [0, 1], got {}",
                        duty_cycle
                    )));
                }
                if !phase.is_finite() {
                    return Err(TraceError::config("phase must be a finite number"));
                }
                Ok(())
            }
        }
    }

    /// Build the runtime state for one rule
    pub(crate) fn into_state(self, rng: ChaCha8Rng) -> ScenarioState {
        match self {
            Scenario::AlwaysCrash => ScenarioState::AlwaysCrash,
            Scenario::RecoverAfter { n } => ScenarioState::RecoverAfter { remaining: n },
            Scenario::RandomCrash { probability } => {
                ScenarioState::RandomCrash { probability, rng }
            }
            Scenario::PeriodicCrash {
                period,
                duty_cycle,
                phase,
            } => ScenarioState::PeriodicCrash {
                period,
                duty_cycle,
                phase,
                invocations: 0,
            },
        }
    }
}

/// Per-rule scheduling state
///
/// Mutated only by [`decide`](ScenarioState::decide), once per matching
/// attempt.
#[derive(Debug)]
pub enum ScenarioState {
    AlwaysCrash,
    RecoverAfter {
        remaining: u64,
    },
    RandomCrash {
        probability: f64,
        rng: ChaCha8Rng,
    },
    PeriodicCrash {
        period: u64,
        duty_cycle: f64,
        phase: f64,
        invocations: u64,
    },
}

impl ScenarioState {
    /// Decide whether this attempt crashes, advancing the state
    pub fn decide(&mut self) -> bool {
        match self {
            ScenarioState::AlwaysCrash => true,
            ScenarioState::RecoverAfter { remaining } => {
                if *remaining > 0 {
                    *remaining -= 1;
                    true
                } else {
                    false
                }
            }
            ScenarioState::RandomCrash { probability, rng } => rng.gen::<f64>() < *probability,
            ScenarioState::PeriodicCrash {
                period,
                duty_cycle,
                phase,
                invocations,
            } => {
                let k = *invocations % *period;
                *invocations = invocations.wrapping_add(1);

                // only the fraction of a full turn shifts the cycle
                let period_f = *period as f64;
                let turns = (*phase / (2.0 * PI)).rem_euclid(1.0);
                let offset = (turns * period_f).round() as u64 % *period;
                let idx = (k + offset) % *period;
                let passing = (*duty_cycle * period_f).floor() as u64;
                idx >= passing
            }
        }
    }
}
