//! Guards over cause/effect bindings

use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TraceError};

use super::pattern::{Bindings, Pattern};

type GuardFn = dyn Fn(&Bindings, &Bindings) -> bool + Send + Sync;

/// A pure predicate over the bindings of a cause and an effect
///
/// A guard declares which variables it reads from each side. The
/// declaration is checked against the patterns when a pairing query is
/// built, so the predicate itself can index the environments directly.
#[derive(Clone)]
pub struct Guard {
    cause_vars: Vec<String>,
    effect_vars: Vec<String>,
    check: Arc<GuardFn>,
}

impl Guard {
    /// Create a guard that reads `cause_vars` and `effect_vars`
    pub fn new<F>(cause_vars: &[&str], effect_vars: &[&str], check: F) -> Self
    where
        F: Fn(&Bindings, &Bindings) -> bool + Send + Sync + 'static,
    {
        Self {
            cause_vars: cause_vars.iter().map(|v| v.to_string()).collect(),
            effect_vars: effect_vars.iter().map(|v| v.to_string()).collect(),
            check: Arc::new(check),
        }
    }

    /// Guard requiring `cause_var` on the cause to equal `effect_var` on the effect
    pub fn equal(cause_var: &str, effect_var: &str) -> Self {
        let (c, e) = (cause_var.to_string(), effect_var.to_string());
        Self::new(&[cause_var], &[effect_var], move |cause, effect| {
            cause.get(&c) == effect.get(&e)
        })
    }

    /// Check that every declared variable is bound by its pattern
    pub fn validate(&self, cause: &Pattern, effect: &Pattern) -> Result<()> {
        let sides = [
            ("cause", &self.cause_vars, cause.bound_variables()),
            ("effect", &self.effect_vars, effect.bound_variables()),
        ];
        for (side, declared, bound) in sides {
            if let Some(var) = declared.iter().find(|v| !bound.contains(v.as_str())) {
                return Err(TraceError::ConfigurationError {
                    reason: format!(
                        "guard references variable '{}' not bound by the {} pattern",
                        var, side
                    ),
                });
            }
        }
        Ok(())
    }

    /// Evaluate the guard
    pub fn holds(&self, cause: &Bindings, effect: &Bindings) -> bool {
        (self.check)(cause, effect)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("cause_vars", &self.cause_vars)
            .field("effect_vars", &self.effect_vars)
            .field("check", &"<fn>")
            .finish()
    }
}
