//! Event patterns and variable binding

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde_json::Value;

use crate::error::{Result, TraceError};
use crate::trace::{lookup, Attributes, Event, TracePoint};

/// Variables bound by a successful match
pub type Bindings = BTreeMap<String, Value>;

/// Something that can decide whether an event is interesting
///
/// Implemented for [`Pattern`] and for plain closures, so blocking waits
/// accept either.
pub trait EventFilter: Send + Sync {
    /// Returns true if the event satisfies this filter
    fn test(&self, event: &Event) -> bool;
}

impl<F> EventFilter for F
where
    F: Fn(&Event) -> bool + Send + Sync,
{
    fn test(&self, event: &Event) -> bool {
        self(event)
    }
}

impl EventFilter for Pattern {
    fn test(&self, event: &Event) -> bool {
        self.bind_event(event).is_some()
    }
}

#[derive(Debug, Clone)]
enum KindMatcher {
    Any,
    Exact(String),
    Glob(glob::Pattern),
}

impl KindMatcher {
    fn matches(&self, kind: &str) -> bool {
        match self {
            KindMatcher::Any => true,
            KindMatcher::Exact(k) => k == kind,
            KindMatcher::Glob(p) => p.matches(kind),
        }
    }
}

#[derive(Debug, Clone)]
enum Constraint {
    Equals { key: String, value: Value },
    Exists { key: String },
    Matches { key: String, regex: Regex },
}

impl Constraint {
    fn key(&self) -> &str {
        match self {
            Constraint::Equals { key, .. }
            | Constraint::Exists { key }
            | Constraint::Matches { key, .. } => key,
        }
    }

    fn holds(&self, attributes: &Attributes) -> bool {
        match self {
            Constraint::Equals { key, value } => lookup(attributes, key) == Some(value),
            Constraint::Exists { key } => lookup(attributes, key).is_some(),
            Constraint::Matches { key, regex } => lookup(attributes, key)
                .and_then(Value::as_str)
                .is_some_and(|s| regex.is_match(s)),
        }
    }
}

#[derive(Debug, Clone)]
enum Binder {
    Attribute { var: String, key: String },
    Timestamp { var: String },
    Kind { var: String },
}

impl Binder {
    fn var(&self) -> &str {
        match self {
            Binder::Attribute { var, .. } | Binder::Timestamp { var } | Binder::Kind { var } => var,
        }
    }
}

/// A predicate over events that can bind variables
///
/// ```rust
/// use kaffe_core::{Event, Pattern};
/// use serde_json::json;
///
/// let pattern = Pattern::kind("req.sent").bind("id", "request_id");
/// let event = Event::new("req.sent", 0).attr("request_id", 7);
///
/// let bindings = pattern.bind_event(&event).unwrap();
/// assert_eq!(bindings["id"], json!(7));
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    kind: KindMatcher,
    constraints: Vec<Constraint>,
    binders: Vec<Binder>,
}

impl Pattern {
    /// Match events of exactly this kind
    pub fn kind(kind: impl Into<String>) -> Self {
        Self::with_matcher(KindMatcher::Exact(kind.into()))
    }

    /// Match events whose kind matches a glob (`db.*`, `*.failed`)
    pub fn kind_glob(glob: &str) -> Result<Self> {
        let pattern = glob::Pattern::new(glob)
            .map_err(|e| TraceError::config(format!("invalid kind glob '{}': {}", glob, e)))?;
        Ok(Self::with_matcher(KindMatcher::Glob(pattern)))
    }

    /// Match events of any kind
    pub fn any() -> Self {
        Self::with_matcher(KindMatcher::Any)
    }

    fn with_matcher(kind: KindMatcher) -> Self {
        Self {
            kind,
            constraints: Vec::new(),
            binders: Vec::new(),
        }
    }

    /// Require an attribute to equal a value
    pub fn field_eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.constraints.push(Constraint::Equals {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Require an attribute to be present
    pub fn field_exists(mut self, key: impl Into<String>) -> Self {
        self.constraints.push(Constraint::Exists { key: key.into() });
        self
    }

    /// Require a string attribute to match a regular expression
    pub fn field_matches(mut self, key: impl Into<String>, regex: &str) -> Result<Self> {
        let regex = Regex::new(regex)
            .map_err(|e| TraceError::config(format!("invalid regex '{}': {}", regex, e)))?;
        self.constraints.push(Constraint::Matches {
            key: key.into(),
            regex,
        });
        Ok(self)
    }

    /// Bind variable `var` to the value of attribute `key`
    ///
    /// The attribute becomes required. Binding the same variable twice in
    /// one pattern requires both values to be equal.
    pub fn bind(mut self, var: impl Into<String>, key: impl Into<String>) -> Self {
        self.binders.push(Binder::Attribute {
            var: var.into(),
            key: key.into(),
        });
        self
    }

    /// Bind variable `var` to the event's arrival timestamp
    pub fn bind_timestamp(mut self, var: impl Into<String>) -> Self {
        self.binders.push(Binder::Timestamp { var: var.into() });
        self
    }

    /// Bind variable `var` to the event's kind
    pub fn bind_kind(mut self, var: impl Into<String>) -> Self {
        self.binders.push(Binder::Kind { var: var.into() });
        self
    }

    /// Attribute keys an event must carry to match
    pub fn required_fields(&self) -> BTreeSet<&str> {
        let constrained = self.constraints.iter().map(Constraint::key);
        let bound = self.binders.iter().filter_map(|b| match b {
            Binder::Attribute { key, .. } => Some(key.as_str()),
            _ => None,
        });
        constrained.chain(bound).collect()
    }

    /// Variables a successful match binds
    pub fn bound_variables(&self) -> BTreeSet<&str> {
        self.binders.iter().map(Binder::var).collect()
    }

    /// Match a recorded event, returning its bindings
    pub fn bind_event(&self, event: &Event) -> Option<Bindings> {
        self.bind_parts(&event.kind, &event.attributes, Some(event.timestamp))
    }

    /// Whether an unrecorded trace point matches
    ///
    /// Timestamp binders are skipped since the point has no arrival index yet.
    pub fn matches_point(&self, point: &TracePoint) -> bool {
        self.bind_parts(&point.kind, &point.attributes, None).is_some()
    }

    fn bind_parts(
        &self,
        kind: &str,
        attributes: &Attributes,
        timestamp: Option<u64>,
    ) -> Option<Bindings> {
        if !self.kind.matches(kind) {
            return None;
        }
        if !self.constraints.iter().all(|c| c.holds(attributes)) {
            return None;
        }

        let mut bindings = Bindings::new();
        for binder in &self.binders {
            let value = match binder {
                Binder::Attribute { key, .. } => lookup(attributes, key)?.clone(),
                Binder::Timestamp { .. } => match timestamp {
                    Some(ts) => Value::from(ts),
                    None => continue,
                },
                Binder::Kind { .. } => Value::from(kind),
            };
            let var = binder.var();
            match bindings.get(var) {
                Some(existing) if *existing != value => return None,
                Some(_) => {}
                None => {
                    bindings.insert(var.to_string(), value);
                }
            }
        }
        Some(bindings)
    }
}
