//! Recorded events and the drained trace

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::point::TracePoint;

/// Attribute mapping carried by every event
///
/// Keys are ordered, values are dynamically typed (primitive, string,
/// array or nested mapping).
pub type Attributes = Map<String, Value>;

/// Severity of a trace point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Level {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Look up an attribute
///
/// A plain key addresses a top-level attribute. A key starting with `/`
/// is a JSON pointer into nested mappings (`/request/id`).
pub(crate) fn lookup<'a>(attributes: &'a Attributes, key: &str) -> Option<&'a Value> {
    let Some(pointer) = key.strip_prefix('/') else {
        return attributes.get(key);
    };

    let (head, rest) = match pointer.find('/') {
        Some(i) => (&pointer[..i], &pointer[i..]),
        None => (pointer, ""),
    };
    let head = head.replace("~1", "/").replace("~0", "~");
    let value = attributes.get(&head)?;

    if rest.is_empty() {
        Some(value)
    } else {
        value.pointer(rest)
    }
}

/// A single recorded event
///
/// Equality ignores `recorded_at`: two events are equal when they carry the
/// same kind, level, arrival index and attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Identifier of the trace point that produced this event
    pub kind: String,

    /// Severity of the trace point
    #[serde(default)]
    pub level: Level,

    /// Arrival index at the collector; the canonical ordering key
    pub timestamp: u64,

    /// Wall-clock time of arrival (informational, never used for ordering)
    #[serde(default = "Utc::now")]
    pub recorded_at: DateTime<Utc>,

    /// Structured payload
    #[serde(default)]
    pub attributes: Attributes,
}

impl Event {
    /// Create an event directly (for hand-built traces and tests)
    pub fn new(kind: impl Into<String>, timestamp: u64) -> Self {
        Self {
            kind: kind.into(),
            level: Level::default(),
            timestamp,
            recorded_at: Utc::now(),
            attributes: Attributes::new(),
        }
    }

    /// Record a trace point at the given arrival index
    pub(crate) fn record(point: TracePoint, timestamp: u64) -> Self {
        Self {
            kind: point.kind,
            level: point.level,
            timestamp,
            recorded_at: Utc::now(),
            attributes: point.attributes,
        }
    }

    /// Add a single attribute
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute by key or JSON pointer
    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup(&self.attributes, key)
    }

    /// Whether two events carry the same kind and attributes
    pub fn same_content(&self, other: &Event) -> bool {
        self.kind == other.kind && self.attributes == other.attributes
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp
            && self.level == other.level
            && self.kind == other.kind
            && self.attributes == other.attributes
    }
}

/// An ordered, immutable snapshot of recorded events
///
/// Produced by `TraceCollector::collect()` or loaded from JSON Lines.
/// Events keep the order they were given in; for collected traces that is
/// arrival order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Trace {
    events: Vec<Event>,
}

impl Trace {
    /// Wrap an ordered list of events
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Iterate over events in order
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the trace has no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Borrow the events
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take ownership of the events
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    /// Events of one kind, in order
    pub fn of_kind<'a>(
        &'a self,
        kind: &'a str,
    ) -> impl Iterator<Item = &'a Event> + Clone + 'a {
        crate::matching::filter_by_kind(kind, self)
    }

    /// Attribute tuples for `keys`, skipping events that lack any of them
    pub fn project<'a>(
        &'a self,
        keys: &'a [&'a str],
    ) -> impl Iterator<Item = Vec<Value>> + Clone + 'a {
        crate::matching::project(keys, self)
    }

    /// Distinct kinds in order of first appearance
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = Vec::new();
        for event in &self.events {
            if !kinds.contains(&event.kind.as_str()) {
                kinds.push(&event.kind);
            }
        }
        kinds
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl IntoIterator for Trace {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl FromIterator<Event> for Trace {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
