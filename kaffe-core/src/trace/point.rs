//! Trace points before they reach the collector
//!
//! A `TracePoint` is what instrumented code hands to `emit()`. It has no
//! timestamp yet: arrival order is assigned by the collector when (and if)
//! the point is recorded. Fault injection rules look at trace points, not
//! at recorded events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::{lookup, Attributes, Level};

/// An emission that has not been recorded yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    /// Identifier of the trace point
    pub kind: String,

    /// Severity used when the point degrades to a log line
    #[serde(default)]
    pub level: Level,

    /// Structured payload
    #[serde(default)]
    pub attributes: Attributes,
}

impl TracePoint {
    /// Create a trace point with no attributes at `Info` level
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            level: Level::default(),
            attributes: Attributes::new(),
        }
    }

    /// Set the level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Add a single attribute
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Merge a JSON object into the attributes
    ///
    /// A non-object value is stored under the `value` key.
    pub fn with_attributes(mut self, attributes: Value) -> Self {
        match attributes {
            Value::Object(map) => self.attributes.extend(map),
            Value::Null => {}
            other => {
                self.attributes.insert("value".to_string(), other);
            }
        }
        self
    }

    /// Look up an attribute by key or JSON pointer
    pub fn get(&self, key: &str) -> Option<&Value> {
        lookup(&self.attributes, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trace_point_creation() {
        let point = TracePoint::new("disk.write")
            .with_level(Level::Debug)
            .attr("block", 7);

        assert_eq!(point.kind, "disk.write");
        assert_eq!(point.level, Level::Debug);
        assert_eq!(point.get("block"), Some(&json!(7)));
    }

    #[test]
    fn test_with_attributes_merges_objects() {
        let point = TracePoint::new("k")
            .attr("a", 1)
            .with_attributes(json!({"b": {"c": true}}));

        assert_eq!(point.get("a"), Some(&json!(1)));
        assert_eq!(point.get("/b/c"), Some(&json!(true)));
    }

    #[test]
    fn test_with_attributes_scalar() {
        let point = TracePoint::new("k").with_attributes(json!(42));
        assert_eq!(point.get("value"), Some(&json!(42)));
    }
}
