//! Kind filters and attribute projections over a trace
//!
//! All iterators here are lazy, order-preserving and `Clone`, so a query
//! can be restarted without touching the trace again.

use serde_json::Value;

use crate::trace::{Event, Trace};

/// Events whose kind equals `kind`
pub fn filter_by_kind<'a>(
    kind: &'a str,
    trace: &'a Trace,
) -> impl Iterator<Item = &'a Event> + Clone + 'a {
    trace.iter().filter(move |e| e.kind == kind)
}

/// Tuples of attribute values for `keys`
///
/// An event missing any requested key is skipped.
pub fn project<'a>(
    keys: &'a [&'a str],
    trace: &'a Trace,
) -> impl Iterator<Item = Vec<Value>> + Clone + 'a {
    trace.iter().filter_map(move |e| {
        keys.iter()
            .map(|k| e.get(k).cloned())
            .collect::<Option<Vec<_>>>()
    })
}

/// Values of a single attribute
pub fn project_one<'a>(key: &'a str, trace: &'a Trace) -> impl Iterator<Item = Value> + Clone + 'a {
    trace.iter().filter_map(move |e| e.get(key).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Trace {
        Trace::new(vec![
            Event::new("put", 0).attr("key", "a").attr("val", 1),
            Event::new("get", 1).attr("key", "a"),
            Event::new("put", 2).attr("key", "b").attr("val", 2),
            Event::new("put", 3).attr("key", "c"),
        ])
    }

    #[test]
    fn test_filter_by_kind_is_ordered_and_restartable() {
        let trace = sample();
        let puts = filter_by_kind("put", &trace);

        let first: Vec<u64> = puts.clone().map(|e| e.timestamp).collect();
        let second: Vec<u64> = puts.map(|e| e.timestamp).collect();

        assert_eq!(first, vec![0, 2, 3]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_project_skips_incomplete_events() {
        let trace = sample();
        let tuples: Vec<Vec<Value>> = project(&["key", "val"], &trace).collect();

        assert_eq!(tuples, vec![vec![json!("a"), json!(1)], vec![json!("b"), json!(2)]]);
    }

    #[test]
    fn test_project_one() {
        let trace = sample();
        let keys: Vec<Value> = project_one("key", &trace).collect();
        assert_eq!(keys, vec![json!("a"), json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_trace_methods_delegate() {
        let trace = sample();
        assert_eq!(trace.of_kind("get").count(), 1);
        assert_eq!(trace.project(&["val"]).count(), 2);
    }
}
