//! Trace assertions that accompany pairing in the check stage

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;

use crate::error::{Result, TraceError};
use crate::trace::Trace;

use super::pairs::{PairMatch, Role};

/// Largest number of pairs open at the same time
///
/// A pair is open from its cause to its effect. Unmatched causes never
/// close; unmatched effects are ignored.
pub fn pair_max_depth(matches: &[PairMatch]) -> usize {
    let mut edges: Vec<(u64, i64)> = Vec::with_capacity(matches.len() * 2);
    for m in matches {
        match m {
            PairMatch::Pair { cause, effect } => {
                edges.push((cause.timestamp, 1));
                edges.push((effect.timestamp, -1));
            }
            PairMatch::Singleton { event, role: Role::Cause } => edges.push((event.timestamp, 1)),
            PairMatch::Singleton { .. } => {}
        }
    }
    edges.sort_unstable();

    let mut depth: i64 = 0;
    let mut max = 0;
    for (_, delta) in edges {
        depth += delta;
        max = max.max(depth);
    }
    max as usize
}

/// Fail if two events share kind and attributes
pub fn unique(trace: &Trace) -> Result<()> {
    let mut seen: HashMap<(&str, String), u64> = HashMap::new();
    for event in trace {
        let key = (event.kind.as_str(), serde_json::to_string(&event.attributes)?);
        if let Some(&first) = seen.get(&key) {
            return Err(TraceError::DuplicateEvent {
                kind: event.kind.clone(),
                first,
                second: event.timestamp,
            });
        }
        seen.insert(key, event.timestamp);
    }
    Ok(())
}

/// Whether each value is strictly greater than the one before
///
/// Numbers compare numerically and strings lexicographically; any other
/// neighbouring pair fails the check.
pub fn strictly_increasing(values: &[Value]) -> bool {
    values
        .windows(2)
        .all(|w| compare(&w[0], &w[1]) == Some(Ordering::Less))
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causality::PairQuery;
    use crate::matching::Pattern;
    use crate::trace::Event;
    use serde_json::json;

    #[test]
    fn test_pair_max_depth() {
        // c c e c e e  -> depth peaks at 2
        let trace = Trace::new(vec![
            Event::new("c", 0),
            Event::new("c", 1),
            Event::new("e", 2),
            Event::new("c", 3),
            Event::new("e", 4),
            Event::new("e", 5),
        ]);
        let matches = PairQuery::new(Pattern::kind("c"), Pattern::kind("e")).find_pairs(&trace);
        assert_eq!(pair_max_depth(&matches), 2);
    }

    #[test]
    fn test_pair_max_depth_counts_open_causes() {
        let trace = Trace::new(vec![Event::new("c", 0), Event::new("c", 1), Event::new("c", 2)]);
        let matches = PairQuery::new(Pattern::kind("c"), Pattern::kind("e")).find_pairs(&trace);
        assert_eq!(pair_max_depth(&matches), 3);
        assert_eq!(pair_max_depth(&[]), 0);
    }

    #[test]
    fn test_unique() {
        let ok = Trace::new(vec![
            Event::new("k", 0).attr("a", 1),
            Event::new("k", 1).attr("a", 2),
            Event::new("j", 2).attr("a", 1),
        ]);
        assert!(unique(&ok).is_ok());

        let dup = Trace::new(vec![
            Event::new("k", 0).attr("a", 1),
            Event::new("x", 1),
            Event::new("k", 2).attr("a", 1),
        ]);
        let err = unique(&dup).unwrap_err();
        assert!(matches!(err, TraceError::DuplicateEvent { first: 0, second: 2, .. }));
    }

    #[test]
    fn test_strictly_increasing() {
        assert!(strictly_increasing(&[json!(1), json!(2), json!(3.5)]));
        assert!(!strictly_increasing(&[json!(1), json!(1)]));
        assert!(strictly_increasing(&[json!("a"), json!("b")]));
        assert!(!strictly_increasing(&[json!(1), json!("b")]));
        assert!(strictly_increasing(&[]));
    }
}
