//! Check-stage queries over traces produced by a live collector.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;

use kaffe_core::{
    causality, find_pairs, pair_max_depth, strict_causality, strictly_increasing, unique, Event,
    Guard, PairMatch, Pattern, Role, Trace, TraceCollector, TraceError, TracePoint,
};

fn cause(ts: u64, val: i64) -> Event {
    Event::new("cause", ts).attr("val", val)
}

fn effect(ts: u64, val: i64) -> Event {
    Event::new("effect", ts).attr("val", val)
}

fn cause_pattern() -> Pattern {
    Pattern::kind("cause").bind("c", "val")
}

fn effect_pattern() -> Pattern {
    Pattern::kind("effect").bind("e", "val")
}

fn same_val() -> Option<Guard> {
    Some(Guard::equal("c", "e"))
}

#[test]
fn test_guarded_pairs_in_order() {
    let trace = Trace::new(vec![cause(0, 1), cause(1, 2), effect(2, 1), effect(3, 2)]);
    let pairs = find_pairs(cause_pattern(), effect_pattern(), same_val(), &trace).unwrap();

    assert_eq!(
        pairs,
        vec![
            PairMatch::Pair { cause: cause(0, 1), effect: effect(2, 1) },
            PairMatch::Pair { cause: cause(1, 2), effect: effect(3, 2) },
        ]
    );
    assert!(strict_causality(cause_pattern(), effect_pattern(), same_val(), &trace).is_ok());
}

#[test]
fn test_missing_effect() {
    let trace = Trace::new(vec![cause(0, 1), cause(1, 2), effect(2, 1)]);
    let pairs = find_pairs(cause_pattern(), effect_pattern(), same_val(), &trace).unwrap();

    assert_eq!(
        pairs,
        vec![
            PairMatch::Pair { cause: cause(0, 1), effect: effect(2, 1) },
            PairMatch::Singleton { event: cause(1, 2), role: Role::Cause },
        ]
    );
    assert!(causality(cause_pattern(), effect_pattern(), same_val(), &trace).is_ok());

    let err = strict_causality(cause_pattern(), effect_pattern(), same_val(), &trace).unwrap_err();
    assert_eq!(err.error_code(), "UNMATCHED_CAUSE");
}

#[test]
fn test_effect_without_preceding_cause() {
    let trace = Trace::new(vec![effect(0, 1), cause(1, 1)]);
    let pairs = find_pairs(cause_pattern(), effect_pattern(), same_val(), &trace).unwrap();

    assert_eq!(pairs[0], PairMatch::Singleton { event: effect(0, 1), role: Role::Effect });

    let err = causality(cause_pattern(), effect_pattern(), same_val(), &trace).unwrap_err();
    assert!(matches!(err, TraceError::OrderViolation { timestamp: 0, .. }));
}

#[test]
fn test_unbound_guard_variable_fails_at_construction() {
    let trace = Trace::new(vec![cause(0, 1)]);
    let err = find_pairs(
        Pattern::kind("cause"),
        effect_pattern(),
        Some(Guard::equal("c", "e")),
        &trace,
    )
    .unwrap_err();
    assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
}

/// Concurrent clients; each response must follow its own request
#[test]
fn test_request_response_from_collector() {
    let collector = Arc::new(TraceCollector::new());
    collector.start().unwrap();

    let clients: Vec<_> = (0..6)
        .map(|client| {
            let collector = Arc::clone(&collector);
            thread::spawn(move || {
                for n in 0..20 {
                    let id = format!("{}-{}", client, n);
                    collector
                        .emit(
                            TracePoint::new("req.sent")
                                .attr("id", id.clone())
                                .attr("client", client),
                        )
                        .unwrap();
                    collector
                        .emit(TracePoint::new("req.done").attr("id", id).attr("client", client))
                        .unwrap();
                }
            })
        })
        .collect();
    for client in clients {
        client.join().unwrap();
    }
    let trace = collector.collect(Duration::from_millis(10)).unwrap();

    let pairs = strict_causality(
        Pattern::kind("req.sent").bind("sent", "id"),
        Pattern::kind("req.done").bind("done", "id"),
        Some(Guard::equal("sent", "done")),
        &trace,
    )
    .unwrap();

    assert_eq!(pairs.len(), 120);
    assert!(pairs.iter().all(|p| p.cause().unwrap().timestamp < p.effect().unwrap().timestamp));
    assert!((1..=6).contains(&pair_max_depth(&pairs)));
    unique(&trace).unwrap();
}

#[test]
fn test_projection_checks() {
    let trace = Trace::new(vec![
        Event::new("tx.commit", 0).attr("tx", 1),
        Event::new("tx.begin", 1).attr("tx", 2),
        Event::new("tx.commit", 2).attr("tx", 2),
        Event::new("tx.commit", 3).attr("status", "late"),
        Event::new("tx.commit", 4).attr("tx", 5),
    ]);

    let committed: Trace = trace.of_kind("tx.commit").cloned().collect();
    let ids: Vec<_> = committed.project(&["tx"]).map(|mut t| t.remove(0)).collect();

    assert_eq!(ids, vec![json!(1), json!(2), json!(5)]);
    assert!(strictly_increasing(&ids));
}

#[test]
fn test_checks_on_reloaded_trace() {
    let trace = Trace::new(vec![cause(0, 7), effect(1, 7), cause(2, 7), effect(3, 7)]);
    let reloaded = Trace::from_jsonl(&trace.to_jsonl().unwrap()).unwrap();

    assert_eq!(reloaded, trace);
    let pairs = strict_causality(cause_pattern(), effect_pattern(), same_val(), &reloaded).unwrap();
    assert_eq!(pair_max_depth(&pairs), 1);

    let err = unique(&reloaded).unwrap_err();
    assert!(matches!(err, TraceError::DuplicateEvent { first: 0, second: 2, .. }));
}
