//! Run stage / check stage composition

use crate::config::RunConfig;
use crate::error::Result;
use crate::trace::{Trace, TraceCollector};

/// Run `run` under a fresh collector run, then `check` the drained trace
///
/// The check stage receives the run stage's result, including an injected
/// crash or any other error, so it can assert on failures as well as on
/// the trace. The collector is stopped afterwards whatever happened.
///
/// ```rust
/// use kaffe_core::{causality, harness, Pattern, RunConfig, TraceCollector, TracePoint};
///
/// let collector = TraceCollector::new();
/// let answer = harness::run_and_check(
///     &collector,
///     &RunConfig::default(),
///     |c| {
///         c.emit(TracePoint::new("ping"))?;
///         c.emit(TracePoint::new("pong"))?;
///         Ok(42)
///     },
///     |result, trace| {
///         causality(Pattern::kind("ping"), Pattern::kind("pong"), None, trace)?;
///         result
///     },
/// )
/// .unwrap();
/// assert_eq!(answer, 42);
/// ```
pub fn run_and_check<R, T, F, C>(
    collector: &TraceCollector,
    config: &RunConfig,
    run: F,
    check: C,
) -> Result<T>
where
    F: FnOnce(&TraceCollector) -> Result<R>,
    C: FnOnce(Result<R>, &Trace) -> Result<T>,
{
    let bucket = config.bucket.as_deref().unwrap_or("default");
    collector.start()?;
    let _stop = StopOnDrop(collector);
    tracing::debug!(bucket, "run stage started");

    let outcome = run(collector);
    let trace = collector.collect(config.timeout())?;
    tracing::debug!(
        bucket,
        events = trace.len(),
        run_ok = outcome.is_ok(),
        "check stage started"
    );

    let checked = check(outcome, &trace);
    if let Err(ref e) = checked {
        tracing::debug!(bucket, error = %e, "check stage failed");
    }
    checked
}

/// Stops the collector on every exit path, unwinding included
struct StopOnDrop<'a>(&'a TraceCollector);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use crate::error::TraceError;
    use crate::matching::Pattern;
    use crate::nemesis::{Scenario, CRASH_KIND};
    use crate::trace::{Phase, TracePoint};

    #[test]
    fn test_check_failure_still_stops() {
        let collector = TraceCollector::new();
        let err = run_and_check(
            &collector,
            &RunConfig::default(),
            |c| c.emit(TracePoint::new("effect")),
            |_, trace| {
                crate::causality::causality(
                    Pattern::kind("cause"),
                    Pattern::kind("effect"),
                    None,
                    trace,
                )
            },
        )
        .unwrap_err();

        assert_eq!(err.error_code(), "ORDER_VIOLATION");
        assert_eq!(collector.phase(), Phase::Stopped);
    }

    #[test]
    fn test_check_sees_injected_crash() {
        let collector = TraceCollector::new();
        let crashes = run_and_check(
            &collector,
            &RunConfig {
                timeout_ms: 10,
                bucket: Some("crash".to_string()),
            },
            |c| {
                c.inject_crash(Pattern::kind("write"), Scenario::AlwaysCrash, None)?;
                c.emit(TracePoint::new("write"))
            },
            |result, trace| {
                assert!(matches!(result, Err(TraceError::InjectedCrash { .. })));
                Ok(trace.of_kind(CRASH_KIND).count())
            },
        )
        .unwrap();

        assert_eq!(crashes, 1);
        assert_eq!(collector.stats().active_rules, 0);
    }

    #[test]
    fn test_already_running_is_reported() {
        let collector = TraceCollector::new();
        collector.start().unwrap();
        let err = run_and_check(&collector, &RunConfig::default(), |_| Ok(()), |r, _| r)
            .unwrap_err();
        assert!(matches!(err, TraceError::AlreadyRunning));
        // a rejected start leaves the other run alone
        assert_eq!(collector.phase(), Phase::Running);
    }

    #[test]
    fn test_panicking_run_stage_stops_collector() {
        let collector = TraceCollector::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            run_and_check(
                &collector,
                &RunConfig::default(),
                |c| -> Result<()> {
                    c.emit(TracePoint::new("before"))?;
                    panic!("run stage blew up")
                },
                |r, _| r,
            )
        }));

        assert!(result.is_err());
        assert_eq!(collector.phase(), Phase::Stopped);

        let events = run_and_check(
            &collector,
            &RunConfig::default(),
            |c| c.emit(TracePoint::new("again")),
            |_, trace| Ok(trace.len()),
        )
        .unwrap();
        assert_eq!(events, 1);
    }

    #[test]
    fn test_panicking_check_stage_clears_rules() {
        let collector = TraceCollector::new();
        let result = catch_unwind(AssertUnwindSafe(|| {
            run_and_check(
                &collector,
                &RunConfig::default(),
                |c| {
                    c.inject_crash(Pattern::kind("write"), Scenario::AlwaysCrash, None)?;
                    c.emit(TracePoint::new("write"))
                },
                |result, _| -> Result<()> {
                    assert!(result.is_ok(), "write should have gone through");
                    Ok(())
                },
            )
        }));

        assert!(result.is_err());
        assert_eq!(collector.phase(), Phase::Stopped);
        assert_eq!(collector.stats().active_rules, 0);
    }
}
