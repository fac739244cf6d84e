//! Emission surface for instrumented code
//!
//! Instrumented code holds an [`Emitter`] chosen once at startup. In
//! `Collect` mode trace points go to a [`TraceCollector`]; in `Log` mode
//! they become `tracing` events at the point's level and nothing is
//! recorded, so fault injection never fires.

use std::sync::Arc;

use crate::config::EmitMode;
use crate::error::Result;
use crate::trace::{Level, TraceCollector, TracePoint};

/// Runtime-selected destination for trace points
#[derive(Debug, Clone)]
pub enum Emitter {
    Collect(Arc<TraceCollector>),
    Log,
}

impl Emitter {
    /// Pick the emitter for a mode
    pub fn from_mode(mode: EmitMode, collector: &Arc<TraceCollector>) -> Self {
        match mode {
            EmitMode::Collect => Emitter::Collect(Arc::clone(collector)),
            EmitMode::Log => Emitter::Log,
        }
    }

    /// Emit a trace point
    ///
    /// Returns `InjectedCrash` when a fault rule fires; the caller should
    /// treat it like any other failure of the operation it instruments.
    pub fn emit(&self, point: TracePoint) -> Result<()> {
        match self {
            Emitter::Collect(collector) => collector.emit(point),
            Emitter::Log => {
                log_point(&point);
                Ok(())
            }
        }
    }
}

fn log_point(point: &TracePoint) {
    let attributes = serde_json::Value::Object(point.attributes.clone());
    let kind = point.kind.as_str();
    match point.level {
        Level::Trace => tracing::trace!(kind, %attributes, "trace point"),
        Level::Debug => tracing::debug!(kind, %attributes, "trace point"),
        Level::Info => tracing::info!(kind, %attributes, "trace point"),
        Level::Warn => tracing::warn!(kind, %attributes, "trace point"),
        Level::Error => tracing::error!(kind, %attributes, "trace point"),
    }
}

/// Emit a trace point with JSON attributes
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use kaffe_core::{tp, Emitter, Level, TraceCollector};
///
/// let collector = Arc::new(TraceCollector::new());
/// collector.start().unwrap();
/// let emitter = Emitter::Collect(Arc::clone(&collector));
///
/// tp!(emitter, Level::Info, "job.done", {"job": 3}).unwrap();
/// tp!(emitter, "heartbeat").unwrap();
///
/// let trace = collector.collect(Duration::ZERO).unwrap();
/// assert_eq!(trace.kinds(), vec!["job.done", "heartbeat"]);
/// ```
#[macro_export]
macro_rules! tp {
    ($emitter:expr, $level:expr, $kind:expr, $($attrs:tt)+) => {
        $emitter.emit(
            $crate::TracePoint::new($kind)
                .with_level($level)
                .with_attributes($crate::__serde_json::json!($($attrs)+)),
        )
    };
    ($emitter:expr, $level:expr, $kind:expr) => {
        $emitter.emit($crate::TracePoint::new($kind).with_level($level))
    };
    ($emitter:expr, $kind:expr) => {
        $emitter.emit($crate::TracePoint::new($kind))
    };
}
