//! JSON Lines persistence for traces
//!
//! One event per line, in trace order. Blank lines are skipped on import.

use std::fs;
use std::path::Path;

use crate::error::{Result, TraceError};

use super::event::{Event, Trace};

impl Trace {
    /// Export events as JSONL
    pub fn to_jsonl(&self) -> Result<String> {
        let lines = self
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lines.join("\n"))
    }

    /// Import events from JSONL, keeping line order
    pub fn from_jsonl(jsonl: &str) -> Result<Self> {
        let mut events = Vec::new();
        for (index, line) in jsonl.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: Event =
                serde_json::from_str(line).map_err(|e| TraceError::InvalidTraceEvent {
                    reason: format!("line {}: {}", index + 1, e),
                })?;
            events.push(event);
        }
        Ok(Trace::new(events))
    }
}

/// Write a trace to a JSONL file
pub fn write_jsonl_file(path: impl AsRef<Path>, trace: &Trace) -> Result<()> {
    let mut contents = trace.to_jsonl()?;
    contents.push('\n');
    fs::write(path, contents)?;
    Ok(())
}

/// Read a trace from a JSONL file
pub fn read_jsonl_file(path: impl AsRef<Path>) -> Result<Trace> {
    let contents = fs::read_to_string(path)?;
    Trace::from_jsonl(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_export_import_jsonl() {
        let trace = Trace::new(vec![
            Event::new("session.started", 0).attr("node", "n1"),
            Event::new("session.ended", 1).attr("meta", json!({"duration_ms": 1000})),
        ]);

        let jsonl = trace.to_jsonl().unwrap();
        assert_eq!(jsonl.lines().count(), 2);
        assert!(jsonl.contains("session.started"));

        let imported = Trace::from_jsonl(&jsonl).unwrap();
        assert_eq!(imported, trace);
    }

    #[test]
    fn test_import_reports_line_number() {
        let good = serde_json::to_string(&Event::new("k", 0)).unwrap();
        let jsonl = format!("{}\n\n{{not json}}\n", good);

        let err = Trace::from_jsonl(&jsonl).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRACE_EVENT");
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_import_hand_written_lines() {
        let jsonl = r#"{"kind": "cause", "timestamp": 0, "attributes": {"val": 1}}
{"kind": "effect", "level": "warn", "timestamp": 1}"#;

        let trace = Trace::from_jsonl(jsonl).unwrap();
        assert_eq!(trace.kinds(), vec!["cause", "effect"]);
        assert_eq!(trace.events()[0].get("val"), Some(&json!(1)));
        assert_eq!(trace.events()[1].level, crate::trace::Level::Warn);
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("kaffe-store-{}.jsonl", uuid::Uuid::new_v4()));
        let trace = Trace::new(vec![Event::new("a", 0), Event::new("b", 1)]);

        write_jsonl_file(&path, &trace).unwrap();
        let loaded = read_jsonl_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.kinds(), vec!["a", "b"]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_jsonl_file("/nonexistent/kaffe/trace.jsonl").unwrap_err();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
