//! Error types for Kaffe operations
//!
//! One error enum covers every component:
//! - Collector lifecycle misuse (`AlreadyRunning`, `NotRunning`)
//! - Deadlines that were not met (`Timeout`)
//! - Check-stage assertion failures (`OrderViolation`, `UnmatchedCause`, `DuplicateEvent`)
//! - Induced faults (`InjectedCrash`)
//! - Malformed queries (`ConfigurationError`)
//!
//! # Error Codes
//!
//! Each variant has a stable code (e.g., `ORDER_VIOLATION`) so that a check
//! runner can aggregate failures without parsing messages.
//!
//! # Example
//!
//! ```rust
//! use kaffe_core::error::{TraceError, ErrorCategory};
//!
//! fn report(err: &TraceError) {
//!     match err.category() {
//!         ErrorCategory::Timeout => println!("deadline missed, handle explicitly"),
//!         ErrorCategory::Assertion => println!("check stage failed"),
//!         ErrorCategory::Fault => println!("injected crash reached the caller"),
//!         _ => println!("hard failure: {}", err.error_code()),
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Kaffe operations
pub type Result<T> = std::result::Result<T, TraceError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Collector used in the wrong phase
    Lifecycle,
    /// A blocking wait ran out of time
    Timeout,
    /// A trace assertion failed in the check stage
    Assertion,
    /// A fault injection rule fired
    Fault,
    /// A predicate, guard or config value is malformed
    Configuration,
    /// Serialization or I/O failed
    External,
    /// A bug in Kaffe itself
    Internal,
}

/// Errors that can occur in Kaffe operations
#[derive(Error, Debug)]
pub enum TraceError {
    // ═══════════════════════════════════════════════════════════════════════
    // Collector lifecycle errors
    // ═══════════════════════════════════════════════════════════════════════

    /// `start()` was called while a run is in progress
    #[error("Trace collector already running. Call collect() or stop() before starting a new run.")]
    AlreadyRunning,

    /// An operation that needs a live run was called outside of one
    #[error("Trace collector is not running. Call start() first.")]
    NotRunning,

    // ═══════════════════════════════════════════════════════════════════════
    // Synchronization errors
    // ═══════════════════════════════════════════════════════════════════════

    /// A blocking wait was not satisfied before its deadline
    #[error("Timed out after {timeout_ms}ms waiting for a matching event")]
    Timeout { timeout_ms: u64 },

    // ═══════════════════════════════════════════════════════════════════════
    // Check-stage assertion errors
    // ═══════════════════════════════════════════════════════════════════════

    /// An effect occurred with no preceding cause
    #[error("Causality violation: effect '{kind}' at timestamp {timestamp} has no preceding cause")]
    OrderViolation { kind: String, timestamp: u64 },

    /// A strict causality check found a cause that never got its effect
    #[error("Unmatched cause: '{kind}' at timestamp {timestamp} was never followed by an effect")]
    UnmatchedCause { kind: String, timestamp: u64 },

    /// Two events with the same kind and attributes were found
    #[error("Duplicate event '{kind}' at timestamps {first} and {second}")]
    DuplicateEvent { kind: String, first: u64, second: u64 },

    // ═══════════════════════════════════════════════════════════════════════
    // Fault injection
    // ═══════════════════════════════════════════════════════════════════════

    /// A fault injection rule decided to crash this trace point
    #[error("Injected crash at trace point '{kind}': {reason}")]
    InjectedCrash { kind: String, reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Configuration errors
    // ═══════════════════════════════════════════════════════════════════════

    /// Malformed pattern, guard or configuration value
    #[error("Configuration error: {reason}")]
    ConfigurationError { reason: String },

    /// A serialized trace line could not be turned into an event
    #[error("Invalid trace event: {reason}")]
    InvalidTraceEvent { reason: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors
    // ═══════════════════════════════════════════════════════════════════════

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// I/O operation failed
    #[error("IO error: {message}")]
    IoError { message: String },

    /// Internal error that shouldn't happen
    #[error("Internal error: {reason}. This is a bug; please report it.")]
    InternalError { reason: String },
}

impl TraceError {
    pub(crate) fn config(reason: impl Into<String>) -> Self {
        TraceError::ConfigurationError {
            reason: reason.into(),
        }
    }

    /// Returns true if the caller is expected to handle this as a normal result
    ///
    /// Only timeouts are recoverable. Lifecycle and configuration errors are
    /// programmer errors; assertion failures end the check stage; injected
    /// crashes must reach the code under test unchanged.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TraceError::Timeout { .. })
    }

    /// Returns true if this error was produced by fault injection
    pub fn is_injected(&self) -> bool {
        matches!(self, TraceError::InjectedCrash { .. })
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            TraceError::AlreadyRunning | TraceError::NotRunning => ErrorCategory::Lifecycle,

            TraceError::Timeout { .. } => ErrorCategory::Timeout,

            TraceError::OrderViolation { .. }
            | TraceError::UnmatchedCause { .. }
            | TraceError::DuplicateEvent { .. } => ErrorCategory::Assertion,

            TraceError::InjectedCrash { .. } => ErrorCategory::Fault,

            TraceError::ConfigurationError { .. }
            | TraceError::InvalidTraceEvent { .. } => ErrorCategory::Configuration,

            TraceError::JsonError(_) | TraceError::IoError { .. } => ErrorCategory::External,

            TraceError::InternalError { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            TraceError::AlreadyRunning => "ALREADY_RUNNING",
            TraceError::NotRunning => "NOT_RUNNING",
            TraceError::Timeout { .. } => "TIMEOUT",
            TraceError::OrderViolation { .. } => "ORDER_VIOLATION",
            TraceError::UnmatchedCause { .. } => "UNMATCHED_CAUSE",
            TraceError::DuplicateEvent { .. } => "DUPLICATE_EVENT",
            TraceError::InjectedCrash { .. } => "INJECTED_CRASH",
            TraceError::ConfigurationError { .. } => "CONFIGURATION_ERROR",
            TraceError::InvalidTraceEvent { .. } => "INVALID_TRACE_EVENT",
            TraceError::JsonError(_) => "JSON_ERROR",
            TraceError::IoError { .. } => "IO_ERROR",
            TraceError::InternalError { .. } => "INTERNAL_ERROR",
        }
    }

    /// Converts this error to a JSON-serializable report
    ///
    /// ```json
    /// {
    ///   "error": {
    ///     "code": "ORDER_VIOLATION",
    ///     "message": "Causality violation: ...",
    ///     "category": "assertion",
    ///     "recoverable": false
    ///   }
    /// }
    /// ```
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
                category: self.category(),
                recoverable: self.is_recoverable(),
            },
        }
    }
}

impl From<std::io::Error> for TraceError {
    fn from(e: std::io::Error) -> Self {
        TraceError::IoError {
            message: e.to_string(),
        }
    }
}

/// JSON-serializable error report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details
    pub error: ErrorDetail,
}

/// Error detail for JSON reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable error code (e.g., "ORDER_VIOLATION")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Error category
    pub category: ErrorCategory,
    /// Whether the caller should treat this as a normal result
    pub recoverable: bool,
}
