//! Audit record schema.
//!
//! An [`AuditRecord`] is the start snapshot of one intercepted call; an
//! [`Outcome`] is its end snapshot. Records are built by the interceptor only
//! and cannot be changed once built.

use std::fmt::{self, Write};
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::config::AuditConfig;
use crate::operation::OperationId;

/// Start snapshot of an intercepted call.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    started_at: DateTime<Local>,
    request_time: String,
    caller: Option<i64>,
    caller_label: String,
    method: String,
    url: String,
    operation: OperationId,
    request_body: String,
}

impl AuditRecord {
    pub(crate) fn new(
        started_at: DateTime<Local>,
        config: &AuditConfig,
        caller: Option<i64>,
        method: String,
        url: String,
        operation: OperationId,
        request_body: String,
    ) -> Self {
        Self {
            started_at,
            request_time: format_time(&started_at, &config.timestamp_format),
            caller,
            caller_label: caller.map_or_else(|| config.none_label.clone(), |id| id.to_string()),
            method,
            url,
            operation,
            request_body,
        }
    }

    /// Wall-clock time the call was intercepted.
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    /// Formatted request time.
    pub fn request_time(&self) -> &str {
        &self.request_time
    }

    /// Caller id, if an authenticated user was among the arguments.
    pub fn caller(&self) -> Option<i64> {
        self.caller
    }

    /// Caller id as logged, or the configured none label.
    pub fn caller_label(&self) -> &str {
        &self.caller_label
    }

    /// HTTP method of the current request.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// URL of the current request.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The intercepted operation.
    pub fn operation(&self) -> &OperationId {
        &self.operation
    }

    /// Rendered request payload.
    pub fn request_body(&self) -> &str {
        &self.request_body
    }
}

/// Formats `at`, falling back to RFC 3339 for an invalid format string.
fn format_time(at: &DateTime<Local>, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", at.format(format)).is_err() {
        return at.to_rfc3339();
    }
    out
}

/// End snapshot of an intercepted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The wrapped operation returned normally
    Success {
        /// Time spent in the wrapped operation
        elapsed: Duration,
        /// Rendered return value
        response_body: String,
    },
    /// The wrapped operation failed
    Failure {
        /// Time spent in the wrapped operation
        elapsed: Duration,
        /// Failure category, e.g. `NotFound`
        kind: String,
        /// Failure message
        message: String,
    },
}

impl Outcome {
    /// Elapsed time regardless of outcome.
    pub fn elapsed(&self) -> Duration {
        match self {
            Outcome::Success { elapsed, .. } | Outcome::Failure { elapsed, .. } => *elapsed,
        }
    }

    /// Elapsed time in whole milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { .. } => write!(f, "success"),
            Outcome::Failure { .. } => write!(f, "failure"),
        }
    }
}
