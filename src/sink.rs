use std::fmt;
use std::sync::{Mutex, MutexGuard};

use thiserror::Error;

use crate::operation::OperationId;
use crate::record::{AuditRecord, Outcome};

/// Error returned when writing to an audit sink fails.
///
/// The interceptor never lets a sink error reach the wrapped operation or its
/// caller; it reports the error through `tracing` and carries on.
///
/// # Examples
///
/// ```
/// use admin_audit::SinkError;
///
/// let error = SinkError::from(std::io::Error::other("pipe closed"));
/// assert_eq!(error.to_string(), "audit sink write failed: pipe closed");
/// ```
#[derive(Debug, Error)]
pub enum SinkError {
    /// The underlying writer failed
    #[error("audit sink write failed: {0}")]
    Io(#[from] std::io::Error),

    /// The sink no longer accepts entries
    #[error("audit sink is closed")]
    Closed,
}

/// Which payload a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStage {
    /// The request payload
    Request,
    /// The response payload
    Response,
}

impl fmt::Display for PayloadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadStage::Request => write!(f, "request"),
            PayloadStage::Response => write!(f, "response"),
        }
    }
}

/// Non-fatal condition noticed while building an audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// No authenticated user was found among the arguments
    MissingCaller {
        /// The intercepted operation
        operation: OperationId,
    },
    /// A payload could not be serialized and was logged in its Debug form
    SerializationFallback {
        /// The intercepted operation
        operation: OperationId,
        /// Request or response payload
        stage: PayloadStage,
        /// Serializer error message
        reason: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingCaller { operation } => {
                write!(f, "no authenticated user among arguments of {}", operation)
            }
            Diagnostic::SerializationFallback {
                operation,
                stage,
                reason,
            } => write!(
                f,
                "JSON conversion of {} payload for {} failed: {}",
                stage, operation, reason
            ),
        }
    }
}

/// Destination for audit log entries.
///
/// A sink receives the start block before the wrapped operation runs and the
/// end block after it returns or fails. Sinks are shared across threads and
/// must synchronize internally if they hold state.
pub trait AuditSink: Send + Sync {
    /// Writes the start block for a call.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the entry could not be written.
    fn started(&self, record: &AuditRecord) -> Result<(), SinkError>;

    /// Writes the end block for a call.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the entry could not be written.
    fn finished(&self, record: &AuditRecord, outcome: &Outcome) -> Result<(), SinkError>;

    /// Writes a diagnostic line.
    ///
    /// # Errors
    ///
    /// Returns `SinkError` if the entry could not be written.
    fn diagnostic(&self, diagnostic: &Diagnostic) -> Result<(), SinkError>;
}

/// Sink that emits audit entries as structured `tracing` events.
///
/// Start and success blocks are logged at `INFO`, failure blocks at `ERROR`
/// and diagnostics at `WARN`, all under the `admin_audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a tracing sink.
    pub fn new() -> Self {
        Self
    }
}

impl AuditSink for TracingSink {
    fn started(&self, record: &AuditRecord) -> Result<(), SinkError> {
        tracing::info!(
            target: "admin_audit",
            request_time = %record.request_time(),
            user_id = %record.caller_label(),
            method = %record.method(),
            url = %record.url(),
            operation = %record.operation(),
            request_body = %record.request_body(),
            "admin api call started"
        );
        Ok(())
    }

    fn finished(&self, record: &AuditRecord, outcome: &Outcome) -> Result<(), SinkError> {
        match outcome {
            Outcome::Success { response_body, .. } => {
                tracing::info!(
                    target: "admin_audit",
                    operation = %record.operation(),
                    elapsed_ms = outcome.elapsed_ms(),
                    response_body = %response_body,
                    "admin api call succeeded"
                );
            }
            Outcome::Failure { kind, message, .. } => {
                tracing::error!(
                    target: "admin_audit",
                    operation = %record.operation(),
                    elapsed_ms = outcome.elapsed_ms(),
                    error_kind = %kind,
                    error_message = %message,
                    "admin api call failed"
                );
            }
        }
        Ok(())
    }

    fn diagnostic(&self, diagnostic: &Diagnostic) -> Result<(), SinkError> {
        tracing::warn!(target: "admin_audit", "{}", diagnostic);
        Ok(())
    }
}

/// One entry captured by a [`MemorySink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEntry {
    /// A start block
    Started(AuditRecord),
    /// An end block
    Finished(AuditRecord, Outcome),
    /// A diagnostic line
    Diagnostic(Diagnostic),
}

/// In-memory sink that keeps every entry in arrival order.
///
/// Useful for tests and for inspecting the audit trail of a running process.
///
/// # Example
///
/// ```
/// use admin_audit::MemorySink;
///
/// let sink = MemorySink::new();
/// assert!(sink.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<SinkEntry>>,
}

impl MemorySink {
    /// Creates a new empty memory sink.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SinkEntry>> {
        // A panicking writer can't leave a half-pushed entry behind.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns a snapshot of all entries.
    pub fn entries(&self) -> Vec<SinkEntry> {
        self.lock().clone()
    }

    /// Returns the start records, in order.
    pub fn starts(&self) -> Vec<AuditRecord> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                SinkEntry::Started(record) => Some(record.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the end blocks, in order.
    pub fn ends(&self) -> Vec<(AuditRecord, Outcome)> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                SinkEntry::Finished(record, outcome) => Some((record.clone(), outcome.clone())),
                _ => None,
            })
            .collect()
    }

    /// Returns the diagnostics, in order.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock()
            .iter()
            .filter_map(|entry| match entry {
                SinkEntry::Diagnostic(diagnostic) => Some(diagnostic.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl AuditSink for MemorySink {
    fn started(&self, record: &AuditRecord) -> Result<(), SinkError> {
        self.lock().push(SinkEntry::Started(record.clone()));
        Ok(())
    }

    fn finished(&self, record: &AuditRecord, outcome: &Outcome) -> Result<(), SinkError> {
        self.lock()
            .push(SinkEntry::Finished(record.clone(), outcome.clone()));
        Ok(())
    }

    fn diagnostic(&self, diagnostic: &Diagnostic) -> Result<(), SinkError> {
        self.lock().push(SinkEntry::Diagnostic(diagnostic.clone()));
        Ok(())
    }
}
