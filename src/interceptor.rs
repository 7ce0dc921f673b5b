//! The audit interceptor.
//!
//! [`AuditInterceptor::intercept`] wraps one call of an operation:
//!
//! ```text
//! look up request scope ── missing ──> Err(NoRequestScope), nothing logged
//!   ↓
//! build AuditRecord, sink.started()
//!   ↓
//! run operation
//!   ├─ Ok(value)  → sink.finished(Success), return Ok(value)
//!   ├─ Err(error) → sink.finished(Failure), return Err(error)
//!   └─ panic      → sink.finished(Failure "Panic"), resume the panic
//! ```
//!
//! The interceptor is an observer. It does not touch arguments, does not
//! retry, and returns exactly what the operation returned.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use chrono::Local;

use crate::args::AuditTags;
use crate::config::AuditConfig;
use crate::error::NoRequestScope;
use crate::operation::{Failure, OperationId};
use crate::record::{AuditRecord, Outcome};
use crate::render::{render, Loggable};
use crate::scope;
use crate::sink::{AuditSink, Diagnostic, PayloadStage, SinkError, TracingSink};

/// Wraps operations with start/end audit logging.
///
/// The sink is injected at construction and shared by every call, so one
/// interceptor can be used from many threads at once.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use admin_audit::{
///     scope, Arg, Args, AuditInterceptor, AuthUser, Error, MemorySink, OperationId,
///     RequestMeta,
/// };
///
/// #[derive(Debug, serde::Serialize)]
/// struct RoleChange {
///     role: String,
/// }
///
/// let sink = Arc::new(MemorySink::new());
/// let interceptor = AuditInterceptor::new(sink.clone());
/// let op = OperationId::new("app::user", "UserAdminController", "change_user_role");
///
/// let args = Args::new()
///     .with(AuthUser::new(7))
///     .with(42)
///     .with(Arg::payload(RoleChange { role: "ADMIN".to_string() }));
///
/// let result = scope::with_request(RequestMeta::new("PATCH", "/admin/users/42"), || {
///     interceptor.intercept(&op, args, |_args| Ok::<_, Error>("changed"))
/// });
///
/// assert_eq!(result.unwrap(), "changed");
/// let start = &sink.starts()[0];
/// assert_eq!(start.caller(), Some(7));
/// assert_eq!(start.request_body(), r#"{"role":"ADMIN"}"#);
/// ```
#[derive(Clone)]
pub struct AuditInterceptor {
    sink: Arc<dyn AuditSink>,
    config: Arc<AuditConfig>,
}

impl std::fmt::Debug for AuditInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditInterceptor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for AuditInterceptor {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink::new()))
    }
}

impl AuditInterceptor {
    /// Creates an interceptor writing to `sink` with the default config.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self::with_config(sink, AuditConfig::default())
    }

    /// Creates an interceptor writing to `sink` with a custom config.
    pub fn with_config(sink: Arc<dyn AuditSink>, config: AuditConfig) -> Self {
        Self {
            sink,
            config: Arc::new(config),
        }
    }

    /// Creates an interceptor that logs through `tracing`.
    pub fn tracing(config: AuditConfig) -> Self {
        Self::with_config(Arc::new(TracingSink::new()), config)
    }

    /// The active configuration.
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Runs `call` with `args`, logging a start block before and an end
    /// block after.
    ///
    /// The request metadata comes from the current [`scope`]. The caller and
    /// payload come from the arguments' [`AuditTags`]. `args` is passed to
    /// `call` unchanged.
    ///
    /// # Errors
    ///
    /// - Returns `NoRequestScope` (converted into `E`) if no request scope
    ///   is active. `call` is not run in that case.
    /// - Otherwise returns whatever error `call` returned, unchanged.
    ///
    /// # Panics
    ///
    /// If `call` panics, the end block is logged as a `Panic` failure and the
    /// panic is resumed with its original payload.
    pub fn intercept<A, T, E, F>(&self, operation: &OperationId, args: A, call: F) -> Result<T, E>
    where
        A: AuditTags,
        T: Loggable,
        E: Failure + From<NoRequestScope>,
        F: FnOnce(A) -> Result<T, E>,
    {
        let request = scope::current()?;
        let record = self.start_record(operation, &args, request.method, request.url);
        self.write(|sink| sink.started(&record));

        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| call(args)));
        let elapsed = started.elapsed();

        let result = match result {
            Ok(result) => result,
            Err(payload) => {
                let outcome = Outcome::Failure {
                    elapsed,
                    kind: "Panic".to_string(),
                    message: panic_message(payload.as_ref()),
                };
                self.write(|sink| sink.finished(&record, &outcome));
                panic::resume_unwind(payload);
            }
        };

        let outcome = match &result {
            Ok(value) => Outcome::Success {
                elapsed,
                response_body: self.render_payload(
                    operation,
                    PayloadStage::Response,
                    Some(value as &dyn Loggable),
                ),
            },
            Err(error) => Outcome::Failure {
                elapsed,
                kind: error.kind().into_owned(),
                message: error.to_string(),
            },
        };
        self.write(|sink| sink.finished(&record, &outcome));

        result
    }

    fn start_record<A: AuditTags>(
        &self,
        operation: &OperationId,
        args: &A,
        method: String,
        url: String,
    ) -> AuditRecord {
        let caller = args.caller().map(|user| user.id);
        if caller.is_none() {
            self.write(|sink| {
                sink.diagnostic(&Diagnostic::MissingCaller {
                    operation: *operation,
                })
            });
        }

        let request_body = self.render_payload(operation, PayloadStage::Request, args.payload());

        AuditRecord::new(
            Local::now(),
            &self.config,
            caller,
            method,
            url,
            *operation,
            request_body,
        )
    }

    fn render_payload(
        &self,
        operation: &OperationId,
        stage: PayloadStage,
        value: Option<&dyn Loggable>,
    ) -> String {
        let rendered = render(value, &self.config.none_label);
        if let Some(reason) = rendered.fallback_reason {
            self.write(|sink| {
                sink.diagnostic(&Diagnostic::SerializationFallback {
                    operation: *operation,
                    stage,
                    reason,
                })
            });
        }
        rendered.text
    }

    /// Sink writes are best-effort.
    fn write(&self, f: impl FnOnce(&dyn AuditSink) -> Result<(), SinkError>) {
        if let Err(err) = f(self.sink.as_ref()) {
            tracing::warn!(target: "admin_audit", error = %err, "audit sink write failed");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
