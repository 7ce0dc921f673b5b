//! Audit logging for administrative operations.
//!
//! This crate wraps operations with request/response audit logging:
//! - **Start block**: request time, caller id, HTTP method, URL, operation
//!   and request payload, logged before the operation runs
//! - **End block**: response payload and elapsed time on success, or error
//!   kind and message on failure, logged after it returns
//!
//! The interceptor is transparent: the caller gets back exactly what the
//! operation produced, and logging problems never stop the operation.
//!
//! # Core Types
//!
//! - [`AuditInterceptor`]: Wraps a call with start/end logging
//! - [`AuditTags`]: Declares the caller and payload among an operation's arguments
//! - [`Args`]: Positional arguments, scanned first-match for caller and payload
//! - [`AuditSink`]: Destination for audit entries ([`TracingSink`], [`MemorySink`])
//! - [`AdminSelector`]: Picks admin operations by signature list or marker
//! - [`Dispatcher`]: Explicit operation registry that applies the interceptor
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use admin_audit::{scope, Args, AuditInterceptor, Error, MemorySink, OperationId, RequestMeta};
//!
//! let sink = Arc::new(MemorySink::new());
//! let interceptor = AuditInterceptor::new(sink.clone());
//! let op = OperationId::new("app", "ReportAdminController", "rebuild");
//!
//! let _guard = scope::enter(RequestMeta::new("POST", "/admin/reports/rebuild"));
//! let rows = interceptor.intercept(&op, Args::new().with(5).with("x"), |_| Ok::<_, Error>(12));
//!
//! assert_eq!(rows.unwrap(), 12);
//! assert_eq!(sink.starts()[0].caller(), None);
//! assert_eq!(sink.starts()[0].request_body(), "none");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod args;
mod config;
mod dispatch;
mod error;
mod interceptor;
mod operation;
mod record;
pub mod render;
mod request;
pub mod scope;
mod selector;
mod sink;

pub use args::{Arg, Args, AuditTags, Scalar};
pub use config::{AuditConfig, ENV_NONE_LABEL, ENV_SIGNATURES, ENV_TIMESTAMP_FORMAT};
pub use dispatch::{DispatchError, Dispatcher, Handler};
pub use error::{Error, NoRequestScope};
pub use interceptor::AuditInterceptor;
pub use operation::{Failure, OperationError, OperationId};
pub use record::{AuditRecord, Outcome};
pub use render::Loggable;
pub use request::{AuthUser, RequestMeta};
pub use selector::AdminSelector;
pub use sink::{
    AuditSink, Diagnostic, MemorySink, PayloadStage, SinkEntry, SinkError, TracingSink,
};
