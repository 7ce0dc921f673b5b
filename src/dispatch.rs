//! Explicit operation registry and request dispatch.
//!
//! Operations are registered at startup under their [`OperationId`]. For each
//! request the dispatcher:
//! 1. enters a request scope for the request's metadata
//! 2. looks up the operation by signature
//! 3. runs it through the [`AuditInterceptor`] if the [`AdminSelector`]
//!    picks it, or calls it directly otherwise
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use admin_audit::{
//!     operation_id, Args, AdminSelector, AuditInterceptor, AuthUser, Dispatcher,
//!     MemorySink, RequestMeta,
//! };
//!
//! let sink = Arc::new(MemorySink::new());
//! let mut dispatcher = Dispatcher::new(AuditInterceptor::new(sink.clone()), AdminSelector::new());
//!
//! dispatcher.register_admin(operation_id!(CommentAdminController, delete_comment), |args| {
//!     Ok(serde_json::json!({ "deleted": args.first_int() }))
//! });
//!
//! let response = dispatcher
//!     .dispatch(
//!         RequestMeta::new("DELETE", "/admin/comments/3"),
//!         "CommentAdminController.delete_comment",
//!         Args::new().with(AuthUser::new(1)).with(3),
//!     )
//!     .unwrap();
//!
//! assert_eq!(response["deleted"], 3);
//! assert_eq!(sink.ends().len(), 1);
//! ```

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::args::Args;
use crate::error::NoRequestScope;
use crate::interceptor::AuditInterceptor;
use crate::operation::{Failure, OperationError, OperationId};
use crate::request::RequestMeta;
use crate::scope;
use crate::selector::AdminSelector;

/// A registered operation body.
pub type Handler = Box<dyn Fn(Args) -> Result<Value, OperationError> + Send + Sync>;

/// Errors returned by [`Dispatcher::dispatch`].
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No operation is registered under the signature
    #[error("unknown operation: {0}")]
    UnknownOperation(String),

    /// The operation ran outside a request scope
    #[error(transparent)]
    NoRequestScope(#[from] NoRequestScope),

    /// The operation itself failed
    #[error(transparent)]
    Operation(#[from] OperationError),
}

impl Failure for DispatchError {
    fn kind(&self) -> Cow<'_, str> {
        match self {
            DispatchError::UnknownOperation(_) => Cow::Borrowed("UnknownOperation"),
            DispatchError::NoRequestScope(inner) => inner.kind(),
            DispatchError::Operation(inner) => inner.kind(),
        }
    }
}

struct Route {
    id: OperationId,
    marked: bool,
    handler: Handler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("marked", &self.marked)
            .finish_non_exhaustive()
    }
}

/// Routes requests to registered operations, auditing the admin ones.
#[derive(Debug)]
pub struct Dispatcher {
    interceptor: AuditInterceptor,
    selector: AdminSelector,
    routes: Vec<Route>,
    by_signature: HashMap<String, usize>,
}

impl Dispatcher {
    /// Creates an empty dispatcher.
    pub fn new(interceptor: AuditInterceptor, selector: AdminSelector) -> Self {
        Self {
            interceptor,
            selector,
            routes: Vec::new(),
            by_signature: HashMap::new(),
        }
    }

    /// Registers an operation. It is audited only if the selector lists its
    /// signature.
    pub fn register<H>(&mut self, id: OperationId, handler: H)
    where
        H: Fn(Args) -> Result<Value, OperationError> + Send + Sync + 'static,
    {
        self.insert(id, false, Box::new(handler));
    }

    /// Registers an operation carrying the admin marker. It is always audited.
    pub fn register_admin<H>(&mut self, id: OperationId, handler: H)
    where
        H: Fn(Args) -> Result<Value, OperationError> + Send + Sync + 'static,
    {
        self.insert(id, true, Box::new(handler));
    }

    fn insert(&mut self, id: OperationId, marked: bool, handler: Handler) {
        let index = self.routes.len();
        self.routes.push(Route {
            id,
            marked,
            handler,
        });

        // Later registrations win.
        self.by_signature.insert(id.qualified(), index);
        self.by_signature.insert(id.signature(), index);
    }

    /// Returns `true` if the operation under `signature` would be audited.
    pub fn is_audited(&self, signature: &str) -> bool {
        self.route(signature)
            .is_some_and(|route| self.selector.is_selected(&route.id, route.marked))
    }

    /// Number of registered operations.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn route(&self, signature: &str) -> Option<&Route> {
        self.by_signature
            .get(signature)
            .and_then(|&index| self.routes.get(index))
    }

    /// Handles one request.
    ///
    /// `signature` may be the short (`Owner.name`) or qualified
    /// (`path::Owner.name`) form.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::UnknownOperation`] if nothing is registered under
    ///   `signature`
    /// - [`DispatchError::Operation`] with the handler's own error if it fails
    pub fn dispatch(
        &self,
        request: RequestMeta,
        signature: &str,
        args: Args,
    ) -> Result<Value, DispatchError> {
        let route = self
            .route(signature)
            .ok_or_else(|| DispatchError::UnknownOperation(signature.to_string()))?;

        let _scope = scope::enter(request);

        if self.selector.is_selected(&route.id, route.marked) {
            self.interceptor.intercept(&route.id, args, |args| {
                (route.handler)(args).map_err(DispatchError::Operation)
            })
        } else {
            tracing::debug!(
                target: "admin_audit",
                operation = %route.id,
                "dispatching unaudited operation"
            );
            (route.handler)(args).map_err(DispatchError::Operation)
        }
    }
}
