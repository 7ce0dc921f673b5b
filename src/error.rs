use std::borrow::Cow;

use thiserror::Error;

use crate::operation::Failure;

/// Returned when an interception is attempted outside of a request scope.
///
/// Entering a scope is a caller precondition. The interceptor propagates this
/// error without running the wrapped operation and without logging anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no request scope is active on this thread")]
pub struct NoRequestScope;

/// Errors that can occur in the audit crate itself.
#[derive(Debug, Error)]
pub enum Error {
    /// No request scope was active
    #[error(transparent)]
    NoRequestScope(#[from] NoRequestScope),

    /// Configuration could not be parsed
    #[error("invalid audit configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Failure for NoRequestScope {}

impl Failure for Error {
    fn kind(&self) -> Cow<'_, str> {
        match self {
            Error::NoRequestScope(_) => Cow::Borrowed("NoRequestScope"),
            Error::Config(_) => Cow::Borrowed("Config"),
        }
    }
}
