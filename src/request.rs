use serde::{Deserialize, Serialize};

/// Metadata about the HTTP request currently being handled.
///
/// Contains the HTTP method and URL. The interceptor reads this from the
/// request scope rather than receiving it as a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    /// HTTP method (GET, POST, DELETE, ...)
    pub method: String,
    /// Request URL or path
    pub url: String,
}

impl RequestMeta {
    /// Creates request metadata from a method and URL.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
        }
    }
}

/// An authenticated user, as resolved by the authentication layer.
///
/// This is the only argument shape recognized as the caller identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Unique numeric identifier for this user
    pub id: i64,
}

impl AuthUser {
    /// Creates an authenticated user with the given id.
    pub fn new(id: i64) -> Self {
        Self { id }
    }
}
