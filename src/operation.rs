use std::borrow::Cow;
use std::fmt;

/// Identity of an intercepted operation.
///
/// An operation is named by its owning type and method name, qualified by the
/// module path it lives in. Use [`operation_id!`](crate::operation_id) to fill
/// in the module path automatically.
///
/// # Examples
///
/// ```
/// use admin_audit::OperationId;
///
/// let id = OperationId::new("app::comment", "CommentAdminController", "delete_comment");
/// assert_eq!(id.to_string(), "CommentAdminController.delete_comment()");
/// assert_eq!(id.signature(), "CommentAdminController.delete_comment");
/// assert_eq!(id.qualified(), "app::comment::CommentAdminController.delete_comment");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId {
    path: &'static str,
    owner: &'static str,
    name: &'static str,
}

impl OperationId {
    /// Creates an operation identity.
    ///
    /// `path` may be empty for operations that don't belong to a module.
    pub const fn new(path: &'static str, owner: &'static str, name: &'static str) -> Self {
        Self { path, owner, name }
    }

    /// Module path of the owning type.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Declaring type name.
    pub fn owner(&self) -> &'static str {
        self.owner
    }

    /// Operation name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Short signature, `Owner.name`.
    pub fn signature(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }

    /// Fully qualified signature, `path::Owner.name`.
    pub fn qualified(&self) -> String {
        if self.path.is_empty() {
            self.signature()
        } else {
            format!("{}::{}.{}", self.path, self.owner, self.name)
        }
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}()", self.owner, self.name)
    }
}

/// Builds an [`OperationId`] qualified with the calling module's path.
///
/// ```
/// use admin_audit::operation_id;
///
/// let id = operation_id!(UserAdminController, change_user_role);
/// assert_eq!(id.owner(), "UserAdminController");
/// assert_eq!(id.name(), "change_user_role");
/// ```
#[macro_export]
macro_rules! operation_id {
    ($owner:ident, $name:ident) => {
        $crate::OperationId::new(
            ::core::module_path!(),
            ::core::stringify!($owner),
            ::core::stringify!($name),
        )
    };
}

/// A failure produced by a wrapped operation.
///
/// The interceptor logs the failure's [`kind`](Failure::kind) and its
/// `Display` message, then hands the very same value back to the caller.
///
/// The default `kind` is the unqualified type name. Error enums usually
/// override it to report the variant:
///
/// ```
/// use std::borrow::Cow;
/// use std::fmt;
/// use admin_audit::Failure;
///
/// #[derive(Debug)]
/// enum CommentError {
///     NotFound { id: i64 },
/// }
///
/// impl fmt::Display for CommentError {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         match self {
///             CommentError::NotFound { id } => write!(f, "comment not found: id={id}"),
///         }
///     }
/// }
///
/// impl Failure for CommentError {
///     fn kind(&self) -> Cow<'_, str> {
///         match self {
///             CommentError::NotFound { .. } => Cow::Borrowed("NotFound"),
///         }
///     }
/// }
///
/// assert_eq!(CommentError::NotFound { id: 3 }.kind(), "NotFound");
/// ```
pub trait Failure: fmt::Display {
    /// Short category of the failure.
    fn kind(&self) -> Cow<'_, str> {
        Cow::Borrowed(short_type_name(std::any::type_name::<Self>()))
    }
}

/// Strips module paths and generic arguments from a type name.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// General-purpose failure value for type-erased handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationError {
    kind: String,
    message: String,
}

impl OperationError {
    /// Creates a failure with an explicit kind and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for the common `NotFound` category.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NotFound", message)
    }

    /// The failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for OperationError {}

impl Failure for OperationError {
    fn kind(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.kind)
    }
}
