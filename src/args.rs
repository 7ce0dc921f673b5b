//! Invocation arguments and the tags the interceptor reads from them.
//!
//! There are two ways to tell the interceptor who the caller is and what the
//! request payload looks like:
//!
//! - Implement [`AuditTags`] on a typed argument struct and point at the
//!   fields directly.
//! - Pass positional [`Args`], which are scanned in order: the first
//!   [`Arg::Identity`] is the caller, and the first argument that is not an
//!   identity, a scalar, request metadata or absent is the payload. Later
//!   composite arguments are not logged.

use std::fmt;

use crate::render::Loggable;
use crate::request::{AuthUser, RequestMeta};

/// Declares which parts of an invocation's arguments are auditable.
pub trait AuditTags {
    /// The authenticated caller, if one was passed in.
    fn caller(&self) -> Option<&AuthUser>;

    /// The request payload to log, if any.
    fn payload(&self) -> Option<&dyn Loggable>;
}

/// A primitive argument value. Never logged as a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Signed integer argument (ids, counts)
    Int(i64),
    /// Unsigned integer argument too wide for `Int`
    UInt(u64),
    /// Floating point argument
    Float(f64),
    /// Text argument
    Text(String),
}

/// A single positional argument.
pub enum Arg {
    /// The authenticated caller
    Identity(AuthUser),
    /// A primitive value
    Scalar(Scalar),
    /// Request metadata passed explicitly
    Request(RequestMeta),
    /// A composite value, eligible as the logged payload
    Payload(Box<dyn Loggable + Send + Sync>),
    /// A missing (null) argument
    Absent,
}

impl Arg {
    /// Wraps a composite value as a payload argument.
    pub fn payload<T>(value: T) -> Self
    where
        T: Loggable + Send + Sync + 'static,
    {
        Arg::Payload(Box::new(value))
    }

    fn as_payload(&self) -> Option<&dyn Loggable> {
        match self {
            Arg::Payload(value) => {
                let value: &dyn Loggable = &**value;
                Some(value)
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Identity(user) => f.debug_tuple("Identity").field(user).finish(),
            Arg::Scalar(scalar) => f.debug_tuple("Scalar").field(scalar).finish(),
            Arg::Request(meta) => f.debug_tuple("Request").field(meta).finish(),
            Arg::Payload(value) => f.debug_tuple("Payload").field(value).finish(),
            Arg::Absent => write!(f, "Absent"),
        }
    }
}

impl From<AuthUser> for Arg {
    fn from(user: AuthUser) -> Self {
        Arg::Identity(user)
    }
}

impl From<RequestMeta> for Arg {
    fn from(meta: RequestMeta) -> Self {
        Arg::Request(meta)
    }
}

macro_rules! scalar_from {
    ($variant:ident($inner:ty): $($ty:ty),+) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Scalar(Scalar::$variant(<$inner>::from(value)))
                }
            }
        )+
    };
}

scalar_from!(Int(i64): i8, i16, i32, i64, u8, u16, u32);
scalar_from!(UInt(u64): u64);
scalar_from!(Float(f64): f32, f64);

impl From<usize> for Arg {
    fn from(value: usize) -> Self {
        Arg::Scalar(Scalar::UInt(value as u64))
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Arg::Scalar(Scalar::Text(value.to_string()))
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Arg::Scalar(Scalar::Text(value))
    }
}

impl<T: Into<Arg>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Arg::Absent, Into::into)
    }
}

/// Ordered argument list of one invocation.
///
/// # Examples
///
/// ```
/// use admin_audit::{Arg, Args, AuditTags, AuthUser};
///
/// #[derive(Debug, serde::Serialize)]
/// struct RoleChange {
///     role: String,
/// }
///
/// let args = Args::new()
///     .with(AuthUser::new(7))
///     .with("DELETE")
///     .with(Arg::payload(RoleChange { role: "ADMIN".to_string() }));
///
/// assert_eq!(args.caller().map(|u| u.id), Some(7));
/// assert_eq!(args.payload_as::<RoleChange>().map(|c| c.role.as_str()), Some("ADMIN"));
/// ```
#[derive(Debug, Default)]
pub struct Args {
    args: Vec<Arg>,
}

impl Args {
    /// Creates an empty argument list.
    pub fn new() -> Self {
        Self { args: Vec::new() }
    }

    /// Appends an argument.
    pub fn with(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends an argument in place.
    pub fn push(&mut self, arg: impl Into<Arg>) {
        self.args.push(arg.into());
    }

    /// Argument at position `index`.
    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.args.get(index)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Returns `true` if there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Iterates over the arguments in declaration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
        self.args.iter()
    }

    /// First integer scalar that fits an `i64`, typically a path id.
    pub fn first_int(&self) -> Option<i64> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Scalar(Scalar::Int(value)) => Some(*value),
            Arg::Scalar(Scalar::UInt(value)) => i64::try_from(*value).ok(),
            _ => None,
        })
    }

    /// The logged payload, downcast to its concrete type.
    pub fn payload_as<T: 'static>(&self) -> Option<&T> {
        self.payload()?.as_any().downcast_ref::<T>()
    }
}

impl From<Vec<Arg>> for Args {
    fn from(args: Vec<Arg>) -> Self {
        Self { args }
    }
}

impl AuditTags for Args {
    fn caller(&self) -> Option<&AuthUser> {
        self.args.iter().find_map(|arg| match arg {
            Arg::Identity(user) => Some(user),
            _ => None,
        })
    }

    fn payload(&self) -> Option<&dyn Loggable> {
        self.args.iter().find_map(Arg::as_payload)
    }
}

impl AuditTags for () {
    fn caller(&self) -> Option<&AuthUser> {
        None
    }

    fn payload(&self) -> Option<&dyn Loggable> {
        None
    }
}
