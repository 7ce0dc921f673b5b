//! Thread-local request scope.
//!
//! The dispatcher enters a scope for every request it handles; anything
//! running on the same thread underneath it can look up the current
//! [`RequestMeta`] with [`current`]. Scopes nest: leaving an inner scope
//! restores the outer one. Each guard removes only the scope it entered, so
//! dropping guards out of order never exposes a scope that already ended.
//!
//! # Example
//!
//! ```
//! use admin_audit::{scope, RequestMeta};
//!
//! assert!(scope::current().is_err());
//!
//! let method = scope::with_request(RequestMeta::new("DELETE", "/admin/comments/3"), || {
//!     scope::current().map(|meta| meta.method)
//! });
//! assert_eq!(method.as_deref(), Ok("DELETE"));
//! ```

use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

use crate::error::NoRequestScope;
use crate::request::RequestMeta;

thread_local! {
    static SCOPES: RefCell<Vec<(u64, RequestMeta)>> = const { RefCell::new(Vec::new()) };
    static NEXT_ID: Cell<u64> = const { Cell::new(0) };
}

/// Guard returned by [`enter`]. The scope ends when it is dropped.
///
/// The guard is `!Send`: it must be dropped on the thread that created it.
#[derive(Debug)]
#[must_use = "the request scope ends as soon as the guard is dropped"]
pub struct ScopeGuard {
    id: u64,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            if let Some(index) = scopes.iter().rposition(|(id, _)| *id == self.id) {
                scopes.remove(index);
            }
        });
    }
}

/// Enters a request scope on the current thread.
pub fn enter(meta: RequestMeta) -> ScopeGuard {
    let id = NEXT_ID.with(|next| {
        let id = next.get();
        next.set(id.wrapping_add(1));
        id
    });
    SCOPES.with(|scopes| scopes.borrow_mut().push((id, meta)));
    ScopeGuard {
        id,
        _not_send: PhantomData,
    }
}

/// Runs `f` inside a request scope for `meta`.
pub fn with_request<R>(meta: RequestMeta, f: impl FnOnce() -> R) -> R {
    let _guard = enter(meta);
    f()
}

/// Returns the metadata of the innermost active request scope.
///
/// # Errors
///
/// Returns [`NoRequestScope`] when called outside any scope.
pub fn current() -> Result<RequestMeta, NoRequestScope> {
    SCOPES.with(|scopes| {
        scopes
            .borrow()
            .last()
            .map(|(_, meta)| meta.clone())
            .ok_or(NoRequestScope)
    })
}

/// Returns `true` if a request scope is active on this thread.
pub fn is_active() -> bool {
    SCOPES.with(|scopes| !scopes.borrow().is_empty())
}
