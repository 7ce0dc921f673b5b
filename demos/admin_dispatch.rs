//! Admin dispatch demonstration.
//!
//! This example wires a small set of admin endpoints through the dispatcher:
//! 1. Load audit configuration from the environment
//! 2. Register operations, some by marker and some by signature list
//! 3. Dispatch requests and watch the audit log on stderr
//!
//! Run with: `RUST_LOG=info cargo run --example admin_dispatch`
//! Add `ADMIN_AUDIT_SIGNATURES=CommentController.list_comments` to audit the
//! public listing as well.

use admin_audit::{
    operation_id, AdminSelector, Arg, Args, AuditConfig, AuditInterceptor, AuthUser,
    Dispatcher, OperationError, RequestMeta,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChangeRoleRequest {
    role: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AuditConfig::from_env();
    config
        .admin_signatures
        .push("UserAdminController.change_user_role".to_string());

    let selector = AdminSelector::from_config(&config);
    let mut dispatcher = Dispatcher::new(AuditInterceptor::tracing(config), selector);

    // Marked as admin at registration.
    dispatcher.register_admin(
        operation_id!(CommentAdminController, delete_comment),
        |args| match args.first_int() {
            Some(3) => Err(OperationError::not_found("id=3")),
            Some(id) => Ok(json!({ "deleted": id })),
            None => Err(OperationError::new("BadRequest", "missing comment id")),
        },
    );

    // Selected by the signature list.
    dispatcher.register(
        operation_id!(UserAdminController, change_user_role),
        |args| {
            let user_id = args
                .first_int()
                .ok_or_else(|| OperationError::new("BadRequest", "missing user id"))?;
            let body = args
                .payload_as::<ChangeRoleRequest>()
                .ok_or_else(|| OperationError::new("BadRequest", "missing body"))?;
            Ok(json!({ "user_id": user_id, "role": body.role }))
        },
    );

    // Not audited unless listed in ADMIN_AUDIT_SIGNATURES.
    dispatcher.register(operation_id!(CommentController, list_comments), |_| {
        Ok(json!([{ "id": 1, "text": "first" }]))
    });

    let admin = AuthUser::new(1);
    let requests = [
        (
            RequestMeta::new("DELETE", "/admin/comments/8"),
            "CommentAdminController.delete_comment",
            Args::new().with(admin).with(8),
        ),
        (
            RequestMeta::new("DELETE", "/admin/comments/3"),
            "CommentAdminController.delete_comment",
            Args::new().with(admin).with(3),
        ),
        (
            RequestMeta::new("PATCH", "/admin/users/5"),
            "UserAdminController.change_user_role",
            Args::new().with(admin).with(5).with(Arg::payload(ChangeRoleRequest {
                role: "ADMIN".to_string(),
            })),
        ),
        (
            RequestMeta::new("GET", "/comments"),
            "CommentController.list_comments",
            Args::new(),
        ),
    ];

    for (request, signature, args) in requests {
        match dispatcher.dispatch(request, signature, args) {
            Ok(value) => tracing::info!(%signature, response = %value, "request handled"),
            Err(err) => tracing::warn!(%signature, error = %err, "request failed"),
        }
    }
}
