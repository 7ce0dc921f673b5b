use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use admin_audit::{
    scope, AdminSelector, Arg, Args, AuditConfig, AuditInterceptor, AuditTags, AuthUser,
    Diagnostic, DispatchError, Dispatcher, Failure, Loggable, MemorySink, NoRequestScope,
    OperationError, OperationId, Outcome, PayloadStage, RequestMeta, SinkEntry,
};
use serde::Serialize;

const DELETE_COMMENT: OperationId =
    OperationId::new("app::comment", "CommentAdminController", "delete_comment");
const CHANGE_ROLE: OperationId =
    OperationId::new("app::user", "UserAdminController", "change_user_role");

#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
struct RoleChangeRequest {
    role: String,
    reason: Option<String>,
}

#[derive(Debug, PartialEq)]
enum CommentError {
    NotFound { id: i64 },
    Forbidden,
    Scope(NoRequestScope),
}

impl fmt::Display for CommentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommentError::NotFound { id } => write!(f, "NotFound: id={}", id),
            CommentError::Forbidden => write!(f, "forbidden"),
            CommentError::Scope(inner) => write!(f, "{}", inner),
        }
    }
}

impl Failure for CommentError {
    fn kind(&self) -> Cow<'_, str> {
        Cow::Borrowed(match self {
            CommentError::NotFound { .. } => "NotFound",
            CommentError::Forbidden => "Forbidden",
            CommentError::Scope(_) => "NoRequestScope",
        })
    }
}

impl From<NoRequestScope> for CommentError {
    fn from(err: NoRequestScope) -> Self {
        CommentError::Scope(err)
    }
}

fn setup() -> (Arc<MemorySink>, AuditInterceptor) {
    let sink = Arc::new(MemorySink::new());
    let interceptor = AuditInterceptor::new(sink.clone());
    (sink, interceptor)
}

fn delete_request() -> RequestMeta {
    RequestMeta::new("DELETE", "/admin/comments/3")
}

#[test]
fn identity_and_first_composite_payload_are_logged() {
    let (sink, interceptor) = setup();
    let body = RoleChangeRequest {
        role: "ADMIN".to_string(),
        reason: None,
    };
    let expected_json = serde_json::to_string(&body).unwrap();

    let args = Args::new()
        .with(AuthUser::new(7))
        .with("DELETE")
        .with(Arg::payload(body));

    let result = scope::with_request(delete_request(), || {
        interceptor.intercept(&CHANGE_ROLE, args, |_| Ok::<_, CommentError>("ok"))
    });

    assert_eq!(result, Ok("ok"));
    let start = &sink.starts()[0];
    assert_eq!(start.caller(), Some(7));
    assert_eq!(start.caller_label(), "7");
    assert_eq!(start.request_body(), expected_json);
    assert!(sink.diagnostics().is_empty());
}

#[test]
fn scalars_only_log_none_for_identity_and_payload() {
    let (sink, interceptor) = setup();

    scope::with_request(delete_request(), || {
        interceptor.intercept(
            &DELETE_COMMENT,
            Args::new().with(5).with("x"),
            |_| Ok::<_, CommentError>(()),
        )
    })
    .unwrap();

    let start = &sink.starts()[0];
    assert_eq!(start.caller_label(), "none");
    assert_eq!(start.request_body(), "none");
    assert_eq!(
        sink.diagnostics(),
        vec![Diagnostic::MissingCaller {
            operation: DELETE_COMMENT
        }]
    );
}

#[test]
fn domain_error_is_logged_and_returned_unchanged() {
    let (sink, interceptor) = setup();

    let result = scope::with_request(delete_request(), || {
        interceptor.intercept(
            &DELETE_COMMENT,
            Args::new().with(AuthUser::new(1)).with(3),
            |args| -> Result<(), CommentError> {
                Err(CommentError::NotFound {
                    id: args.first_int().unwrap_or_default(),
                })
            },
        )
    });

    assert_eq!(result, Err(CommentError::NotFound { id: 3 }));
    let (_, outcome) = &sink.ends()[0];
    match outcome {
        Outcome::Failure { kind, message, .. } => {
            assert_eq!(kind, "NotFound");
            assert!(message.contains("id=3"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[test]
fn elapsed_time_covers_operation_duration() {
    let (sink, interceptor) = setup();

    scope::with_request(delete_request(), || {
        interceptor.intercept(&DELETE_COMMENT, Args::new().with(AuthUser::new(1)), |_| {
            thread::sleep(Duration::from_millis(50));
            Ok::<_, CommentError>(())
        })
    })
    .unwrap();

    let (_, outcome) = &sink.ends()[0];
    assert!(outcome.elapsed_ms() >= 50);
    assert!(outcome.elapsed() >= Duration::from_millis(50));
}

#[test]
fn start_block_is_written_before_operation_runs() {
    let (sink, interceptor) = setup();

    scope::with_request(delete_request(), || {
        interceptor.intercept(&DELETE_COMMENT, Args::new().with(AuthUser::new(1)), |_| {
            assert_eq!(sink.starts().len(), 1);
            assert!(sink.ends().is_empty());
            Ok::<_, CommentError>(())
        })
    })
    .unwrap();

    assert_eq!(sink.ends().len(), 1);
}

#[test]
fn end_record_repeats_start_fields() {
    let (sink, interceptor) = setup();

    scope::with_request(delete_request(), || {
        interceptor.intercept(&DELETE_COMMENT, Args::new().with(AuthUser::new(4)), |_| {
            Err::<(), _>(CommentError::Forbidden)
        })
    })
    .unwrap_err();

    let start = sink.starts()[0].clone();
    let (end_record, _) = sink.ends()[0].clone();
    assert_eq!(start, end_record);
}

#[test]
fn unserializable_payload_falls_back_to_debug_form() {
    let (sink, interceptor) = setup();
    let mut grid = HashMap::new();
    grid.insert((1, 1), "x");
    let debug_form = format!("{:?}", grid);

    let result = scope::with_request(delete_request(), || {
        interceptor.intercept(
            &CHANGE_ROLE,
            Args::new().with(AuthUser::new(1)).with(Arg::payload(grid)),
            |_| Ok::<_, CommentError>(7),
        )
    });

    assert_eq!(result, Ok(7));
    assert_eq!(sink.starts()[0].request_body(), debug_form);
    assert!(matches!(
        sink.diagnostics()[0],
        Diagnostic::SerializationFallback {
            stage: PayloadStage::Request,
            ..
        }
    ));
}

#[test]
fn unserializable_response_falls_back_to_debug_form() {
    let (sink, interceptor) = setup();

    let result = scope::with_request(delete_request(), || {
        interceptor.intercept(&CHANGE_ROLE, Args::new().with(AuthUser::new(1)), |_| {
            let mut response = HashMap::new();
            response.insert(vec![1u8], true);
            Ok::<_, CommentError>(response)
        })
    });

    let response = result.unwrap();
    assert_eq!(response.get(&vec![1u8]), Some(&true));
    match &sink.ends()[0].1 {
        Outcome::Success { response_body, .. } => {
            assert_eq!(response_body, &format!("{:?}", response))
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert!(matches!(
        sink.diagnostics()[0],
        Diagnostic::SerializationFallback {
            stage: PayloadStage::Response,
            ..
        }
    ));
}

#[test]
fn missing_scope_reaches_operation_error_type() {
    let (sink, interceptor) = setup();

    let result = interceptor.intercept(&DELETE_COMMENT, Args::new(), |_| Ok::<_, CommentError>(()));

    assert_eq!(result, Err(CommentError::Scope(NoRequestScope)));
    assert!(sink.is_empty());
}

struct ChangeRoleArgs {
    admin: AuthUser,
    user_id: i64,
    body: RoleChangeRequest,
}

impl AuditTags for ChangeRoleArgs {
    fn caller(&self) -> Option<&AuthUser> {
        Some(&self.admin)
    }

    fn payload(&self) -> Option<&dyn Loggable> {
        Some(&self.body)
    }
}

#[test]
fn typed_arguments_declare_their_own_tags() {
    let (sink, interceptor) = setup();
    let args = ChangeRoleArgs {
        admin: AuthUser::new(99),
        user_id: 5,
        body: RoleChangeRequest {
            role: "USER".to_string(),
            reason: Some("demotion".to_string()),
        },
    };

    let changed = scope::with_request(RequestMeta::new("PATCH", "/admin/users/5"), || {
        interceptor.intercept(&CHANGE_ROLE, args, |args| {
            Ok::<_, CommentError>(format!("{} -> {}", args.user_id, args.body.role))
        })
    });

    assert_eq!(changed.as_deref(), Ok("5 -> USER"));
    let start = &sink.starts()[0];
    assert_eq!(start.caller(), Some(99));
    assert_eq!(start.request_body(), r#"{"role":"USER","reason":"demotion"}"#);
    assert_eq!(start.method(), "PATCH");
    match &sink.ends()[0].1 {
        Outcome::Success { response_body, .. } => assert_eq!(response_body, r#""5 -> USER""#),
        other => panic!("expected success, got {:?}", other),
    }
}

#[test]
fn concurrent_calls_keep_independent_records() {
    let (sink, interceptor) = setup();

    thread::scope(|s| {
        for user in 0..8_i64 {
            let interceptor = &interceptor;
            s.spawn(move || {
                let url = format!("/admin/users/{}", user);
                scope::with_request(RequestMeta::new("PATCH", url), || {
                    interceptor.intercept(&CHANGE_ROLE, Args::new().with(AuthUser::new(user)), |_| {
                        Ok::<_, CommentError>(user)
                    })
                })
                .unwrap();
            });
        }
    });

    let starts = sink.starts();
    let ends = sink.ends();
    assert_eq!(starts.len(), 8);
    assert_eq!(ends.len(), 8);

    for (record, outcome) in ends {
        let caller = record.caller().unwrap();
        assert_eq!(record.url(), format!("/admin/users/{}", caller));
        assert_eq!(
            outcome,
            Outcome::Success {
                elapsed: outcome.elapsed(),
                response_body: caller.to_string(),
            }
        );
    }
}

#[test]
fn request_time_follows_configured_format() {
    let sink = Arc::new(MemorySink::new());
    let config = AuditConfig::from_json(r#"{"timestamp_format": "%Y/%m/%d"}"#).unwrap();
    let interceptor = AuditInterceptor::with_config(sink.clone(), config);

    scope::with_request(delete_request(), || {
        interceptor.intercept(&DELETE_COMMENT, Args::new().with(AuthUser::new(1)), |_| {
            Ok::<_, CommentError>(())
        })
    })
    .unwrap();

    let start = &sink.starts()[0];
    assert_eq!(
        start.request_time(),
        start.started_at().format("%Y/%m/%d").to_string()
    );
    assert_eq!(start.request_time().len(), 10);
}

#[test]
fn dispatcher_routes_marked_and_listed_operations_through_interceptor() {
    let (sink, interceptor) = setup();
    let config = AuditConfig {
        admin_signatures: vec!["UserAdminController.change_user_role(..)".to_string()],
        ..AuditConfig::default()
    };
    let mut dispatcher = Dispatcher::new(interceptor, AdminSelector::from_config(&config));

    dispatcher.register_admin(DELETE_COMMENT, |args| match args.first_int() {
        Some(id) if id > 100 => Err(OperationError::not_found(format!("id={}", id))),
        id => Ok(serde_json::json!({ "deleted": id })),
    });
    dispatcher.register(CHANGE_ROLE, |args| {
        let body = args
            .payload_as::<RoleChangeRequest>()
            .ok_or_else(|| OperationError::new("BadRequest", "missing body"))?;
        Ok(serde_json::json!({ "role": body.role }))
    });
    dispatcher.register(
        OperationId::new("app::comment", "CommentController", "list"),
        |_| Ok(serde_json::json!([])),
    );

    dispatcher
        .dispatch(
            delete_request(),
            "CommentAdminController.delete_comment",
            Args::new().with(AuthUser::new(1)).with(3),
        )
        .unwrap();
    dispatcher
        .dispatch(
            RequestMeta::new("PATCH", "/admin/users/2"),
            "app::user::UserAdminController.change_user_role",
            Args::new().with(AuthUser::new(1)).with(2).with(Arg::payload(RoleChangeRequest {
                role: "ADMIN".to_string(),
                reason: None,
            })),
        )
        .unwrap();
    dispatcher
        .dispatch(
            RequestMeta::new("GET", "/comments"),
            "CommentController.list",
            Args::new(),
        )
        .unwrap();
    let err = dispatcher
        .dispatch(
            RequestMeta::new("DELETE", "/admin/comments/404"),
            "CommentAdminController.delete_comment",
            Args::new().with(AuthUser::new(1)).with(404),
        )
        .unwrap_err();

    assert!(matches!(err, DispatchError::Operation(_)));
    assert_eq!(err.to_string(), "NotFound: id=404");

    let operations: Vec<_> = sink
        .starts()
        .iter()
        .map(|record| record.operation().name())
        .collect();
    assert_eq!(
        operations,
        vec!["delete_comment", "change_user_role", "delete_comment"]
    );

    let entries = sink.entries();
    assert_eq!(entries.len(), 6);
    assert!(matches!(entries[5], SinkEntry::Finished(_, Outcome::Failure { .. })));
}
