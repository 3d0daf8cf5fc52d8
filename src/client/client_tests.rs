use super::*;

use std::time::Duration;

use crate::client::test_support::{runtime_with_session, RefreshBehavior, ScriptedBackend};
use crate::config::TaskdeskConfig;
use crate::runtime::SessionRuntime;
use crate::session::clock::SystemClock;
use crate::session::events::{SessionEvent, TerminationReason};
use crate::session::model::Role;

fn anonymous(backend: Arc<ScriptedBackend>) -> SessionRuntime {
    SessionRuntime::assemble(TaskdeskConfig::default(), backend, Arc::new(SessionStore::in_memory()), Arc::new(SystemClock))
}

#[test]
fn auth_endpoints_are_recognised() {
    assert!(is_auth_endpoint("/api/auth/login"));
    assert!(is_auth_endpoint("/api/auth/registerUser?x=1"));
    assert!(is_auth_endpoint("/api/auth/registerAdmin"));
    assert!(!is_auth_endpoint("/api/tasks"));
    assert!(!is_auth_endpoint("/api/users?next=/login"));
}

#[tokio::test(start_paused = true)]
async fn two_requests_300ms_apart_both_replayed_after_one_refresh() {
    let backend = ScriptedBackend::new("not-yet", RefreshBehavior::Issue("t2".into()), Duration::from_millis(200));
    backend.latency.lock().push(("/api/a".into(), Duration::from_millis(150)));
    backend.latency.lock().push(("/api/b".into(), Duration::from_millis(150)));
    let (rt, _clock) = runtime_with_session(backend.clone(), "t1", Role::User);

    let a = {
        let c = rt.client().clone();
        tokio::spawn(async move { c.get("/api/a").await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    // the refresh started at 150ms is still running, so b goes out with the old token
    assert_eq!(rt.store().access_token().as_deref(), Some("t1"));
    let b = {
        let c = rt.client().clone();
        tokio::spawn(async move { c.get("/api/b").await })
    };

    assert_eq!(a.await.unwrap().unwrap().status, 200);
    assert_eq!(b.await.unwrap().unwrap().status, 200);
    assert_eq!(backend.refresh_calls(), 1);

    let sent = backend.sent();
    for path in ["/api/a", "/api/b"] {
        let attempts: Vec<_> = sent.iter().filter(|(p, _, _)| p == path).collect();
        assert_eq!(attempts.len(), 2, "{path}: {attempts:?}");
        assert_eq!(attempts[0].1.as_deref(), Some("t1"));
        assert_eq!(attempts[1].1.as_deref(), Some("t2"));
        assert!(attempts[1].2);
    }
}

#[tokio::test]
async fn rejected_login_never_refreshes_or_touches_the_store() {
    let backend = ScriptedBackend::new("t1", RefreshBehavior::Issue("t2".into()), Duration::ZERO);
    let rt = anonymous(backend.clone());

    let err = rt.auth().login("ann", "wrong").await.unwrap_err();
    assert_eq!(err.http_status(), Some(401));
    assert!(err.is_auth_failure());
    assert_eq!(err.backend_message().as_deref(), Some("Invalid email or password"));
    assert_eq!(backend.refresh_calls(), 0);
    assert!(!rt.store().is_authenticated());
}

#[tokio::test]
async fn login_establishes_and_rearms() {
    let backend = ScriptedBackend::new("t1", RefreshBehavior::Issue("t2".into()), Duration::ZERO);
    let rt = anonymous(backend);
    assert!(rt.logout());

    let creds = rt.auth().login("boss", "secret").await.unwrap();
    assert_eq!(creds.role, Role::Admin);
    assert_eq!(creds.user_id, "7");
    assert_eq!(rt.store().access_token().as_deref(), Some("t1"));
    assert_eq!(rt.store().refresh_token().as_deref(), Some("rt-1"));
    assert!(rt.guard_protected(Some(Role::Admin)).is_allowed());

    let resp = rt.client().get("/api/tasks").await.unwrap();
    assert_eq!(resp.status, 200);
    assert!(rt.logout());
    assert!(!rt.store().is_authenticated());
}

#[tokio::test]
async fn network_failure_keeps_the_session() {
    let backend = ScriptedBackend::new("t1", RefreshBehavior::Issue("t2".into()), Duration::ZERO);
    let (rt, _clock) = runtime_with_session(backend.clone(), "t1", Role::User);
    let err = rt.client().get("/offline").await.unwrap_err();
    assert!(matches!(err, SessionError::NetworkUnreachable { .. }));
    assert!(rt.store().is_authenticated());
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn server_errors_pass_through() {
    let backend = ScriptedBackend::new("t1", RefreshBehavior::Issue("t2".into()), Duration::ZERO);
    let (rt, _clock) = runtime_with_session(backend.clone(), "t1", Role::User);
    let err = rt.client().get("/boom").await.unwrap_err();
    assert_eq!(err, SessionError::http(500, r#"{"message":"boom"}"#));
    assert!(rt.store().is_authenticated());
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn replay_still_unauthorized_ends_the_session() {
    let backend = ScriptedBackend::new("t1", RefreshBehavior::Issue("t2".into()), Duration::ZERO);
    let (rt, _clock) = runtime_with_session(backend.clone(), "t1", Role::User);
    let mut rx = rt.subscribe();

    let err = rt.client().get("/api/locked").await.unwrap_err();
    assert!(matches!(err, SessionError::AuthRejected { status: 401, .. }));
    assert_eq!(backend.refresh_calls(), 1);
    assert!(!rt.store().is_authenticated());

    let mut reasons = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        if let SessionEvent::Terminated { reason, .. } = ev { reasons.push(reason); }
    }
    assert_eq!(reasons, vec![TerminationReason::AuthRejected]);
}

#[tokio::test]
async fn typed_json_helpers() {
    let backend = ScriptedBackend::new("t1", RefreshBehavior::Issue("t2".into()), Duration::ZERO);
    let (rt, _clock) = runtime_with_session(backend, "t1", Role::User);
    let v: serde_json::Value = rt.client().get_json("/api/whatever").await.unwrap();
    assert_eq!(v["path"], "/api/whatever");
    let r = rt.client().post("/api/tasks", &serde_json::json!({ "title": "x" })).await.unwrap();
    assert!(r.is_success());
}
