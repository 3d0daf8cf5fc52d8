//! Scripted in-process backend for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::client::transport::{ApiRequest, ApiResponse, HttpTransport};
use crate::config::TaskdeskConfig;
use crate::error::{SessionError, SessionResult};
use crate::runtime::SessionRuntime;
use crate::session::clock::ManualClock;
use crate::session::model::{Credentials, Role};
use crate::session::store::SessionStore;

#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    Issue(String),
    Status(u16),
    Unreachable,
    Hang,
}

pub struct ScriptedBackend {
    pub log: Mutex<Vec<ApiRequest>>,
    pub valid_token: Mutex<String>,
    pub refresh: Mutex<RefreshBehavior>,
    pub refresh_delay: Duration,
    pub refresh_calls: AtomicUsize,
    /// Per-path artificial latency for resource calls.
    pub latency: Mutex<Vec<(String, Duration)>>,
}

impl ScriptedBackend {
    pub fn new(valid_token: &str, refresh: RefreshBehavior, refresh_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            log: Mutex::new(Vec::new()),
            valid_token: Mutex::new(valid_token.to_string()),
            refresh: Mutex::new(refresh),
            refresh_delay,
            refresh_calls: AtomicUsize::new(0),
            latency: Mutex::new(Vec::new()),
        })
    }

    pub fn refresh_calls(&self) -> usize { self.refresh_calls.load(Ordering::SeqCst) }

    /// Paths of resource requests in the order they reached the backend.
    pub fn sent(&self) -> Vec<(String, Option<String>, bool)> {
        self.log.lock().iter().map(|r| (r.path.clone(), r.bearer.clone(), r.retried)).collect()
    }

    fn json(status: u16, v: serde_json::Value) -> ApiResponse { ApiResponse { status, body: v.to_string() } }
}

#[async_trait]
impl HttpTransport for ScriptedBackend {
    async fn send(&self, req: &ApiRequest) -> SessionResult<ApiResponse> {
        self.log.lock().push(req.clone());
        let path = req.path.split('?').next().unwrap_or("").to_string();

        if path == "/api/auth/refresh-token" {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.refresh_delay).await;
            let behavior = self.refresh.lock().clone();
            return match behavior {
                RefreshBehavior::Issue(tok) => {
                    *self.valid_token.lock() = tok.clone();
                    Ok(Self::json(200, serde_json::json!({ "token": tok })))
                }
                RefreshBehavior::Status(s) => Ok(Self::json(s, serde_json::json!({ "message": "refresh token expired" }))),
                RefreshBehavior::Unreachable => Err(SessionError::network("connection refused")),
                RefreshBehavior::Hang => std::future::pending().await,
            };
        }
        if path == "/api/auth/login" {
            let body = req.body.clone().unwrap_or_default();
            if body["password"] == "secret" {
                let role = if body["username"] == "boss" { "ADMIN" } else { "USER" };
                let tok = self.valid_token.lock().clone();
                return Ok(Self::json(200, serde_json::json!({
                    "token": tok, "refreshToken": "rt-1", "role": role, "userId": 7, "sessionId": "s-1"
                })));
            }
            return Ok(Self::json(401, serde_json::json!({ "message": "Invalid email or password" })));
        }
        if path == "/offline" {
            return Err(SessionError::network("connection refused"));
        }
        if path == "/boom" {
            return Ok(Self::json(500, serde_json::json!({ "message": "boom" })));
        }
        if path == "/api/locked" {
            return Ok(Self::json(401, serde_json::json!({ "message": "account locked" })));
        }

        let delay = self.latency.lock().iter().find(|(p, _)| *p == path).map(|(_, d)| *d);
        if let Some(d) = delay { tokio::time::sleep(d).await; }
        if req.bearer.as_deref() == Some(self.valid_token.lock().as_str()) {
            Ok(Self::json(200, serde_json::json!({ "path": path })))
        } else {
            Ok(Self::json(401, serde_json::json!({ "message": "unauthorized" })))
        }
    }
}

pub fn creds(access: &str, refresh: Option<&str>, role: Role) -> Credentials {
    Credentials {
        access_token: access.to_string(),
        refresh_token: refresh.unwrap_or("").to_string(),
        role,
        user_id: "7".to_string(),
    }
}

/// Runtime over `backend` with an already established session.
pub fn runtime_with_session(backend: Arc<ScriptedBackend>, access: &str, role: Role) -> (SessionRuntime, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(SessionStore::in_memory());
    store.establish(creds(access, Some("rt-1"), role)).unwrap();
    let rt = SessionRuntime::assemble(TaskdeskConfig::default(), backend, store, clock.clone());
    (rt, clock)
}
