//! Single-flight token refresh.
//!
//! At most one `POST refresh-token` is outstanding at any time. Requests that
//! hit 401 while it runs are queued in arrival order and settled exactly once
//! when it finishes: replayed with the new token on success, rejected with the
//! refresh error on failure. Taking the queue and leaving the `Refreshing`
//! state happen in one critical section, so a 401 arriving during the drain
//! either made it into this batch or starts (or skips) a fresh cycle.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{SessionError, SessionResult};
use crate::session::events::TerminationReason;
use crate::session::store::SessionStore;
use crate::session::terminate::SessionTerminator;

use super::transport::{ApiRequest, ApiResponse, HttpTransport, Method};

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken", alias = "token")]
    access_token: String,
}

enum Waiter {
    /// A request that failed with 401 and wants to be replayed.
    Replay { request: ApiRequest, reply: oneshot::Sender<SessionResult<ApiResponse>> },
    /// Continue-session: only needs the new token.
    Token { reply: oneshot::Sender<SessionResult<String>> },
}

impl Waiter {
    fn reject(self, err: SessionError) {
        match self {
            Waiter::Replay { reply, .. } => { let _ = reply.send(Err(err)); }
            Waiter::Token { reply } => { let _ = reply.send(Err(err)); }
        }
    }
}

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    queue: VecDeque<Waiter>,
    calls: u64,
}

enum Entry {
    ReplayNow(ApiRequest, Option<String>),
    /// `start` carries the store generation the new refresh belongs to.
    Queued { start: Option<u64> },
}

enum Outcome {
    Renewed(String),
    Failed(SessionError),
    /// Logout or a new login happened while refreshing; leave the session alone.
    Superseded(SessionError),
}

pub struct RefreshCoordinator {
    transport: Arc<dyn HttpTransport>,
    store: Arc<SessionStore>,
    terminator: Arc<SessionTerminator>,
    refresh_path: String,
    timeout: Duration,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        store: Arc<SessionStore>,
        terminator: Arc<SessionTerminator>,
        refresh_path: impl Into<String>,
        timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            store,
            terminator,
            refresh_path: refresh_path.into(),
            timeout,
            state: Mutex::new(RefreshState::default()),
        })
    }

    /// Number of refresh calls actually sent to the backend.
    pub fn refresh_calls(&self) -> u64 { self.state.lock().calls }

    pub fn is_refreshing(&self) -> bool { self.state.lock().refreshing }

    /// Reactive path: `request` got 401 while carrying `sent_token`.
    pub async fn recover(self: &Arc<Self>, request: ApiRequest, sent_token: Option<String>) -> SessionResult<ApiResponse> {
        let (tx, rx) = oneshot::channel();
        let entry = {
            let mut st = self.state.lock();
            let current = if st.refreshing { None } else { self.store.access_token() };
            if current.is_some() && current != sent_token {
                // a refresh already landed after this request went out
                Entry::ReplayNow(request, current)
            } else {
                let start = (!st.refreshing).then(|| self.store.generation());
                st.refreshing = true;
                st.queue.push_back(Waiter::Replay { request, reply: tx });
                debug!(target: "refresh", queued = st.queue.len(), "401 queued behind refresh");
                Entry::Queued { start }
            }
        };
        match entry {
            Entry::ReplayNow(request, current) => {
                debug!(target: "refresh", path = %request.path, "token already renewed; replaying without refresh");
                self.replay(request, current).await
            }
            Entry::Queued { start } => {
                if let Some(generation) = start { self.spawn_refresh(generation); }
                rx.await.unwrap_or_else(|_| Err(SessionError::refresh("refresh task went away")))
            }
        }
    }

    /// Proactive path: get a fresh token, joining a refresh already in flight.
    pub async fn refresh_now(self: &Arc<Self>) -> SessionResult<String> {
        let (tx, rx) = oneshot::channel();
        let start = {
            let mut st = self.state.lock();
            let start = (!st.refreshing).then(|| self.store.generation());
            st.refreshing = true;
            st.queue.push_back(Waiter::Token { reply: tx });
            start
        };
        if let Some(generation) = start { self.spawn_refresh(generation); }
        rx.await.unwrap_or_else(|_| Err(SessionError::refresh("refresh task went away")))
    }

    fn spawn_refresh(self: &Arc<Self>, generation: u64) {
        let this = self.clone();
        tokio::spawn(async move { this.run_refresh(generation).await });
    }

    /// `generation` is the session the triggering 401 belonged to; a result
    /// for any other session is discarded.
    async fn run_refresh(self: Arc<Self>, generation: u64) {
        let stored = if self.store.generation() == generation { self.store.refresh_token() } else { None };
        let result = match stored {
            None => Err(SessionError::refresh("no refresh token stored")),
            Some(rt) => {
                self.state.lock().calls += 1;
                info!(target: "refresh", "refreshing access token");
                match tokio::time::timeout(self.timeout, self.exchange(rt)).await {
                    Ok(r) => r,
                    Err(_) => Err(SessionError::refresh(format!("refresh timed out after {} ms", self.timeout.as_millis()))),
                }
            }
        };

        let (waiters, outcome) = {
            let mut st = self.state.lock();
            let outcome = match result {
                Ok(tok) => match self.store.apply_refreshed_token(generation, tok.clone()) {
                    Ok(()) => Outcome::Renewed(tok),
                    // a token that cannot be saved ends the session
                    Err(SessionError::Storage { message }) => {
                        Outcome::Failed(SessionError::refresh(format!("could not persist renewed token: {message}")))
                    }
                    Err(e) => Outcome::Superseded(e),
                },
                Err(e) if self.store.generation() != generation => Outcome::Superseded(e),
                Err(e) => Outcome::Failed(e),
            };
            st.refreshing = false;
            (std::mem::take(&mut st.queue), outcome)
        };

        match outcome {
            Outcome::Renewed(token) => {
                info!(target: "refresh", waiters = waiters.len(), "refresh succeeded; draining queue");
                self.drain(waiters, token).await;
            }
            Outcome::Failed(err) => {
                warn!(target: "refresh", error = %err, waiters = waiters.len(), "refresh failed; ending session");
                self.terminator.terminate_for(generation, TerminationReason::RefreshFailed);
                for w in waiters { w.reject(err.clone()); }
            }
            Outcome::Superseded(err) => {
                debug!(target: "refresh", error = %err, "session changed during refresh; discarding result");
                for w in waiters { w.reject(err.clone()); }
            }
        }
    }

    async fn exchange(&self, refresh_token: String) -> SessionResult<String> {
        let req = ApiRequest {
            method: Method::Post,
            path: self.refresh_path.clone(),
            body: Some(serde_json::json!({ "refreshToken": refresh_token })),
            bearer: None,
            retried: true,
        };
        let resp = self.transport.send(&req).await
            .map_err(|e| SessionError::refresh(format!("refresh call failed: {e}")))?;
        if !resp.is_success() {
            return Err(SessionError::refresh(format!("refresh endpoint returned HTTP {}", resp.status)));
        }
        let parsed: RefreshResponse = resp.json()
            .map_err(|e| SessionError::refresh(format!("refresh response unreadable: {e}")))?;
        if parsed.access_token.is_empty() {
            return Err(SessionError::refresh("refresh response carried an empty token"));
        }
        Ok(parsed.access_token)
    }

    /// Start every replay in queue order; each waiter is answered as soon as
    /// its own replay finishes.
    async fn drain(self: &Arc<Self>, waiters: VecDeque<Waiter>, token: String) {
        let mut inflight = FuturesUnordered::new();
        for w in waiters {
            match w {
                Waiter::Token { reply } => { let _ = reply.send(Ok(token.clone())); }
                Waiter::Replay { request, reply } => {
                    let this = self.clone();
                    let tok = token.clone();
                    inflight.push(async move {
                        let r = this.replay(request, Some(tok)).await;
                        let _ = reply.send(r);
                    });
                }
            }
        }
        while inflight.next().await.is_some() {}
    }

    /// Send `request` once more with `token`. A second 401 ends the session.
    async fn replay(&self, mut request: ApiRequest, token: Option<String>) -> SessionResult<ApiResponse> {
        request.bearer = token;
        request.retried = true;
        let resp = self.transport.send(&request).await?;
        if resp.status == 401 {
            warn!(target: "refresh", path = %request.path, "replayed request still unauthorized");
            self.terminator.terminate(TerminationReason::AuthRejected);
            return Err(SessionError::auth(resp.status, resp.body));
        }
        resp.error_for_status()
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod refresh_tests;
