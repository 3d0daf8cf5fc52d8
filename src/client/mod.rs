//! Authenticated HTTP access to the backend.
//! `ApiClient` attaches the stored access token, passes ordinary responses
//! through, and hands 401s to the refresh coordinator. It never navigates;
//! session teardown goes through the terminator.

pub mod refresh;
pub mod transport;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};
use crate::session::store::SessionStore;

pub use refresh::RefreshCoordinator;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, ReqwestTransport};

/// Login and registration must fail plainly on 401, never refresh.
pub fn is_auth_endpoint(path: &str) -> bool {
    let p = path.split('?').next().unwrap_or(path);
    p.contains("/login") || p.contains("/register")
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    store: Arc<SessionStore>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, store: Arc<SessionStore>, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { transport, store, coordinator }
    }

    pub fn store(&self) -> &Arc<SessionStore> { &self.store }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> { &self.coordinator }

    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> SessionResult<ApiResponse> {
        let sent_token = self.store.access_token();
        let mut req = ApiRequest::new(method, path, body);
        req.bearer = sent_token.clone();
        let resp = match self.transport.send(&req).await {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "client", path, error = %e, "backend unreachable");
                return Err(e);
            }
        };
        if resp.status != 401 {
            return resp.error_for_status();
        }
        if is_auth_endpoint(path) {
            return Err(SessionError::auth(resp.status, resp.body));
        }
        debug!(target: "client", path, "401; handing to refresh coordinator");
        self.coordinator.recover(req, sent_token).await
    }

    pub async fn get(&self, path: &str) -> SessionResult<ApiResponse> { self.request(Method::Get, path, None).await }

    pub async fn delete(&self, path: &str) -> SessionResult<ApiResponse> { self.request(Method::Delete, path, None).await }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> SessionResult<ApiResponse> {
        self.request(Method::Post, path, Some(to_value(body)?)).await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> SessionResult<ApiResponse> {
        self.request(Method::Put, path, Some(to_value(body)?)).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SessionResult<T> {
        self.get(path).await?.json()
    }
}

fn to_value<B: Serialize + ?Sized>(body: &B) -> SessionResult<Value> {
    serde_json::to_value(body).map_err(|e| SessionError::decode(format!("request body: {e}")))
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
