use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{SessionError, SessionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Everything needed to send (and later replay) one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured base URL, query string included.
    pub path: String,
    pub body: Option<Value>,
    pub bearer: Option<String>,
    /// Set on replays; a retried request never triggers another refresh.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self { method, path: path.into(), body, bearer: None, retried: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

    /// Pass success through; anything else becomes `SessionError::Http`.
    pub fn error_for_status(self) -> SessionResult<ApiResponse> {
        if self.is_success() { Ok(self) } else { Err(SessionError::http(self.status, self.body)) }
    }

    pub fn json<T: DeserializeOwned>(&self) -> SessionResult<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| SessionError::decode(format!("HTTP {} body did not match: {e}", self.status)))
    }
}

/// The wire. `ApiClient` and the refresh coordinator only ever talk to this,
/// so tests can script the backend.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// `Err` only when no response was obtained at all.
    async fn send(&self, req: &ApiRequest) -> SessionResult<ApiResponse>;
}

pub struct ReqwestTransport {
    base: Url,
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(base: &str, timeout: Duration) -> SessionResult<Self> {
        let base = Url::parse(base).map_err(|e| SessionError::config(format!("invalid base URL '{base}': {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionError::config(format!("building HTTP client: {e}")))?;
        Ok(Self { base, client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, req: &ApiRequest) -> SessionResult<ApiResponse> {
        let url = self.base.join(&req.path).map_err(|e| SessionError::config(format!("bad path '{}': {e}", req.path)))?;
        let mut builder = self.client.request(req.method.as_reqwest(), url);
        if let Some(tok) = &req.bearer {
            builder = builder.bearer_auth(tok);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        tracing::trace!(target: "client", path = %req.path, status, "response");
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        let ok = ApiResponse { status: 204, body: String::new() };
        assert!(ok.clone().error_for_status().is_ok());
        let bad = ApiResponse { status: 409, body: "dup".into() };
        assert_eq!(bad.error_for_status().unwrap_err(), SessionError::http(409, "dup"));
    }

    #[test]
    fn json_decode_error_is_typed() {
        let r = ApiResponse { status: 200, body: "<html>".into() };
        assert!(matches!(r.json::<Value>(), Err(SessionError::Decode { .. })));
    }

    #[test]
    fn bad_base_url_is_config_error() {
        assert!(matches!(ReqwestTransport::new("not a url", Duration::from_secs(1)), Err(SessionError::Config { .. })));
    }
}
