//! Unified session-core error model.
//! Every failure the HTTP wrapper, refresh coordinator and expiry monitor surface
//! to the view layer is one of these variants. The enum is `Clone` so a single
//! refresh failure can be handed to every queued waiter.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionError {
    /// No response was obtained at all (connection refused, DNS, timeout).
    #[error("network_unreachable: {message}")]
    NetworkUnreachable { message: String },
    /// 401 on login/register, or a replayed request that is still 401.
    #[error("auth_rejected: HTTP {status}: {body}")]
    AuthRejected { status: u16, body: String },
    /// Refresh call errored, returned non-success, timed out, or there was no refresh token.
    #[error("refresh_failed: {message}")]
    RefreshFailed { message: String },
    /// The stored access token could not be decoded.
    #[error("token_decode: {message}")]
    TokenDecode { message: String },
    /// Any other non-success response.
    #[error("http_error: HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("storage: {message}")]
    Storage { message: String },
    /// A success body did not match the expected shape.
    #[error("decode: {message}")]
    Decode { message: String },
    #[error("config: {message}")]
    Config { message: String },
}

impl SessionError {
    pub fn network<S: Into<String>>(msg: S) -> Self { SessionError::NetworkUnreachable { message: msg.into() } }
    pub fn auth<S: Into<String>>(status: u16, body: S) -> Self { SessionError::AuthRejected { status, body: body.into() } }
    pub fn refresh<S: Into<String>>(msg: S) -> Self { SessionError::RefreshFailed { message: msg.into() } }
    pub fn token<S: Into<String>>(msg: S) -> Self { SessionError::TokenDecode { message: msg.into() } }
    pub fn http<S: Into<String>>(status: u16, body: S) -> Self { SessionError::Http { status, body: body.into() } }
    pub fn storage<S: Into<String>>(msg: S) -> Self { SessionError::Storage { message: msg.into() } }
    pub fn decode<S: Into<String>>(msg: S) -> Self { SessionError::Decode { message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { SessionError::Config { message: msg.into() } }

    pub fn code_str(&self) -> &'static str {
        match self {
            SessionError::NetworkUnreachable { .. } => "network_unreachable",
            SessionError::AuthRejected { .. } => "auth_rejected",
            SessionError::RefreshFailed { .. } => "refresh_failed",
            SessionError::TokenDecode { .. } => "token_decode",
            SessionError::Http { .. } => "http_error",
            SessionError::Storage { .. } => "storage",
            SessionError::Decode { .. } => "decode",
            SessionError::Config { .. } => "config",
        }
    }

    /// HTTP status carried by the error, if any came back from the backend.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SessionError::AuthRejected { status, .. } | SessionError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for errors that end (or never started) an authenticated session.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            SessionError::AuthRejected { .. } | SessionError::RefreshFailed { .. } | SessionError::TokenDecode { .. }
        )
    }

    /// Backend error message, when the body is JSON with a `message` field.
    pub fn backend_message(&self) -> Option<String> {
        let body = match self {
            SessionError::AuthRejected { body, .. } | SessionError::Http { body, .. } => body,
            _ => return None,
        };
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(|s| s.to_string()))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

impl From<reqwest::Error> for SessionError {
    fn from(err: reqwest::Error) -> Self {
        SessionError::NetworkUnreachable { message: err.to_string() }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Storage { message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
