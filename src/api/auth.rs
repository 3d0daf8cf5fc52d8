use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::ApiClient;
use crate::error::{SessionError, SessionResult};
use crate::session::events::TerminationReason;
use crate::session::model::{Credentials, Role};
use crate::session::terminate::SessionTerminator;

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(rename = "accessToken", alias = "token")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
    pub role: Role,
    #[serde(rename = "userId", deserialize_with = "super::string_or_number")]
    pub user_id: String,
}

/// Registration payload for both self-registered admins and admin-created users.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    /// Backend expects `ADMIN`/`USER`.
    pub role: String,
    #[serde(rename = "createdBy", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

/// Login, logout, registration and OTP password recovery.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
    terminator: Arc<SessionTerminator>,
    login_path: String,
}

impl AuthService {
    pub fn new(client: ApiClient, terminator: Arc<SessionTerminator>, login_path: impl Into<String>) -> Self {
        Self { client, terminator, login_path: login_path.into() }
    }

    /// Exchange credentials for a session. A rejected login leaves the store untouched.
    pub async fn login(&self, username: &str, password: &str) -> SessionResult<Credentials> {
        let body = serde_json::json!({ "username": username, "password": password });
        let resp = match self.client.post(&self.login_path, &body).await {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "session", username, error = %e, "login failed");
                return Err(e);
            }
        };
        let parsed: LoginResponse = resp.json()?;
        if parsed.access_token.is_empty() || parsed.refresh_token.is_empty() {
            return Err(SessionError::decode("login response is missing a token"));
        }
        let creds = Credentials {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
            role: parsed.role,
            user_id: parsed.user_id,
        };
        // a new generation also re-arms the terminator
        self.client.store().establish(creds.clone())?;
        info!(target: "session", username, role = %creds.role, "logged in");
        Ok(creds)
    }

    /// Explicit logout. False if the session had already been torn down.
    pub fn logout(&self) -> bool {
        self.terminator.terminate(TerminationReason::Explicit)
    }

    pub async fn register_admin(&self, user: &NewUser) -> SessionResult<()> {
        self.client.post("/api/auth/registerAdmin", user).await.map(|_| ())
    }

    /// Admin creates a user; `createdBy` defaults to the signed-in admin.
    pub async fn register_user(&self, user: &NewUser) -> SessionResult<()> {
        let mut user = user.clone();
        if user.created_by.is_none() {
            user.created_by = self.client.store().user_id();
        }
        self.client.post("/api/auth/registerUser", &user).await.map(|_| ())
    }

    /// Ask the backend to email a one-time password.
    pub async fn forgot_password(&self, email: &str) -> SessionResult<()> {
        self.client.post("/api/auth/forgot-password", &serde_json::json!({ "email": email })).await.map(|_| ())
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> SessionResult<()> {
        self.client.post("/api/auth/verify-otp", &serde_json::json!({ "email": email, "otp": otp })).await.map(|_| ())
    }

    pub async fn reset_password(&self, email: &str, new_password: &str) -> SessionResult<()> {
        self.client
            .post("/api/auth/reset-password", &serde_json::json!({ "email": email, "newPassword": new_password }))
            .await
            .map(|_| ())
    }
}
