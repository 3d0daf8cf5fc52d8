use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SessionError;

/// Authorization class gating dashboards and guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = SessionError;

    // backend sends ADMIN/USER
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(SessionError::decode(format!("unknown role '{other}'"))),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Credentials established by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    pub role: Role,
    pub user_id: String,
}

/// Persisted key/value layout. Every field is optional on disk so a torn or
/// hand-edited file can be detected rather than failing to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl PersistedSession {
    /// Both tokens present or the record is unusable.
    pub fn into_credentials(self) -> Option<Credentials> {
        let access_token = self.access_token.filter(|s| !s.is_empty())?;
        let refresh_token = self.refresh_token.filter(|s| !s.is_empty())?;
        let role = self.role.as_deref().and_then(|r| r.parse::<Role>().ok())?;
        Some(Credentials { access_token, refresh_token, role, user_id: self.user_id.unwrap_or_default() })
    }
}

impl From<&Credentials> for PersistedSession {
    fn from(c: &Credentials) -> Self {
        Self {
            access_token: Some(c.access_token.clone()),
            refresh_token: Some(c.refresh_token.clone()),
            role: Some(c.role.as_str().to_string()),
            user_id: Some(c.user_id.clone()),
        }
    }
}
