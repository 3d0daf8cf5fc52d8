//! Typed wrappers over the backend endpoints the client uses. Everything goes
//! through `ApiClient`, so tokens, refresh and termination apply uniformly.

pub mod auth;
pub mod tasks;
pub mod users;

pub use auth::{AuthService, LoginResponse, NewUser};
pub use tasks::{Task, TaskDraft, TaskService, TaskStatus};
pub use users::{User, UserService, UserUpdate};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Backend ids arrive as JSON numbers or strings; keep them as strings.
pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

pub(crate) fn opt_string_or_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}
