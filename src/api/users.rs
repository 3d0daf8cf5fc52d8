use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::error::SessionResult;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserUpdate {
    pub username: String,
    pub firstname: String,
    pub lastname: String,
    pub role: String,
}

#[derive(Clone)]
pub struct UserService {
    client: ApiClient,
}

impl UserService {
    pub fn new(client: ApiClient) -> Self { Self { client } }

    /// Users created by `admin_id`.
    pub async fn list_for_admin(&self, admin_id: &str) -> SessionResult<Vec<User>> {
        self.client.get_json(&format!("/api/users?adminId={}", urlencoding::encode(admin_id))).await
    }

    /// Users created by the signed-in admin; empty when anonymous.
    pub async fn list_mine(&self) -> SessionResult<Vec<User>> {
        match self.client.store().user_id() {
            Some(id) => self.list_for_admin(&id).await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn update(&self, id: &str, update: &UserUpdate) -> SessionResult<User> {
        self.client.put(&format!("/api/users/{id}"), update).await?.json()
    }

    pub async fn delete(&self, id: &str) -> SessionResult<()> {
        self.client.delete(&format!("/api/users/{id}")).await.map(|_| ())
    }
}
