use std::fmt;

use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::error::SessionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TaskStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "super::string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, rename = "userId", deserialize_with = "super::opt_string_or_number")]
    pub user_id: Option<String>,
}

/// Body for create and update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self { title: title.into(), description: None, status: TaskStatus::Pending }
    }
}

/// Personal task CRUD plus the admin-wide listing.
#[derive(Clone)]
pub struct TaskService {
    client: ApiClient,
}

impl TaskService {
    pub fn new(client: ApiClient) -> Self { Self { client } }

    pub async fn create(&self, draft: &TaskDraft) -> SessionResult<Task> {
        self.client.post("/api/tasks", draft).await?.json()
    }

    pub async fn list(&self) -> SessionResult<Vec<Task>> {
        self.client.get_json("/api/tasks").await
    }

    pub async fn get(&self, id: &str) -> SessionResult<Task> {
        self.client.get_json(&format!("/api/tasks/{id}")).await
    }

    pub async fn update(&self, id: &str, draft: &TaskDraft) -> SessionResult<Task> {
        self.client.put(&format!("/api/tasks/{id}"), draft).await?.json()
    }

    pub async fn delete(&self, id: &str) -> SessionResult<()> {
        self.client.delete(&format!("/api/tasks/{id}")).await.map(|_| ())
    }

    pub async fn admin_view(&self) -> SessionResult<Vec<Task>> {
        self.client.get_json("/api/tasks/admin/view-tasks").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_display_labels_on_the_wire() {
        assert_eq!(serde_json::to_string(&TaskStatus::InProgress).unwrap(), "\"In Progress\"");
        let s: TaskStatus = serde_json::from_str("\"Completed\"").unwrap();
        assert_eq!(s, TaskStatus::Completed);
        assert_eq!(TaskStatus::InProgress.to_string(), "In Progress");
    }

    #[test]
    fn task_tolerates_missing_optional_fields() {
        let t: Task = serde_json::from_str(r#"{"id":4,"title":"write report"}"#).unwrap();
        assert_eq!(t.id, "4");
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.description.is_none());
        assert!(t.user_id.is_none());
    }
}
