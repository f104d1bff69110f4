use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tasks::Issue;

/// Body of `POST /api/auth/jira/token`.
#[derive(Debug, Serialize)]
pub struct TokenRequest<'a> {
    pub code: &'a str,
}

/// Response from the token exchange endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// A Jira Cloud site the token can reach (Atlassian "accessible resource").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, rename = "avatarUrl")]
    pub avatar_url: Option<String>,
}

impl TenantDescriptor {
    /// Human label used in listings and prompts.
    pub fn label(&self) -> String {
        match (&self.name, &self.url) {
            (Some(name), Some(url)) => format!("{} ({})", name, url),
            (Some(name), None) => name.clone(),
            (None, Some(url)) => url.clone(),
            (None, None) => self.id.clone(),
        }
    }
}

/// Response from `GET /api/jira/{tenant}/tasks`. `issues` may be missing.
#[derive(Debug, Default, Deserialize)]
pub struct TasksResponse {
    #[serde(default)]
    pub issues: Option<Vec<Issue>>,
}

/// The tracker's identity record. Kept opaque; the accessors cover the
/// fields the CLI shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserProfile(pub Value);

impl UserProfile {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn display_name(&self) -> &str {
        self.str_field("displayName")
            .or_else(|| self.str_field("name"))
            .unwrap_or("Jira User")
    }

    pub fn email(&self) -> Option<&str> {
        self.str_field("emailAddress").or_else(|| self.str_field("email"))
    }

    pub fn account_id(&self) -> Option<&str> {
        self.str_field("accountId")
    }

    pub fn locale(&self) -> Option<&str> {
        self.str_field("locale")
    }

    pub fn timezone(&self) -> Option<&str> {
        self.str_field("timezone")
    }
}

/// What the Void endpoints receive for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub title: String,
    pub description: String,
}

/// Response from `POST /api/void/preview`.
#[derive(Debug, Deserialize)]
pub struct PreviewResponse {
    #[serde(default)]
    pub preview: String,
}

/// Body of `POST /api/deploy`.
#[derive(Debug, Serialize)]
pub struct DeployRequest<'a> {
    #[serde(rename = "taskTitle")]
    pub task_title: &'a str,
}

/// Response from `POST /api/deploy`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub deployed_url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}
