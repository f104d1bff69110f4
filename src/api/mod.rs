//! Relay HTTP API.
//!
//! Every call goes to the relay server (default `http://localhost:3000`),
//! which owns the OAuth client secret, proxies Jira, and fronts the Void
//! and deployment integrations.
//!
//! | Method | Path                          | Auth   | Operation                    |
//! |--------|-------------------------------|--------|------------------------------|
//! | POST   | `/api/auth/jira/token`        | none   | `exchange_code_for_token`    |
//! | GET    | `/api/jira/resources`         | Bearer | `get_accessible_resources`   |
//! | GET    | `/api/jira/{tenant}/tasks`    | Bearer | `get_user_tasks`             |
//! | GET    | `/api/jira/profile`           | Bearer | `get_user_profile`           |
//! | POST   | `/api/void/send-task`         | none   | `send_task_to_void`          |
//! | POST   | `/api/void/preview`           | none   | `preview_void_message`       |
//! | POST   | `/api/deploy`                 | none   | `trigger_deployment`         |
//! | GET    | `/api/deploy/status`          | none   | `get_deployment_status`      |

use async_trait::async_trait;

use crate::errors::ApiError;

pub mod client;
pub mod models;

pub use client::RelayClient;
pub use models::{
    DeploymentOutcome, PreviewResponse, TasksResponse, TaskPayload, TenantDescriptor,
    TokenResponse, UserProfile,
};

/// The relay operations the session and action layers depend on.
///
/// `RelayClient` is the HTTP implementation; tests substitute fakes.
#[async_trait]
pub trait RelayApi: Send + Sync {
    async fn exchange_code_for_token(&self, code: &str) -> Result<TokenResponse, ApiError>;

    async fn get_accessible_resources(
        &self,
        token: &str,
    ) -> Result<Vec<TenantDescriptor>, ApiError>;

    async fn get_user_tasks(&self, token: &str, tenant_id: &str)
    -> Result<TasksResponse, ApiError>;

    async fn get_user_profile(&self, token: &str) -> Result<UserProfile, ApiError>;

    async fn send_task_to_void(&self, payload: &TaskPayload) -> Result<serde_json::Value, ApiError>;

    async fn preview_void_message(&self, payload: &TaskPayload)
    -> Result<PreviewResponse, ApiError>;

    async fn trigger_deployment(&self, task_title: &str) -> Result<DeploymentOutcome, ApiError>;

    async fn get_deployment_status(&self) -> Result<serde_json::Value, ApiError>;
}
