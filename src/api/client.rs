use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::RelayApi;
use super::models::{
    DeployRequest, DeploymentOutcome, PreviewResponse, TaskPayload, TasksResponse,
    TenantDescriptor, TokenRequest, TokenResponse, UserProfile,
};
use crate::errors::ApiError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Error body shape the relay uses for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

/// HTTP client for the relay server.
///
/// Single attempt per call: no retries, no timeouts beyond the OS defaults,
/// no caching.
#[derive(Debug, Clone)]
pub struct RelayClient {
    http: Client,
    base_url: Url,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let parsed = Url::parse(base_url).map_err(|e| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        let http = Client::builder()
            .user_agent(concat!("taskbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    /// Relay endpoint that starts the Atlassian OAuth dance in a browser.
    pub fn login_url(&self) -> String {
        self.endpoint(["login"]).to_string()
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base_url.clone();
        // Cannot fail: `new` rejects cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request<'a>(
        &self,
        method: Method,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(%method, path = url.path(), "relay request");
        self.http.request(method, url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &'static str,
    ) -> Result<T, ApiError> {
        let response = builder.send().await.map_err(|source| {
            error!(context, error = %source, "relay unreachable");
            ApiError::Transport { context, source }
        })?;
        read_json(response, context).await
    }
}

/// Turn a relay response into `T`, or into `ApiError::Server` carrying the
/// body's `error` field (falling back to `context`) when the status is not 2xx.
async fn read_json<T: DeserializeOwned>(
    response: Response,
    context: &'static str,
) -> Result<T, ApiError> {
    let status = response.status();

    if !status.is_success() {
        let message = match response.json::<ErrorBody>().await {
            Ok(ErrorBody {
                error: Some(message),
            }) if !message.is_empty() => message,
            _ => context.to_string(),
        };
        error!(context, status = status.as_u16(), %message, "relay returned error");
        return Err(ApiError::Server {
            status: status.as_u16(),
            message,
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| ApiError::Transport { context, source })?;
    serde_json::from_slice(&body).map_err(|source| ApiError::Decode { context, source })
}

#[async_trait]
impl RelayApi for RelayClient {
    async fn exchange_code_for_token(&self, code: &str) -> Result<TokenResponse, ApiError> {
        let builder = self
            .request(Method::POST, ["api", "auth", "jira", "token"])
            .json(&TokenRequest { code });
        self.send(builder, "Failed to exchange code for token").await
    }

    async fn get_accessible_resources(
        &self,
        token: &str,
    ) -> Result<Vec<TenantDescriptor>, ApiError> {
        let builder = self
            .request(Method::GET, ["api", "jira", "resources"])
            .bearer_auth(token);
        self.send(builder, "Failed to get accessible resources").await
    }

    async fn get_user_tasks(
        &self,
        token: &str,
        tenant_id: &str,
    ) -> Result<TasksResponse, ApiError> {
        let builder = self
            .request(Method::GET, ["api", "jira", tenant_id, "tasks"])
            .bearer_auth(token);
        self.send(builder, "Failed to get user tasks").await
    }

    async fn get_user_profile(&self, token: &str) -> Result<UserProfile, ApiError> {
        let builder = self
            .request(Method::GET, ["api", "jira", "profile"])
            .bearer_auth(token);
        self.send(builder, "Failed to get user profile").await
    }

    async fn send_task_to_void(
        &self,
        payload: &TaskPayload,
    ) -> Result<serde_json::Value, ApiError> {
        let builder = self
            .request(Method::POST, ["api", "void", "send-task"])
            .json(payload);
        self.send(builder, "Failed to send task to Void").await
    }

    async fn preview_void_message(
        &self,
        payload: &TaskPayload,
    ) -> Result<PreviewResponse, ApiError> {
        let builder = self
            .request(Method::POST, ["api", "void", "preview"])
            .json(payload);
        self.send(builder, "Failed to preview message").await
    }

    async fn trigger_deployment(&self, task_title: &str) -> Result<DeploymentOutcome, ApiError> {
        let builder = self
            .request(Method::POST, ["api", "deploy"])
            .json(&DeployRequest { task_title });
        self.send(builder, "Failed to trigger deployment").await
    }

    async fn get_deployment_status(&self) -> Result<serde_json::Value, ApiError> {
        let builder = self.request(Method::GET, ["api", "deploy", "status"]);
        self.send(builder, "Failed to get deployment status").await
    }
}
