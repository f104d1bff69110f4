//! Typed error hierarchy for taskbridge.
//!
//! Three enums cover the three layers:
//! - `ApiError`: one relay HTTP call
//! - `StorageError`: the durable credential store
//! - `SessionError`: session lifecycle operations built on the two above

use std::path::PathBuf;

use thiserror::Error;

/// Errors from a single relay HTTP call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was obtained (DNS, connection refused, reset...).
    #[error("{context}: {source}")]
    Transport {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response. `message` is the server's `error` field when the
    /// body carried one, otherwise the operation's generic message.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// 2xx response whose body was not the expected JSON.
    #[error("{context}: unexpected response body: {source}")]
    Decode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid relay base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ApiError {
    /// HTTP status of a server-reported error.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the relay rejected the credentials.
    ///
    /// The relay sometimes wraps the upstream 401 inside a 500 body, so the
    /// message is checked as well as the status.
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            ApiError::Server { status, message } => *status == 401 || message.contains("401"),
            _ => false,
        }
    }
}

/// Errors from the durable credential store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access credential store at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential store at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Not connected to Jira. Run 'taskbridge login' first.")]
    NotConnected,

    #[error("No Jira sites are accessible with this account")]
    NoAccessibleResources,

    #[error("No accessible Jira site matches '{0}'")]
    TenantNotFound(String),

    #[error("Jira site selection failed: {0}")]
    TenantSelection(String),
}

impl SessionError {
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, SessionError::Api(api) if api.is_auth_rejection())
    }
}
