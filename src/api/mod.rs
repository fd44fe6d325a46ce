//! Outbound GitHub REST contract
//!
//! Every remote call is an [`ApiRequest`] dispatched through a [`GithubApi`]
//! together with the caller's [`Credential`]. Implementations hold no
//! authentication state of their own.

#[cfg(feature = "http")]
pub mod http;
pub mod mock;
pub mod types;

use async_trait::async_trait;
use scm_core_resilience::Classify;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[cfg(feature = "http")]
pub use http::HttpApi;
pub use mock::MockApi;
pub use types::*;

/// OAuth-style bearer token supplied per call
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub struct Credential(Arc<SecretString>);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Arc::new(SecretString::from(token.into())))
    }

    /// Raw token, for building the `Authorization` header
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// REST API area an operation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiScope {
    Repos,
    GitData,
    Users,
}

impl fmt::Display for ApiScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiScope::Repos => write!(f, "repos"),
            ApiScope::GitData => write!(f, "gitdata"),
            ApiScope::Users => write!(f, "users"),
        }
    }
}

/// Body of a commit status update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    /// `success`, `pending` or `failure`
    pub state: String,
    pub description: String,
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
}

/// The fixed catalogue of remote operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    GetById {
        id: String,
    },
    GetRepo {
        owner: String,
        repo: String,
    },
    GetBranch {
        owner: String,
        repo: String,
        branch: String,
    },
    GetContent {
        owner: String,
        repo: String,
        path: String,
        git_ref: String,
    },
    GetCommit {
        owner: String,
        repo: String,
        sha: String,
    },
    /// `git_ref` is relative to `refs/`, e.g. `heads/main`
    GetReference {
        owner: String,
        repo: String,
        git_ref: String,
    },
    CreateStatus {
        owner: String,
        repo: String,
        sha: String,
        status: StatusBody,
    },
    GetUser {
        username: String,
    },
}

impl ApiRequest {
    /// Operation name used in logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            ApiRequest::GetById { .. } => "repos.getById",
            ApiRequest::GetRepo { .. } => "repos.get",
            ApiRequest::GetBranch { .. } => "repos.getBranch",
            ApiRequest::GetContent { .. } => "repos.getContent",
            ApiRequest::GetCommit { .. } => "repos.getCommit",
            ApiRequest::GetReference { .. } => "gitdata.getReference",
            ApiRequest::CreateStatus { .. } => "repos.createStatus",
            ApiRequest::GetUser { .. } => "users.getForUser",
        }
    }

    pub fn scope(&self) -> ApiScope {
        match self {
            ApiRequest::GetReference { .. } => ApiScope::GitData,
            ApiRequest::GetUser { .. } => ApiScope::Users,
            _ => ApiScope::Repos,
        }
    }
}

/// Failure of a single dispatch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Connection, DNS or TLS failure
    #[error("network error: {0}")]
    Network(String),

    /// Transport-level timeout
    #[error("request timed out")]
    Timeout,

    /// Non-2xx response
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body was not JSON
    #[error("invalid response body: {0}")]
    Decode(String),
}

impl Classify for ApiError {
    fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout => true,
            ApiError::Status { status, .. } => *status == 429 || *status >= 500,
            ApiError::Decode(_) => false,
        }
    }
}

/// Transport for the remote catalogue
///
/// The credential is applied to this request only.
#[async_trait]
pub trait GithubApi: Send + Sync {
    async fn dispatch(
        &self,
        credential: &Credential,
        request: &ApiRequest,
    ) -> Result<serde_json::Value, ApiError>;
}
