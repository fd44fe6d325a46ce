//! reqwest-backed transport for the GitHub REST API
//!
//! Builds one request per [`ApiRequest`] and maps the outcome onto
//! [`ApiError`]. Works against github.com or a GitHub Enterprise base URL.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{ApiError, ApiRequest, Credential, GithubApi};
use crate::config::ScmConfig;

/// GitHub REST API version pinned for every request
const API_VERSION: &str = "2022-11-28";

#[derive(Debug, Deserialize)]
struct GithubErrorResponse {
    message: String,
}

/// Live GitHub transport
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    api_base: String,
    user_agent: String,
}

impl HttpApi {
    /// Create a transport for the public API
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self::with_api_base(crate::config::DEFAULT_API_URL, user_agent)
    }

    /// Create a transport with a custom API base URL
    ///
    /// Use this for GitHub Enterprise installations.
    pub fn with_api_base(api_base: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        }
    }

    pub fn from_config(config: &ScmConfig) -> Self {
        Self::with_api_base(&config.api_url, &config.user_agent)
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build common headers for API requests
    fn headers(&self, credential: &Credential) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| ApiError::Status {
                status: 401,
                message: "token contains characters not allowed in a header".into(),
            })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Ok(agent) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, agent);
        }
        headers.insert("x-github-api-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn build(&self, request: &ApiRequest) -> RequestBuilder {
        match request {
            ApiRequest::GetById { id } => self
                .client
                .request(Method::GET, self.url(&format!("/repositories/{}", id))),
            ApiRequest::GetRepo { owner, repo } => self
                .client
                .request(Method::GET, self.url(&format!("/repos/{}/{}", owner, repo))),
            ApiRequest::GetBranch {
                owner,
                repo,
                branch,
            } => self.client.request(
                Method::GET,
                self.url(&format!("/repos/{}/{}/branches/{}", owner, repo, branch)),
            ),
            ApiRequest::GetContent {
                owner,
                repo,
                path,
                git_ref,
            } => self
                .client
                .request(
                    Method::GET,
                    self.url(&format!(
                        "/repos/{}/{}/contents/{}",
                        owner,
                        repo,
                        path.trim_start_matches('/')
                    )),
                )
                .query(&[("ref", git_ref)]),
            ApiRequest::GetCommit { owner, repo, sha } => self.client.request(
                Method::GET,
                self.url(&format!("/repos/{}/{}/commits/{}", owner, repo, sha)),
            ),
            ApiRequest::GetReference {
                owner,
                repo,
                git_ref,
            } => self.client.request(
                Method::GET,
                self.url(&format!(
                    "/repos/{}/{}/git/ref/{}",
                    owner,
                    repo,
                    git_ref.trim_start_matches("refs/")
                )),
            ),
            ApiRequest::CreateStatus {
                owner,
                repo,
                sha,
                status,
            } => self
                .client
                .request(
                    Method::POST,
                    self.url(&format!("/repos/{}/{}/statuses/{}", owner, repo, sha)),
                )
                .json(status),
            ApiRequest::GetUser { username } => self
                .client
                .request(Method::GET, self.url(&format!("/users/{}", username))),
        }
    }

    /// Handle API response, mapping errors appropriately
    async fn handle_response(&self, response: Response) -> Result<serde_json::Value, ApiError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| ApiError::Decode(e.to_string()))
        } else {
            Err(Self::error_response(response, status).await)
        }
    }

    async fn error_response(response: Response, status: StatusCode) -> ApiError {
        // Try to get error message from body
        let message = match response.json::<GithubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string(),
        };

        ApiError::Status {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl GithubApi for HttpApi {
    async fn dispatch(
        &self,
        credential: &Credential,
        request: &ApiRequest,
    ) -> Result<serde_json::Value, ApiError> {
        debug!(operation = request.name(), scope = %request.scope(), "dispatching");

        let response = self
            .build(request)
            .headers(self.headers(credential)?)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout
                } else {
                    ApiError::Network(e.to_string())
                }
            })?;

        self.handle_response(response).await
    }
}
