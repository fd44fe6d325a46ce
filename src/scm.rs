//! Repository operations
//!
//! The fixed catalogue of source-control operations the orchestrator relies
//! on, expressed as the [`Scm`] capability trait and implemented for GitHub by
//! [`GithubScm`]. Every operation resolves its identifier through the
//! [`IdentityResolver`] and talks to the provider only through the [`Gateway`].

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::api::{
    ApiRequest, BranchInfo, CommitInfo, ContentInfo, ContentReply, Credential, GithubApi,
    Permissions, ReferenceInfo, RepoInfo, StatusAck, StatusBody, UserInfo,
};
use crate::config::ScmConfig;
use crate::error::{Result, ScmError};
use crate::gateway::{CallDescriptor, Gateway};
use crate::resolver::IdentityResolver;
use crate::webhook::{self, HeaderMap, WebhookEvent};
use scm_core_locator::{format_checkout_url, Locator, ScmUri};
use scm_core_resilience::HealthSnapshot;

/// Build status reported by the orchestrator
///
/// Unrecognised values are kept verbatim and reported as failures.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum BuildStatus {
    Success,
    Failure,
    Aborted,
    Running,
    Queued,
    Unknown(String),
}

impl BuildStatus {
    /// Provider commit state: `success`, `pending` or `failure`
    pub fn state(&self) -> &'static str {
        match self {
            BuildStatus::Success => "success",
            BuildStatus::Running | BuildStatus::Queued => "pending",
            BuildStatus::Failure | BuildStatus::Aborted | BuildStatus::Unknown(_) => "failure",
        }
    }

    /// Human-readable description attached to the status
    pub fn description(&self) -> &'static str {
        match self {
            BuildStatus::Success => "Everything looks good!",
            BuildStatus::Failure => "Did not work as expected.",
            BuildStatus::Aborted => "Aborted mid-flight",
            BuildStatus::Running => "Testing your code...",
            BuildStatus::Queued => "Looking for a place to park...",
            BuildStatus::Unknown(_) => "failure",
        }
    }
}

impl FromStr for BuildStatus {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "SUCCESS" => BuildStatus::Success,
            "FAILURE" => BuildStatus::Failure,
            "ABORTED" => BuildStatus::Aborted,
            "RUNNING" => BuildStatus::Running,
            "QUEUED" => BuildStatus::Queued,
            other => BuildStatus::Unknown(other.to_string()),
        })
    }
}

impl From<String> for BuildStatus {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(status) => status,
            Err(never) => match never {},
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Success => write!(f, "SUCCESS"),
            BuildStatus::Failure => write!(f, "FAILURE"),
            BuildStatus::Aborted => write!(f, "ABORTED"),
            BuildStatus::Running => write!(f, "RUNNING"),
            BuildStatus::Queued => write!(f, "QUEUED"),
            BuildStatus::Unknown(other) => write!(f, "{}", other),
        }
    }
}

/// Identifier plus credential
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRequest {
    #[serde(alias = "scmUrl", alias = "scmUri")]
    pub identifier: String,
    pub token: Credential,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitShaRequest {
    #[serde(alias = "scmUrl", alias = "scmUri")]
    pub identifier: String,
    pub token: Credential,
    /// Branch, `heads/<branch>`, `tags/<tag>` or full `refs/...` name
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitStatusRequest {
    #[serde(alias = "scmUrl", alias = "scmUri")]
    pub identifier: String,
    pub token: Credential,
    pub sha: String,
    pub build_status: BuildStatus,
    #[serde(default)]
    pub job_name: Option<String>,
    /// Target URL linked from the status
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRequest {
    #[serde(alias = "scmUrl", alias = "scmUri")]
    pub identifier: String,
    pub token: Credential,
    pub path: String,
    /// Branch or sha; defaults to the identifier's branch
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorRequest {
    pub username: String,
    pub token: Credential,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    #[serde(alias = "scmUrl", alias = "scmUri")]
    pub identifier: String,
    pub token: Credential,
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutUrlRequest {
    pub checkout_url: String,
    pub token: Credential,
}

/// Storable identity of a repository branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoIdentity {
    /// Canonical repository id, `host:id:branch`
    pub id: String,
    /// `owner/repo`
    pub name: String,
    /// Browsable branch URL
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDecoration {
    pub avatar: Option<String>,
    pub name: String,
    pub username: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDecoration {
    pub author: AuthorDecoration,
    pub message: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlDecoration {
    pub branch: String,
    pub name: String,
    pub url: String,
}

/// Source-control capability set consumed by the orchestrator
#[async_trait]
pub trait Scm: Send + Sync {
    /// Permissions of the authenticated identity on the repository
    async fn get_permissions(&self, request: &RepoRequest) -> Result<Permissions>;

    /// Head sha of the identifier's branch, or of an explicit ref
    async fn get_commit_sha(&self, request: &CommitShaRequest) -> Result<String>;

    /// Publish a build status on a commit
    async fn update_commit_status(&self, request: &CommitStatusRequest) -> Result<StatusAck>;

    /// Decoded contents of a file
    async fn get_file(&self, request: &FileRequest) -> Result<String>;

    /// Canonical id, display name and branch URL
    async fn get_repo_identity(&self, request: &CheckoutUrlRequest) -> Result<RepoIdentity>;

    async fn decorate_author(&self, request: &AuthorRequest) -> Result<AuthorDecoration>;

    async fn decorate_commit(&self, request: &CommitRequest) -> Result<CommitDecoration>;

    async fn decorate_url(&self, request: &RepoRequest) -> Result<UrlDecoration>;

    /// Canonical repository id for a checkout URL
    async fn parse_url(&self, request: &CheckoutUrlRequest) -> Result<String>;

    /// Normalize an inbound webhook
    fn parse_hook(&self, headers: &HeaderMap, payload: &serde_json::Value) -> Result<WebhookEvent>;

    /// Normalize a checkout URL for storage
    fn format_checkout_url(&self, checkout_url: &str) -> Result<String>;

    /// Gateway health snapshot
    fn stats(&self) -> HealthSnapshot;
}

/// GitHub implementation of [`Scm`]
#[derive(Debug)]
pub struct GithubScm {
    resolver: IdentityResolver,
    status_context: String,
}

impl GithubScm {
    /// Build on top of any [`GithubApi`] transport
    pub fn new(api: Arc<dyn GithubApi>, config: &ScmConfig) -> Result<Self> {
        config.validate()?;
        let gateway = Gateway::new(api, config.breaker_config());

        Ok(Self {
            resolver: IdentityResolver::new(gateway, config.resolver.cache_ttl()),
            status_context: config.status_context.clone(),
        })
    }

    /// Build with the live reqwest transport
    #[cfg(feature = "http")]
    pub fn from_config(config: &ScmConfig) -> Result<Self> {
        let api = crate::api::HttpApi::from_config(config);
        Self::new(Arc::new(api), config)
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    fn gateway(&self) -> &Gateway {
        self.resolver.gateway()
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        credential: &Credential,
        request: ApiRequest,
    ) -> Result<T> {
        self.gateway()
            .invoke(CallDescriptor::new(credential, request))
            .await
    }

    async fn get_repo_info(&self, locator: &Locator, credential: &Credential) -> Result<RepoInfo> {
        self.call(
            credential,
            ApiRequest::GetRepo {
                owner: locator.owner.clone(),
                repo: locator.repo.clone(),
            },
        )
        .await
    }

    async fn get_branch_info(
        &self,
        locator: &Locator,
        credential: &Credential,
    ) -> Result<BranchInfo> {
        self.call(
            credential,
            ApiRequest::GetBranch {
                owner: locator.owner.clone(),
                repo: locator.repo.clone(),
                branch: locator.branch.clone(),
            },
        )
        .await
    }

    fn status_context(&self, job_name: Option<&str>) -> String {
        match job_name {
            Some(job) if !job.is_empty() => format!("{}/{}", self.status_context, job),
            _ => self.status_context.clone(),
        }
    }
}

#[async_trait]
impl Scm for GithubScm {
    #[instrument(skip(self, request), fields(identifier = %request.identifier))]
    async fn get_permissions(&self, request: &RepoRequest) -> Result<Permissions> {
        let locator = self.resolver.resolve(&request.identifier, &request.token).await?;
        let repo = self.get_repo_info(&locator, &request.token).await?;

        // No permission block means the identity has no access recorded
        Ok(repo.permissions.unwrap_or_default())
    }

    #[instrument(skip(self, request), fields(identifier = %request.identifier))]
    async fn get_commit_sha(&self, request: &CommitShaRequest) -> Result<String> {
        let locator = self.resolver.resolve(&request.identifier, &request.token).await?;

        match request.git_ref.as_deref() {
            Some(git_ref) => {
                let reference: ReferenceInfo = self
                    .call(
                        &request.token,
                        ApiRequest::GetReference {
                            owner: locator.owner.clone(),
                            repo: locator.repo.clone(),
                            git_ref: qualify_ref(git_ref),
                        },
                    )
                    .await?;
                Ok(reference.object.sha)
            }
            None => {
                let branch = self.get_branch_info(&locator, &request.token).await?;
                Ok(branch.commit.sha)
            }
        }
    }

    #[instrument(
        skip(self, request),
        fields(identifier = %request.identifier, sha = %request.sha, status = %request.build_status)
    )]
    async fn update_commit_status(&self, request: &CommitStatusRequest) -> Result<StatusAck> {
        let locator = self.resolver.resolve(&request.identifier, &request.token).await?;
        let status = StatusBody {
            state: request.build_status.state().to_string(),
            description: request.build_status.description().to_string(),
            context: self.status_context(request.job_name.as_deref()),
            target_url: request.url.clone().filter(|url| !url.is_empty()),
        };

        debug!(state = %status.state, context = %status.context, "updating commit status");
        self.call(
            &request.token,
            ApiRequest::CreateStatus {
                owner: locator.owner,
                repo: locator.repo,
                sha: request.sha.clone(),
                status,
            },
        )
        .await
    }

    #[instrument(skip(self, request), fields(identifier = %request.identifier, path = %request.path))]
    async fn get_file(&self, request: &FileRequest) -> Result<String> {
        let locator = self.resolver.resolve(&request.identifier, &request.token).await?;
        let git_ref = request
            .git_ref
            .clone()
            .unwrap_or_else(|| locator.branch.clone());

        let reply: ContentReply = self
            .call(
                &request.token,
                ApiRequest::GetContent {
                    owner: locator.owner,
                    repo: locator.repo,
                    path: request.path.clone(),
                    git_ref,
                },
            )
            .await?;

        match reply {
            ContentReply::Entry(content) if content.kind == "file" => decode_content(&content),
            _ => Err(ScmError::NotAFile {
                path: request.path.clone(),
            }),
        }
    }

    #[instrument(skip(self, request), fields(checkout_url = %request.checkout_url))]
    async fn get_repo_identity(&self, request: &CheckoutUrlRequest) -> Result<RepoIdentity> {
        let locator = self
            .resolver
            .resolve(&request.checkout_url, &request.token)
            .await?;

        let (repo, branch) = tokio::try_join!(
            self.get_repo_info(&locator, &request.token),
            self.get_branch_info(&locator, &request.token),
        )?;

        let id = ScmUri::new(&locator.host, repo.id.to_string(), &locator.branch);
        info!(id = %id, "resolved repository identity");

        Ok(RepoIdentity {
            id: id.to_string(),
            name: repo.full_name,
            url: branch.links.html,
            clone_url: repo.clone_url,
        })
    }

    #[instrument(skip(self, request), fields(username = %request.username))]
    async fn decorate_author(&self, request: &AuthorRequest) -> Result<AuthorDecoration> {
        let user: UserInfo = self
            .call(
                &request.token,
                ApiRequest::GetUser {
                    username: request.username.clone(),
                },
            )
            .await?;

        Ok(AuthorDecoration {
            avatar: user.avatar_url,
            name: user.name.unwrap_or_else(|| user.login.clone()),
            username: Some(user.login),
            url: user.html_url,
        })
    }

    #[instrument(skip(self, request), fields(identifier = %request.identifier, sha = %request.sha))]
    async fn decorate_commit(&self, request: &CommitRequest) -> Result<CommitDecoration> {
        let locator = self.resolver.resolve(&request.identifier, &request.token).await?;
        let commit: CommitInfo = self
            .call(
                &request.token,
                ApiRequest::GetCommit {
                    owner: locator.owner.clone(),
                    repo: locator.repo.clone(),
                    sha: request.sha.clone(),
                },
            )
            .await?;

        let account = commit.author;
        Ok(CommitDecoration {
            author: AuthorDecoration {
                avatar: account.as_ref().and_then(|a| a.avatar_url.clone()),
                name: commit.commit.author.name,
                username: account.as_ref().map(|a| a.login.clone()),
                url: account.and_then(|a| a.html_url),
            },
            message: commit.commit.message,
            url: locator.tree_url(&request.sha),
        })
    }

    #[instrument(skip(self, request), fields(identifier = %request.identifier))]
    async fn decorate_url(&self, request: &RepoRequest) -> Result<UrlDecoration> {
        let locator = self.resolver.resolve(&request.identifier, &request.token).await?;

        Ok(UrlDecoration {
            url: locator.tree_url(&locator.branch),
            name: locator.full_name(),
            branch: locator.branch,
        })
    }

    #[instrument(skip(self, request), fields(checkout_url = %request.checkout_url))]
    async fn parse_url(&self, request: &CheckoutUrlRequest) -> Result<String> {
        let locator = self
            .resolver
            .resolve(&request.checkout_url, &request.token)
            .await?;
        let repo = self.get_repo_info(&locator, &request.token).await?;

        Ok(ScmUri::new(locator.host, repo.id.to_string(), locator.branch).to_string())
    }

    fn parse_hook(&self, headers: &HeaderMap, payload: &serde_json::Value) -> Result<WebhookEvent> {
        webhook::normalize(headers, payload)
    }

    fn format_checkout_url(&self, checkout_url: &str) -> Result<String> {
        Ok(format_checkout_url(checkout_url)?)
    }

    fn stats(&self) -> HealthSnapshot {
        self.gateway().stats()
    }
}

/// Turn a user-supplied ref into the `heads/...` or `tags/...` form
fn qualify_ref(git_ref: &str) -> String {
    let git_ref = git_ref.trim_start_matches("refs/");
    if git_ref.starts_with("heads/") || git_ref.starts_with("tags/") || git_ref.starts_with("pull/")
    {
        git_ref.to_string()
    } else {
        format!("heads/{}", git_ref)
    }
}

/// Decode inline file content according to its declared encoding
fn decode_content(content: &ContentInfo) -> Result<String> {
    let raw = content.content.as_deref().unwrap_or_default();

    match content.encoding.as_deref() {
        Some("base64") => {
            // The provider wraps base64 at 60 columns
            let compact: String = raw.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map_err(|e| ScmError::Decode(format!("{}: {}", content.path, e)))?;
            String::from_utf8(bytes)
                .map_err(|e| ScmError::Decode(format!("{}: {}", content.path, e)))
        }
        None | Some("utf-8") | Some("utf8") => Ok(raw.to_string()),
        Some(other) => Err(ScmError::Decode(format!(
            "{}: unsupported content encoding {:?}",
            content.path, other
        ))),
    }
}
