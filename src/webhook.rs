//! Webhook normalization
//!
//! Translates a GitHub webhook (event header plus JSON payload) into the
//! canonical event handed to the orchestrator. Pure and synchronous: no
//! network or resolver access.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{Result, ScmError};

/// Inbound request headers; names are matched case-insensitively
pub type HeaderMap = HashMap<String, String>;

/// Header carrying the event family
pub const EVENT_HEADER: &str = "x-github-event";

const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// Normalized pull-request action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestAction {
    Opened,
    Reopened,
    Synchronized,
    Closed,
}

impl PullRequestAction {
    /// Map a provider action; anything unrecognised is treated as closed
    pub fn from_remote(action: &str) -> Self {
        match action {
            "opened" => PullRequestAction::Opened,
            "reopened" => PullRequestAction::Reopened,
            "synchronize" | "synchronized" => PullRequestAction::Synchronized,
            "closed" => PullRequestAction::Closed,
            other => {
                warn!(action = other, "unsupported pull request action, treating as closed");
                PullRequestAction::Closed
            }
        }
    }
}

impl fmt::Display for PullRequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PullRequestAction::Opened => write!(f, "opened"),
            PullRequestAction::Reopened => write!(f, "reopened"),
            PullRequestAction::Synchronized => write!(f, "synchronized"),
            PullRequestAction::Closed => write!(f, "closed"),
        }
    }
}

/// Pull-request event: a PR was opened, updated or closed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestEvent {
    pub action: PullRequestAction,
    /// Base branch the PR targets
    pub branch: String,
    pub checkout_url: String,
    pub pr_num: u64,
    /// `{checkout_url}#pull/{pr_num}/merge`
    pub pr_ref: String,
    /// Head sha of the PR
    pub sha: String,
    pub username: String,
}

/// Push event: commits landed on a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    /// Always `push`
    pub action: String,
    pub branch: String,
    pub checkout_url: String,
    pub sha: String,
    pub username: String,
}

/// Canonical webhook event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebhookEvent {
    #[serde(rename = "pr")]
    PullRequest(PullRequestEvent),
    #[serde(rename = "repo")]
    Push(PushEvent),
}

impl WebhookEvent {
    pub fn branch(&self) -> &str {
        match self {
            WebhookEvent::PullRequest(pr) => &pr.branch,
            WebhookEvent::Push(push) => &push.branch,
        }
    }

    pub fn sha(&self) -> &str {
        match self {
            WebhookEvent::PullRequest(pr) => &pr.sha,
            WebhookEvent::Push(push) => &push.sha,
        }
    }
}

/// Normalize an inbound webhook
pub fn normalize(headers: &HeaderMap, payload: &Value) -> Result<WebhookEvent> {
    let event = event_type(headers)
        .ok_or_else(|| ScmError::UnsupportedEventType("<missing>".to_string()))?;

    debug!(event, "normalizing webhook");

    match event {
        "pull_request" => parse_pull_request(payload).map(WebhookEvent::PullRequest),
        "push" => parse_push(payload).map(WebhookEvent::Push),
        other => Err(ScmError::UnsupportedEventType(other.to_string())),
    }
}

fn event_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(EVENT_HEADER))
        .map(|(_, value)| value.trim())
}

fn parse_pull_request(payload: &Value) -> Result<PullRequestEvent> {
    let checkout_url = string_at(payload, "/repository/ssh_url")?;
    let pr_num = payload
        .pointer("/pull_request/number")
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed("/pull_request/number"))?;

    Ok(PullRequestEvent {
        action: PullRequestAction::from_remote(&string_at(payload, "/action")?),
        branch: string_at(payload, "/pull_request/base/ref")?,
        pr_ref: format!("{}#pull/{}/merge", checkout_url, pr_num),
        checkout_url,
        pr_num,
        sha: string_at(payload, "/pull_request/head/sha")?,
        username: string_at(payload, "/pull_request/user/login")?,
    })
}

fn parse_push(payload: &Value) -> Result<PushEvent> {
    let git_ref = string_at(payload, "/ref")?;
    let branch = git_ref
        .strip_prefix(BRANCH_REF_PREFIX)
        .map(str::to_string)
        .unwrap_or(git_ref);

    Ok(PushEvent {
        action: "push".to_string(),
        branch,
        checkout_url: string_at(payload, "/repository/ssh_url")?,
        sha: string_at(payload, "/after")?,
        username: string_at(payload, "/sender/login")?,
    })
}

fn string_at(payload: &Value, pointer: &str) -> Result<String> {
    payload
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| malformed(pointer))
}

fn malformed(pointer: &str) -> ScmError {
    ScmError::MalformedPayload(pointer.trim_start_matches('/').replace('/', "."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn headers(event: &str) -> HeaderMap {
        HeaderMap::from([("X-GitHub-Event".to_string(), event.to_string())])
    }

    fn pr_payload(action: &str) -> Value {
        json!({
            "action": action,
            "pull_request": {
                "number": 1,
                "base": { "ref": "master" },
                "head": { "sha": "0f9a0b8c" },
                "user": { "login": "baxterthehacker" }
            },
            "repository": { "ssh_url": "git@github.com:baxterthehacker/public-repo.git" }
        })
    }

    #[test]
    fn test_pull_request_opened() {
        let event = normalize(&headers("pull_request"), &pr_payload("opened")).unwrap();
        match event {
            WebhookEvent::PullRequest(pr) => {
                assert_eq!(pr.action, PullRequestAction::Opened);
                assert_eq!(pr.branch, "master");
                assert_eq!(pr.pr_num, 1);
                assert_eq!(
                    pr.pr_ref,
                    "git@github.com:baxterthehacker/public-repo.git#pull/1/merge"
                );
                assert_eq!(pr.sha, "0f9a0b8c");
                assert_eq!(pr.username, "baxterthehacker");
            }
            other => panic!("Expected pull request, got {:?}", other),
        }
    }

    #[test]
    fn test_action_normalization() {
        crate::logging::init_test_logging();
        for (remote, expected) in [
            ("synchronize", PullRequestAction::Synchronized),
            ("synchronized", PullRequestAction::Synchronized),
            ("reopened", PullRequestAction::Reopened),
            ("labeled", PullRequestAction::Closed),
            ("edited", PullRequestAction::Closed),
        ] {
            assert_eq!(PullRequestAction::from_remote(remote), expected, "{}", remote);
        }
    }

    #[test]
    fn test_push_strips_branch_prefix() {
        let payload = json!({
            "ref": "refs/heads/main",
            "after": "abc123",
            "repository": { "ssh_url": "git@github.com:o/r.git" },
            "sender": { "login": "octocat" }
        });
        let event = normalize(&headers("push"), &payload).unwrap();
        assert_eq!(event.branch(), "main");
        assert_eq!(event.sha(), "abc123");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "repo");
        assert_eq!(json["action"], "push");
        assert_eq!(json["checkoutUrl"], "git@github.com:o/r.git");
    }

    #[test]
    fn test_push_to_tag_keeps_ref() {
        let payload = json!({
            "ref": "refs/tags/v1.0.0",
            "after": "abc",
            "repository": { "ssh_url": "git@github.com:o/r.git" },
            "sender": { "login": "octocat" }
        });
        let event = normalize(&headers("push"), &payload).unwrap();
        assert_eq!(event.branch(), "refs/tags/v1.0.0");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let headers = HeaderMap::from([("x-github-event".to_string(), "pull_request".to_string())]);
        assert!(normalize(&headers, &pr_payload("closed")).is_ok());
    }

    #[test]
    fn test_unsupported_event() {
        let err = normalize(&headers("issues"), &json!({})).unwrap_err();
        assert!(matches!(err, ScmError::UnsupportedEventType(ref e) if e == "issues"));
    }

    #[test]
    fn test_missing_header() {
        let err = normalize(&HeaderMap::new(), &json!({})).unwrap_err();
        assert!(matches!(err, ScmError::UnsupportedEventType(ref e) if e == "<missing>"));
    }

    #[test]
    fn test_malformed_payload_names_field() {
        let mut payload = pr_payload("opened");
        payload["pull_request"]["number"] = json!("one");
        let err = normalize(&headers("pull_request"), &payload).unwrap_err();
        assert!(matches!(err, ScmError::MalformedPayload(ref f) if f == "pull_request.number"));
    }

    #[test]
    fn test_pr_event_serializes_with_type_tag() {
        let event = normalize(&headers("pull_request"), &pr_payload("synchronize")).unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "pr");
        assert_eq!(json["action"], "synchronized");
        assert_eq!(json["prNum"], 1);
    }
}
