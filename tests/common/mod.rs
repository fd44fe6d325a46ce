//! Shared fixtures for integration tests

#![allow(dead_code)]

use scm_github::api::{ApiRequest, MockApi};
use scm_github::{Credential, GithubScm, ScmConfig};
use serde_json::{json, Value};
use std::sync::Arc;

pub const OWNER: &str = "screwdriver-cd";
pub const REPO: &str = "models";
pub const REPO_ID: u64 = 920414;
pub const CHECKOUT_URL: &str = "git@github.com:screwdriver-cd/models.git#master";
pub const SCM_URI: &str = "github.com:920414:master";

/// Config with fast, deterministic retries
pub fn test_config() -> ScmConfig {
    let mut config = ScmConfig::default();
    config.retry.initial_backoff_ms = 10;
    config.retry.max_backoff_ms = 50;
    config.retry.jitter_factor = 0.0;
    config.breaker.cooldown_ms = 1_000;
    config.breaker.timeout_ms = 500;
    config
}

pub fn scm_with(api: &MockApi, config: &ScmConfig) -> GithubScm {
    GithubScm::new(Arc::new(api.clone()), config).unwrap()
}

pub fn scm(api: &MockApi) -> GithubScm {
    scm_with(api, &test_config())
}

pub fn token() -> Credential {
    Credential::new("test-token")
}

pub fn get_repo() -> ApiRequest {
    ApiRequest::GetRepo {
        owner: OWNER.into(),
        repo: REPO.into(),
    }
}

pub fn get_branch(branch: &str) -> ApiRequest {
    ApiRequest::GetBranch {
        owner: OWNER.into(),
        repo: REPO.into(),
        branch: branch.into(),
    }
}

pub fn get_by_id() -> ApiRequest {
    ApiRequest::GetById {
        id: REPO_ID.to_string(),
    }
}

pub fn repo_body() -> Value {
    json!({
        "id": REPO_ID,
        "name": REPO,
        "full_name": format!("{}/{}", OWNER, REPO),
        "owner": { "login": OWNER },
        "clone_url": "https://github.com/screwdriver-cd/models.git",
        "ssh_url": "git@github.com:screwdriver-cd/models.git",
        "permissions": { "admin": false, "push": true, "pull": true }
    })
}

pub fn branch_body(branch: &str, sha: &str) -> Value {
    json!({
        "name": branch,
        "commit": { "sha": sha },
        "_links": {
            "html": format!("https://github.com/{}/{}/tree/{}", OWNER, REPO, branch)
        }
    })
}
