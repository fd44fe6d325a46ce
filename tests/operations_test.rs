mod common;

use base64::Engine;
use common::*;
use scm_github::api::{ApiError, ApiRequest, MockApi, Permissions, StatusBody};
use scm_github::scm::{
    AuthorRequest, CheckoutUrlRequest, CommitRequest, CommitShaRequest, CommitStatusRequest,
    FileRequest, RepoIdentity, RepoRequest,
};
use scm_github::{BuildStatus, Credential, GatewayError, Scm, ScmError};
use serde_json::json;

fn repo_request(identifier: &str) -> RepoRequest {
    RepoRequest {
        identifier: identifier.into(),
        token: token(),
    }
}

fn checkout_request() -> CheckoutUrlRequest {
    CheckoutUrlRequest {
        checkout_url: CHECKOUT_URL.into(),
        token: token(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_get_permissions() {
    let api = MockApi::new();
    api.on(get_repo(), repo_body());
    let scm = scm(&api);

    let permissions = scm.get_permissions(&repo_request(CHECKOUT_URL)).await.unwrap();
    assert_eq!(
        permissions,
        Permissions {
            admin: false,
            push: true,
            pull: true
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_get_permissions_without_block_is_all_false() {
    let api = MockApi::new();
    let mut body = repo_body();
    body.as_object_mut().unwrap().remove("permissions");
    api.on(get_repo(), body);
    let scm = scm(&api);

    let permissions = scm.get_permissions(&repo_request(CHECKOUT_URL)).await.unwrap();
    assert_eq!(permissions, Permissions::default());
}

#[tokio::test(start_paused = true)]
async fn test_get_permissions_via_canonical_id() {
    let api = MockApi::new();
    api.on(get_by_id(), repo_body());
    api.on(get_repo(), repo_body());
    let scm = scm(&api);

    let permissions = scm.get_permissions(&repo_request(SCM_URI)).await.unwrap();
    assert!(permissions.push);
    assert_eq!(api.calls_to("repos.getById"), 1);
    assert_eq!(api.calls_to("repos.get"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_get_commit_sha_from_branch() {
    let api = MockApi::new();
    api.on(get_branch("master"), branch_body("master", "a1b2c3"));
    let scm = scm(&api);

    let sha = scm
        .get_commit_sha(&CommitShaRequest {
            identifier: CHECKOUT_URL.into(),
            token: token(),
            git_ref: None,
        })
        .await
        .unwrap();
    assert_eq!(sha, "a1b2c3");
}

#[tokio::test(start_paused = true)]
async fn test_get_commit_sha_from_ref() {
    let api = MockApi::new();
    api.on(
        ApiRequest::GetReference {
            owner: OWNER.into(),
            repo: REPO.into(),
            git_ref: "heads/feature".into(),
        },
        json!({
            "ref": "refs/heads/feature",
            "object": { "sha": "f00d", "type": "commit" }
        }),
    );
    let scm = scm(&api);

    let sha = scm
        .get_commit_sha(&CommitShaRequest {
            identifier: CHECKOUT_URL.into(),
            token: token(),
            git_ref: Some("feature".into()),
        })
        .await
        .unwrap();
    assert_eq!(sha, "f00d");
    assert_eq!(api.calls_to("repos.getBranch"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_update_commit_status_mapping() {
    let cases = [
        ("SUCCESS", "success", "Everything looks good!"),
        ("FAILURE", "failure", "Did not work as expected."),
        ("ABORTED", "failure", "Aborted mid-flight"),
        ("RUNNING", "pending", "Testing your code..."),
        ("QUEUED", "pending", "Looking for a place to park..."),
        ("MYSTERY", "failure", "failure"),
    ];

    for (build_status, state, description) in cases {
        let api = MockApi::new();
        api.on(
            ApiRequest::CreateStatus {
                owner: OWNER.into(),
                repo: REPO.into(),
                sha: "deadbeef".into(),
                status: StatusBody {
                    state: state.into(),
                    description: description.into(),
                    context: "Screwdriver/main".into(),
                    target_url: Some("https://cd.example.com/builds/1".into()),
                },
            },
            json!({ "id": 1, "state": state, "context": "Screwdriver/main" }),
        );
        let scm = scm(&api);

        let ack = scm
            .update_commit_status(&CommitStatusRequest {
                identifier: CHECKOUT_URL.into(),
                token: token(),
                sha: "deadbeef".into(),
                build_status: build_status.parse::<BuildStatus>().unwrap(),
                job_name: Some("main".into()),
                url: Some("https://cd.example.com/builds/1".into()),
            })
            .await
            .unwrap_or_else(|e| panic!("{} failed: {}", build_status, e));
        assert_eq!(ack.state, state);
    }
}

#[tokio::test(start_paused = true)]
async fn test_update_commit_status_without_job_uses_bare_context() {
    let api = MockApi::new();
    api.on(
        ApiRequest::CreateStatus {
            owner: OWNER.into(),
            repo: REPO.into(),
            sha: "deadbeef".into(),
            status: StatusBody {
                state: "success".into(),
                description: "Everything looks good!".into(),
                context: "Screwdriver".into(),
                target_url: None,
            },
        },
        json!({ "state": "success" }),
    );
    let scm = scm(&api);

    scm.update_commit_status(&CommitStatusRequest {
        identifier: CHECKOUT_URL.into(),
        token: token(),
        sha: "deadbeef".into(),
        build_status: BuildStatus::Success,
        job_name: None,
        url: None,
    })
    .await
    .unwrap();
}

fn get_content(path: &str, git_ref: &str) -> ApiRequest {
    ApiRequest::GetContent {
        owner: OWNER.into(),
        repo: REPO.into(),
        path: path.into(),
        git_ref: git_ref.into(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_get_file_decodes_base64() {
    let api = MockApi::new();
    let encoded = base64::engine::general_purpose::STANDARD.encode("jobs:\n  main:\n    image: node:20\n");
    api.on(
        get_content("screwdriver.yaml", "master"),
        json!({ "type": "file", "path": "screwdriver.yaml", "encoding": "base64", "content": encoded }),
    );
    let scm = scm(&api);

    let contents = scm
        .get_file(&FileRequest {
            identifier: CHECKOUT_URL.into(),
            token: token(),
            path: "screwdriver.yaml".into(),
            git_ref: None,
        })
        .await
        .unwrap();
    assert_eq!(contents, "jobs:\n  main:\n    image: node:20\n");
}

#[tokio::test(start_paused = true)]
async fn test_get_file_at_explicit_ref() {
    let api = MockApi::new();
    api.on(
        get_content("README.md", "abc123"),
        json!({ "type": "file", "path": "README.md", "encoding": "utf-8", "content": "# models" }),
    );
    let scm = scm(&api);

    let contents = scm
        .get_file(&FileRequest {
            identifier: CHECKOUT_URL.into(),
            token: token(),
            path: "README.md".into(),
            git_ref: Some("abc123".into()),
        })
        .await
        .unwrap();
    assert_eq!(contents, "# models");
}

#[tokio::test(start_paused = true)]
async fn test_get_file_on_directory() {
    let api = MockApi::new();
    api.on(
        get_content("lib", "master"),
        json!({ "type": "dir", "path": "lib" }),
    );
    let scm = scm(&api);

    let err = scm
        .get_file(&FileRequest {
            identifier: CHECKOUT_URL.into(),
            token: token(),
            path: "lib".into(),
            git_ref: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Path (lib) does not point to file");
}

#[tokio::test(start_paused = true)]
async fn test_get_file_on_directory_listing() {
    let api = MockApi::new();
    api.on(
        get_content("lib", "master"),
        json!([
            { "type": "file", "name": "index.js", "path": "lib/index.js" },
            { "type": "dir", "name": "helpers", "path": "lib/helpers" }
        ]),
    );
    let scm = scm(&api);

    let err = scm
        .get_file(&FileRequest {
            identifier: CHECKOUT_URL.into(),
            token: token(),
            path: "lib".into(),
            git_ref: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ScmError::NotAFile { ref path } if path == "lib"));
    assert_eq!(err.to_string(), "Path (lib) does not point to file");
}

#[tokio::test(start_paused = true)]
async fn test_get_repo_identity() {
    let api = MockApi::new();
    api.on(get_repo(), repo_body());
    api.on(get_branch("master"), branch_body("master", "a1b2c3"));
    let scm = scm(&api);

    let identity = scm.get_repo_identity(&checkout_request()).await.unwrap();
    assert_eq!(
        identity,
        RepoIdentity {
            id: SCM_URI.into(),
            name: "screwdriver-cd/models".into(),
            url: "https://github.com/screwdriver-cd/models/tree/master".into(),
            clone_url: Some("https://github.com/screwdriver-cd/models.git".into()),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_get_repo_identity_missing_branch() {
    let api = MockApi::new();
    api.on(get_repo(), repo_body());
    api.fail(
        get_branch("master"),
        ApiError::Status {
            status: 404,
            message: "Branch not found".into(),
        },
    );
    let scm = scm(&api);

    let err = scm.get_repo_identity(&checkout_request()).await.unwrap_err();
    assert!(matches!(
        err,
        ScmError::Gateway(GatewayError::Rejected { status: 404, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_parse_url() {
    let api = MockApi::new();
    api.on(get_repo(), repo_body());
    let scm = scm(&api);

    let id = scm.parse_url(&checkout_request()).await.unwrap();
    assert_eq!(id, SCM_URI);
}

#[tokio::test(start_paused = true)]
async fn test_decorate_author() {
    let api = MockApi::new();
    api.on(
        ApiRequest::GetUser {
            username: "batman".into(),
        },
        json!({
            "login": "batman",
            "name": "Bruce Wayne",
            "avatar_url": "https://avatars.githubusercontent.com/u/1",
            "html_url": "https://github.com/batman"
        }),
    );
    api.on(
        ApiRequest::GetUser {
            username: "robin".into(),
        },
        json!({ "login": "robin" }),
    );
    let scm = scm(&api);

    let author = scm
        .decorate_author(&AuthorRequest {
            username: "batman".into(),
            token: token(),
        })
        .await
        .unwrap();
    assert_eq!(author.name, "Bruce Wayne");
    assert_eq!(author.username.as_deref(), Some("batman"));
    assert_eq!(author.url.as_deref(), Some("https://github.com/batman"));

    let author = scm
        .decorate_author(&AuthorRequest {
            username: "robin".into(),
            token: token(),
        })
        .await
        .unwrap();
    assert_eq!(author.name, "robin");
    assert!(author.avatar.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_decorate_commit() {
    let api = MockApi::new();
    api.on(
        ApiRequest::GetCommit {
            owner: OWNER.into(),
            repo: REPO.into(),
            sha: "40171b678527".into(),
        },
        json!({
            "sha": "40171b678527",
            "commit": {
                "message": "Fix the build",
                "author": { "name": "Bruce Wayne", "email": "bruce@example.com" }
            },
            "author": { "login": "batman", "html_url": "https://github.com/batman" }
        }),
    );
    let scm = scm(&api);

    let commit = scm
        .decorate_commit(&CommitRequest {
            identifier: CHECKOUT_URL.into(),
            token: token(),
            sha: "40171b678527".into(),
        })
        .await
        .unwrap();
    assert_eq!(commit.message, "Fix the build");
    assert_eq!(commit.author.name, "Bruce Wayne");
    assert_eq!(commit.author.username.as_deref(), Some("batman"));
    assert_eq!(
        commit.url,
        "https://github.com/screwdriver-cd/models/tree/40171b678527"
    );
}

#[tokio::test(start_paused = true)]
async fn test_decorate_url_makes_no_calls() {
    let api = MockApi::new();
    let scm = scm(&api);

    let decoration = scm.decorate_url(&repo_request(CHECKOUT_URL)).await.unwrap();
    assert_eq!(decoration.name, "screwdriver-cd/models");
    assert_eq!(decoration.branch, "master");
    assert_eq!(
        decoration.url,
        "https://github.com/screwdriver-cd/models/tree/master"
    );
    assert_eq!(api.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_tokens_are_not_shared_between_callers() {
    let api = MockApi::new();
    api.on(get_repo(), repo_body());
    let scm = scm(&api);

    for name in ["alice", "bob"] {
        scm.get_permissions(&RepoRequest {
            identifier: CHECKOUT_URL.into(),
            token: Credential::new(name),
        })
        .await
        .unwrap();
    }
    assert_eq!(api.tokens(), vec!["alice".to_string(), "bob".to_string()]);
}

#[test]
fn test_format_checkout_url() {
    let api = MockApi::new();
    let scm = scm(&api);

    assert_eq!(
        scm.format_checkout_url("git@GitHub.com:Screwdriver-CD/Models.git#Feature")
            .unwrap(),
        "git@github.com:screwdriver-cd/models.git#Feature"
    );
    assert_eq!(
        scm.format_checkout_url("https://github.com/o/r.git").unwrap(),
        "https://github.com/o/r.git#master"
    );
    assert!(scm.format_checkout_url(SCM_URI).is_err());
}
