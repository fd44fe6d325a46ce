/*!
 * scm-github CLI - Command Line Interface
 *
 * Thin wrapper over the library for inspecting identifiers, replaying webhook
 * payloads and running single repository operations. Results go to stdout as
 * JSON; diagnostics go to stderr.
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use scm_github::{
    config::ScmConfig,
    logging,
    scm::{CheckoutUrlRequest, CommitShaRequest, FileRequest},
    webhook::{self, HeaderMap, EVENT_HEADER},
    Credential, GithubScm, Identifier, Scm, ScmError,
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "scm-github")]
#[command(version, about = "Resilient GitHub SCM adapter", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// GitHub token for remote operations
    #[arg(long, env = "SCM_GITHUB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognise an identifier without contacting GitHub
    Parse {
        identifier: String,
    },

    /// Normalize a checkout URL for storage
    Format {
        checkout_url: String,
    },

    /// Normalize a webhook payload read from a file
    Hook {
        /// Value of the X-GitHub-Event header
        #[arg(long)]
        event: String,

        payload: PathBuf,
    },

    /// Resolve an identifier to host, owner, repo and branch
    Resolve {
        identifier: String,
    },

    /// Canonical id, name and branch URL of a checkout URL
    RepoId {
        checkout_url: String,
    },

    /// Fetch and decode a file
    File {
        identifier: String,
        path: String,

        /// Branch or sha (defaults to the identifier's branch)
        #[arg(long = "ref")]
        git_ref: Option<String>,
    },

    /// Head sha of a branch or ref
    Sha {
        identifier: String,

        #[arg(long = "ref")]
        git_ref: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            match e.downcast_ref::<ScmError>() {
                Some(scm) if scm.is_retryable() => ExitCode::from(3),
                _ => ExitCode::from(2),
            }
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => ScmConfig::from_file(path)?,
        None => ScmConfig::default(),
    };

    if let Err(e) = logging::init_logging(&config.logging, cli.verbose) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Parse { identifier } => {
            let value = match scm_core_locator::parse_identifier(&identifier)? {
                Identifier::CheckoutUrl(locator) => json!({
                    "kind": "checkout-url",
                    "locator": locator,
                }),
                Identifier::RepositoryId(uri) => json!({
                    "kind": "repository-id",
                    "scmUri": uri,
                }),
            };
            print_json(&value)
        }
        Commands::Format { checkout_url } => {
            print_json(&scm_core_locator::format_checkout_url(&checkout_url)?)
        }
        Commands::Hook { event, payload } => {
            let body = std::fs::read_to_string(&payload)
                .with_context(|| format!("reading {}", payload.display()))?;
            let payload: serde_json::Value = serde_json::from_str(&body)
                .with_context(|| format!("parsing {}", payload.display()))?;
            let headers = HeaderMap::from([(EVENT_HEADER.to_string(), event)]);
            print_json(&webhook::normalize(&headers, &payload)?)
        }
        Commands::Resolve { identifier } => {
            let token = credential(cli.token)?;
            let scm = GithubScm::from_config(&config)?;
            let locator = scm.resolver().resolve(&identifier, &token).await?;
            print_json(&locator)
        }
        Commands::RepoId { checkout_url } => {
            let token = credential(cli.token)?;
            let scm = GithubScm::from_config(&config)?;
            let identity = scm
                .get_repo_identity(&CheckoutUrlRequest {
                    checkout_url,
                    token,
                })
                .await?;
            print_json(&identity)
        }
        Commands::File {
            identifier,
            path,
            git_ref,
        } => {
            let token = credential(cli.token)?;
            let scm = GithubScm::from_config(&config)?;
            let contents = scm
                .get_file(&FileRequest {
                    identifier,
                    token,
                    path,
                    git_ref,
                })
                .await?;
            print_json(&contents)
        }
        Commands::Sha {
            identifier,
            git_ref,
        } => {
            let token = credential(cli.token)?;
            let scm = GithubScm::from_config(&config)?;
            let sha = scm
                .get_commit_sha(&CommitShaRequest {
                    identifier,
                    token,
                    git_ref,
                })
                .await?;
            print_json(&sha)
        }
    }
}

fn credential(token: Option<String>) -> Result<Credential> {
    token
        .filter(|t| !t.is_empty())
        .map(Credential::new)
        .context("a GitHub token is required (--token or SCM_GITHUB_TOKEN)")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
