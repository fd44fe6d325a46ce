/*!
 * scm-github - Resilient GitHub source-control adapter
 *
 * Connects a CI orchestrator's source-control contract to the GitHub REST API:
 * - Identifier parsing for SSH/HTTPS checkout URLs and canonical repository ids
 * - Identity resolution with a TTL cache and lookup-by-id fallback
 * - A circuit-breaker-guarded call gateway with retry, timeouts and health stats
 * - Repository operations (permissions, commit sha, statuses, files, decoration)
 * - Webhook normalization for pull-request and push events
 */

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod resolver;
pub mod scm;
pub mod webhook;

// Re-export commonly used types
pub use api::{ApiError, ApiRequest, Credential, GithubApi, MockApi};
pub use config::ScmConfig;
pub use error::{ErrorCategory, GatewayError, Result, ScmError};
pub use gateway::{CallDescriptor, Gateway};
pub use resolver::IdentityResolver;
pub use scm::{BuildStatus, GithubScm, Scm};
pub use webhook::{normalize, PullRequestAction, WebhookEvent};

pub use scm_core_locator::{Identifier, Locator, ScmUri};
pub use scm_core_resilience::HealthSnapshot;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
