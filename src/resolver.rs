//! Identity resolution
//!
//! Turns any supported identifier into a [`Locator`]. Checkout URLs are parsed
//! locally; canonical repository ids need a lookup-by-id against the provider
//! to recover the owner and repository name. Successful resolutions are
//! memoized by exact input for the configured TTL; failures never are.

use std::time::Duration;
use tracing::{debug, instrument};

use crate::api::{ApiRequest, Credential, RepoInfo};
use crate::cache::TtlCache;
use crate::error::{Result, ScmError};
use crate::gateway::{CallDescriptor, Gateway};
use scm_core_locator::{parse_identifier, Identifier, Locator, ScmUri};

/// Resolver with an optional TTL cache
#[derive(Debug)]
pub struct IdentityResolver {
    gateway: Gateway,
    cache: TtlCache<String, Locator>,
}

impl IdentityResolver {
    pub fn new(gateway: Gateway, cache_ttl: Duration) -> Self {
        Self {
            gateway,
            cache: TtlCache::new(cache_ttl),
        }
    }

    /// Resolve a checkout URL or canonical repository id
    #[instrument(skip(self, credential))]
    pub async fn resolve(&self, identifier: &str, credential: &Credential) -> Result<Locator> {
        if let Some(hit) = self.cache.get(identifier) {
            debug!("resolver cache hit");
            return Ok(hit);
        }

        let locator = match parse_identifier(identifier) {
            Ok(Identifier::CheckoutUrl(locator)) => locator,
            Ok(Identifier::RepositoryId(uri)) => self.lookup_scm_uri(&uri, credential).await?,
            Err(_) => {
                return Err(ScmError::UnresolvableIdentifier(identifier.to_string()));
            }
        };

        Ok(self.cache.insert_if_absent(identifier.to_string(), locator))
    }

    /// Recover owner and repository name for a canonical id
    #[instrument(skip(self, credential), fields(uri = %uri))]
    pub async fn lookup_scm_uri(&self, uri: &ScmUri, credential: &Credential) -> Result<Locator> {
        let repo: RepoInfo = self
            .gateway
            .invoke(CallDescriptor::new(
                credential,
                ApiRequest::GetById {
                    id: uri.repo_id.clone(),
                },
            ))
            .await?;

        uri.with_full_name(&repo.full_name)
            .map_err(|_| ScmError::MalformedResponse {
                operation: "repos.getById".to_string(),
                message: format!("unexpected full_name {:?}", repo.full_name),
            })
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Drop expired cache entries
    pub fn purge_cache(&self) -> usize {
        self.cache.purge_expired()
    }
}
