//! Resilient call gateway
//!
//! Single choke point for remote calls. Each invocation carries its own
//! credential, runs under the shared circuit breaker with retry and timeout,
//! and is counted in the gateway's health snapshot.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::{ApiError, ApiRequest, ApiScope, Credential, GithubApi};
use crate::error::{GatewayError, Result, ScmError};
use scm_core_resilience::{
    CircuitBreaker, CircuitBreakerConfig, Classify, HealthSnapshot, ResilienceError,
};

/// One remote invocation: operation, scope, credential and parameters
///
/// Consumed by [`Gateway::invoke`].
#[derive(Debug)]
pub struct CallDescriptor {
    pub operation: &'static str,
    pub scope: ApiScope,
    pub credential: Credential,
    pub request: ApiRequest,
}

impl CallDescriptor {
    pub fn new(credential: &Credential, request: ApiRequest) -> Self {
        Self {
            operation: request.name(),
            scope: request.scope(),
            credential: credential.clone(),
            request,
        }
    }
}

/// Breaker-guarded access to a [`GithubApi`]
#[derive(Clone)]
pub struct Gateway {
    api: Arc<dyn GithubApi>,
    breaker: CircuitBreaker,
}

impl Gateway {
    pub fn new(api: Arc<dyn GithubApi>, config: CircuitBreakerConfig) -> Self {
        Self {
            api,
            breaker: CircuitBreaker::new(config),
        }
    }

    /// Dispatch a call and decode the response body into `T`
    pub async fn invoke<T: DeserializeOwned>(&self, call: CallDescriptor) -> Result<T> {
        let CallDescriptor {
            operation,
            scope,
            credential,
            request,
        } = call;
        let api = &self.api;

        debug!(operation, %scope, "invoking");
        let outcome = self
            .breaker
            .execute(|| api.dispatch(&credential, &request))
            .await;

        let body = outcome.map_err(|e| classify(operation, e))?;

        serde_json::from_value(body).map_err(|e| ScmError::MalformedResponse {
            operation: operation.to_string(),
            message: e.to_string(),
        })
    }

    /// Health and usage counters; never blocks
    pub fn stats(&self) -> HealthSnapshot {
        self.breaker.stats()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("breaker", &self.breaker.get_state())
            .finish_non_exhaustive()
    }
}

fn classify(operation: &'static str, err: ResilienceError<ApiError>) -> ScmError {
    let operation = operation.to_string();
    let err = match err {
        ResilienceError::CircuitOpen => {
            warn!(%operation, "circuit open, failing fast");
            GatewayError::CircuitOpen { operation }
        }
        ResilienceError::Timeout(after) => GatewayError::Transient {
            operation,
            message: format!("timed out after {:?}", after),
        },
        ResilienceError::Inner(e) if e.is_transient() => GatewayError::Transient {
            operation,
            message: e.to_string(),
        },
        ResilienceError::Inner(ApiError::Status { status, message }) => GatewayError::Rejected {
            operation,
            status,
            message,
        },
        ResilienceError::Inner(other) => {
            return ScmError::MalformedResponse {
                operation,
                message: other.to_string(),
            }
        }
    };
    ScmError::Gateway(err)
}
