/*!
 * Error types for the GitHub SCM adapter
 */

use scm_core_locator::LocatorError;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScmError>;

/// Failure of a call routed through the gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Breaker is open; the provider was not contacted
    #[error("{operation}: circuit breaker is open, provider unavailable")]
    CircuitOpen { operation: String },

    /// Network failure, timeout or provider overload, after the retry budget
    #[error("{operation}: transient failure: {message}")]
    Transient { operation: String, message: String },

    /// The provider answered and refused the request
    #[error("{operation}: rejected with status {status}: {message}")]
    Rejected {
        operation: String,
        status: u16,
        message: String,
    },
}

impl GatewayError {
    /// Whether this is a fast failure from an open breaker
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, GatewayError::CircuitOpen { .. })
    }

    /// Remote status code of a rejection
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Name of the remote operation that failed
    pub fn operation(&self) -> &str {
        match self {
            GatewayError::CircuitOpen { operation }
            | GatewayError::Transient { operation, .. }
            | GatewayError::Rejected { operation, .. } => operation,
        }
    }
}

#[derive(Debug, Error)]
pub enum ScmError {
    /// Identifier matches none of the supported grammars
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Identifier could not be turned into a repository location
    #[error("Unable to resolve identifier: {0}")]
    UnresolvableIdentifier(String),

    /// Requested path is a directory, symlink or submodule
    #[error("Path ({path}) does not point to file")]
    NotAFile { path: String },

    /// Webhook event family outside pull-request and push
    #[error("Unsupported webhook event type: {0}")]
    UnsupportedEventType(String),

    /// Webhook payload lacks a required field
    #[error("Malformed webhook payload: missing or invalid {0}")]
    MalformedPayload(String),

    /// Provider answered with an unexpected body
    #[error("{operation}: unexpected response: {message}")]
    MalformedResponse { operation: String, message: String },

    /// File content could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote call failed
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl From<LocatorError> for ScmError {
    fn from(err: LocatorError) -> Self {
        ScmError::InvalidIdentifier(err.input().to_string())
    }
}

impl ScmError {
    /// Check if retrying the whole operation later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScmError::Gateway(GatewayError::CircuitOpen { .. })
                | ScmError::Gateway(GatewayError::Transient { .. })
        )
    }

    /// Check if this error is a fast failure from an open breaker
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ScmError::Gateway(e) if e.is_circuit_open())
    }

    /// Get error category for logging and instrumentation
    pub fn category(&self) -> ErrorCategory {
        match self {
            ScmError::InvalidIdentifier(_) | ScmError::UnresolvableIdentifier(_) => {
                ErrorCategory::Identifier
            }
            ScmError::NotAFile { .. } => ErrorCategory::Content,
            ScmError::Decode(_) => ErrorCategory::Codec,
            ScmError::UnsupportedEventType(_) | ScmError::MalformedPayload(_) => {
                ErrorCategory::Webhook
            }
            ScmError::MalformedResponse { .. } => ErrorCategory::Protocol,
            ScmError::Config(_) => ErrorCategory::Configuration,
            ScmError::Gateway(GatewayError::CircuitOpen { .. }) => ErrorCategory::Availability,
            ScmError::Gateway(GatewayError::Transient { .. }) => ErrorCategory::Network,
            ScmError::Gateway(GatewayError::Rejected { status, .. }) => match status {
                401 | 403 => ErrorCategory::Security,
                _ => ErrorCategory::Remote,
            },
        }
    }
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Identifier parsing and resolution
    Identifier,
    /// Repository content errors
    Content,
    /// Content decoding errors
    Codec,
    /// Webhook ingestion errors
    Webhook,
    /// Unexpected provider responses
    Protocol,
    /// Configuration errors
    Configuration,
    /// Breaker short-circuits
    Availability,
    /// Network/timeout errors
    Network,
    /// Authentication/authorization rejections
    Security,
    /// Other provider rejections
    Remote,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Identifier => write!(f, "identifier"),
            ErrorCategory::Content => write!(f, "content"),
            ErrorCategory::Codec => write!(f, "codec"),
            ErrorCategory::Webhook => write!(f, "webhook"),
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Configuration => write!(f, "configuration"),
            ErrorCategory::Availability => write!(f, "availability"),
            ErrorCategory::Network => write!(f, "network"),
            ErrorCategory::Security => write!(f, "security"),
            ErrorCategory::Remote => write!(f, "remote"),
        }
    }
}
