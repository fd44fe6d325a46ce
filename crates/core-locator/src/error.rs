//! Error types for identifier parsing

use thiserror::Error;

/// Errors produced while decomposing an identifier string
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LocatorError {
    /// No supported grammar matched the input
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl LocatorError {
    /// The offending input string
    pub fn input(&self) -> &str {
        match self {
            LocatorError::InvalidIdentifier(input) => input,
        }
    }
}
