//! Structured repository locations

use crate::error::LocatorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Branch assumed when an identifier carries no `#branch` suffix
pub const DEFAULT_BRANCH: &str = "master";

/// Separator between the parts of a canonical repository id
pub const SCM_URI_DELIMITER: char = ':';

/// A fully resolved repository location
///
/// `host`, `owner` and `repo` are never empty. `branch` is kept exactly as the
/// source spelled it because provider branch names are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// Provider host, e.g. `github.com`
    pub host: String,
    /// Repository owner (user or organisation)
    pub owner: String,
    /// Repository name without the `.git` suffix
    pub repo: String,
    /// Branch name
    pub branch: String,
}

impl Locator {
    /// Create a new locator
    pub fn new(
        host: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    /// `owner/repo`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Copy with host, owner and repo lower-cased for comparison.
    /// The branch is left untouched.
    pub fn canonical(&self) -> Self {
        Self {
            host: self.host.to_lowercase(),
            owner: self.owner.to_lowercase(),
            repo: self.repo.to_lowercase(),
            branch: self.branch.clone(),
        }
    }

    /// Browsable URL of a tree-ish (branch or sha) in this repository
    pub fn tree_url(&self, tree_ish: &str) -> String {
        format!(
            "https://{}/{}/{}/tree/{}",
            self.host, self.owner, self.repo, tree_ish
        )
    }
}

/// Canonical repository id: `host:repo_id:branch`
///
/// The numeric id is opaque here; turning it back into an owner and repository
/// name requires asking the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScmUri {
    /// Provider host
    pub host: String,
    /// Provider-assigned numeric repository id
    pub repo_id: String,
    /// Branch name
    pub branch: String,
}

impl ScmUri {
    /// Create a new canonical id
    pub fn new(
        host: impl Into<String>,
        repo_id: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            repo_id: repo_id.into(),
            branch: branch.into(),
        }
    }

    /// Combine with an `owner/repo` full name reported by the provider
    pub fn with_full_name(&self, full_name: &str) -> Result<Locator, LocatorError> {
        match full_name.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() => Ok(Locator::new(
                self.host.clone(),
                owner,
                repo,
                self.branch.clone(),
            )),
            _ => Err(LocatorError::InvalidIdentifier(full_name.to_string())),
        }
    }
}

impl fmt::Display for ScmUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}",
            self.host,
            self.repo_id,
            self.branch,
            d = SCM_URI_DELIMITER
        )
    }
}

impl FromStr for ScmUri {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::grammar::Grammar::ScmUri.matches(s) {
            Some(Identifier::RepositoryId(uri)) => Ok(uri),
            _ => Err(LocatorError::InvalidIdentifier(s.to_string())),
        }
    }
}

/// Result of recognising an identifier string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// A checkout URL that fully describes the repository
    CheckoutUrl(Locator),
    /// A canonical id that still needs a provider lookup
    RepositoryId(ScmUri),
}
