//! Ordered identifier grammars
//!
//! Each supported identifier shape is a named [`Grammar`]. [`GRAMMARS`] fixes
//! the priority order; [`parse_identifier`] returns the first match.

use crate::error::LocatorError;
use crate::locator::{Identifier, Locator, ScmUri, DEFAULT_BRANCH};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// `user@host:owner/repo[.git][#branch]`
static SSH_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[^@/:\s]+@(?P<host>[^@/:\s]+):(?P<owner>[^/:\s]+)/(?P<repo>[^/:\s#]+?)(?:\.git)?(?:#(?P<branch>\S+))?$",
    )
    .expect("valid ssh url pattern")
});

/// `scheme://[user@]host[:port]/owner/repo[.git][/][#branch]`
static HTTPS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?|git|ssh)://(?:[^@/\s]+@)?(?P<host>[^@/:\s]+)(?::\d+)?/(?P<owner>[^/:\s]+)/(?P<repo>[^/:\s#]+?)(?:\.git)?/?(?:#(?P<branch>\S+))?$",
    )
    .expect("valid https url pattern")
});

/// `host:numeric-id:branch`
static SCM_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<host>[^@/:\s]+):(?P<id>\d+):(?P<branch>\S+)$").expect("valid scm uri pattern")
});

/// A supported identifier shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    /// SSH-style checkout URL
    Ssh,
    /// HTTPS or git-protocol checkout URL
    Https,
    /// Canonical repository id
    ScmUri,
}

/// Grammars in priority order
pub const GRAMMARS: [Grammar; 3] = [Grammar::Ssh, Grammar::Https, Grammar::ScmUri];

impl Grammar {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Grammar::Ssh => "ssh",
            Grammar::Https => "https",
            Grammar::ScmUri => "scm-uri",
        }
    }

    /// Whether a match is self-contained (no provider lookup needed)
    pub fn is_checkout_url(&self) -> bool {
        !matches!(self, Grammar::ScmUri)
    }

    fn pattern(&self) -> &'static Regex {
        match self {
            Grammar::Ssh => &SSH_URL,
            Grammar::Https => &HTTPS_URL,
            Grammar::ScmUri => &SCM_URI,
        }
    }

    /// Try this grammar alone against `input`
    pub fn matches(&self, input: &str) -> Option<Identifier> {
        let caps = self.pattern().captures(input.trim())?;

        match self {
            Grammar::Ssh | Grammar::Https => Some(Identifier::CheckoutUrl(Locator::new(
                &caps["host"],
                &caps["owner"],
                &caps["repo"],
                branch_or_default(&caps),
            ))),
            Grammar::ScmUri => Some(Identifier::RepositoryId(ScmUri::new(
                &caps["host"],
                &caps["id"],
                &caps["branch"],
            ))),
        }
    }
}

fn branch_or_default(caps: &Captures<'_>) -> String {
    caps.name("branch")
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string())
}

/// Recognise any supported identifier shape
pub fn parse_identifier(input: &str) -> Result<Identifier, LocatorError> {
    GRAMMARS
        .iter()
        .find_map(|grammar| grammar.matches(input))
        .ok_or_else(|| LocatorError::InvalidIdentifier(input.to_string()))
}

/// Decompose a checkout URL into a [`Locator`]
///
/// Canonical repository ids are rejected here: they cannot produce an owner
/// and repository name without a provider lookup.
pub fn parse(input: &str) -> Result<Locator, LocatorError> {
    GRAMMARS
        .iter()
        .filter(|grammar| grammar.is_checkout_url())
        .find_map(|grammar| match grammar.matches(input) {
            Some(Identifier::CheckoutUrl(locator)) => Some(locator),
            _ => None,
        })
        .ok_or_else(|| LocatorError::InvalidIdentifier(input.to_string()))
}

/// Normalise a checkout URL for storage and comparison
///
/// Everything before `#` is lower-cased; the branch is appended exactly as
/// written, or the default branch when the URL carries none.
pub fn format_checkout_url(input: &str) -> Result<String, LocatorError> {
    let locator = parse(input)?;
    let trimmed = input.trim();
    let base = trimmed.split('#').next().unwrap_or(trimmed);

    Ok(format!("{}#{}", base.to_lowercase(), locator.branch))
}
