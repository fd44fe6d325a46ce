//! SCM Core Locator: pure-logic repository identifier parsing
//!
//! # Overview
//!
//! The orchestrator has stored repositories under three different identifier
//! shapes over its lifetime. This crate recognises all of them and decomposes
//! them into structured values:
//!
//! - **SSH checkout URL**: `git@github.com:owner/repo.git#branch`
//! - **HTTPS / git protocol checkout URL**: `https://github.com/owner/repo.git#branch`
//! - **Canonical repository id**: `github.com:123456:branch`
//!
//! Checkout URLs are self-contained and yield a [`Locator`] directly. A canonical
//! repository id only carries the provider's numeric id, so it yields a
//! [`ScmUri`] that has to be resolved against the provider by the caller.
//!
//! # Key Principles
//!
//! This crate has zero knowledge of networking, credentials, or async runtimes.
//! Every function is deterministic and cheap enough for hot paths.
//!
//! # Example
//!
//! ```
//! use scm_core_locator::{parse, parse_identifier, Identifier};
//!
//! let locator = parse("git@github.com:screwdriver-cd/models.git#Feature").unwrap();
//! assert_eq!(locator.owner, "screwdriver-cd");
//! assert_eq!(locator.repo, "models");
//! assert_eq!(locator.branch, "Feature");
//!
//! match parse_identifier("github.com:920414:master").unwrap() {
//!     Identifier::RepositoryId(uri) => assert_eq!(uri.repo_id, "920414"),
//!     Identifier::CheckoutUrl(_) => unreachable!(),
//! }
//! ```

pub mod error;
pub mod grammar;
pub mod locator;

pub use error::LocatorError;
pub use grammar::{format_checkout_url, parse, parse_identifier, Grammar, GRAMMARS};
pub use locator::{Identifier, Locator, ScmUri, DEFAULT_BRANCH, SCM_URI_DELIMITER};
