//! Git operations abstraction layer
//!
//! The versioning code only needs a handful of tag and history queries from
//! version control. They are expressed by the [Repository] trait so that tag
//! reconciliation and describe resolution can run against a real repository
//! or an in-memory one.
//!
//! - [repository::Git2Repository]: a real implementation using the `git2` crate
//! - [mock::MockRepository]: a linear-history mock for testing
//!
//! ```rust
//! # use hdl_mirror::git::Repository;
//! # use hdl_mirror::domain::DescribeFilter;
//! # fn example<R: Repository>(repo: &R) -> hdl_mirror::Result<()> {
//! let hash = repo.resolve_commit("master")?;
//! let described = repo.describe("master", &DescribeFilter::release_tags())?;
//! println!("{} described as {:?}", hash, described);
//! # Ok(())
//! # }
//! ```

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::{Git2Repository, HttpsCredentials};

use std::cmp::Ordering;

use crate::domain::{DescribeFilter, ParsedVersion};
use crate::error::Result;

/// Message attached to the synthesized `v0.0` baseline tag
pub const BASELINE_TAG_MESSAGE: &str = "Dummy version on first commit so git-describe works";

/// Name of the synthesized baseline tag
pub const BASELINE_TAG: &str = "v0.0";

/// Tag store and history queries used by version resolution
///
/// Commits are identified by their full hexadecimal hash. References accept
/// anything the implementation can resolve to a commit (branch names, tags,
/// hashes).
pub trait Repository {
    /// All tag names, in the order the store reports them
    fn list_tags(&self) -> Result<Vec<String>>;

    /// Create an annotated tag `name` on commit `target`
    fn create_annotated_tag(&self, name: &str, target: &str, message: &str) -> Result<()>;

    /// Delete tag `name` from the store
    fn delete_tag(&self, name: &str) -> Result<()>;

    /// Resolve a reference to its commit hash
    fn resolve_commit(&self, reference: &str) -> Result<String>;

    /// Describe `reference` relative to its nearest ancestor tag accepted by
    /// `filter`, as `TAG-DISTANCE-gHASH`.
    ///
    /// # Returns
    /// * `Ok(Some(description))` - a matching tag is reachable
    /// * `Ok(None)` - no accepted tag is reachable from `reference`
    fn describe(&self, reference: &str, filter: &DescribeFilter) -> Result<Option<String>>;

    /// The oldest commit reachable from `reference`, or `None` for an empty history
    fn oldest_commit(&self, reference: &str) -> Result<Option<String>>;

    /// Full message of the commit `reference` points to
    fn commit_message(&self, reference: &str) -> Result<String>;
}

/// Format a describe string the way `git describe --long` does
pub fn format_description(tag: &str, distance: usize, short_hash: &str) -> String {
    format!("{}-{}-g{}", tag, distance, short_hash)
}

/// Pick the tag a describe anchors on when several share one commit:
/// the highest version wins, unparsable names lose, names break ties.
pub fn preferred_tag<'a>(names: &'a [String]) -> Option<&'a String> {
    names.iter().max_by(|a, b| {
        match (ParsedVersion::parse(a).ok(), ParsedVersion::parse(b).ok()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| a.cmp(b))
    })
}
