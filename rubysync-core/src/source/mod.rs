//! Upstream discovery of stable Ruby versions.
//!
//! The source of truth is the `ruby-build` definitions repository: its
//! latest release tag pins a snapshot, and the filenames in the definitions
//! directory at that tag are the version candidates. Two sequential remote
//! reads, no retries.

use async_trait::async_trait;

use crate::error::SyncError;
use crate::events::{EventSink, Stage};
use crate::github::GitHubClient;
use crate::version::RubyVersion;

/// Fixed upstream coordinate
pub const UPSTREAM_OWNER: &str = "rbenv";
pub const UPSTREAM_REPO: &str = "ruby-build";

/// Directory whose filenames are version candidates
pub const DEFINITIONS_DIR: &str = "share/ruby-build";

/// The two remote reads discovery performs, as a seam for tests
#[async_trait]
pub trait ReleaseFeed: Send + Sync {
    /// Tag of the latest stable release of the definitions repository.
    async fn latest_tag(&self) -> Result<String, SyncError>;

    /// Filenames in the definitions directory at `tag`.
    async fn definition_names(&self, tag: &str) -> Result<Vec<String>, SyncError>;
}

/// Production feed backed by the GitHub REST client
pub struct UpstreamSource {
    client: GitHubClient,
}

impl UpstreamSource {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReleaseFeed for UpstreamSource {
    async fn latest_tag(&self) -> Result<String, SyncError> {
        let release = self
            .client
            .latest_release(UPSTREAM_OWNER, UPSTREAM_REPO)
            .await?;
        Ok(release.tag_name)
    }

    async fn definition_names(&self, tag: &str) -> Result<Vec<String>, SyncError> {
        let entries = self
            .client
            .directory_listing(UPSTREAM_OWNER, UPSTREAM_REPO, DEFINITIONS_DIR, tag)
            .await?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.kind == "file")
            .map(|entry| entry.name)
            .collect())
    }
}

/// Fetch stable versions at or above `min_version`, descending.
///
/// Candidates whose name is not an exact triple (pre-releases, alternative
/// engines) are discarded before comparison.
pub async fn fetch(
    feed: &dyn ReleaseFeed,
    min_version: Option<RubyVersion>,
    sink: &dyn EventSink,
) -> Result<Vec<RubyVersion>, SyncError> {
    let tag = feed.latest_tag().await?;
    sink.debug(
        Stage::Discover,
        &format!("upstream definitions pinned at release {tag}"),
    );

    let names = feed.definition_names(&tag).await?;
    let candidate_count = names.len();

    let mut versions: Vec<RubyVersion> = names
        .iter()
        .filter_map(|name| name.parse().ok())
        .filter(|v| min_version.map_or(true, |min| *v >= min))
        .collect();
    versions.sort_unstable_by(|a, b| b.cmp(a));
    versions.dedup();

    sink.info(
        Stage::Discover,
        &format!(
            "{} stable versions of {} upstream candidates",
            versions.len(),
            candidate_count
        ),
    );

    Ok(versions)
}
