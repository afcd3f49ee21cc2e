//! End-to-end pipeline: discover, mutate, publish.
//!
//! Strictly linear per run. Per-version mutation failures are tolerated and
//! collected; a publish failure is fatal for the whole run.

use std::path::Path;

use crate::catalog::VersionCatalog;
use crate::error::SyncError;
use crate::events::{EventSink, Stage};
use crate::git::GitClient;
use crate::mutator;
use crate::publish::{Publisher, PublishOutcome, PullRequestApi};
use crate::source::{self, ReleaseFeed};
use crate::version::RubyVersion;

/// A per-version mutation failure the run continued past
#[derive(Debug, Clone)]
pub struct VersionFailure {
    pub version: RubyVersion,
    pub message: String,
}

/// Aggregated result of one run
#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    /// Versions upstream has that the catalog does not, descending.
    pub new_versions: Vec<RubyVersion>,

    /// Versions whose mutation succeeded, in application order.
    pub applied: Vec<RubyVersion>,

    /// Versions whose mutation failed, with the failure message.
    pub failures: Vec<VersionFailure>,

    /// De-duplicated union of modified relative paths, first-touch order.
    pub files_modified: Vec<String>,

    /// The created pull request, when one was published.
    pub pull_request: Option<PublishOutcome>,

    /// True when the run only reported what it would do.
    pub dry_run: bool,
}

/// Sequences VersionSource → diff → ConfigMutator → PRPublisher
pub struct Synchronizer<'a> {
    feed: &'a dyn ReleaseFeed,
    git: &'a dyn GitClient,
    api: &'a dyn PullRequestApi,
    sink: &'a dyn EventSink,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        feed: &'a dyn ReleaseFeed,
        git: &'a dyn GitClient,
        api: &'a dyn PullRequestApi,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            feed,
            git,
            api,
            sink,
        }
    }

    pub async fn run(
        &self,
        working_dir: &Path,
        credential: Option<&str>,
        dry_run: bool,
    ) -> Result<SyncOutcome, SyncError> {
        let catalog = VersionCatalog::load(&working_dir.join(mutator::CATALOG_FILE))?;
        self.sink.info(
            Stage::Catalog,
            &format!("{} versions currently cataloged", catalog.len()),
        );

        let available = source::fetch(self.feed, catalog.lowest(), self.sink).await?;
        let new_versions = catalog.diff(&available);

        if new_versions.is_empty() {
            self.sink
                .info(Stage::Catalog, "catalog is already up to date");
            return Ok(SyncOutcome::default());
        }

        let listed = new_versions
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        self.sink
            .info(Stage::Catalog, &format!("new upstream versions: {listed}"));

        if dry_run {
            return Ok(SyncOutcome {
                new_versions,
                dry_run: true,
                ..SyncOutcome::default()
            });
        }

        let mut applied = Vec::new();
        let mut failures = Vec::new();
        let mut files_modified: Vec<String> = Vec::new();

        // Descending order, continuing past per-version failures.
        for version in &new_versions {
            match mutator::apply(&version.to_string(), working_dir, self.sink) {
                Ok(outcome) => {
                    for file in outcome.files_modified {
                        if !files_modified.contains(&file) {
                            files_modified.push(file);
                        }
                    }
                    applied.push(*version);
                }
                Err(err) => {
                    self.sink.error(
                        Stage::Mutate,
                        &format!("could not add {version}: {err}"),
                    );
                    failures.push(VersionFailure {
                        version: *version,
                        message: err.to_string(),
                    });
                }
            }
        }

        if applied.is_empty() {
            // Nothing mutated; there is no change to propose.
            self.sink.warn(
                Stage::Publish,
                "every version addition failed; skipping publish",
            );
            return Ok(SyncOutcome {
                new_versions,
                applied,
                failures,
                files_modified,
                pull_request: None,
                dry_run: false,
            });
        }

        let publisher = Publisher::new(self.git, self.api, self.sink);
        let pull_request = publisher
            .publish(&applied, &files_modified, credential)
            .await?;

        Ok(SyncOutcome {
            new_versions,
            applied,
            failures,
            files_modified,
            pull_request: Some(pull_request),
            dry_run: false,
        })
    }
}
