//! Branch, commit, push, and pull-request lifecycle.
//!
//! One canonical automation pull request per run: any open pull request
//! carrying both automation labels is commented on and closed before the
//! fresh one is created. Stale pull requests are closed, never deleted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SyncError;
use crate::events::{EventSink, Stage};
use crate::git::GitClient;
use crate::github::{CreatedPull, GitHubClient, PullSummary, RepoCoordinates};
use crate::version::RubyVersion;

/// The fixed label pair identifying automation pull requests
pub const PR_LABELS: [&str; 2] = ["automated-pr", "ruby-version-update"];

/// Machine-parseable marker embedded in every automation commit
pub const COMMIT_MARKER: &str = "[rubysync:auto]";

/// Comment left on a superseded pull request
pub const SUPERSEDE_COMMENT: &str =
    "Superseded by a newer automated version update; closing in favor of the fresh pull request.";

const BRANCH_PREFIX: &str = "ruby-version-update-";

/// Remote pull-request operations, as a seam for tests
#[async_trait]
pub trait PullRequestApi: Send + Sync {
    /// Login of the credential's user.
    async fn authenticated_user(&self) -> Result<String, SyncError>;

    /// Default branch of the repository.
    async fn default_branch(&self, coords: &RepoCoordinates) -> Result<String, SyncError>;

    async fn open_pull_requests(
        &self,
        coords: &RepoCoordinates,
    ) -> Result<Vec<PullSummary>, SyncError>;

    async fn comment(
        &self,
        coords: &RepoCoordinates,
        number: u64,
        body: &str,
    ) -> Result<(), SyncError>;

    async fn close_pull_request(
        &self,
        coords: &RepoCoordinates,
        number: u64,
    ) -> Result<(), SyncError>;

    async fn create_pull_request(
        &self,
        coords: &RepoCoordinates,
        params: NewPullRequest,
    ) -> Result<CreatedPull, SyncError>;

    async fn add_labels(
        &self,
        coords: &RepoCoordinates,
        number: u64,
        labels: &[&str],
    ) -> Result<(), SyncError>;
}

#[async_trait]
impl PullRequestApi for GitHubClient {
    async fn authenticated_user(&self) -> Result<String, SyncError> {
        Ok(GitHubClient::authenticated_user(self).await?.login)
    }

    async fn default_branch(&self, coords: &RepoCoordinates) -> Result<String, SyncError> {
        Ok(self.repository(coords).await?.default_branch)
    }

    async fn open_pull_requests(
        &self,
        coords: &RepoCoordinates,
    ) -> Result<Vec<PullSummary>, SyncError> {
        GitHubClient::open_pull_requests(self, coords).await
    }

    async fn comment(
        &self,
        coords: &RepoCoordinates,
        number: u64,
        body: &str,
    ) -> Result<(), SyncError> {
        self.comment_on_issue(coords, number, body).await
    }

    async fn close_pull_request(
        &self,
        coords: &RepoCoordinates,
        number: u64,
    ) -> Result<(), SyncError> {
        GitHubClient::close_pull_request(self, coords, number).await
    }

    async fn create_pull_request(
        &self,
        coords: &RepoCoordinates,
        params: NewPullRequest,
    ) -> Result<CreatedPull, SyncError> {
        GitHubClient::create_pull_request(
            self,
            coords,
            &params.title,
            &params.head,
            &params.base,
            &params.body,
        )
        .await
    }

    async fn add_labels(
        &self,
        coords: &RepoCoordinates,
        number: u64,
        labels: &[&str],
    ) -> Result<(), SyncError> {
        GitHubClient::add_labels(self, coords, number, labels).await
    }
}

/// Parameters of the pull request to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

/// What a successful publish produced
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub number: u64,
    pub url: String,
    pub branch: String,
}

/// Drives the publish sequence against the injected seams
pub struct Publisher<'a> {
    git: &'a dyn GitClient,
    api: &'a dyn PullRequestApi,
    sink: &'a dyn EventSink,
}

impl<'a> Publisher<'a> {
    pub fn new(
        git: &'a dyn GitClient,
        api: &'a dyn PullRequestApi,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self { git, api, sink }
    }

    /// Publish one pull request covering `versions` and `files_modified`.
    ///
    /// Failures during the supersession sweep and the pre-branch fetch are
    /// tolerated (logged, run continues); everything else aborts with the
    /// originating message.
    pub async fn publish(
        &self,
        versions: &[RubyVersion],
        files_modified: &[String],
        credential: Option<&str>,
    ) -> Result<PublishOutcome, SyncError> {
        if credential.map_or(true, |c| c.trim().is_empty()) {
            return Err(SyncError::TokenRequired);
        }

        let banner = self.git.probe()?;
        self.sink.debug(Stage::Publish, &format!("using {banner}"));

        let login = self.api.authenticated_user().await?;
        self.sink
            .debug(Stage::Publish, &format!("authenticated as {login}"));
        self.ensure_commit_identity(&login)?;

        let origin = self.git.remote_url("origin")?;
        let coords = RepoCoordinates::parse(&origin)?;
        let base = self.api.default_branch(&coords).await?;

        self.supersede_stale(&coords).await;

        let branch = branch_name(Utc::now());
        if let Err(err) = self.git.fetch("origin", &base) {
            // Tolerated: a fresh clone in CI may not need it, and a failure
            // here must not strand the mutated tree.
            self.sink.warn(
                Stage::Publish,
                &format!("fetch of {base} failed, continuing: {err}"),
            );
        }
        self.git.create_branch(&branch)?;
        self.git.stage_all()?;
        self.git.commit(&commit_message(versions))?;
        self.git.push("origin", &branch)?;
        self.sink
            .info(Stage::Publish, &format!("pushed {branch}"));

        let params = NewPullRequest {
            title: pr_title(versions),
            head: branch.clone(),
            base,
            body: pr_body(versions, files_modified, provenance_from_env()),
        };
        let created = self.api.create_pull_request(&coords, params).await?;
        self.api
            .add_labels(&coords, created.number, &PR_LABELS)
            .await?;

        self.sink.info(
            Stage::Publish,
            &format!("opened pull request #{}: {}", created.number, created.html_url),
        );

        Ok(PublishOutcome {
            number: created.number,
            url: created.html_url,
            branch,
        })
    }

    /// Default a commit identity as a local-only override when unset.
    fn ensure_commit_identity(&self, login: &str) -> Result<(), SyncError> {
        if self.git.config_get("user.name")?.is_none() {
            self.git.config_set_local("user.name", login)?;
        }
        if self.git.config_get("user.email")?.is_none() {
            let email = format!("{login}@users.noreply.github.com");
            self.git.config_set_local("user.email", &email)?;
        }
        Ok(())
    }

    /// Comment on and close every open automation pull request. Non-fatal:
    /// each failure is logged and the sweep continues.
    async fn supersede_stale(&self, coords: &RepoCoordinates) {
        let pulls = match self.api.open_pull_requests(coords).await {
            Ok(pulls) => pulls,
            Err(err) => {
                self.sink.warn(
                    Stage::Publish,
                    &format!("could not list open pull requests: {err}"),
                );
                return;
            }
        };

        for pull in pulls.iter().filter(|p| has_automation_labels(p)) {
            self.sink.info(
                Stage::Publish,
                &format!("superseding stale pull request #{}", pull.number),
            );

            if let Err(err) = self.api.comment(coords, pull.number, SUPERSEDE_COMMENT).await {
                self.sink.warn(
                    Stage::Publish,
                    &format!("could not comment on #{}: {err}", pull.number),
                );
            }
            if let Err(err) = self.api.close_pull_request(coords, pull.number).await {
                self.sink.warn(
                    Stage::Publish,
                    &format!("could not close #{}: {err}", pull.number),
                );
            }
        }
    }
}

/// True when the pull request carries both automation labels.
pub fn has_automation_labels(pull: &PullSummary) -> bool {
    PR_LABELS
        .iter()
        .all(|wanted| pull.labels.iter().any(|l| l.name == *wanted))
}

/// Timestamp-suffixed branch name.
pub fn branch_name(now: DateTime<Utc>) -> String {
    format!("{BRANCH_PREFIX}{}", now.format("%Y%m%d%H%M%S"))
}

/// `Add Ruby version: V` / `Add Ruby versions: V1, V2, …` in input order.
pub fn pr_title(versions: &[RubyVersion]) -> String {
    let joined = versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    if versions.len() == 1 {
        format!("Add Ruby version: {joined}")
    } else {
        format!("Add Ruby versions: {joined}")
    }
}

/// Commit subject is the title; the marker rides in the body.
pub fn commit_message(versions: &[RubyVersion]) -> String {
    format!("{}\n\n{COMMIT_MARKER}", pr_title(versions))
}

/// The generated pull-request body.
pub fn pr_body(
    versions: &[RubyVersion],
    files_modified: &[String],
    provenance: Option<String>,
) -> String {
    let mut body = String::from(
        "This automated pull request adds newly released Ruby versions to the supported-version catalog.\n",
    );

    body.push_str("\n## Versions added\n\n");
    for version in versions {
        body.push_str(&format!("- {version}\n"));
    }

    body.push_str("\n## Files changed\n\n");
    for file in files_modified {
        body.push_str(&format!("- `{file}`\n"));
    }

    body.push_str(
        "\n---\n\nReview the default-version bump before merging: when the newest \
version outranks the previous default, the feature descriptor, documentation, \
and test fixtures are updated together.\n\n\
_Generated by rubysync. A newer run will supersede this pull request._\n",
    );

    if let Some(link) = provenance {
        body.push_str(&format!("\nProvenance: {link}\n"));
    }

    body
}

/// Link to the CI run when the standard provenance values are present.
pub fn provenance_link(server: &str, repository: &str, run_id: &str) -> String {
    format!("{server}/{repository}/actions/runs/{run_id}")
}

fn provenance_from_env() -> Option<String> {
    let server = std::env::var("GITHUB_SERVER_URL").ok()?;
    let repository = std::env::var("GITHUB_REPOSITORY").ok()?;
    let run_id = std::env::var("GITHUB_RUN_ID").ok()?;
    Some(provenance_link(&server, &repository, &run_id))
}
