//! Minimal GitHub REST client.
//!
//! Covers exactly the calls the pipeline needs: the upstream release/contents
//! reads for discovery and the pull-request lifecycle for publishing. No
//! pagination beyond one page of open pull requests, no retries; the first
//! failure aborts the calling stage.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::error::SyncError;

/// Public GitHub REST endpoint
pub const API_BASE: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("rubysync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// `owner/repo` coordinates parsed from the local origin remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub owner: String,
    pub repo: String,
}

impl RepoCoordinates {
    /// Parse an origin URL in either the SSH (`git@github.com:o/r.git`) or
    /// HTTP(S) (`https://github.com/o/r[.git]`) form.
    pub fn parse(url: &str) -> Result<Self, SyncError> {
        let trimmed = url.trim();
        let unrecognized = || SyncError::Parse {
            subject: "origin remote URL".to_string(),
            message: format!("unrecognized form: '{trimmed}'"),
        };

        let rest = trimmed
            .strip_prefix("git@github.com:")
            .or_else(|| trimmed.strip_prefix("ssh://git@github.com/"))
            .or_else(|| trimmed.strip_prefix("https://github.com/"))
            .or_else(|| trimmed.strip_prefix("http://github.com/"))
            .ok_or_else(unrecognized)?;

        let rest = rest.strip_suffix(".git").unwrap_or(rest);
        let rest = rest.trim_end_matches('/');

        let mut parts = rest.splitn(2, '/');
        let owner = parts.next().unwrap_or_default();
        let repo = parts.next().unwrap_or_default();

        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(unrecognized());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// A published release, as returned by `releases/latest`
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
}

/// One entry of a repository directory listing
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Label attached to an issue or pull request
#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

/// An open pull request, as listed by the pulls endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct PullSummary {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// The pull request created by a publish run
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPull {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticatedUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub default_branch: String,
}

/// Thin wrapper over the REST endpoints the pipeline touches
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    token: Option<String>,
    api_base: String,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self, SyncError> {
        Self::with_base(token, API_BASE)
    }

    /// Point the client at a different endpoint; used by tests.
    pub fn with_base(token: Option<String>, api_base: impl Into<String>) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Transport {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let token = token.filter(|t| !t.trim().is_empty());

        Ok(Self {
            http,
            token,
            api_base: api_base.into(),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, format!("{}{}", self.api_base, path))
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn send(&self, req: RequestBuilder, context: &str) -> Result<Response, SyncError> {
        let response = req.send().await.map_err(|e| SyncError::Transport {
            message: format!("{context}: {e}"),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        Err(error_for_status(status, self.has_token(), context))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, context: &str) -> Result<T, SyncError> {
        let response = self.send(self.request(Method::GET, path), context).await?;
        response.json().await.map_err(|e| SyncError::Parse {
            subject: context.to_string(),
            message: e.to_string(),
        })
    }

    /// Latest published release of `owner/repo`.
    pub async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release, SyncError> {
        self.get_json(
            &format!("/repos/{owner}/{repo}/releases/latest"),
            &format!("resolving the latest release of {owner}/{repo}"),
        )
        .await
    }

    /// Directory listing of `dir` at `reference`.
    pub async fn directory_listing(
        &self,
        owner: &str,
        repo: &str,
        dir: &str,
        reference: &str,
    ) -> Result<Vec<ContentEntry>, SyncError> {
        self.get_json(
            &format!("/repos/{owner}/{repo}/contents/{dir}?ref={reference}"),
            &format!("listing {owner}/{repo}:{dir} at {reference}"),
        )
        .await
    }

    /// Login of the credential's user; doubles as the credential check.
    pub async fn authenticated_user(&self) -> Result<AuthenticatedUser, SyncError> {
        self.get_json("/user", "resolving the authenticated user").await
    }

    pub async fn repository(&self, coords: &RepoCoordinates) -> Result<Repository, SyncError> {
        self.get_json(
            &format!("/repos/{}", coords.slug()),
            &format!("reading repository {}", coords.slug()),
        )
        .await
    }

    pub async fn open_pull_requests(
        &self,
        coords: &RepoCoordinates,
    ) -> Result<Vec<PullSummary>, SyncError> {
        self.get_json(
            &format!("/repos/{}/pulls?state=open&per_page=100", coords.slug()),
            &format!("listing open pull requests on {}", coords.slug()),
        )
        .await
    }

    pub async fn comment_on_issue(
        &self,
        coords: &RepoCoordinates,
        number: u64,
        body: &str,
    ) -> Result<(), SyncError> {
        let path = format!("/repos/{}/issues/{number}/comments", coords.slug());
        let context = format!("commenting on #{number}");
        self.send(
            self.request(Method::POST, &path).json(&json!({ "body": body })),
            &context,
        )
        .await?;
        Ok(())
    }

    pub async fn close_pull_request(
        &self,
        coords: &RepoCoordinates,
        number: u64,
    ) -> Result<(), SyncError> {
        let path = format!("/repos/{}/pulls/{number}", coords.slug());
        let context = format!("closing pull request #{number}");
        self.send(
            self.request(Method::PATCH, &path)
                .json(&json!({ "state": "closed" })),
            &context,
        )
        .await?;
        Ok(())
    }

    pub async fn create_pull_request(
        &self,
        coords: &RepoCoordinates,
        title: &str,
        head: &str,
        base: &str,
        body: &str,
    ) -> Result<CreatedPull, SyncError> {
        let path = format!("/repos/{}/pulls", coords.slug());
        let context = format!("creating a pull request on {}", coords.slug());
        let response = self
            .send(
                self.request(Method::POST, &path).json(&json!({
                    "title": title,
                    "head": head,
                    "base": base,
                    "body": body,
                })),
                &context,
            )
            .await
            .map_err(|err| match err {
                // auth/rate-limit/not-found keep their own variants; a
                // garden-variety rejection here is a publish failure
                SyncError::Transport { message } => SyncError::Publish { message },
                other => other,
            })?;

        response.json().await.map_err(|e| SyncError::Parse {
            subject: context,
            message: e.to_string(),
        })
    }

    pub async fn add_labels(
        &self,
        coords: &RepoCoordinates,
        number: u64,
        labels: &[&str],
    ) -> Result<(), SyncError> {
        let path = format!("/repos/{}/issues/{number}/labels", coords.slug());
        let context = format!("labeling pull request #{number}");
        self.send(
            self.request(Method::POST, &path)
                .json(&json!({ "labels": labels })),
            &context,
        )
        .await?;
        Ok(())
    }
}

/// Map a non-success status onto the error taxonomy. 403 wording depends on
/// whether a credential was supplied, since the fix differs.
pub(crate) fn error_for_status(status: StatusCode, has_token: bool, context: &str) -> SyncError {
    match status {
        StatusCode::UNAUTHORIZED => SyncError::Auth {
            message: format!(
                "GitHub authentication failed while {context} (HTTP 401); check that the token is valid"
            ),
        },
        StatusCode::FORBIDDEN => {
            let message = if has_token {
                format!(
                    "GitHub API rate limit exceeded or access forbidden while {context} (HTTP 403); the supplied token may lack the required scopes"
                )
            } else {
                format!(
                    "GitHub API rate limit exceeded while {context} (HTTP 403); set GITHUB_TOKEN to raise the unauthenticated limit"
                )
            };
            SyncError::RateLimit { message }
        }
        StatusCode::NOT_FOUND => SyncError::NotFound {
            what: format!("{context} (HTTP 404)"),
        },
        other => SyncError::Transport {
            message: format!("{context}: HTTP {other}"),
        },
    }
}
