//! Shared fakes and fixture builders for cross-component tests.
//!
//! The fakes record every call in a shared log so tests can assert on
//! ordering across the git and API seams.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rubysync_core::error::SyncError;
use rubysync_core::git::GitClient;
use rubysync_core::github::{CreatedPull, Label, PullSummary, RepoCoordinates};
use rubysync_core::publish::{NewPullRequest, PullRequestApi, PR_LABELS};
use rubysync_core::source::ReleaseFeed;

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn record(log: &CallLog, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

pub fn entries(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Position of the first log entry starting with `prefix`.
pub fn position(log: &CallLog, prefix: &str) -> Option<usize> {
    entries(log).iter().position(|e| e.starts_with(prefix))
}

/// Feed serving a fixed tag and candidate list
pub struct FakeFeed {
    pub tag: String,
    pub names: Vec<String>,
}

impl FakeFeed {
    pub fn new(names: &[&str]) -> Self {
        Self {
            tag: "v20240727".to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ReleaseFeed for FakeFeed {
    async fn latest_tag(&self) -> Result<String, SyncError> {
        Ok(self.tag.clone())
    }

    async fn definition_names(&self, _tag: &str) -> Result<Vec<String>, SyncError> {
        Ok(self.names.clone())
    }
}

/// In-memory git with a call log and a config store
pub struct FakeGit {
    pub log: CallLog,
    pub remote: String,
    config: Mutex<HashMap<String, String>>,
}

impl FakeGit {
    pub fn new(log: CallLog) -> Self {
        Self::with_remote(log, "git@github.com:devcontainers/images.git")
    }

    pub fn with_remote(log: CallLog, remote: &str) -> Self {
        Self {
            log,
            remote: remote.to_string(),
            config: Mutex::new(HashMap::new()),
        }
    }

    pub fn preset_config(&self, key: &str, value: &str) {
        self.config
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    pub fn config_value(&self, key: &str) -> Option<String> {
        self.config.lock().unwrap().get(key).cloned()
    }
}

impl GitClient for FakeGit {
    fn probe(&self) -> Result<String, SyncError> {
        record(&self.log, "git:probe");
        Ok("git version 2.43.0 (fake)".to_string())
    }

    fn config_get(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self.config.lock().unwrap().get(key).cloned())
    }

    fn config_set_local(&self, key: &str, value: &str) -> Result<(), SyncError> {
        record(&self.log, format!("git:config {key}={value}"));
        self.config
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remote_url(&self, remote: &str) -> Result<String, SyncError> {
        record(&self.log, format!("git:remote-url {remote}"));
        if remote == "origin" {
            Ok(self.remote.clone())
        } else {
            Err(SyncError::Parse {
                subject: "origin remote URL".to_string(),
                message: format!("remote.{remote}.url is not configured"),
            })
        }
    }

    fn fetch(&self, remote: &str, branch: &str) -> Result<(), SyncError> {
        record(&self.log, format!("git:fetch {remote} {branch}"));
        Ok(())
    }

    fn create_branch(&self, name: &str) -> Result<(), SyncError> {
        record(&self.log, format!("git:branch {name}"));
        Ok(())
    }

    fn stage_all(&self) -> Result<(), SyncError> {
        record(&self.log, "git:add");
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<(), SyncError> {
        let subject = message.lines().next().unwrap_or_default();
        record(&self.log, format!("git:commit {subject}"));
        Ok(())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<(), SyncError> {
        record(&self.log, format!("git:push {remote} {branch}"));
        Ok(())
    }
}

/// In-memory pull-request API with failure knobs
pub struct FakeApi {
    pub log: CallLog,
    pub login: String,
    pub base_branch: String,
    pub open_pulls: Mutex<Vec<PullSummary>>,
    pub created: Mutex<Vec<NewPullRequest>>,
    pub fail_comment: bool,
    pub fail_create: bool,
}

impl FakeApi {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            login: "octo-bot".to_string(),
            base_branch: "main".to_string(),
            open_pulls: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            fail_comment: false,
            fail_create: false,
        }
    }

    pub fn with_open_pulls(log: CallLog, pulls: Vec<PullSummary>) -> Self {
        let api = Self::new(log);
        *api.open_pulls.lock().unwrap() = pulls;
        api
    }

    pub fn created_params(&self) -> Vec<NewPullRequest> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl PullRequestApi for FakeApi {
    async fn authenticated_user(&self) -> Result<String, SyncError> {
        record(&self.log, "api:user");
        Ok(self.login.clone())
    }

    async fn default_branch(&self, _coords: &RepoCoordinates) -> Result<String, SyncError> {
        record(&self.log, "api:default-branch");
        Ok(self.base_branch.clone())
    }

    async fn open_pull_requests(
        &self,
        _coords: &RepoCoordinates,
    ) -> Result<Vec<PullSummary>, SyncError> {
        record(&self.log, "api:list-pulls");
        Ok(self.open_pulls.lock().unwrap().clone())
    }

    async fn comment(
        &self,
        _coords: &RepoCoordinates,
        number: u64,
        _body: &str,
    ) -> Result<(), SyncError> {
        record(&self.log, format!("api:comment #{number}"));
        if self.fail_comment {
            return Err(SyncError::Transport {
                message: "comment rejected".to_string(),
            });
        }
        Ok(())
    }

    async fn close_pull_request(
        &self,
        _coords: &RepoCoordinates,
        number: u64,
    ) -> Result<(), SyncError> {
        record(&self.log, format!("api:close #{number}"));
        Ok(())
    }

    async fn create_pull_request(
        &self,
        _coords: &RepoCoordinates,
        params: NewPullRequest,
    ) -> Result<CreatedPull, SyncError> {
        record(&self.log, format!("api:create {}", params.title));
        if self.fail_create {
            return Err(SyncError::Publish {
                message: "creation rejected".to_string(),
            });
        }
        self.created.lock().unwrap().push(params);
        Ok(CreatedPull {
            number: 101,
            html_url: "https://github.com/devcontainers/images/pull/101".to_string(),
        })
    }

    async fn add_labels(
        &self,
        _coords: &RepoCoordinates,
        number: u64,
        labels: &[&str],
    ) -> Result<(), SyncError> {
        record(&self.log, format!("api:labels #{number} {}", labels.join(",")));
        Ok(())
    }
}

/// An open pull request carrying both automation labels
pub fn automation_pull(number: u64) -> PullSummary {
    PullSummary {
        number,
        title: "Add Ruby version: 3.3.0".to_string(),
        html_url: format!("https://github.com/devcontainers/images/pull/{number}"),
        labels: PR_LABELS
            .iter()
            .map(|name| Label {
                name: name.to_string(),
            })
            .collect(),
    }
}

/// An open pull request with unrelated labels
pub fn unrelated_pull(number: u64) -> PullSummary {
    PullSummary {
        number,
        title: "Fix typo".to_string(),
        html_url: format!("https://github.com/devcontainers/images/pull/{number}"),
        labels: vec![Label {
            name: "documentation".to_string(),
        }],
    }
}

const DESCRIPTOR_TEMPLATE: &str = r#"{
    "id": "ruby",
    "version": "2.0.0",
    "name": "Ruby (via rbenv)",
    "description": "Installs Ruby, rbenv, and common gems.",
    "options": {
        "version": {
            "type": "string",
            "proposals": ["latest", "none"],
            "default": "__DEFAULT__",
            "description": "Select or enter a Ruby version."
        }
    }
}
"#;

/// Lay down the five-file tree the mutator operates on.
pub fn write_fixture_tree(dir: &Path, catalog: &[&str], default_version: &str) {
    std::fs::create_dir_all(dir.join("src/ruby")).unwrap();
    std::fs::create_dir_all(dir.join("test/ruby")).unwrap();

    let entries = catalog
        .iter()
        .map(|v| format!("    \"{v}\""))
        .collect::<Vec<_>>()
        .join(",\n");
    let catalog_json = if catalog.is_empty() {
        "[]\n".to_string()
    } else {
        format!("[\n{entries}\n]\n")
    };
    std::fs::write(dir.join("ruby-versions.json"), catalog_json).unwrap();

    std::fs::write(
        dir.join("src/ruby/devcontainer-feature.json"),
        DESCRIPTOR_TEMPLATE.replace("__DEFAULT__", default_version),
    )
    .unwrap();

    std::fs::write(
        dir.join("src/ruby/README.md"),
        format!(
            "# Ruby\n\n| Options Id | Description | Type | Default Value |\n|-----|-----|-----|-----|\n| version | Select or enter a Ruby version. | string | {default_version} |\n"
        ),
    )
    .unwrap();

    std::fs::write(
        dir.join("test/ruby/scenarios.json"),
        format!(
            "{{\n    \"install_ruby\": {{\n        \"features\": {{ \"ruby\": {{ \"version\": \"{default_version}\" }} }}\n    }}\n}}\n"
        ),
    )
    .unwrap();

    std::fs::write(
        dir.join("test/ruby/test.sh"),
        format!("#!/bin/bash\ncheck \"ruby version\" ruby --version | grep {default_version}\n"),
    )
    .unwrap();
}
