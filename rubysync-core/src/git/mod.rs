//! Narrow version-control capability used by publishing.
//!
//! The pipeline never shells out directly; it goes through [`GitClient`] so
//! tests can substitute an in-memory fake. [`ProcessGit`] is the production
//! implementation, one blocking `git -C <workdir> …` invocation per call, in
//! strict sequence.

use std::io;
use std::path::PathBuf;
use std::process::Command;

use crate::error::SyncError;

/// The exact git operations publishing performs
pub trait GitClient: Send + Sync {
    /// Probe that git is invocable; returns the version banner.
    fn probe(&self) -> Result<String, SyncError>;

    /// Read a config key; `None` when unset.
    fn config_get(&self, key: &str) -> Result<Option<String>, SyncError>;

    /// Set a repository-local config override.
    fn config_set_local(&self, key: &str, value: &str) -> Result<(), SyncError>;

    /// URL of the named remote.
    fn remote_url(&self, remote: &str) -> Result<String, SyncError>;

    fn fetch(&self, remote: &str, branch: &str) -> Result<(), SyncError>;

    /// Create and switch to a new branch.
    fn create_branch(&self, name: &str) -> Result<(), SyncError>;

    /// Stage every working-tree change.
    fn stage_all(&self) -> Result<(), SyncError>;

    fn commit(&self, message: &str) -> Result<(), SyncError>;

    /// Push `branch` to `remote`, setting the upstream.
    fn push(&self, remote: &str, branch: &str) -> Result<(), SyncError>;
}

/// Subprocess-backed implementation
pub struct ProcessGit {
    workdir: PathBuf,
}

impl ProcessGit {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.workdir).args(args);
        cmd
    }

    fn run(&self, args: &[&str]) -> Result<String, SyncError> {
        let output = self
            .command(args)
            .output()
            .map_err(|source| spawn_error(args, source))?;

        if !output.status.success() {
            return Err(SyncError::GitCommand {
                command: args.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

fn spawn_error(args: &[&str], source: io::Error) -> SyncError {
    if source.kind() == io::ErrorKind::NotFound {
        SyncError::ToolMissing { source }
    } else {
        SyncError::GitCommand {
            command: args.join(" "),
            status: "failed to spawn".to_string(),
            stderr: source.to_string(),
        }
    }
}

impl GitClient for ProcessGit {
    fn probe(&self) -> Result<String, SyncError> {
        // `--version` works outside any repository, so a failure here means
        // the tool itself is unavailable.
        let output = Command::new("git")
            .arg("--version")
            .output()
            .map_err(|source| spawn_error(&["--version"], source))?;

        if !output.status.success() {
            return Err(SyncError::GitCommand {
                command: "--version".to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn config_get(&self, key: &str) -> Result<Option<String>, SyncError> {
        // `git config --get` exits 1 for an unset key; that is not a failure.
        let args = ["config", "--get", key];
        let output = self
            .command(&args)
            .output()
            .map_err(|source| spawn_error(&args, source))?;

        if output.status.success() {
            let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(if value.is_empty() { None } else { Some(value) });
        }

        if output.status.code() == Some(1) {
            return Ok(None);
        }

        Err(SyncError::GitCommand {
            command: args.join(" "),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn config_set_local(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.run(&["config", key, value]).map(|_| ())
    }

    fn remote_url(&self, remote: &str) -> Result<String, SyncError> {
        let key = format!("remote.{remote}.url");
        self.config_get(&key)?.ok_or_else(|| SyncError::Parse {
            subject: "origin remote URL".to_string(),
            message: format!("{key} is not configured"),
        })
    }

    fn fetch(&self, remote: &str, branch: &str) -> Result<(), SyncError> {
        self.run(&["fetch", remote, branch]).map(|_| ())
    }

    fn create_branch(&self, name: &str) -> Result<(), SyncError> {
        self.run(&["checkout", "-b", name]).map(|_| ())
    }

    fn stage_all(&self) -> Result<(), SyncError> {
        self.run(&["add", "--all"]).map(|_| ())
    }

    fn commit(&self, message: &str) -> Result<(), SyncError> {
        self.run(&["commit", "--message", message]).map(|_| ())
    }

    fn push(&self, remote: &str, branch: &str) -> Result<(), SyncError> {
        self.run(&["push", "--set-upstream", remote, branch])
            .map(|_| ())
    }
}
