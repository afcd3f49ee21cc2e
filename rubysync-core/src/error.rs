//! Error taxonomy for the synchronization pipeline.
//!
//! Every component converts its own failures into one of these variants;
//! nothing is retried, and file mutations written before a failure are not
//! rolled back.

use thiserror::Error;

/// Structured failures surfaced by the pipeline
#[derive(Error, Debug)]
pub enum SyncError {
    /// Input that is not an exact MAJOR.MINOR.PATCH triple
    #[error("invalid version '{input}': expected three dot-separated integers (MAJOR.MINOR.PATCH)")]
    Format { input: String },

    /// A required file or remote resource is absent
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The version is already present in the catalog
    #[error("version {version} is already present in the catalog")]
    Duplicate { version: String },

    /// The remote rejected the supplied credential (HTTP 401)
    #[error("{message}")]
    Auth { message: String },

    /// Quota or permission failure (HTTP 403); the message differs
    /// depending on whether a credential was supplied
    #[error("{message}")]
    RateLimit { message: String },

    /// Publishing requires a credential and none was supplied
    #[error("a GitHub token is required: set GITHUB_TOKEN or pass --token")]
    TokenRequired,

    /// The `git` executable could not be invoked
    #[error("the `git` executable is not available on PATH")]
    ToolMissing {
        #[source]
        source: std::io::Error,
    },

    /// Any other remote failure; first failure aborts the stage
    #[error("upstream request failed: {message}")]
    Transport { message: String },

    /// A git subprocess exited unsuccessfully
    #[error("`git {command}` failed ({status}): {stderr}")]
    GitCommand {
        command: String,
        status: String,
        stderr: String,
    },

    /// Malformed content that should have parsed
    #[error("failed to parse {subject}: {message}")]
    Parse { subject: String, message: String },

    /// Pull request creation failed
    #[error("failed to publish pull request: {message}")]
    Publish { message: String },

    /// A file read or write failed mid-mutation
    #[error("i/o failure on {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
