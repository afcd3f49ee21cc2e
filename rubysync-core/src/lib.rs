//! rubysync library exports

pub mod catalog;
pub mod error;
pub mod events;
pub mod git;
pub mod github;
pub mod mutator;
pub mod publish;
pub mod source;
pub mod sync;
pub mod version;

pub use error::SyncError;
pub use version::RubyVersion;
