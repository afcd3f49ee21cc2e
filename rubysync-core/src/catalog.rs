//! The persisted catalog of supported Ruby versions.
//!
//! On disk the catalog is a JSON array of version strings, 4-space
//! indented with a trailing newline, always sorted descending. Invariant:
//! no duplicates.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::SyncError;
use crate::version::RubyVersion;

/// Ordered, duplicate-free set of known versions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCatalog {
    versions: Vec<RubyVersion>,
}

impl VersionCatalog {
    /// Build a catalog from any ordering; sorts descending and deduplicates.
    pub fn new(mut versions: Vec<RubyVersion>) -> Self {
        versions.sort_unstable_by(|a, b| b.cmp(a));
        versions.dedup();
        Self { versions }
    }

    /// Load the catalog file. A missing file is `NotFound`; anything that
    /// is not a JSON array of exact triples is `Parse`.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            return Err(SyncError::NotFound {
                what: path.display().to_string(),
            });
        }

        let raw = fs::read_to_string(path).map_err(|source| SyncError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json(&raw).map_err(|err| match err {
            SyncError::Parse { message, .. } => SyncError::Parse {
                subject: format!("catalog file {}", path.display()),
                message,
            },
            other => other,
        })
    }

    /// Parse the on-disk representation.
    pub fn from_json(raw: &str) -> Result<Self, SyncError> {
        let entries: Vec<String> =
            serde_json::from_str(raw).map_err(|e| SyncError::Parse {
                subject: "catalog".to_string(),
                message: e.to_string(),
            })?;

        let versions = entries
            .iter()
            .map(|entry| {
                entry.parse::<RubyVersion>().map_err(|_| SyncError::Parse {
                    subject: "catalog".to_string(),
                    message: format!("'{entry}' is not a MAJOR.MINOR.PATCH triple"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(versions))
    }

    /// Serialize to the on-disk representation.
    pub fn to_json(&self) -> Result<String, SyncError> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);

        self.versions
            .serialize(&mut serializer)
            .map_err(|e| SyncError::Parse {
                subject: "catalog".to_string(),
                message: e.to_string(),
            })?;

        let mut out = String::from_utf8(buf).map_err(|e| SyncError::Parse {
            subject: "catalog".to_string(),
            message: e.to_string(),
        })?;
        out.push('\n');
        Ok(out)
    }

    /// Persist to `path`, overwriting.
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        let content = self.to_json()?;
        fs::write(path, content).map_err(|source| SyncError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Members of `available` absent from this catalog, descending.
    pub fn diff(&self, available: &[RubyVersion]) -> Vec<RubyVersion> {
        let mut new: Vec<RubyVersion> = available
            .iter()
            .filter(|v| !self.contains(**v))
            .copied()
            .collect();
        new.sort_unstable_by(|a, b| b.cmp(a));
        new.dedup();
        new
    }

    /// The union with `version`, or `Duplicate` if already present.
    pub fn add(&self, version: RubyVersion) -> Result<Self, SyncError> {
        if self.contains(version) {
            return Err(SyncError::Duplicate {
                version: version.to_string(),
            });
        }

        let mut versions = self.versions.clone();
        versions.push(version);
        Ok(Self::new(versions))
    }

    pub fn contains(&self, version: RubyVersion) -> bool {
        self.versions.contains(&version)
    }

    /// Lowest cataloged version; the discovery floor.
    pub fn lowest(&self) -> Option<RubyVersion> {
        self.versions.last().copied()
    }

    pub fn versions(&self) -> &[RubyVersion] {
        &self.versions
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn ver(s: &str) -> RubyVersion {
        s.parse().unwrap()
    }

    #[test]
    fn new_sorts_descending_and_dedupes() {
        let catalog = VersionCatalog::new(vec![ver("3.3.0"), ver("3.4.0"), ver("3.3.0")]);
        assert_eq!(catalog.versions(), &[ver("3.4.0"), ver("3.3.0")]);
    }

    #[test]
    fn add_sorts_numerically_not_lexically() {
        let catalog =
            VersionCatalog::new(vec![ver("3.3.10"), ver("3.3.9"), ver("3.3.0")]);
        let updated = catalog.add(ver("3.3.11")).unwrap();
        assert_eq!(
            updated.versions(),
            &[ver("3.3.11"), ver("3.3.10"), ver("3.3.9"), ver("3.3.0")]
        );
    }

    #[test]
    fn add_rejects_duplicates() {
        let catalog = VersionCatalog::new(vec![ver("3.3.0")]);
        let err = catalog.add(ver("3.3.0")).unwrap_err();
        assert!(matches!(err, SyncError::Duplicate { .. }));
        // the original is untouched
        assert_eq!(catalog.versions(), &[ver("3.3.0")]);
    }

    #[test]
    fn diff_returns_only_new_versions_descending() {
        let catalog = VersionCatalog::new(vec![ver("3.3.0")]);
        let available = vec![ver("3.3.0"), ver("3.4.0"), ver("3.3.5")];
        assert_eq!(catalog.diff(&available), vec![ver("3.4.0"), ver("3.3.5")]);
    }

    #[test]
    fn json_round_trip_is_four_space_indented_with_trailing_newline() {
        let catalog = VersionCatalog::new(vec![ver("3.3.0"), ver("3.4.0")]);
        let json = catalog.to_json().unwrap();
        assert_eq!(json, "[\n    \"3.4.0\",\n    \"3.3.0\"\n]\n");

        let back = VersionCatalog::from_json(&json).unwrap();
        assert_eq!(back, catalog);
    }

    #[test]
    fn empty_catalog_serializes_to_bare_array() {
        let catalog = VersionCatalog::default();
        assert_eq!(catalog.to_json().unwrap(), "[]\n");
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = VersionCatalog::load(&dir.path().join("ruby-versions.json")).unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
    }

    #[test]
    fn load_malformed_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ruby-versions.json");

        std::fs::write(&path, "{ not an array }").unwrap();
        assert!(matches!(
            VersionCatalog::load(&path).unwrap_err(),
            SyncError::Parse { .. }
        ));

        std::fs::write(&path, "[\"3.4.0-preview1\"]").unwrap();
        assert!(matches!(
            VersionCatalog::load(&path).unwrap_err(),
            SyncError::Parse { .. }
        ));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ruby-versions.json");

        let catalog = VersionCatalog::new(vec![ver("3.2.2"), ver("3.3.0")]);
        catalog.save(&path).unwrap();

        let loaded = VersionCatalog::load(&path).unwrap();
        assert_eq!(loaded, catalog);
        assert_eq!(loaded.lowest(), Some(ver("3.2.2")));
    }
}
