//! Ruby release version triples.
//!
//! The catalog only ever holds exact `MAJOR.MINOR.PATCH` triples; anything
//! with a suffix (`3.4.0-preview1`) or a prefix (`jruby-9.4.5.0`) is not a
//! stable release version and fails to parse.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SyncError;

/// Exact form of a stable release version.
static VERSION_EXACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+\.\d+$").unwrap());

/// Version-shaped substrings inside arbitrary text. Matches anywhere, with
/// no anchoring, which is what the fixture rewrite relies on.
pub(crate) static VERSION_SCAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+\.\d+").unwrap());

/// A release version, totally ordered by component-wise numeric comparison.
///
/// The derived `Ord` compares `major`, then `minor`, then `patch` as
/// integers, so `3.3.11 > 3.3.9` even though the strings sort the other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RubyVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl RubyVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The next patch level, used for the feature descriptor's own version.
    pub fn bump_patch(&self) -> Self {
        Self {
            patch: self.patch + 1,
            ..*self
        }
    }
}

impl FromStr for RubyVersion {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format_err = || SyncError::Format {
            input: s.to_string(),
        };

        if !VERSION_EXACT.is_match(s) {
            return Err(format_err());
        }

        // Leading zeros parse numerically without canonicalization; the
        // textual form is not preserved.
        let mut parts = s.split('.');
        let mut next = || -> Result<u32, SyncError> {
            parts
                .next()
                .ok_or_else(format_err)?
                .parse()
                .map_err(|_| format_err())
        };

        Ok(Self {
            major: next()?,
            minor: next()?,
            patch: next()?,
        })
    }
}

impl fmt::Display for RubyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for RubyVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RubyVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|e: SyncError| D::Error::custom(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_exact_triples() {
        let v: RubyVersion = "3.4.0".parse().unwrap();
        assert_eq!(v, RubyVersion::new(3, 4, 0));
        assert_eq!(v.to_string(), "3.4.0");
    }

    #[test]
    fn rejects_suffixed_and_prefixed_forms() {
        for bad in [
            "3.4.0-preview1",
            "3.3.0-rc1",
            "v3.4.0",
            "jruby-9.4.5.0",
            "3.4",
            "3.4.0.1",
            "3..0",
            "",
        ] {
            let err = bad.parse::<RubyVersion>().unwrap_err();
            assert!(
                matches!(err, SyncError::Format { .. }),
                "expected Format error for {bad:?}"
            );
        }
    }

    #[test]
    fn orders_numerically_not_lexically() {
        let newer: RubyVersion = "3.3.11".parse().unwrap();
        let older: RubyVersion = "3.3.9".parse().unwrap();
        assert!(newer > older, "3.3.11 must outrank 3.3.9");

        let ten: RubyVersion = "3.10.0".parse().unwrap();
        let nine: RubyVersion = "3.9.9".parse().unwrap();
        assert!(ten > nine);
    }

    #[test]
    fn bump_patch_increments_by_exactly_one() {
        let v = RubyVersion::new(2, 0, 0);
        assert_eq!(v.bump_patch(), RubyVersion::new(2, 0, 1));
    }

    // Pins the current handling of non-canonical numerals; the behavior is
    // unspecified upstream and may change.
    #[test]
    fn leading_zeros_parse_numerically() {
        let v: RubyVersion = "3.04.1".parse().unwrap();
        assert_eq!(v, RubyVersion::new(3, 4, 1));
        assert_eq!(v.to_string(), "3.4.1");
    }

    #[test]
    fn serde_uses_the_textual_form() {
        let v = RubyVersion::new(3, 3, 5);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"3.3.5\"");

        let back: RubyVersion = serde_json::from_str("\"3.3.5\"").unwrap();
        assert_eq!(back, v);

        assert!(serde_json::from_str::<RubyVersion>("\"3.3.5.beta\"").is_err());
    }
}
