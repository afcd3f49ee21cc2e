//! Applies one version addition across the fixed file set.
//!
//! Five files are in play: the catalog, the feature descriptor, the
//! documentation table, and two test fixtures. Adding a version always
//! rewrites the catalog; when the new version outranks the descriptor's
//! current default it also bumps the default, increments the descriptor's
//! own patch version, rewrites the documentation row, and rewrites every
//! version-shaped substring in both fixtures.
//!
//! All contents are read and validated before anything is written, then the
//! writes happen in one pass. This narrows the partial-failure window but
//! does not eliminate it: there is no cross-file transaction, and a crash
//! mid-pass leaves the tree partially updated.
//!
//! The fixture rewrite is deliberately global and unscoped. A fixture that
//! embeds an unrelated version-shaped string (say a dependency pin) will
//! have it rewritten too; that matches the upstream behavior and is left
//! as-is rather than silently narrowed.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;

use crate::catalog::VersionCatalog;
use crate::error::SyncError;
use crate::events::{EventSink, Stage};
use crate::version::{RubyVersion, VERSION_SCAN};

/// Catalog of known versions
pub const CATALOG_FILE: &str = "ruby-versions.json";

/// Feature descriptor carrying the configurable default version
pub const FEATURE_FILE: &str = "src/ruby/devcontainer-feature.json";

/// Documentation table listing the default
pub const DOCS_FILE: &str = "src/ruby/README.md";

/// Test fixtures with embedded version literals
pub const SCENARIOS_FIXTURE: &str = "test/ruby/scenarios.json";
pub const SCRIPT_FIXTURE: &str = "test/ruby/test.sh";

/// The fixed file set, in mutation order.
pub fn target_files() -> [&'static str; 5] {
    [
        CATALOG_FILE,
        FEATURE_FILE,
        DOCS_FILE,
        SCENARIOS_FIXTURE,
        SCRIPT_FIXTURE,
    ]
}

/// What one application changed
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    /// Relative paths written, in mutation order; the catalog is always
    /// first, the other four appear only on a default bump.
    pub files_modified: Vec<String>,

    /// The descriptor default before this application.
    pub previous_default: RubyVersion,

    /// The new default, when the bump happened.
    pub new_default: Option<RubyVersion>,

    /// Old and new descriptor own-version, when the bump happened.
    pub feature_version: Option<(String, String)>,
}

/// Apply `version` to the fixed file set under `working_dir`.
pub fn apply(
    version: &str,
    working_dir: &Path,
    sink: &dyn EventSink,
) -> Result<MutationOutcome, SyncError> {
    let version: RubyVersion = version.parse()?;

    // Every target must exist before anything is touched.
    for rel in target_files() {
        if !working_dir.join(rel).exists() {
            return Err(SyncError::NotFound {
                what: rel.to_string(),
            });
        }
    }

    let catalog_path = working_dir.join(CATALOG_FILE);
    let catalog = VersionCatalog::load(&catalog_path)?;
    if catalog.contains(version) {
        return Err(SyncError::Duplicate {
            version: version.to_string(),
        });
    }

    let descriptor_raw = read(working_dir, FEATURE_FILE)?;
    let mut descriptor: Value =
        serde_json::from_str(&descriptor_raw).map_err(|e| SyncError::Parse {
            subject: FEATURE_FILE.to_string(),
            message: e.to_string(),
        })?;

    let previous_default: RubyVersion = descriptor_field(&descriptor, FEATURE_FILE)?
        .parse()
        .map_err(|_| SyncError::Parse {
            subject: FEATURE_FILE.to_string(),
            message: "options.version.default is not a MAJOR.MINOR.PATCH triple".to_string(),
        })?;

    let updated_catalog = catalog.add(version)?;
    let mut writes: Vec<(PathBuf, String)> =
        vec![(catalog_path, updated_catalog.to_json()?)];
    let mut files_modified = vec![CATALOG_FILE.to_string()];
    let mut new_default = None;
    let mut feature_version = None;

    if version > previous_default {
        let old_feature = own_version(&descriptor, FEATURE_FILE)?;
        let new_feature = old_feature
            .parse::<RubyVersion>()
            .map_err(|_| SyncError::Parse {
                subject: FEATURE_FILE.to_string(),
                message: format!("feature version '{old_feature}' is not a triple"),
            })?
            .bump_patch()
            .to_string();

        set_default(&mut descriptor, version)?;
        descriptor["version"] = Value::String(new_feature.clone());

        let docs_raw = read(working_dir, DOCS_FILE)?;
        let docs_updated = rewrite_default_row(&docs_raw, version);

        let scenarios_raw = read(working_dir, SCENARIOS_FIXTURE)?;
        let script_raw = read(working_dir, SCRIPT_FIXTURE)?;

        writes.push((working_dir.join(FEATURE_FILE), to_json_pretty(&descriptor)?));
        writes.push((working_dir.join(DOCS_FILE), docs_updated));
        writes.push((
            working_dir.join(SCENARIOS_FIXTURE),
            replace_version_literals(&scenarios_raw, version),
        ));
        writes.push((
            working_dir.join(SCRIPT_FIXTURE),
            replace_version_literals(&script_raw, version),
        ));

        files_modified.extend(
            [FEATURE_FILE, DOCS_FILE, SCENARIOS_FIXTURE, SCRIPT_FIXTURE]
                .map(String::from),
        );
        new_default = Some(version);
        feature_version = Some((old_feature, new_feature));

        sink.info(
            Stage::Mutate,
            &format!("default version bumped {previous_default} -> {version}"),
        );
    } else {
        sink.info(
            Stage::Mutate,
            &format!("default {previous_default} outranks {version}; catalog-only update"),
        );
    }

    // Commit every staged write in one pass.
    for (path, content) in &writes {
        fs::write(path, content).map_err(|source| SyncError::Io {
            path: path.display().to_string(),
            source,
        })?;
        sink.debug(Stage::Mutate, &format!("wrote {}", path.display()));
    }

    Ok(MutationOutcome {
        files_modified,
        previous_default,
        new_default,
        feature_version,
    })
}

fn read(working_dir: &Path, rel: &str) -> Result<String, SyncError> {
    let path = working_dir.join(rel);
    fs::read_to_string(&path).map_err(|source| SyncError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// The descriptor's `options.version.default` string.
fn descriptor_field<'a>(descriptor: &'a Value, subject: &str) -> Result<&'a str, SyncError> {
    descriptor
        .get("options")
        .and_then(|o| o.get("version"))
        .and_then(|v| v.get("default"))
        .and_then(Value::as_str)
        .ok_or_else(|| SyncError::Parse {
            subject: subject.to_string(),
            message: "missing options.version.default".to_string(),
        })
}

/// The descriptor's own `version` string.
fn own_version(descriptor: &Value, subject: &str) -> Result<String, SyncError> {
    descriptor
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| SyncError::Parse {
            subject: subject.to_string(),
            message: "missing top-level version".to_string(),
        })
}

fn set_default(descriptor: &mut Value, version: RubyVersion) -> Result<(), SyncError> {
    let slot = descriptor
        .get_mut("options")
        .and_then(|o| o.get_mut("version"))
        .and_then(|v| v.get_mut("default"))
        .ok_or_else(|| SyncError::Parse {
            subject: FEATURE_FILE.to_string(),
            message: "missing options.version.default".to_string(),
        })?;
    *slot = Value::String(version.to_string());
    Ok(())
}

/// 4-space-indented JSON with a trailing newline; key order is preserved by
/// the order-preserving map behind `serde_json::Value`.
fn to_json_pretty(value: &Value) -> Result<String, SyncError> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer).map_err(|e| SyncError::Parse {
        subject: FEATURE_FILE.to_string(),
        message: e.to_string(),
    })?;

    let mut out = String::from_utf8(buf).map_err(|e| SyncError::Parse {
        subject: FEATURE_FILE.to_string(),
        message: e.to_string(),
    })?;
    out.push('\n');
    Ok(out)
}

/// Rewrite the trailing value cell of the labeled-version table row.
///
/// The row is addressed by column role: first cell `version`, type cell
/// `string`. Other rows pass through byte-identical; within the matched row
/// only the value cell changes.
fn rewrite_default_row(markdown: &str, version: RubyVersion) -> String {
    let ends_with_newline = markdown.ends_with('\n');

    let lines: Vec<String> = markdown
        .lines()
        .map(|line| rewrite_row_if_default(line, version))
        .collect();

    let mut out = lines.join("\n");
    if ends_with_newline {
        out.push('\n');
    }
    out
}

fn rewrite_row_if_default(line: &str, version: RubyVersion) -> String {
    if !line.trim_start().starts_with('|') {
        return line.to_string();
    }

    // `| version | <description> | string | X.Y.Z |` splits into
    // ["", " version ", " <description> ", " string ", " X.Y.Z ", ""].
    let mut cells: Vec<String> = line.split('|').map(str::to_string).collect();
    if cells.len() < 6 {
        return line.to_string();
    }

    let is_target = cells[1].trim() == "version" && cells[3].trim() == "string";
    if !is_target {
        return line.to_string();
    }

    cells[4] = format!(" {version} ");
    cells.join("|")
}

/// Replace every version-shaped substring; global and unconditional.
fn replace_version_literals(text: &str, version: RubyVersion) -> String {
    VERSION_SCAN
        .replace_all(text, version.to_string())
        .into_owned()
}
