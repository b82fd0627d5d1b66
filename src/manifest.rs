//! Package manifests (`jem.json`).
//!
//! Manifests ship inside third-party packages, so they are treated as
//! untrusted data: the format is plain JSON, checked against an embedded JSON
//! Schema, then deserialized into typed fields and validated field by field.
//! Nothing in a manifest is ever evaluated.
//!
//! ```json
//! {
//!   "schema_version": "jem_manifest_v1",
//!   "name": "foo",
//!   "version": "1.0",
//!   "require_paths": ["lib"],
//!   "dependencies": [{"name": "bar", "requirements": [">= 0.3"]}]
//! }
//! ```

use crate::error::ManifestError;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// File name of the manifest at the root of an exploded package.
pub const MANIFEST_FILE: &str = "jem.json";
/// Platform values that do not contribute to the full name. `ruby` is the
/// generic platform packages produced by gem tooling declare.
pub const GENERIC_PLATFORMS: &[&str] = &["any", "ruby"];
/// Require path used when a manifest does not declare any.
pub const DEFAULT_REQUIRE_PATH: &str = "lib";

const DEFAULT_SCHEMA_VERSION: &str = "jem_manifest_v1";
const ENV_ALLOWED_SCHEMA_VERSIONS: &str = "JEMS_ALLOWED_MANIFEST_SCHEMAS";

/// Parsed, validated package metadata. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PackageSpec {
    name: String,
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<String>,
    full_name: String,
    require_paths: Vec<String>,
    dependencies: Vec<Dependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

/// A declared runtime dependency. Recorded for callers; never resolved here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(default)]
    pub requirements: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    schema_version: String,
    name: String,
    version: String,
    #[serde(default)]
    platform: Option<String>,
    #[serde(default)]
    require_paths: Option<Vec<String>>,
    #[serde(default)]
    dependencies: Vec<Dependency>,
    #[serde(default)]
    summary: Option<String>,
}

impl PackageSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Unique `name-version[-platform]` identifier; names the package's
    /// directory inside the store.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn require_paths(&self) -> &[String] {
        &self.require_paths
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }
}

/// Parse manifest text, accepting the default schema version plus any listed
/// in `JEMS_ALLOWED_MANIFEST_SCHEMAS`.
pub fn parse(raw: &str) -> Result<PackageSpec, ManifestError> {
    parse_with_versions(raw, &allowed_schema_versions())
}

/// Parse manifest text against an explicit set of accepted schema versions.
pub fn parse_with_versions(
    raw: &str,
    allowed: &BTreeSet<String>,
) -> Result<PackageSpec, ManifestError> {
    let value: Value = serde_json::from_str(raw)?;
    validate_structure(&value)?;
    let manifest: RawManifest = serde_json::from_value(value)?;

    if !allowed.contains(&manifest.schema_version) {
        return Err(ManifestError::UnsupportedVersion {
            found: manifest.schema_version,
            allowed: allowed.iter().cloned().collect(),
        });
    }

    validate_identifier("name", &manifest.name)?;
    validate_identifier("version", &manifest.version)?;
    if let Some(platform) = &manifest.platform {
        validate_identifier("platform", platform)?;
    }
    for dep in &manifest.dependencies {
        validate_identifier("dependencies.name", &dep.name)?;
    }

    let require_paths = manifest
        .require_paths
        .unwrap_or_else(|| vec![DEFAULT_REQUIRE_PATH.to_string()]);
    validate_require_paths(&require_paths)?;

    let full_name = full_name(&manifest.name, &manifest.version, manifest.platform.as_deref());
    Ok(PackageSpec {
        name: manifest.name,
        version: manifest.version,
        platform: manifest.platform,
        full_name,
        require_paths,
        dependencies: manifest.dependencies,
        summary: manifest.summary,
    })
}

/// Schema versions `parse` accepts.
pub fn allowed_schema_versions() -> BTreeSet<String> {
    let mut versions: BTreeSet<String> = BTreeSet::new();
    versions.insert(DEFAULT_SCHEMA_VERSION.to_string());
    if let Ok(raw) = std::env::var(ENV_ALLOWED_SCHEMA_VERSIONS) {
        for v in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            versions.insert(v.to_string());
        }
    }
    versions
}

fn full_name(name: &str, version: &str, platform: Option<&str>) -> String {
    match platform {
        Some(platform) if !GENERIC_PLATFORMS.contains(&platform) => {
            format!("{name}-{version}-{platform}")
        }
        _ => format!("{name}-{version}"),
    }
}

fn manifest_schema() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let strings = json!({"type": "array", "items": {"type": "string"}});
        json!({
            "type": "object",
            "required": ["schema_version", "name", "version"],
            "additionalProperties": false,
            "properties": {
                "schema_version": {"type": "string", "minLength": 1},
                "name": {"type": "string", "minLength": 1},
                "version": {"type": "string", "minLength": 1},
                "platform": {"type": "string", "minLength": 1},
                "summary": {"type": "string"},
                "require_paths": strings.clone(),
                "dependencies": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name"],
                        "additionalProperties": false,
                        "properties": {
                            "name": {"type": "string", "minLength": 1},
                            "requirements": strings
                        }
                    }
                }
            }
        })
    })
}

// The schema is a constant, so it is compiled once and the outcome (including
// a compile failure) is reused by every parse.
fn compiled_schema() -> &'static Result<JSONSchema, String> {
    static COMPILED: OnceLock<Result<JSONSchema, String>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        JSONSchema::compile(manifest_schema())
            .map_err(|err| format!("compiling manifest schema: {err}"))
    })
}

fn validate_structure(value: &Value) -> Result<(), ManifestError> {
    let compiled = compiled_schema()
        .as_ref()
        .map_err(|details| ManifestError::Schema {
            details: details.clone(),
        })?;
    if let Err(errors) = compiled.validate(value) {
        let details = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(ManifestError::Schema { details });
    }
    Ok(())
}

fn validate_identifier(field: &str, value: &str) -> Result<(), ManifestError> {
    if value.is_empty() {
        return Err(ManifestError::field(field, "must not be empty"));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ManifestError::field(
            field,
            format!("must match ^[A-Za-z0-9_.-]+$, got {value}"),
        ));
    }
    if value.starts_with('.') {
        return Err(ManifestError::field(field, "must not start with '.'"));
    }
    Ok(())
}

// Require paths are joined onto a store location, so they must stay inside
// the package: relative, forward-slash separated, no `.`/`..` segments, and
// every segment limited to `[A-Za-z0-9_.-]` so nothing in it can be read back
// as a URL escape, query or fragment.
fn validate_require_paths(paths: &[String]) -> Result<(), ManifestError> {
    let mut seen = BTreeSet::new();
    for path in paths {
        if path.is_empty() {
            return Err(ManifestError::field("require_paths", "entries must not be empty"));
        }
        if path.starts_with('/') || path.contains('\\') || path.contains(':') {
            return Err(ManifestError::field(
                "require_paths",
                format!("'{path}' must be a relative forward-slash path"),
            ));
        }
        if path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(ManifestError::field(
                "require_paths",
                format!("'{path}' must not contain empty, '.' or '..' segments"),
            ));
        }
        if !path.split('/').all(is_plain_segment) {
            return Err(ManifestError::field(
                "require_paths",
                format!("'{path}' segments must match ^[A-Za-z0-9_.-]+$"),
            ));
        }
        if !seen.insert(path.as_str()) {
            return Err(ManifestError::field(
                "require_paths",
                format!("duplicate entry '{path}'"),
            ));
        }
    }
    Ok(())
}

fn is_plain_segment(segment: &str) -> bool {
    segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
