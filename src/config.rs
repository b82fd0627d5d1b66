//! Environment-driven configuration for the store and the activator.
//!
//! Every knob has a typed default so library callers can ignore the
//! environment entirely; `from_env` constructors layer `JEMS_*` variables on
//! top. Binaries apply CLI flags after `from_env`, so flags always win.

use std::env;
use std::env::VarError;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

pub const ENV_HOME: &str = "JEMS_HOME";
pub const ENV_PATH: &str = "JEMS_PATH";
pub const ENV_MISSING_INDEX: &str = "JEMS_MISSING_INDEX";
pub const ENV_ON_DUPLICATE: &str = "JEMS_ON_DUPLICATE";
pub const ENV_LOG: &str = "JEMS_LOG";

/// Marker file written at the root of every installed package and in each of
/// its require-path directories. Part of the store layout contract.
pub const DEFAULT_INDEX_MARKER: &str = ".jemdir";
/// Store subdirectory holding installed package trees.
pub const PACKAGES_DIR: &str = "packages";
/// Store subdirectory holding a copy of each installed manifest.
pub const SPECIFICATIONS_DIR: &str = "specifications";

#[derive(Debug, Error)]
#[error("unknown value '{value}' for {setting}; expected one of {expected:?}")]
pub struct ConfigError {
    pub setting: &'static str,
    pub value: String,
    pub expected: &'static [&'static str],
}

/// What the store does when a package with the same full name is installed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicateBehavior {
    Overwrite,
    #[default]
    Skip,
    Fail,
}

impl DuplicateBehavior {
    const NAMES: &'static [&'static str] = &["overwrite", "skip", "fail"];

    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateBehavior::Overwrite => "overwrite",
            DuplicateBehavior::Skip => "skip",
            DuplicateBehavior::Fail => "fail",
        }
    }
}

impl TryFrom<&str> for DuplicateBehavior {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, ConfigError> {
        match value {
            "overwrite" => Ok(DuplicateBehavior::Overwrite),
            "skip" => Ok(DuplicateBehavior::Skip),
            "fail" => Ok(DuplicateBehavior::Fail),
            other => Err(ConfigError {
                setting: ENV_ON_DUPLICATE,
                value: other.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

/// How activation treats a package whose index marker cannot be resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MissingIndexPolicy {
    /// Report `LocatorError::IndexNotFound`.
    #[default]
    Fail,
    /// Continue with an empty resource root. No candidate resolves to a
    /// directory, so activation returns `false` without touching the path.
    Degenerate,
}

impl MissingIndexPolicy {
    const NAMES: &'static [&'static str] = &["fail", "degenerate"];

    pub fn as_str(&self) -> &'static str {
        match self {
            MissingIndexPolicy::Fail => "fail",
            MissingIndexPolicy::Degenerate => "degenerate",
        }
    }
}

impl TryFrom<&str> for MissingIndexPolicy {
    type Error = ConfigError;

    fn try_from(value: &str) -> Result<Self, ConfigError> {
        match value {
            "fail" => Ok(MissingIndexPolicy::Fail),
            "degenerate" => Ok(MissingIndexPolicy::Degenerate),
            other => Err(ConfigError {
                setting: ENV_MISSING_INDEX,
                value: other.to_string(),
                expected: Self::NAMES,
            }),
        }
    }
}

/// Settings for `JemStore::open`.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Persistent store home. A temporary directory is used when unset.
    pub home: Option<PathBuf>,
    /// Read-only roots searched after the home when resolving resources.
    pub extra_roots: Vec<PathBuf>,
    pub on_duplicate: DuplicateBehavior,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        let home = env_non_empty(ENV_HOME).map(PathBuf::from);
        let extra_roots = env::var_os(ENV_PATH)
            .map(|paths| {
                env::split_paths(&paths)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let on_duplicate = env_setting(ENV_ON_DUPLICATE, |raw| DuplicateBehavior::try_from(raw));
        Self {
            home,
            extra_roots,
            on_duplicate,
        }
    }
}

/// Settings for `ActivationContext`.
#[derive(Clone, Debug)]
pub struct ActivatorConfig {
    pub index_marker: String,
    pub missing_index: MissingIndexPolicy,
}

impl Default for ActivatorConfig {
    fn default() -> Self {
        Self {
            index_marker: DEFAULT_INDEX_MARKER.to_string(),
            missing_index: MissingIndexPolicy::default(),
        }
    }
}

impl ActivatorConfig {
    pub fn from_env() -> Self {
        Self {
            missing_index: env_setting(ENV_MISSING_INDEX, |raw| MissingIndexPolicy::try_from(raw)),
            ..Self::default()
        }
    }

    /// Resource name of the index marker for a package full name.
    pub fn index_resource(&self, full_name: &str) -> String {
        format!("{PACKAGES_DIR}/{full_name}/{}", self.index_marker)
    }
}

pub(crate) fn env_non_empty(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        Ok(_) => None,
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(os)) => Some(os.to_string_lossy().into_owned()),
    }
}

// Unknown values fall back to the default; a typo in the environment should
// not take down a host that merely embeds the loader.
fn env_setting<T: Default>(name: &str, parse: impl Fn(&str) -> Result<T, ConfigError>) -> T {
    let Some(raw) = env_non_empty(name) else {
        return T::default();
    };
    match parse(raw.trim()) {
        Ok(value) => value,
        Err(err) => {
            warn!(%err, "ignoring invalid setting");
            T::default()
        }
    }
}
