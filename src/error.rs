//! Error taxonomy for activation.
//!
//! Locator and manifest failures keep their own types so callers can tell a
//! missing package apart from a broken one. `ActivationError` is the union the
//! activator returns; it never wraps or rewrites the inner message.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The package store could not load a package or serve one of its resources.
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("package '{identifier}' not found")]
    NotFound { identifier: String },

    #[error("I/O error at {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("package '{identifier}' carries an invalid manifest")]
    InvalidManifest {
        identifier: String,
        #[source]
        source: ManifestError,
    },

    #[error("package '{full_name}' is already installed at {}", path.display())]
    AlreadyInstalled { full_name: String, path: PathBuf },

    #[error("index resource '{resource}' not found in any registered root")]
    IndexNotFound { resource: String },

    #[error("invalid resource name '{name}'")]
    InvalidResourceName { name: String },
}

impl LocatorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        LocatorError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Manifest text was malformed or did not describe a usable package.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest is not valid JSON")]
    Json(#[from] serde_json::Error),

    #[error("manifest failed schema validation:\n{details}")]
    Schema { details: String },

    #[error("manifest schema_version '{found}' not in allowed set {allowed:?}")]
    UnsupportedVersion { found: String, allowed: Vec<String> },

    #[error("manifest field '{field}' is invalid: {reason}")]
    InvalidField { field: String, reason: String },
}

impl ManifestError {
    pub(crate) fn field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ManifestError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Anything `activate` can fail with.
#[derive(Debug, Error)]
pub enum ActivationError {
    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}
