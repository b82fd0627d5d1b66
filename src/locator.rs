//! Resource locator contract consumed by the activator.
//!
//! A locator is whatever stores package bytes: it installs a package when
//! asked for its manifest, maps store-relative resource names to location
//! URIs, and answers directory checks for those locations. `JemStore` is the
//! filesystem-backed implementation; tests plug in their own.
//!
//! Locations are plain strings so that the search path can hold whatever the
//! host interpreter understands. The helpers below only know about `file:`
//! URLs.

use crate::error::LocatorError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

pub trait ResourceLocator: Send + Sync {
    /// Register the package named by `identifier` and return its manifest
    /// text. Must be safe to call for a package that is already registered.
    fn fetch_manifest(&self, identifier: &str) -> Result<String, LocatorError>;

    /// Location of `name` in some registered root, if any root has it.
    fn resolve_resource(&self, name: &str) -> Option<String>;

    /// Whether `location` names an existing directory.
    fn is_directory(&self, location: &str) -> bool {
        path_from_location(location).is_some_and(|path| path.is_dir())
    }
}

impl<L: ResourceLocator + ?Sized> ResourceLocator for Arc<L> {
    fn fetch_manifest(&self, identifier: &str) -> Result<String, LocatorError> {
        (**self).fetch_manifest(identifier)
    }

    fn resolve_resource(&self, name: &str) -> Option<String> {
        (**self).resolve_resource(name)
    }

    fn is_directory(&self, location: &str) -> bool {
        (**self).is_directory(location)
    }
}

impl<L: ResourceLocator + ?Sized> ResourceLocator for &L {
    fn fetch_manifest(&self, identifier: &str) -> Result<String, LocatorError> {
        (**self).fetch_manifest(identifier)
    }

    fn resolve_resource(&self, name: &str) -> Option<String> {
        (**self).resolve_resource(name)
    }

    fn is_directory(&self, location: &str) -> bool {
        (**self).is_directory(location)
    }
}

/// Join a relative, `/`-separated path onto a location.
///
/// When `root` is a URL each segment of `path` is appended as one
/// percent-encoded path segment, so `%`, `#` and `?` in a segment can never be
/// read back as an escape, fragment or query. Roots that are not URLs (the
/// empty root of a missing index) fall back to a plain join with exactly one
/// `/` between the parts.
pub fn join_location(root: &str, path: &str) -> String {
    let segments = path.split('/').filter(|segment| !segment.is_empty());
    if let Ok(mut url) = Url::parse(root) {
        let joined = if let Ok(mut parts) = url.path_segments_mut() {
            parts.pop_if_empty().extend(segments);
            true
        } else {
            false
        };
        if joined {
            return url.into();
        }
    }
    format!(
        "{}/{}",
        root.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Strip a trailing `/<marker>` from a resolved marker location, keeping the
/// scheme and everything before it. Returns the input unchanged when the
/// marker is not the last segment.
pub fn strip_marker<'a>(location: &'a str, marker: &str) -> &'a str {
    location
        .strip_suffix(marker)
        .and_then(|rest| rest.strip_suffix('/'))
        .unwrap_or(location)
}

/// `file:` URL for an absolute filesystem path.
pub fn location_from_path(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(String::from)
}

/// Filesystem path behind a `file:` location. Anything else yields `None`.
pub fn path_from_location(location: &str) -> Option<PathBuf> {
    let url = Url::parse(location).ok()?;
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path().ok()
}
