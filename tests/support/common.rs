#![allow(dead_code)]

use anyhow::{Context, Result};
use jemloader::{LocatorError, ResourceLocator};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const MARKER: &str = ".jemdir";

pub fn manifest_json(name: &str, version: &str, require_paths: &[&str]) -> String {
    json!({
        "schema_version": "jem_manifest_v1",
        "name": name,
        "version": version,
        "require_paths": require_paths,
    })
    .to_string()
}

// In-memory locator: identifiers map to manifest text, resource names map to
// locations, and a mutable set of locations counts as existing directories.
#[derive(Default)]
pub struct MapLocator {
    manifests: BTreeMap<String, String>,
    resources: BTreeMap<String, String>,
    directories: Mutex<BTreeSet<String>>,
    fetches: AtomicUsize,
}

impl MapLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package whose store root is `scheme://root/packages/<full_name>`.
    pub fn with_package(mut self, identifier: &str, name: &str, version: &str, paths: &[&str]) -> Self {
        let full_name = format!("{name}-{version}");
        self.manifests
            .insert(identifier.to_string(), manifest_json(name, version, paths));
        self.resources.insert(
            format!("packages/{full_name}/{MARKER}"),
            format!("{}/{MARKER}", package_root(&full_name)),
        );
        self
    }

    pub fn with_manifest(mut self, identifier: &str, raw: &str) -> Self {
        self.manifests.insert(identifier.to_string(), raw.to_string());
        self
    }

    pub fn with_resource(mut self, name: &str, location: &str) -> Self {
        self.resources.insert(name.to_string(), location.to_string());
        self
    }

    pub fn without_resource(mut self, name: &str) -> Self {
        self.resources.remove(name);
        self
    }

    pub fn with_directory(self, location: &str) -> Self {
        self.add_directory(location);
        self
    }

    pub fn add_directory(&self, location: &str) {
        self.directories
            .lock()
            .unwrap()
            .insert(location.to_string());
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ResourceLocator for MapLocator {
    fn fetch_manifest(&self, identifier: &str) -> Result<String, LocatorError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.manifests
            .get(identifier)
            .cloned()
            .ok_or_else(|| LocatorError::NotFound {
                identifier: identifier.to_string(),
            })
    }

    fn resolve_resource(&self, name: &str) -> Option<String> {
        self.resources.get(name).cloned()
    }

    fn is_directory(&self, location: &str) -> bool {
        self.directories.lock().unwrap().contains(location)
    }
}

pub fn package_root(full_name: &str) -> String {
    format!("scheme://root/packages/{full_name}")
}

pub fn require_dir(full_name: &str, path: &str) -> String {
    format!("{}/{path}", package_root(full_name))
}

// Exploded package on disk: `<parent>/<name>-<version>/jem.json` plus one
// directory (holding a single source file) per entry in `create_dirs`.
pub struct PackageFixture {
    pub dir: PathBuf,
}

impl PackageFixture {
    pub fn create(
        parent: &Path,
        name: &str,
        version: &str,
        require_paths: &[&str],
        create_dirs: &[&str],
    ) -> Result<Self> {
        let dir = parent.join(format!("{name}-{version}"));
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating fixture {}", dir.display()))?;
        fs::write(
            dir.join("jem.json"),
            manifest_json(name, version, require_paths),
        )?;
        for sub in create_dirs {
            let sub_dir = dir.join(sub);
            fs::create_dir_all(&sub_dir)?;
            fs::write(sub_dir.join(format!("{name}.src")), format!("// {name} {sub}\n"))?;
        }
        Ok(Self { dir })
    }

    pub fn identifier(&self) -> String {
        self.dir.display().to_string()
    }
}
