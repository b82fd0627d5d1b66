//! Filesystem-backed package store.
//!
//! The store owns a home directory laid out as:
//!
//! ```text
//! <home>/packages/<full_name>/...        installed package trees
//! <home>/packages/<full_name>/.jemdir    index marker (also in each require path)
//! <home>/specifications/<full_name>.json manifest copy
//! ```
//!
//! Packages arrive as exploded directories containing a `jem.json`. Installing
//! copies the tree under `packages/`, writes the index markers the activator
//! resolves, and records the manifest. Extra read-only roots with the same
//! layout (for example a vendored package set) are consulted after the home
//! when resolving resources.

use crate::config::{
    DEFAULT_INDEX_MARKER, DuplicateBehavior, PACKAGES_DIR, SPECIFICATIONS_DIR, StoreConfig,
};
use crate::error::LocatorError;
use crate::locator::{ResourceLocator, location_from_path};
use crate::manifest::{self, MANIFEST_FILE, PackageSpec};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::TempDir;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const INDEX_MARKER_CONTENTS: &str = ".";

#[derive(Debug)]
pub struct JemStore {
    home: PathBuf,
    extra_roots: Vec<PathBuf>,
    on_duplicate: DuplicateBehavior,
    installed: Mutex<BTreeSet<String>>,
    // Keeps a temporary home alive for the lifetime of the store.
    _temp: Option<TempDir>,
}

impl JemStore {
    /// Open (creating if needed) the store described by `config`.
    pub fn open(config: StoreConfig) -> Result<Self, LocatorError> {
        let (home, temp) = match config.home {
            Some(home) => {
                fs::create_dir_all(&home).map_err(|err| LocatorError::io(&home, err))?;
                (home, None)
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("jems")
                    .tempdir()
                    .map_err(|err| LocatorError::io(std::env::temp_dir(), err))?;
                (temp.path().to_path_buf(), Some(temp))
            }
        };
        let home = fs::canonicalize(&home).map_err(|err| LocatorError::io(&home, err))?;

        for dir in [PACKAGES_DIR, SPECIFICATIONS_DIR] {
            let path = home.join(dir);
            fs::create_dir_all(&path).map_err(|err| LocatorError::io(&path, err))?;
        }

        let extra_roots = config
            .extra_roots
            .into_iter()
            .filter_map(|root| match fs::canonicalize(&root) {
                Ok(canonical) => Some(canonical),
                Err(err) => {
                    warn!(root = %root.display(), %err, "skipping unreadable package root");
                    None
                }
            })
            .collect();

        debug!(home = %home.display(), "opened package store");
        Ok(Self {
            home,
            extra_roots,
            on_duplicate: config.on_duplicate,
            installed: Mutex::new(BTreeSet::new()),
            _temp: temp,
        })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Directory a package with `full_name` installs into.
    pub fn package_dir(&self, full_name: &str) -> PathBuf {
        self.home.join(PACKAGES_DIR).join(full_name)
    }

    /// Full names installed through this store instance, in sorted order.
    pub fn installed(&self) -> Vec<String> {
        self.lock_installed().iter().cloned().collect()
    }

    fn lock_installed(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.installed.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn install(&self, source: &Path, raw: &str, spec: &PackageSpec) -> Result<(), LocatorError> {
        let mut installed = self.lock_installed();
        let dest = self.package_dir(spec.full_name());

        let copy = if dest.exists() {
            let same_tree = fs::canonicalize(source).ok() == fs::canonicalize(&dest).ok();
            match self.on_duplicate {
                _ if same_tree => false,
                DuplicateBehavior::Skip => false,
                DuplicateBehavior::Overwrite => {
                    fs::remove_dir_all(&dest).map_err(|err| LocatorError::io(&dest, err))?;
                    true
                }
                DuplicateBehavior::Fail => {
                    return Err(LocatorError::AlreadyInstalled {
                        full_name: spec.full_name().to_string(),
                        path: dest,
                    });
                }
            }
        } else {
            true
        };

        if copy {
            copy_tree(source, &dest)?;
            info!(
                package = spec.full_name(),
                dest = %dest.display(),
                "installed package"
            );
        } else {
            debug!(package = spec.full_name(), "package already installed");
        }

        write_marker(&dest)?;
        for path in spec.require_paths() {
            let dir = dest.join(path);
            if dir.is_dir() {
                write_marker(&dir)?;
            }
        }

        let spec_copy = self
            .home
            .join(SPECIFICATIONS_DIR)
            .join(format!("{}.json", spec.full_name()));
        fs::write(&spec_copy, raw).map_err(|err| LocatorError::io(&spec_copy, err))?;

        installed.insert(spec.full_name().to_string());
        Ok(())
    }
}

impl ResourceLocator for JemStore {
    /// `identifier` is a path to an exploded package directory, or to the
    /// `jem.json` inside one.
    fn fetch_manifest(&self, identifier: &str) -> Result<String, LocatorError> {
        let source = Path::new(identifier);
        let (package_dir, manifest_path) = if source.is_dir() {
            (source.to_path_buf(), source.join(MANIFEST_FILE))
        } else if source.file_name().is_some_and(|name| name == MANIFEST_FILE) {
            let parent = source
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            (parent.to_path_buf(), source.to_path_buf())
        } else {
            return Err(LocatorError::NotFound {
                identifier: identifier.to_string(),
            });
        };
        if !manifest_path.is_file() {
            return Err(LocatorError::NotFound {
                identifier: identifier.to_string(),
            });
        }

        let raw = fs::read_to_string(&manifest_path)
            .map_err(|err| LocatorError::io(&manifest_path, err))?;
        let spec = manifest::parse(&raw).map_err(|source| LocatorError::InvalidManifest {
            identifier: identifier.to_string(),
            source,
        })?;
        self.install(&package_dir, &raw, &spec)?;
        Ok(raw)
    }

    fn resolve_resource(&self, name: &str) -> Option<String> {
        if !is_store_relative(name) {
            warn!(name, "refusing to resolve resource outside the store");
            return None;
        }
        std::iter::once(&self.home)
            .chain(self.extra_roots.iter())
            .map(|root| root.join(name))
            .find(|candidate| candidate.exists())
            .and_then(|found| location_from_path(&found))
    }
}

/// Process-wide store, created from the environment on first use.
pub fn shared_store() -> Result<Arc<JemStore>, LocatorError> {
    let mut slot = SHARED_STORE.lock().unwrap_or_else(|err| err.into_inner());
    if let Some(store) = slot.as_ref() {
        return Ok(Arc::clone(store));
    }
    let store = Arc::new(JemStore::open(StoreConfig::from_env())?);
    *slot = Some(Arc::clone(&store));
    Ok(store)
}

/// Drop the process-wide store so the next `shared_store` call reopens it.
pub fn reset_shared_store() {
    SHARED_STORE
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .take();
}

static SHARED_STORE: Mutex<Option<Arc<JemStore>>> = Mutex::new(None);

fn is_store_relative(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('/')
        && !name.contains('\\')
        && !name.contains(':')
        && name.split('/').all(|segment| segment != "..")
}

fn write_marker(dir: &Path) -> Result<(), LocatorError> {
    let marker = dir.join(DEFAULT_INDEX_MARKER);
    fs::write(&marker, INDEX_MARKER_CONTENTS).map_err(|err| LocatorError::io(&marker, err))
}

// Symlinks are not followed or copied: a package must not be able to pull
// files from outside its own tree into the store.
fn copy_tree(source: &Path, dest: &Path) -> Result<(), LocatorError> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(source).to_path_buf();
            LocatorError::io(path, err.into())
        })?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|err| LocatorError::io(&target, err))?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).map_err(|err| LocatorError::io(&target, err))?;
        } else {
            debug!(path = %entry.path().display(), "skipping non-regular file");
        }
    }
    Ok(())
}
