//! Package activation.
//!
//! `ActivationContext` ties a locator to the registry and search path it
//! mutates. Everything from the registry check to the registry insert runs
//! under one lock, so concurrent activations of the same package cannot both
//! merge directories. Fetching and parsing the manifest happen before the
//! lock; the locator's registration step is idempotent and is repeated even
//! for packages that are already active.

use crate::config::{ActivatorConfig, MissingIndexPolicy};
use crate::error::{ActivationError, LocatorError};
use crate::locator::{ResourceLocator, join_location, strip_marker};
use crate::manifest::{self, PackageSpec};
use crate::registry::ActivationRegistry;
use crate::search_path::SearchPath;
use crate::store::{JemStore, reset_shared_store, shared_store};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct ActivationState {
    registry: ActivationRegistry,
    search_path: SearchPath,
}

/// Result of one activation in `activate_all`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivationOutcome {
    pub identifier: String,
    pub changed: bool,
}

/// A locator plus the registry and search path that activations through it
/// update.
pub struct ActivationContext<L> {
    locator: L,
    config: ActivatorConfig,
    state: Mutex<ActivationState>,
}

impl<L: ResourceLocator> ActivationContext<L> {
    /// Empty registry and search path over `locator`, with the default
    /// activator settings.
    pub fn new(locator: L) -> Self {
        Self {
            locator,
            config: ActivatorConfig::default(),
            state: Mutex::new(ActivationState::default()),
        }
    }

    /// Replace the index marker and missing-index policy.
    pub fn with_config(mut self, config: ActivatorConfig) -> Self {
        self.config = config;
        self
    }

    /// Start from an existing search path (for example the host's built-in
    /// entries). Activation never removes or reorders these.
    pub fn with_search_path(self, search_path: SearchPath) -> Self {
        self.lock_state().search_path = search_path;
        self
    }

    /// The locator packages are fetched from.
    pub fn locator(&self) -> &L {
        &self.locator
    }

    /// Settings this context resolves index resources with.
    pub fn config(&self) -> &ActivatorConfig {
        &self.config
    }

    /// Merge the require paths of the package named by `identifier` into the
    /// search path.
    ///
    /// Returns `Ok(true)` when at least one directory was prepended and the
    /// package is now recorded as active. `Ok(false)` means nothing changed:
    /// the package was already active, or none of its require paths named a
    /// directory that was not already on the path. A package that returned
    /// `false` for the second reason is retried in full on the next call.
    pub fn activate(&self, identifier: &str) -> Result<bool, ActivationError> {
        let raw = self.locator.fetch_manifest(identifier)?;
        let spec = manifest::parse(&raw)?;

        let mut state = self.lock_state();
        if state.registry.contains(spec.name()) {
            debug!(package = spec.name(), "package already active");
            return Ok(false);
        }

        let root = self.resource_root(&spec)?;
        let mut activated = false;
        for path in spec.require_paths() {
            let candidate = join_location(&root, path);
            if !self.locator.is_directory(&candidate) {
                debug!(%candidate, "require path is not a directory");
                continue;
            }
            if state.search_path.prepend(candidate.as_str()) {
                debug!(%candidate, "prepended to search path");
                activated = true;
            } else {
                debug!(%candidate, "already on search path");
            }
        }

        if activated {
            info!(
                package = spec.name(),
                full_name = spec.full_name(),
                "activated package"
            );
            state.registry.insert(spec);
        }
        Ok(activated)
    }

    /// Activate each identifier in order, stopping at the first error.
    pub fn activate_all<I, S>(&self, identifiers: I) -> Result<Vec<ActivationOutcome>, ActivationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        identifiers
            .into_iter()
            .map(|identifier| {
                let identifier = identifier.as_ref();
                self.activate(identifier).map(|changed| ActivationOutcome {
                    identifier: identifier.to_string(),
                    changed,
                })
            })
            .collect()
    }

    /// Snapshot of the current search path.
    pub fn search_path(&self) -> SearchPath {
        self.lock_state().search_path.clone()
    }

    /// Whether a package with this name has been activated.
    pub fn is_active(&self, name: &str) -> bool {
        self.lock_state().registry.contains(name)
    }

    /// Manifest of the active package named `name`. Only the first activated
    /// version of a name is ever recorded.
    pub fn active_spec(&self, name: &str) -> Option<PackageSpec> {
        self.lock_state().registry.get(name).cloned()
    }

    /// Names of all active packages, sorted.
    pub fn active_names(&self) -> Vec<String> {
        self.lock_state()
            .registry
            .names()
            .map(str::to_string)
            .collect()
    }

    fn resource_root(&self, spec: &PackageSpec) -> Result<String, LocatorError> {
        let resource = self.config.index_resource(spec.full_name());
        match self.locator.resolve_resource(&resource) {
            Some(location) => Ok(strip_marker(&location, &self.config.index_marker).to_string()),
            None => match self.config.missing_index {
                MissingIndexPolicy::Fail => Err(LocatorError::IndexNotFound { resource }),
                MissingIndexPolicy::Degenerate => {
                    warn!(%resource, "index resource missing; using empty resource root");
                    Ok(String::new())
                }
            },
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ActivationState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

/// Context type behind the process-wide `activate`.
pub type SharedContext = ActivationContext<Arc<JemStore>>;

static GLOBAL_CONTEXT: Mutex<Option<Arc<SharedContext>>> = Mutex::new(None);

/// Process-wide context over the shared store, created on first use.
pub fn global_context() -> Result<Arc<SharedContext>, LocatorError> {
    let mut slot = GLOBAL_CONTEXT
        .lock()
        .unwrap_or_else(|err| err.into_inner());
    if let Some(context) = slot.as_ref() {
        return Ok(Arc::clone(context));
    }
    let context = Arc::new(
        ActivationContext::new(shared_store()?).with_config(ActivatorConfig::from_env()),
    );
    *slot = Some(Arc::clone(&context));
    Ok(context)
}

/// Forget the process-wide context and store. Packages activated so far are
/// no longer recorded anywhere.
pub fn reset_global_context() {
    GLOBAL_CONTEXT
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .take();
    reset_shared_store();
}

/// Activate `identifier` in the process-wide context.
pub fn activate(identifier: &str) -> Result<bool, ActivationError> {
    global_context()?.activate(identifier)
}
