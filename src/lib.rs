//! Activates jems (packaged modules kept in a local store) onto a host
//! interpreter's module search path, once per package name.

pub mod activator;
pub mod config;
pub mod error;
pub mod locator;
pub mod manifest;
pub mod registry;
pub mod search_path;
pub mod store;

pub use activator::{
    ActivationContext, ActivationOutcome, SharedContext, activate, global_context,
    reset_global_context,
};
pub use config::{ActivatorConfig, DuplicateBehavior, MissingIndexPolicy, StoreConfig};
pub use error::{ActivationError, LocatorError, ManifestError};
pub use locator::ResourceLocator;
pub use manifest::{Dependency, PackageSpec};
pub use registry::ActivationRegistry;
pub use search_path::SearchPath;
pub use store::{JemStore, reset_shared_store, shared_store};

use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber used by the binaries. Filter directives
/// come from `JEMS_LOG` (default `warn`).
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(config::ENV_LOG)
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
