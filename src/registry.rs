//! Registry of activated packages, keyed by package name.
//!
//! Entries are only added, never removed: there is no deactivation.

use crate::manifest::PackageSpec;
use std::collections::BTreeMap;

/// Active packages by name.
#[derive(Clone, Debug, Default)]
pub struct ActivationRegistry {
    by_name: BTreeMap<String, PackageSpec>,
}

impl ActivationRegistry {
    /// Whether `name` has an entry, whatever its version.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Manifest recorded for `name`.
    pub fn get(&self, name: &str) -> Option<&PackageSpec> {
        self.by_name.get(name)
    }

    /// Record `spec` under its name. An existing entry is kept and `false`
    /// returned; the first successful activation wins.
    pub fn insert(&mut self, spec: PackageSpec) -> bool {
        if self.contains(spec.name()) {
            return false;
        }
        self.by_name.insert(spec.name().to_string(), spec);
        true
    }

    /// Active package names in stable order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Number of active packages.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
