//! Ordered module search path.
//!
//! Earlier entries win. The activator only ever prepends, and membership is
//! an exact string comparison, so an entry is never inserted twice.

use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SearchPath {
    entries: Vec<String>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.entries.iter().any(|existing| existing == entry)
    }

    /// Insert `entry` at the front unless it is already present. Returns
    /// whether the path changed.
    pub fn prepend(&mut self, entry: impl Into<String>) -> bool {
        let entry = entry.into();
        if self.contains(&entry) {
            return false;
        }
        self.entries.insert(0, entry);
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Seed a path from existing entries, keeping their order and dropping
/// repeats.
impl<S: Into<String>> FromIterator<S> for SearchPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut entries: Vec<String> = Vec::new();
        for entry in iter {
            let entry = entry.into();
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        Self { entries }
    }
}
