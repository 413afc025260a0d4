use serde::Serialize;
use std::collections::BTreeMap;

/// Requested font family → resolved local family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FontCache {
    mappings: BTreeMap<String, String>,
}

impl FontCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, requested: &str) -> Option<&str> {
        self.mappings.get(requested).map(String::as_str)
    }

    pub fn contains(&self, requested: &str) -> bool {
        self.mappings.contains_key(requested)
    }

    /// Sets a mapping, replacing any earlier one for the same family.
    pub fn insert(&mut self, requested: impl Into<String>, resolved: impl Into<String>) {
        self.mappings.insert(requested.into(), resolved.into());
    }

    pub fn clear(&mut self) {
        self.mappings.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.mappings.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
