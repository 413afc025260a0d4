//! Bookkeeping for images written during a build.

use crate::ids::ImageRef;
use crate::names::image_file_stem;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Where an image reference was stored on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFileRecord {
    directory: PathBuf,
    file_name: String,
}

impl ImageFileRecord {
    pub fn new(directory: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            file_name: file_name.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Maps image references to the files they were written to.
///
/// File names handed out by [`ImageFileTable::allocate_name`] are never
/// handed out again for the lifetime of the table.
#[derive(Debug, Clone, Default)]
pub struct ImageFileTable {
    records: BTreeMap<ImageRef, ImageFileRecord>,
    used_names: BTreeSet<String>,
}

impl ImageFileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves a collision-free file name for `image_ref`:
    /// `<stem>.<ext>`, then `<stem>_1.<ext>`, `<stem>_2.<ext>`, ...
    pub fn allocate_name(&mut self, image_ref: &str, extension: &str) -> String {
        let stem = image_file_stem(image_ref);
        let mut candidate = format!("{}.{}", stem, extension);
        let mut count = 1;
        while self.used_names.contains(&candidate) {
            candidate = format!("{}_{}.{}", stem, count, extension);
            count += 1;
        }
        self.used_names.insert(candidate.clone());
        candidate
    }

    pub fn insert(&mut self, image_ref: ImageRef, record: ImageFileRecord) {
        self.used_names.insert(record.file_name.clone());
        self.records.insert(image_ref, record);
    }

    pub fn get(&self, image_ref: &str) -> Option<&ImageFileRecord> {
        self.records.get(image_ref)
    }

    pub fn contains(&self, image_ref: &str) -> bool {
        self.records.contains_key(image_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ImageRef, &ImageFileRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Which components and elements depend on each image reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageContextIndex {
    contexts: BTreeMap<ImageRef, BTreeSet<String>>,
}

impl ImageContextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, image_ref: ImageRef, owner: impl Into<String>) {
        self.contexts.entry(image_ref).or_default().insert(owner.into());
    }

    pub fn owners(&self, image_ref: &str) -> Option<&BTreeSet<String>> {
        self.contexts.get(image_ref)
    }

    /// Whether an image passes a name filter. An empty filter accepts
    /// everything, as does an image with no recorded owners.
    pub fn accepts(&self, image_ref: &str, filter: &BTreeSet<String>) -> bool {
        if filter.is_empty() {
            return true;
        }
        match self.contexts.get(image_ref) {
            Some(owners) => owners.iter().any(|owner| filter.contains(owner)),
            None => true,
        }
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
