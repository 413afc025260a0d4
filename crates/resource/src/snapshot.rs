//! Filesystem-backed provider serving a design document captured to disk.
//!
//! A snapshot directory looks like this:
//!
//! ```text
//! <base>/document.json
//! <base>/nodes/<id>.json
//! <base>/images/<ref>.png | <ref>.jpg
//! <base>/renderings/<ref>.png | <ref>.jpg
//! ```
//!
//! Ids and references are mapped to file stems with the same sanitizing the
//! engine uses for image files. Everything on disk counts as cached, so every
//! fetch answers immediately.
//!
//! # Security
//!
//! The provider validates that all resolved paths remain within the base path
//! to prevent directory traversal attacks (e.g., `../../../etc/passwd`).

use designmark_traits::{
    DesignProvider, Fetch, ImageData, ImageFormat, ProviderError, SharedBytes,
};
use designmark_types::names::image_file_stem;
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DOCUMENT_FILE: &str = "document.json";

/// A provider that reads a design snapshot from the local filesystem.
#[derive(Debug)]
pub struct SnapshotProvider {
    base_path: PathBuf,
    /// Canonicalized base path for security checks
    canonical_base: Option<PathBuf>,
}

impl SnapshotProvider {
    /// Creates a snapshot provider rooted at `base_path`.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        let base = base_path.as_ref().to_path_buf();
        // Try to canonicalize for security checks; may fail if path doesn't exist yet
        let canonical = base.canonicalize().ok();
        Self {
            base_path: base,
            canonical_base: canonical,
        }
    }

    /// Returns the base path for this provider.
    pub fn base(&self) -> &Path {
        &self.base_path
    }

    /// Reads the top-level document description.
    pub fn document(&self) -> Result<Vec<u8>, ProviderError> {
        self.read(DOCUMENT_FILE)
    }

    /// Resolves and validates a path relative to the base path.
    ///
    /// Returns `None` if the path would escape the base directory.
    fn resolve_path_safe(&self, path: &str) -> Option<PathBuf> {
        if Path::new(path).is_absolute() {
            return None;
        }

        let full_path = self.base_path.join(path);

        if let Ok(canonical) = full_path.canonicalize()
            && let Some(ref base) = self.canonical_base
        {
            if canonical.starts_with(base) {
                return Some(canonical);
            }
            return None;
        }

        for component in Path::new(path).components() {
            if let std::path::Component::ParentDir = component {
                return None;
            }
        }

        Some(full_path)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, ProviderError> {
        let full_path = self
            .resolve_path_safe(path)
            .ok_or_else(|| ProviderError::NotFound(format!("{} (path traversal blocked)", path)))?;

        std::fs::read(&full_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ProviderError::NotFound(path.to_string())
            } else {
                ProviderError::FetchFailed {
                    key: path.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn read_image(&self, folder: &str, image_ref: &str) -> Result<ImageData, ProviderError> {
        let stem = image_file_stem(image_ref);
        for format in [ImageFormat::Png, ImageFormat::Jpeg] {
            let relative = format!("{}/{}.{}", folder, stem, format.extension());
            match self.read(&relative) {
                Ok(bytes) => {
                    debug!("Snapshot image '{}' served from {}", image_ref, relative);
                    return Ok(ImageData::new(bytes, format));
                }
                Err(ProviderError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ProviderError::NotFound(format!("{}/{}", folder, image_ref)))
    }
}

impl DesignProvider for SnapshotProvider {
    fn fetch_node(&self, id: &str) -> Result<Fetch<SharedBytes>, ProviderError> {
        let relative = format!("nodes/{}.json", image_file_stem(id));
        self.read(&relative).map(|bytes| Fetch::Ready(Arc::new(bytes)))
    }

    fn fetch_image(
        &self,
        image_ref: &str,
        _max_dimension: u32,
    ) -> Result<Fetch<ImageData>, ProviderError> {
        self.read_image("images", image_ref).map(Fetch::Ready)
    }

    fn fetch_rendering(&self, image_ref: &str) -> Result<Fetch<ImageData>, ProviderError> {
        self.read_image("renderings", image_ref).map(Fetch::Ready)
    }

    fn is_ready(&self) -> bool {
        self.resolve_path_safe(DOCUMENT_FILE)
            .map(|p| p.exists())
            .unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "SnapshotProvider"
    }
}
