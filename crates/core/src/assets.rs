//! Image resolution during generation and image export afterwards.

use crate::error::{EngineError, Interrupt, Step};
use crate::events::EventSink;
use crate::output;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use designmark_traits::{DesignProvider, Fetch, ImageData, PendingFetch};
use designmark_types::{ImageContextIndex, ImageFileRecord, ImageFileTable, ImageRef};
use log::debug;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Image reference that always resolves to the broken-image placeholder.
pub const PLACEHOLDER_REF: &str = "__placeholder__";

/// Built-in placeholder: a transparent 1x1 PNG.
pub const DEFAULT_BROKEN_IMAGE: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

/// Sub-directory of an output folder holding referenced images.
pub const IMAGES_DIR: &str = "images";

/// Encodes bytes as a `data:image/<subtype>;base64,` URI.
pub fn data_uri(mime_subtype: &str, bytes: &[u8]) -> String {
    format!("data:image/{};base64,{}", mime_subtype, STANDARD.encode(bytes))
}

/// Loads a JPEG file as a placeholder data URI.
pub fn placeholder_from_file(path: &Path) -> Result<String, EngineError> {
    let bytes = fs::read(path).map_err(|e| EngineError::io(path, e))?;
    Ok(data_uri("jpeg", &bytes))
}

/// How image sources appear in generated markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    /// Inline base64 data URI; no file is written.
    Embedded,
    /// Relative `images/<file>` path to a file written next to the markup.
    Referenced,
}

/// Resolves image references to markup sources for one build attempt.
#[derive(Debug)]
pub(crate) struct AssetPipeline<'a> {
    mode: ImageMode,
    images_dir: PathBuf,
    max_dimension: u32,
    placeholder: &'a str,
    events: &'a EventSink,
    files: ImageFileTable,
}

impl<'a> AssetPipeline<'a> {
    pub fn new(
        mode: ImageMode,
        images_dir: PathBuf,
        max_dimension: u32,
        placeholder: &'a str,
        events: &'a EventSink,
    ) -> Self {
        Self {
            mode,
            images_dir,
            max_dimension,
            placeholder,
            events,
            files: ImageFileTable::new(),
        }
    }

    pub fn placeholder(&self) -> &'a str {
        self.placeholder
    }

    /// Returns the markup source for `image_ref`. A cache miss in the
    /// provider suspends the attempt.
    pub fn resolve(
        &mut self,
        provider: &dyn DesignProvider,
        image_ref: &str,
        rendering: bool,
    ) -> Step<String> {
        if image_ref == PLACEHOLDER_REF {
            return Ok(self.placeholder.to_string());
        }
        if self.mode == ImageMode::Referenced
            && let Some(record) = self.files.get(image_ref)
        {
            return Ok(relative_source(record.file_name()));
        }

        let Some(image) = self.fetch(provider, image_ref, rendering)? else {
            self.events
                .warning(format!("Image '{}' has no data, using placeholder", image_ref));
            return Ok(self.placeholder.to_string());
        };

        match self.mode {
            ImageMode::Embedded => Ok(data_uri(image.format.mime_subtype(), &image.bytes)),
            ImageMode::Referenced => {
                let file_name = self.files.allocate_name(image_ref, image.format.extension());
                let record = ImageFileRecord::new(self.images_dir.clone(), file_name);
                output::write_atomic(&record.path(), &image.bytes)?;
                let source = relative_source(record.file_name());
                self.files.insert(ImageRef::from(image_ref), record);
                Ok(source)
            }
        }
    }

    fn fetch(
        &self,
        provider: &dyn DesignProvider,
        image_ref: &str,
        rendering: bool,
    ) -> Step<Option<ImageData>> {
        let fetched = if rendering {
            provider.fetch_rendering(image_ref)?
        } else {
            provider.fetch_image(image_ref, self.max_dimension)?
        };
        match fetched {
            Fetch::Ready(image) if image.bytes.is_empty() => Ok(None),
            Fetch::Ready(image) => Ok(Some(image)),
            Fetch::Pending if rendering => Err(Interrupt::Suspend(PendingFetch::Rendering(image_ref.to_string()))),
            Fetch::Pending => Err(Interrupt::Suspend(PendingFetch::Image(image_ref.to_string()))),
        }
    }

    pub fn into_files(self) -> ImageFileTable {
        self.files
    }
}

fn relative_source(file_name: &str) -> String {
    format!("{}/{}", IMAGES_DIR, file_name)
}

/// Result of copying recorded images into an export folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub copied: Vec<PathBuf>,
    /// Targets that already existed with the same size.
    pub skipped: Vec<PathBuf>,
}

impl CopyReport {
    pub fn total(&self) -> usize {
        self.copied.len() + self.skipped.len()
    }
}

/// Copies every recorded image accepted by `filter` into `target_dir`.
///
/// A target that already exists with the same size is skipped with a warning.
/// A target with a different size is never overwritten: the copy stops with
/// [`EngineError::CopyConflict`].
pub fn copy_images(
    files: &ImageFileTable,
    contexts: &ImageContextIndex,
    target_dir: &Path,
    filter: &BTreeSet<String>,
    events: &EventSink,
) -> Result<CopyReport, EngineError> {
    output::ensure_dir(target_dir)?;
    let mut report = CopyReport::default();
    for (image_ref, record) in files.iter() {
        if !contexts.accepts(image_ref.as_str(), filter) {
            debug!("Image '{}' filtered out of export", image_ref);
            continue;
        }
        let source = record.path();
        let source_len = match fs::metadata(&source) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return Err(EngineError::SourceMissing(source)),
        };
        let target = target_dir.join(record.file_name());
        match fs::metadata(&target) {
            Ok(meta) if meta.len() == source_len => {
                events.warning(format!(
                    "Are equal {} to {}",
                    source.display(),
                    target.display()
                ));
                report.skipped.push(target);
            }
            Ok(_) => return Err(EngineError::CopyConflict(target)),
            Err(_) => {
                output::copy_atomic(&source, &target)?;
                report.copied.push(target);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use designmark_traits::{ImageFormat, MemoryProvider};
    use tempfile::tempdir;

    fn provider_with(image_ref: &str, bytes: &[u8], format: ImageFormat) -> MemoryProvider {
        let provider = MemoryProvider::new();
        provider
            .insert_image(image_ref, ImageData::new(bytes.to_vec(), format))
            .unwrap();
        provider.cache_all().unwrap();
        provider
    }

    #[test]
    fn test_embedded_image_becomes_data_uri() {
        let provider = provider_with("img", b"abc", ImageFormat::Jpeg);
        let dir = tempdir().unwrap();
        let (sink, _events) = EventSink::channel();
        let mut assets = AssetPipeline::new(ImageMode::Embedded, dir.path().join("images"), 1024, DEFAULT_BROKEN_IMAGE, &sink);
        let source = assets.resolve(&provider, "img", false).unwrap();
        assert_eq!(source, "data:image/jpeg;base64,YWJj");
        assert!(!dir.path().join("images").exists());
    }

    #[test]
    fn test_cache_miss_suspends() {
        let provider = MemoryProvider::new();
        let dir = tempdir().unwrap();
        let (sink, _events) = EventSink::channel();
        let mut assets = AssetPipeline::new(ImageMode::Embedded, dir.path().to_path_buf(), 1024, DEFAULT_BROKEN_IMAGE, &sink);
        let result = assets.resolve(&provider, "1:5", true);
        assert!(matches!(
            result,
            Err(Interrupt::Suspend(PendingFetch::Rendering(ref id))) if id == "1:5"
        ));
    }

    #[test]
    fn test_placeholder_bypasses_provider() {
        let provider = MemoryProvider::new();
        let dir = tempdir().unwrap();
        let (sink, _events) = EventSink::channel();
        let mut assets = AssetPipeline::new(ImageMode::Referenced, dir.path().to_path_buf(), 1024, "data:broken", &sink);
        assert_eq!(assets.resolve(&provider, PLACEHOLDER_REF, false).unwrap(), "data:broken");
        assert_eq!(provider.fetch_requests(), 0);
    }

    #[test]
    fn test_referenced_images_get_distinct_files() {
        let provider = MemoryProvider::new();
        provider.insert_image("a:b", ImageData::new(b"one".to_vec(), ImageFormat::Png)).unwrap();
        provider.insert_image("a/b", ImageData::new(b"two".to_vec(), ImageFormat::Png)).unwrap();
        provider.cache_all().unwrap();
        let dir = tempdir().unwrap();
        let images = dir.path().join("images");
        let (sink, _events) = EventSink::channel();
        let mut assets = AssetPipeline::new(ImageMode::Referenced, images.clone(), 1024, DEFAULT_BROKEN_IMAGE, &sink);

        assert_eq!(assets.resolve(&provider, "a:b", false).unwrap(), "images/a_b.png");
        assert_eq!(assets.resolve(&provider, "a/b", false).unwrap(), "images/a_b_1.png");
        assert_eq!(assets.resolve(&provider, "a:b", false).unwrap(), "images/a_b.png");
        assert_eq!(fs::read(images.join("a_b.png")).unwrap(), b"one");
        assert_eq!(fs::read(images.join("a_b_1.png")).unwrap(), b"two");
        assert_eq!(assets.into_files().len(), 2);
    }

    #[test]
    fn test_empty_image_warns_and_uses_placeholder() {
        let provider = provider_with("blank", b"", ImageFormat::Png);
        let dir = tempdir().unwrap();
        let (sink, events) = EventSink::channel();
        let mut assets = AssetPipeline::new(ImageMode::Referenced, dir.path().join("images"), 1024, "data:broken", &sink);

        assert_eq!(assets.resolve(&provider, "blank", false).unwrap(), "data:broken");
        assert!(matches!(
            events.try_recv().unwrap(),
            crate::events::BuildEvent::Warning(m) if m.contains("'blank' has no data")
        ));
        assert!(assets.into_files().is_empty());
    }

    #[test]
    fn test_placeholder_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(placeholder_from_file(&path).unwrap(), "data:image/jpeg;base64,YWJj");
        assert!(placeholder_from_file(&dir.path().join("nope.jpg")).is_err());
    }
}
