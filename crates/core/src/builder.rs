use crate::assets::{self, DEFAULT_BROKEN_IMAGE};
use crate::config::{EngineConfig, GenerationFlags, ImportVersioning};
use crate::error::EngineError;
use crate::fonts::FontResolver;
use crate::orchestrator::Engine;
use async_channel::Receiver;
use designmark_traits::{DesignProvider, FontCatalog, ProviderEvent, StaticFontCatalog};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A builder for creating an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: EngineConfig,
    provider: Option<Arc<dyn DesignProvider>>,
    catalog: Option<Box<dyn FontCatalog>>,
    font_dirs: Vec<PathBuf>,
    readiness: Option<Receiver<ProviderEvent>>,
    placeholder: Option<PathBuf>,
}

impl EngineBuilder {
    /// Creates a new `EngineBuilder` with default settings.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the data source. Required.
    pub fn with_provider(mut self, provider: Arc<dyn DesignProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Directory generated files are written to. Created on the first build.
    pub fn with_output_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.output_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_flags(mut self, flags: GenerationFlags) -> Self {
        self.config.set_flags(flags);
        self
    }

    /// Adds or replaces one import; an empty version imports the module
    /// without a version.
    pub fn with_import(mut self, module: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.set_import(module, version);
        self
    }

    /// Requires every import version to be a dotted number.
    pub fn with_strict_imports(mut self, strict: bool) -> Self {
        self.config.versioning = if strict {
            ImportVersioning::Strict
        } else {
            ImportVersioning::Lenient
        };
        self
    }

    pub fn with_max_image_dimension(mut self, dimension: u32) -> Self {
        self.config.set_max_image_dimension(dimension);
        self
    }

    /// File extension of generated markup files, without the dot.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.config.extension = extension.into();
        self
    }

    /// First wait between attempts while suspended.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Upper bound the wait between attempts backs off to.
    pub fn with_max_poll_interval(mut self, interval: Duration) -> Self {
        self.config.max_poll_interval = interval;
        self
    }

    /// Font source used for substitution. Defaults to an empty catalog, which
    /// keeps every requested family.
    pub fn with_font_catalog(mut self, catalog: Box<dyn FontCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Loads the fonts of a directory into the catalog when the engine is built.
    pub fn with_font_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.font_dirs.push(dir.as_ref().to_path_buf());
        self
    }

    /// Provider events that wake a suspended [`Engine::run`] early.
    pub fn with_readiness(mut self, events: Receiver<ProviderEvent>) -> Self {
        self.readiness = Some(events);
        self
    }

    /// JPEG file used in place of images that cannot be resolved.
    pub fn with_broken_placeholder<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.placeholder = Some(path.as_ref().to_path_buf());
        self
    }

    /// Consumes the builder and creates the `Engine`.
    pub fn build(self) -> Result<Engine, EngineError> {
        let provider = self.provider.ok_or_else(|| {
            EngineError::Config(
                "No provider has been configured. Use `with_provider`.".to_string(),
            )
        })?;
        if self.config.extension.is_empty() {
            return Err(EngineError::Config("File extension must not be empty".to_string()));
        }

        let mut config = self.config;
        if config.max_poll_interval < config.poll_interval {
            config.max_poll_interval = config.poll_interval;
        }
        config.header()?;

        let placeholder = match &self.placeholder {
            Some(path) => assets::placeholder_from_file(path)?,
            None => DEFAULT_BROKEN_IMAGE.to_string(),
        };
        let catalog = self
            .catalog
            .unwrap_or_else(|| Box::new(StaticFontCatalog::default()));
        info!(
            "Engine using provider '{}' and font catalog '{}'.",
            provider.name(),
            catalog.name()
        );

        let mut engine = Engine::new(
            provider,
            config,
            FontResolver::new(catalog),
            placeholder,
            self.readiness,
        );
        for dir in &self.font_dirs {
            engine.load_font_folder(dir);
        }
        Ok(engine)
    }
}
