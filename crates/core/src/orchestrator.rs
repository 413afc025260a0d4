//! The conversion engine: accepts build requests, drives the suspend/retry
//! state machine and serves the finished document.

use crate::assets;
use crate::config::{ElementFilter, EngineConfig, GenerationFlags};
use crate::description::Description;
use crate::error::{EngineError, Interrupt};
use crate::events::{BuildEvent, EventSink};
use crate::export::{self, ExportReport};
use crate::fonts::FontResolver;
use crate::output;
use crate::walk::{Attempt, BuildContext};
use async_channel::Receiver;
use designmark_traits::{DesignProvider, FontCatalogError, ProviderEvent};
use designmark_types::names::make_file_name;
use designmark_types::{Document, ElementEntry, FontCache, ImageContextIndex, ImageFileTable};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Lifecycle of the engine with respect to the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// No request, or the last one was cancelled.
    Idle,
    /// Waiting for the provider; the next tick starts a new attempt.
    Suspended,
    /// An attempt is walking the description.
    Constructing,
    Done,
    Failed,
}

/// Cooperative cancellation flag shared with the caller.
///
/// Checked between elements and before every sub-component; a cancelled
/// attempt stops without emitting an error.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The result of a successful attempt: the document plus everything needed to
/// export it later.
#[derive(Debug, Clone)]
pub struct CompletedBuild {
    document: Document,
    image_files: ImageFileTable,
    image_contexts: ImageContextIndex,
    output_dir: PathBuf,
    header: String,
    extension: String,
}

impl CompletedBuild {
    pub(crate) fn new(
        document: Document,
        image_files: ImageFileTable,
        image_contexts: ImageContextIndex,
        output_dir: PathBuf,
        header: String,
        extension: String,
    ) -> Self {
        Self {
            document,
            image_files,
            image_contexts,
            output_dir,
            header,
            extension,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(crate) fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn image_files(&self) -> &ImageFileTable {
        &self.image_files
    }

    pub fn image_contexts(&self) -> &ImageContextIndex {
        &self.image_contexts
    }

    /// Directory the markup files of this build were written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The imports header every file of this build starts with.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Path of the generated file of an element in the output directory.
    pub fn element_path(&self, canvas: usize, element: usize) -> Option<PathBuf> {
        let canvas = self.document.canvas(canvas)?;
        let element = canvas.element(element)?;
        Some(self.output_dir.join(format!(
            "{}_{}.{}",
            make_file_name(canvas.name()),
            element.name(),
            self.extension
        )))
    }
}

struct BuildRequest {
    description: Description,
    filter: ElementFilter,
}

/// Converts design descriptions into markup files.
///
/// Created through [`crate::EngineBuilder`]. A build is requested with
/// [`Engine::request_build`] and then driven either by calling
/// [`Engine::tick`] whenever the provider may have more data, or by awaiting
/// [`Engine::run`].
pub struct Engine {
    provider: Arc<dyn DesignProvider>,
    config: EngineConfig,
    fonts: FontResolver,
    placeholder: String,
    state: BuildState,
    request: Option<BuildRequest>,
    completed: Option<Arc<CompletedBuild>>,
    cancel: CancelHandle,
    events: EventSink,
    receiver: Receiver<BuildEvent>,
    readiness: Option<Receiver<ProviderEvent>>,
}

impl Engine {
    pub(crate) fn new(
        provider: Arc<dyn DesignProvider>,
        config: EngineConfig,
        fonts: FontResolver,
        placeholder: String,
        readiness: Option<Receiver<ProviderEvent>>,
    ) -> Self {
        let (events, receiver) = EventSink::channel();
        Self {
            provider,
            config,
            fonts,
            placeholder,
            state: BuildState::Idle,
            request: None,
            completed: None,
            cancel: CancelHandle::new(),
            events,
            receiver,
            readiness,
        }
    }

    /// A receiver for build events. Every clone sees each event once, so use
    /// a single consumer. Undrained events are capped at
    /// [`crate::events::EVENT_BACKLOG`], oldest dropped first.
    pub fn events(&self) -> Receiver<BuildEvent> {
        self.receiver.clone()
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, BuildState::Suspended | BuildState::Constructing)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn DesignProvider {
        self.provider.as_ref()
    }

    /// Parses `data` and queues it for building. Nothing is generated until
    /// the next [`Engine::tick`].
    pub fn request_build(&mut self, data: &[u8], filter: ElementFilter) -> Result<(), EngineError> {
        if self.is_busy() {
            return Err(EngineError::BuildInProgress);
        }
        let description = match Description::parse(data) {
            Ok(description) => description,
            Err(e) => {
                self.events.failed(e.to_string());
                self.state = BuildState::Failed;
                return Err(e);
            }
        };
        info!(
            "Build of '{}' requested: {} canvases, {} elements, {} components.",
            description.name,
            description.canvases.len(),
            description.element_count(),
            description.components.len()
        );
        self.cancel.reset();
        self.request = Some(BuildRequest {
            description,
            filter,
        });
        self.state = BuildState::Suspended;
        self.events.emit(BuildEvent::Started);
        self.events.emit(BuildEvent::Busy(true));
        Ok(())
    }

    /// Runs one attempt if the engine is suspended and the provider is ready.
    /// Returns the state afterwards.
    pub fn tick(&mut self) -> BuildState {
        if self.state != BuildState::Suspended {
            return self.state;
        }
        if self.cancel.is_cancelled() {
            info!("Build cancelled.");
            self.finish(BuildState::Idle);
            return self.state;
        }
        if !self.provider.is_ready() {
            debug!("Provider '{}' not ready.", self.provider.name());
            return self.state;
        }
        let Some(request) = self.request.as_ref() else {
            self.finish(BuildState::Idle);
            return self.state;
        };

        self.state = BuildState::Constructing;
        let outcome = match self.config.header() {
            Err(e) => Err(Interrupt::Fatal(e)),
            Ok(header) => {
                let ctx = BuildContext {
                    provider: self.provider.as_ref(),
                    config: &self.config,
                    header: &header,
                    placeholder: &self.placeholder,
                    events: &self.events,
                    cancel: &self.cancel,
                };
                Attempt::new(ctx, &request.description, &request.filter, &mut self.fonts).run()
            }
        };

        match outcome {
            Ok(build) => {
                let build = Arc::new(build);
                self.completed = Some(Arc::clone(&build));
                self.events.emit(BuildEvent::Completed(build));
                self.finish(BuildState::Done);
            }
            Err(Interrupt::Suspend(fetch)) => {
                self.state = BuildState::Suspended;
                self.events.emit(BuildEvent::Suspended(fetch));
            }
            Err(Interrupt::Cancelled) => {
                info!("Build cancelled.");
                self.finish(BuildState::Idle);
            }
            Err(Interrupt::Fatal(e)) if self.cancel.is_cancelled() => {
                debug!("Error after cancellation suppressed: {}", e);
                self.finish(BuildState::Idle);
            }
            Err(Interrupt::Fatal(e)) => {
                self.events.failed(e.to_string());
                self.finish(BuildState::Failed);
            }
        }
        self.state
    }

    fn finish(&mut self, state: BuildState) {
        self.state = state;
        self.request = None;
        self.events.emit(BuildEvent::Busy(false));
    }

    /// Drives the current request to a terminal state.
    ///
    /// Between attempts the engine waits for a provider event if a readiness
    /// channel was configured, otherwise it sleeps. Without events the wait
    /// doubles up to the configured maximum.
    pub async fn run(&mut self) -> BuildState {
        let mut wait = self.config.poll_interval();
        loop {
            let state = self.tick();
            if state != BuildState::Suspended {
                return state;
            }
            let notified = match self.readiness.clone() {
                Some(readiness) => match tokio::time::timeout(wait, readiness.recv()).await {
                    Ok(Ok(event)) => {
                        debug!("Provider event: {}", describe(&event));
                        while readiness.try_recv().is_ok() {}
                        true
                    }
                    Ok(Err(_)) => {
                        debug!("Readiness channel closed, falling back to polling.");
                        self.readiness = None;
                        false
                    }
                    Err(_) => false,
                },
                None => {
                    tokio::time::sleep(wait).await;
                    false
                }
            };
            wait = if notified {
                self.config.poll_interval()
            } else {
                (wait * 2).min(self.config.max_poll_interval())
            };
        }
    }

    /// The last completed build, if any.
    pub fn completed(&self) -> Option<&Arc<CompletedBuild>> {
        self.completed.as_ref()
    }

    pub fn document(&self) -> Option<&Document> {
        self.completed.as_deref().map(CompletedBuild::document)
    }

    fn document_mut(&mut self) -> Option<&mut Document> {
        self.completed
            .as_mut()
            .map(|build| Arc::make_mut(build).document_mut())
    }

    pub fn canvas_count(&self) -> usize {
        self.document().map_or(0, Document::len)
    }

    /// Number of elements in the current canvas.
    pub fn element_count(&self) -> usize {
        self.document()
            .and_then(Document::current)
            .map_or(0, |canvas| canvas.len())
    }

    pub fn current_canvas(&self) -> usize {
        self.document().map_or(0, Document::current_index)
    }

    pub fn current_element(&self) -> usize {
        self.document()
            .and_then(Document::current)
            .map_or(0, |canvas| canvas.current_index())
    }

    pub fn set_current_canvas(&mut self, index: usize) -> bool {
        self.document_mut().is_some_and(|doc| doc.set_current(index))
    }

    pub fn set_current_element(&mut self, index: usize) -> bool {
        self.document_mut()
            .is_some_and(|doc| doc.set_current_element(index))
    }

    pub fn document_name(&self) -> Option<&str> {
        self.document().map(Document::name)
    }

    pub fn canvas_name(&self) -> Option<&str> {
        self.document()
            .and_then(Document::current)
            .map(|canvas| canvas.name())
    }

    pub fn element_name(&self) -> Option<&str> {
        self.document()
            .and_then(Document::current)
            .and_then(|canvas| canvas.current())
            .map(|element| element.name())
    }

    /// Every element of the document with its position and names.
    pub fn elements(&self) -> Vec<ElementEntry> {
        self.document()
            .map(Document::element_entries)
            .unwrap_or_default()
    }

    pub fn source_code(&self, canvas: usize, element: usize) -> Option<&[u8]> {
        self.document()?
            .element(canvas, element)
            .map(|element| element.markup())
    }

    pub fn current_source_code(&self) -> Option<&[u8]> {
        self.source_code(self.current_canvas(), self.current_element())
    }

    /// Names of the components an element uses directly.
    pub fn components(&self, canvas: usize, element: usize) -> Vec<String> {
        self.document()
            .and_then(|doc| doc.element(canvas, element))
            .map(|element| element.components().to_vec())
            .unwrap_or_default()
    }

    pub fn component_source_code(&self, name: &str) -> Option<&[u8]> {
        self.document()?.component(name).map(|c| c.markup())
    }

    pub fn element_path(&self, canvas: usize, element: usize) -> Option<PathBuf> {
        self.completed.as_ref()?.element_path(canvas, element)
    }

    /// Font substitutions decided so far.
    pub fn fonts(&self) -> &FontCache {
        self.fonts.mappings()
    }

    /// Overrides one font substitution. Existing markup is stale afterwards.
    pub fn set_font_mapping(&mut self, requested: impl Into<String>, family: impl Into<String>) {
        self.fonts.set_mapping(requested, family);
        self.events.emit(BuildEvent::RefreshRequested);
    }

    /// Seeds font substitutions, e.g. from saved settings.
    pub fn set_fonts<I, K, V>(&mut self, mappings: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (requested, family) in mappings {
            self.fonts.set_mapping(requested, family);
        }
    }

    pub fn reset_font_mappings(&mut self) {
        self.fonts.reset();
        self.events.emit(BuildEvent::RefreshRequested);
    }

    /// Loads every font file in `dir` and returns the families found.
    /// Problems are reported as warnings.
    pub fn load_font_folder(&mut self, dir: &Path) -> Vec<String> {
        match self.fonts.load_font_dir(dir) {
            Ok(families) => {
                for family in &families {
                    self.events.info(format!("font \"{}\" loaded", family));
                }
                families
            }
            Err(FontCatalogError::FolderNotFound(folder)) => {
                self.events
                    .warning(format!("Folder \"{}\", not found", folder));
                Vec::new()
            }
            Err(e) => {
                self.events.warning(e.to_string());
                Vec::new()
            }
        }
    }

    /// Replaces the generation flags. Returns `true` if the default imports
    /// changed as a result.
    pub fn set_flags(&mut self, flags: GenerationFlags) -> bool {
        let changed = self.config.set_flags(flags);
        if changed {
            debug!("Imports updated for flags {:#x}", flags.bits());
        }
        changed
    }

    pub fn set_import(&mut self, module: impl Into<String>, version: impl Into<String>) {
        self.config.set_import(module, version);
    }

    pub fn remove_import(&mut self, module: &str) -> bool {
        self.config.remove_import(module)
    }

    pub fn set_max_image_dimension(&mut self, dimension: u32) {
        self.config.set_max_image_dimension(dimension);
    }

    /// Uses the JPEG at `path` for images that cannot be resolved.
    pub fn set_broken_placeholder(&mut self, path: &Path) -> Result<(), EngineError> {
        self.placeholder = assets::placeholder_from_file(path)?;
        Ok(())
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    /// Removes generated files from the output and images directories.
    /// Returns the number of files removed.
    pub fn clean_output(&self) -> Result<usize, EngineError> {
        if self.is_busy() {
            return Err(EngineError::BuildInProgress);
        }
        let removed = output::clean_dir(self.config.output_dir())?
            + output::clean_dir(&self.config.images_dir())?;
        debug!("Removed {} generated files", removed);
        Ok(removed)
    }

    /// Writes every element, the components they use and their images into
    /// `folder`.
    pub fn save_all(&self, folder: &Path) -> Result<ExportReport, EngineError> {
        let build = self.completed.as_deref().ok_or(EngineError::NoDocument)?;
        export::save_all(build, folder, &self.events).inspect_err(|e| self.events.failed(e.to_string()))
    }

    /// Like [`Engine::save_all`] but only for the given 0-based
    /// `(canvas, element)` positions.
    pub fn save_selection(
        &self,
        folder: &Path,
        selection: &[(usize, usize)],
    ) -> Result<ExportReport, EngineError> {
        let build = self.completed.as_deref().ok_or(EngineError::NoDocument)?;
        export::save_selection(build, folder, selection, &self.events)
            .inspect_err(|e| self.events.failed(e.to_string()))
    }
}

fn describe(event: &ProviderEvent) -> String {
    match event {
        ProviderEvent::DocumentReady => "document ready".to_string(),
        ProviderEvent::NodeReady { id, .. } => format!("node {} ready", id),
        ProviderEvent::ImageReady { image_ref, .. } => format!("image {} ready", image_ref),
        ProviderEvent::RenderingReady { image_ref, .. } => format!("rendering {} ready", image_ref),
    }
}
