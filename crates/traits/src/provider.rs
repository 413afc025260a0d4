//! DesignProvider trait for abstracting access to the remote design service.
//!
//! The engine never talks to the network itself. It asks a provider for node
//! bodies, image bytes and pre-rendered exports; the provider either answers
//! from its cache straight away or starts a fetch in the background and
//! answers [`Fetch::Pending`]. When such a fetch completes the provider sends a
//! [`ProviderEvent`] so the engine knows a retry may now get further.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Failed to fetch '{key}': {message}")]
    FetchFailed { key: String, message: String },

    #[error("Invalid resource format: {0}")]
    InvalidFormat(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl From<std::io::Error> for ProviderError {
    fn from(err: std::io::Error) -> Self {
        ProviderError::Unavailable(err.to_string())
    }
}

/// Shared byte payload (reference-counted).
pub type SharedBytes = Arc<Vec<u8>>;

/// Encoding of image bytes delivered by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// File extension used when the image is written to disk.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// Subtype used in `data:image/<subtype>;base64,` URIs.
    pub fn mime_subtype(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
        }
    }

    /// Guesses the format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }
}

/// Image bytes together with their encoding.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: SharedBytes,
    pub format: ImageFormat,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>, format: ImageFormat) -> Self {
        Self {
            bytes: Arc::new(bytes),
            format,
        }
    }
}

impl Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("len", &self.bytes.len())
            .field("format", &self.format)
            .finish()
    }
}

/// Outcome of a non-blocking fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetch<T> {
    /// The data was cached and is returned immediately.
    Ready(T),
    /// The data is being fetched; a [`ProviderEvent`] follows on completion.
    Pending,
}

impl<T> Fetch<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Fetch::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Fetch::Ready(value) => Some(value),
            Fetch::Pending => None,
        }
    }
}

/// Identifies an outstanding fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PendingFetch {
    Node(String),
    Image(String),
    Rendering(String),
}

impl fmt::Display for PendingFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingFetch::Node(id) => write!(f, "node {}", id),
            PendingFetch::Image(image_ref) => write!(f, "image {}", image_ref),
            PendingFetch::Rendering(image_ref) => write!(f, "rendering {}", image_ref),
        }
    }
}

/// Readiness notification emitted once per completed asynchronous fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    DocumentReady,
    NodeReady { id: String, bytes: SharedBytes },
    ImageReady { image_ref: String, image: ImageData },
    RenderingReady { image_ref: String, image: ImageData },
}

/// A trait for the data source behind the design service.
///
/// None of the methods may block waiting for the network: a cache miss
/// starts a fetch and returns [`Fetch::Pending`].
///
/// # Implementations
///
/// - `MemoryProvider`: pre-populated backing store with an explicit pending queue
/// - `SnapshotProvider` (designmark-resource): reads an on-disk snapshot
pub trait DesignProvider: Send + Sync + Debug {
    /// Returns the raw JSON body of a node by id.
    fn fetch_node(&self, id: &str) -> Result<Fetch<SharedBytes>, ProviderError>;

    /// Returns the bytes of an image fill, downscaled so that neither edge
    /// exceeds `max_dimension`.
    fn fetch_image(&self, image_ref: &str, max_dimension: u32)
    -> Result<Fetch<ImageData>, ProviderError>;

    /// Returns a pre-rendered export of a node rather than a raw asset.
    fn fetch_rendering(&self, image_ref: &str) -> Result<Fetch<ImageData>, ProviderError>;

    /// `true` once the top-level document description is available.
    fn is_ready(&self) -> bool;

    /// Returns a human-readable name for this provider (for logging/debugging).
    fn name(&self) -> &'static str;
}

#[derive(Debug, Default)]
struct MemoryState {
    ready: bool,
    nodes: HashMap<String, SharedBytes>,
    images: HashMap<String, ImageData>,
    renderings: HashMap<String, ImageData>,
    node_cache: HashMap<String, SharedBytes>,
    image_cache: HashMap<String, ImageData>,
    rendering_cache: HashMap<String, ImageData>,
    pending: Vec<PendingFetch>,
    failed: HashMap<PendingFetch, String>,
    requests: usize,
}

impl MemoryState {
    fn queue(&mut self, key: PendingFetch) {
        if !self.pending.contains(&key) {
            self.requests += 1;
            self.pending.push(key);
        }
    }

    fn check_failed(&self, key: &PendingFetch) -> Result<(), ProviderError> {
        match self.failed.get(key) {
            Some(message) => Err(ProviderError::NotFound(message.clone())),
            None => Ok(()),
        }
    }
}

/// An in-memory provider with an explicit fetch queue.
///
/// Data is split into a backing store (what the remote service knows) and a
/// cache (what has been fetched). Cache misses are queued and only complete
/// when [`MemoryProvider::deliver_pending`] or [`MemoryProvider::deliver_one`]
/// is called, which makes every suspend/retry cycle observable.
pub struct MemoryProvider {
    state: Mutex<MemoryState>,
    notifier: Option<async_channel::Sender<ProviderEvent>>,
}

impl Debug for MemoryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryProvider")
            .field("pending", &self.pending().len())
            .finish()
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// Creates a provider whose document is already available.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                ready: true,
                ..Default::default()
            }),
            notifier: None,
        }
    }

    /// Sends a [`ProviderEvent`] on `sender` for every delivered fetch.
    pub fn with_notifier(mut self, sender: async_channel::Sender<ProviderEvent>) -> Self {
        self.notifier = Some(sender);
        self
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, ProviderError> {
        self.state
            .lock()
            .map_err(|_| ProviderError::Unavailable("provider state lock poisoned".to_string()))
    }

    fn notify(&self, event: ProviderEvent) {
        if let Some(sender) = &self.notifier {
            // A closed channel only means nobody is listening any more.
            let _ = sender.try_send(event);
        }
    }

    /// Marks the top-level document as (un)available.
    pub fn set_ready(&self, ready: bool) -> Result<(), ProviderError> {
        self.lock()?.ready = ready;
        if ready {
            self.notify(ProviderEvent::DocumentReady);
        }
        Ok(())
    }

    /// Adds a node body to the backing store.
    pub fn insert_node(&self, id: impl Into<String>, bytes: Vec<u8>) -> Result<(), ProviderError> {
        self.lock()?.nodes.insert(id.into(), Arc::new(bytes));
        Ok(())
    }

    /// Adds an image to the backing store.
    pub fn insert_image(&self, image_ref: impl Into<String>, image: ImageData) -> Result<(), ProviderError> {
        self.lock()?.images.insert(image_ref.into(), image);
        Ok(())
    }

    /// Adds a pre-rendered export to the backing store.
    pub fn insert_rendering(
        &self,
        image_ref: impl Into<String>,
        image: ImageData,
    ) -> Result<(), ProviderError> {
        self.lock()?.renderings.insert(image_ref.into(), image);
        Ok(())
    }

    /// Copies the whole backing store into the cache, so every fetch hits.
    pub fn cache_all(&self) -> Result<(), ProviderError> {
        let mut state = self.lock()?;
        let MemoryState {
            nodes,
            images,
            renderings,
            node_cache,
            image_cache,
            rendering_cache,
            ..
        } = &mut *state;
        node_cache.extend(nodes.iter().map(|(k, v)| (k.clone(), v.clone())));
        image_cache.extend(images.iter().map(|(k, v)| (k.clone(), v.clone())));
        rendering_cache.extend(renderings.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    /// Outstanding fetches in request order.
    pub fn pending(&self) -> Vec<PendingFetch> {
        self.state
            .lock()
            .map(|s| s.pending.clone())
            .unwrap_or_default()
    }

    /// Number of asynchronous fetches started so far.
    pub fn fetch_requests(&self) -> usize {
        self.state.lock().map(|s| s.requests).unwrap_or(0)
    }

    /// Completes the oldest outstanding fetch. Returns `false` when nothing
    /// was pending.
    pub fn deliver_one(&self) -> Result<bool, ProviderError> {
        let event = {
            let mut state = self.lock()?;
            if state.pending.is_empty() {
                return Ok(false);
            }
            let key = state.pending.remove(0);
            Self::complete(&mut state, key)
        };
        if let Some(event) = event {
            self.notify(event);
        }
        Ok(true)
    }

    /// Completes every outstanding fetch. Keys missing from the backing store
    /// fail: later fetches of them return [`ProviderError::NotFound`].
    pub fn deliver_pending(&self) -> Result<usize, ProviderError> {
        let mut delivered = 0;
        while self.deliver_one()? {
            delivered += 1;
        }
        Ok(delivered)
    }

    fn complete(state: &mut MemoryState, key: PendingFetch) -> Option<ProviderEvent> {
        match &key {
            PendingFetch::Node(id) => match state.nodes.get(id).cloned() {
                Some(bytes) => {
                    state.node_cache.insert(id.clone(), bytes.clone());
                    Some(ProviderEvent::NodeReady { id: id.clone(), bytes })
                }
                None => {
                    state.failed.insert(key.clone(), format!("node {}", id));
                    None
                }
            },
            PendingFetch::Image(image_ref) => match state.images.get(image_ref).cloned() {
                Some(image) => {
                    state.image_cache.insert(image_ref.clone(), image.clone());
                    Some(ProviderEvent::ImageReady {
                        image_ref: image_ref.clone(),
                        image,
                    })
                }
                None => {
                    state.failed.insert(key.clone(), format!("image {}", image_ref));
                    None
                }
            },
            PendingFetch::Rendering(image_ref) => match state.renderings.get(image_ref).cloned() {
                Some(image) => {
                    state.rendering_cache.insert(image_ref.clone(), image.clone());
                    Some(ProviderEvent::RenderingReady {
                        image_ref: image_ref.clone(),
                        image,
                    })
                }
                None => {
                    state.failed.insert(key.clone(), format!("rendering {}", image_ref));
                    None
                }
            },
        }
    }
}

impl DesignProvider for MemoryProvider {
    fn fetch_node(&self, id: &str) -> Result<Fetch<SharedBytes>, ProviderError> {
        let mut state = self.lock()?;
        let key = PendingFetch::Node(id.to_string());
        state.check_failed(&key)?;
        if let Some(bytes) = state.node_cache.get(id) {
            return Ok(Fetch::Ready(bytes.clone()));
        }
        state.queue(key);
        Ok(Fetch::Pending)
    }

    fn fetch_image(
        &self,
        image_ref: &str,
        _max_dimension: u32,
    ) -> Result<Fetch<ImageData>, ProviderError> {
        let mut state = self.lock()?;
        let key = PendingFetch::Image(image_ref.to_string());
        state.check_failed(&key)?;
        if let Some(image) = state.image_cache.get(image_ref) {
            return Ok(Fetch::Ready(image.clone()));
        }
        state.queue(key);
        Ok(Fetch::Pending)
    }

    fn fetch_rendering(&self, image_ref: &str) -> Result<Fetch<ImageData>, ProviderError> {
        let mut state = self.lock()?;
        let key = PendingFetch::Rendering(image_ref.to_string());
        state.check_failed(&key)?;
        if let Some(image) = state.rendering_cache.get(image_ref) {
            return Ok(Fetch::Ready(image.clone()));
        }
        state.queue(key);
        Ok(Fetch::Pending)
    }

    fn is_ready(&self) -> bool {
        self.state.lock().map(|s| s.ready).unwrap_or(false)
    }

    fn name(&self) -> &'static str {
        "MemoryProvider"
    }
}
