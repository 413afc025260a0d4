//! Defines the error types for every engine operation.

use designmark_traits::{PendingFetch, ProviderError};
use designmark_types::ModelError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error enum for all high-level operations within the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Description parse error: {0}")]
    Parse(String),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid document structure: {0}")]
    Structure(String),
    #[error("Component '{component}' used by '{owner}' was never generated")]
    MissingComponent { owner: String, component: String },
    #[error("Generated markup for '{0}' is empty")]
    EmptyMarkup(String),
    #[error("Components {first} and {second} both generate '{name}' with different content")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },
    #[error("Invalid imports version '{version}' for {module}")]
    InvalidImportVersion { module: String, version: String },
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Document model error: {0}")]
    Model(#[from] ModelError),
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Cannot replace {0}: a different file with that name exists")]
    CopyConflict(PathBuf),
    #[error("Invalid filename: {0} (not found)")]
    SourceMissing(PathBuf),
    #[error("A build is already in progress")]
    BuildInProgress,
    #[error("No document has been built yet")]
    NoDocument,
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why a build attempt stopped before completing.
///
/// The first interrupt raised anywhere in the tree walk unwinds the whole
/// attempt through `?`, so at most one terminal error exists per attempt.
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// Data is being fetched; retry the whole walk later.
    Suspend(PendingFetch),
    /// The caller asked to stop.
    Cancelled,
    Fatal(EngineError),
}

pub(crate) type Step<T> = Result<T, Interrupt>;

impl From<EngineError> for Interrupt {
    fn from(e: EngineError) -> Self {
        Interrupt::Fatal(e)
    }
}

impl From<ProviderError> for Interrupt {
    fn from(e: ProviderError) -> Self {
        Interrupt::Fatal(EngineError::Provider(e))
    }
}

impl From<ModelError> for Interrupt {
    fn from(e: ModelError) -> Self {
        Interrupt::Fatal(EngineError::Model(e))
    }
}
