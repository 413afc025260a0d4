//! # designmark-core
//!
//! Converts design-tool documents into declarative markup files.
//!
//! This crate provides the conversion engine:
//! - **description**: Parsing of the design document JSON
//! - **orchestrator**: The suspend/retry build state machine and the [`Engine`]
//! - **assets**: Image resolution, embedding and export copying
//! - **fonts**: Font substitution with exact, platform and fuzzy matching
//! - **export**: Writing a finished build into a chosen folder
//! - **error**: Error types for the engine
//!
//! ## Design Principle
//!
//! The engine never blocks on the network. All data comes from a
//! [`DesignProvider`](designmark_traits::DesignProvider) that answers from its
//! cache or reports a pending fetch; a pending fetch aborts the current attempt
//! and a later attempt starts over from the root of the description.

// Re-export foundation crates
pub use designmark_traits as traits;
pub use designmark_types as types;

pub mod assets;
pub mod builder;
pub mod config;
pub mod description;
pub mod error;
pub mod events;
pub mod export;
pub mod fonts;
pub mod orchestrator;
pub mod output;

mod generator;
mod markup;
mod walk;

pub use builder::EngineBuilder;
pub use config::{ElementFilter, EngineConfig, GenerationFlags, ImportVersioning};
pub use description::{Description, pretty};
pub use error::EngineError;
pub use events::{BuildEvent, EventSink};
pub use export::ExportReport;
pub use orchestrator::{BuildState, CancelHandle, CompletedBuild, Engine};
pub use walk::FILTERED_OUT;

// Re-export commonly used types from foundation crates
pub use designmark_traits::{
    DesignProvider, FontCatalog, ImageData, ImageFormat, MemoryProvider, PendingFetch,
    ProviderEvent, StaticFontCatalog,
};
pub use designmark_types::names::make_file_name as valid_file_name;
pub use designmark_types::{Document, ElementEntry};
