//! # designmark
//!
//! Converts design-tool documents into declarative markup files plus the
//! image assets they reference.
//!
//! ```no_run
//! use designmark::{ElementFilter, EngineBuilder, SnapshotProvider};
//! use std::sync::Arc;
//!
//! # async fn convert() -> Result<(), designmark::EngineError> {
//! let provider = Arc::new(SnapshotProvider::new("snapshot"));
//! let description = provider.document()?;
//! let mut engine = EngineBuilder::new()
//!     .with_provider(provider)
//!     .with_output_dir("out")
//!     .build()?;
//! engine.request_build(&description, ElementFilter::new())?;
//! engine.run().await;
//! engine.save_all("export".as_ref())?;
//! # Ok(())
//! # }
//! ```

pub use designmark_core::*;

pub use designmark_resource::SnapshotProvider;

#[cfg(feature = "system-fonts")]
pub use designmark_resource::SystemFontCatalog;
