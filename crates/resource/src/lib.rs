//! Platform-specific providers for the designmark conversion engine.
//!
//! This crate provides implementations of the contracts in designmark-traits
//! that need the local filesystem or the host's font configuration.
//!
//! ## Available Providers
//!
//! - [`SnapshotProvider`]: Serves a design document captured to a local directory
//! - [`SystemFontCatalog`]: Installed font families via `fontdb` (feature: `system-fonts`)
//!
//! ## Re-exports
//!
//! For convenience, we also re-export the in-memory implementations from designmark-traits:
//! - [`MemoryProvider`]: Pre-populated provider with an explicit fetch queue
//! - [`StaticFontCatalog`]: Fixed list of families

mod snapshot;

#[cfg(feature = "system-fonts")]
mod system_fonts;

pub use snapshot::SnapshotProvider;

#[cfg(feature = "system-fonts")]
pub use system_fonts::SystemFontCatalog;

// Re-export the in-memory implementations from designmark-traits for convenience
pub use designmark_traits::{MemoryProvider, StaticFontCatalog};
