pub mod document;
pub mod fonts;
pub mod ids;
pub mod images;
pub mod names;

pub use document::{Canvas, Component, ComponentKind, Document, Element, ElementEntry, ModelError};
pub use fonts::FontCache;
pub use ids::{ComponentId, ImageRef};
pub use images::{ImageContextIndex, ImageFileRecord, ImageFileTable};
