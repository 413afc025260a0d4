pub mod font;
pub mod provider;

pub use font::{FontCatalog, FontCatalogError, StaticFontCatalog};
pub use provider::{
    DesignProvider, Fetch, ImageData, ImageFormat, MemoryProvider, PendingFetch, ProviderError,
    ProviderEvent, SharedBytes,
};
