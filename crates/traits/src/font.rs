//! FontCatalog trait for enumerating the font families available locally.

use std::fmt::Debug;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FontCatalogError {
    #[error("Font folder not found: {0}")]
    FolderNotFound(String),

    #[error("Catalog '{0}' cannot load font folders")]
    Unsupported(&'static str),
}

/// A source of installed font families.
pub trait FontCatalog: Send + Sync + Debug {
    /// Installed family names in enumeration order, without duplicates.
    fn families(&self) -> Vec<String>;

    /// The family the platform would substitute for `requested`, if any.
    fn closest_family(&self, requested: &str) -> Option<String>;

    /// Loads every font file in `dir`, returning the newly available families.
    fn add_font_dir(&mut self, dir: &Path) -> Result<Vec<String>, FontCatalogError> {
        let _ = dir;
        Err(FontCatalogError::Unsupported(self.name()))
    }

    fn name(&self) -> &'static str;
}

/// A fixed list of families. Substitution picks a case-insensitive exact
/// match, else the first family as the platform default.
#[derive(Debug, Clone, Default)]
pub struct StaticFontCatalog {
    families: Vec<String>,
}

impl StaticFontCatalog {
    pub fn new<I, S>(families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for family in families {
            let family = family.into();
            if !list.contains(&family) {
                list.push(family);
            }
        }
        Self { families: list }
    }
}

impl FontCatalog for StaticFontCatalog {
    fn families(&self) -> Vec<String> {
        self.families.clone()
    }

    fn closest_family(&self, requested: &str) -> Option<String> {
        self.families
            .iter()
            .find(|f| f.eq_ignore_ascii_case(requested))
            .or_else(|| self.families.first())
            .cloned()
    }

    fn name(&self) -> &'static str {
        "StaticFontCatalog"
    }
}
