//! Font catalog backed by `fontdb`.

use designmark_traits::{FontCatalog, FontCatalogError};
use log::{debug, info};
use std::collections::BTreeSet;
use std::path::Path;

/// Installed font families discovered through `fontdb`.
#[derive(Debug, Default)]
pub struct SystemFontCatalog {
    db: fontdb::Database,
}

impl SystemFontCatalog {
    /// Creates an empty catalog. Use [`SystemFontCatalog::with_system_fonts`]
    /// to scan the host.
    pub fn new() -> Self {
        Self {
            db: fontdb::Database::new(),
        }
    }

    /// Scans the host system for installed fonts.
    pub fn with_system_fonts(mut self, enable: bool) -> Self {
        if enable {
            self.db.load_system_fonts();
            info!("Loaded {} system font faces.", self.db.len());
        }
        self
    }

    /// Adds a single font from memory (used for bundled fallbacks).
    pub fn add_font_data(&mut self, data: Vec<u8>) {
        self.db.load_font_data(data);
    }
}

impl FontCatalog for SystemFontCatalog {
    fn families(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut families = Vec::new();
        for face in self.db.faces() {
            if let Some((family, _)) = face.families.first()
                && seen.insert(family.clone())
            {
                families.push(family.clone());
            }
        }
        families
    }

    fn closest_family(&self, requested: &str) -> Option<String> {
        let query = fontdb::Query {
            families: &[fontdb::Family::Name(requested), fontdb::Family::SansSerif],
            weight: fontdb::Weight::NORMAL,
            stretch: fontdb::Stretch::Normal,
            style: fontdb::Style::Normal,
        };
        let id = self.db.query(&query)?;
        let face = self.db.face(id)?;
        face.families.first().map(|(family, _)| family.clone())
    }

    fn add_font_dir(&mut self, dir: &Path) -> Result<Vec<String>, FontCatalogError> {
        if !dir.is_dir() {
            return Err(FontCatalogError::FolderNotFound(dir.display().to_string()));
        }
        let before: BTreeSet<String> = self.families().into_iter().collect();
        self.db.load_fonts_dir(dir);
        let added: Vec<String> = self
            .families()
            .into_iter()
            .filter(|family| !before.contains(family))
            .collect();
        debug!("Font folder {} added {} families.", dir.display(), added.len());
        Ok(added)
    }

    fn name(&self) -> &'static str {
        "SystemFontCatalog"
    }
}
