//! Maps font families named in the design to families installed locally.

use crate::config::GenerationFlags;
use designmark_traits::{FontCatalog, FontCatalogError};
use designmark_types::FontCache;
use log::debug;
use std::path::Path;

/// The family in `families` closest to `requested`; ties go to the earliest.
pub fn nearest_family<'a>(requested: &str, families: &'a [String]) -> Option<&'a str> {
    let mut best: Option<(usize, &str)> = None;
    for family in families {
        let distance = strsim::levenshtein(family, requested);
        if best.is_none_or(|(min, _)| distance < min) {
            best = Some((distance, family));
        }
    }
    best.map(|(_, family)| family)
}

/// Outcome of a font lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontResolution {
    pub family: String,
    /// `true` when this lookup computed a new cache entry.
    pub fresh: bool,
}

/// Font lookups backed by a [`FontCatalog`] and a cache of earlier answers.
///
/// Cached mappings outlive individual builds: they are only replaced through
/// [`FontResolver::set_mapping`] or dropped through [`FontResolver::reset`].
#[derive(Debug)]
pub struct FontResolver {
    catalog: Box<dyn FontCatalog>,
    cache: FontCache,
}

impl FontResolver {
    pub fn new(catalog: Box<dyn FontCatalog>) -> Self {
        Self {
            catalog,
            cache: FontCache::new(),
        }
    }

    pub fn resolve(&mut self, requested: &str, flags: GenerationFlags) -> FontResolution {
        if flags.contains(GenerationFlags::KEEP_FONT_NAMES) {
            return FontResolution {
                family: requested.to_string(),
                fresh: false,
            };
        }
        if let Some(family) = self.cache.get(requested) {
            return FontResolution {
                family: family.to_string(),
                fresh: false,
            };
        }

        let family = if flags.contains(GenerationFlags::FUZZY_FONT_FALLBACK) {
            let families = self.catalog.families();
            if families.iter().any(|f| f == requested) {
                requested.to_string()
            } else {
                nearest_family(requested, &families)
                    .unwrap_or(requested)
                    .to_string()
            }
        } else {
            self.catalog
                .closest_family(requested)
                .unwrap_or_else(|| requested.to_string())
        };

        debug!("Font '{}' resolved to '{}' via {}", requested, family, self.catalog.name());
        self.cache.insert(requested, family.clone());
        FontResolution {
            family,
            fresh: true,
        }
    }

    pub fn mappings(&self) -> &FontCache {
        &self.cache
    }

    pub fn set_mapping(&mut self, requested: impl Into<String>, family: impl Into<String>) {
        self.cache.insert(requested, family);
    }

    pub fn reset(&mut self) {
        self.cache.clear();
    }

    /// Loads every font in `dir` into the catalog.
    pub fn load_font_dir(&mut self, dir: &Path) -> Result<Vec<String>, FontCatalogError> {
        self.catalog.add_font_dir(dir)
    }

    pub fn catalog(&self) -> &dyn FontCatalog {
        self.catalog.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use designmark_traits::StaticFontCatalog;

    fn resolver(families: &[&str]) -> FontResolver {
        FontResolver::new(Box::new(StaticFontCatalog::new(families.iter().copied())))
    }

    #[test]
    fn test_nearest_family_by_edit_distance() {
        let families = ["Arial".to_string(), "Courier New".to_string(), "Arimo".to_string()];
        assert_eq!(nearest_family("Arial", &families), Some("Arial"));
        assert_eq!(nearest_family("Ariel", &families), Some("Arial"));
        assert_eq!(nearest_family("Courier", &families), Some("Courier New"));
        assert_eq!(nearest_family("Arimo", &[]), None);
    }

    #[test]
    fn test_nearest_family_prefers_first_on_tie() {
        let families: Vec<String> = ["Helvetica", "Arial", "Courier"].iter().map(|s| s.to_string()).collect();
        assert_eq!(nearest_family("Ariel", &families), Some("Arial"));
        let tied: Vec<String> = ["Abc", "Abd"].iter().map(|s| s.to_string()).collect();
        assert_eq!(nearest_family("Abx", &tied), Some("Abc"));
        assert_eq!(nearest_family("Abx", &[]), None);
    }

    #[test]
    fn test_fuzzy_fallback_resolves_and_caches() {
        let mut fonts = resolver(&["Helvetica", "Arial", "Courier"]);
        let first = fonts.resolve("Ariel", GenerationFlags::FUZZY_FONT_FALLBACK);
        assert_eq!(first, FontResolution { family: "Arial".to_string(), fresh: true });
        let second = fonts.resolve("Ariel", GenerationFlags::FUZZY_FONT_FALLBACK);
        assert!(!second.fresh);
        assert_eq!(fonts.mappings().get("Ariel"), Some("Arial"));
    }

    #[test]
    fn test_fuzzy_fallback_without_families_keeps_name() {
        let mut fonts = resolver(&[]);
        let resolved = fonts.resolve("Inter", GenerationFlags::FUZZY_FONT_FALLBACK);
        assert_eq!(resolved.family, "Inter");
    }

    #[test]
    fn test_platform_substitution_without_fuzzy_flag() {
        let mut fonts = resolver(&["DejaVu Sans", "Arial"]);
        assert_eq!(fonts.resolve("arial", GenerationFlags::empty()).family, "Arial");
        assert_eq!(fonts.resolve("Ariel", GenerationFlags::empty()).family, "DejaVu Sans");
    }

    #[test]
    fn test_keep_font_names_bypasses_cache() {
        let mut fonts = resolver(&["Arial"]);
        fonts.set_mapping("Roboto", "Arial");
        let resolved = fonts.resolve("Roboto", GenerationFlags::KEEP_FONT_NAMES);
        assert_eq!(resolved.family, "Roboto");
        assert_eq!(fonts.resolve("Roboto", GenerationFlags::empty()).family, "Arial");
    }

    #[test]
    fn test_reset_clears_mappings() {
        let mut fonts = resolver(&["Arial"]);
        fonts.resolve("Foo", GenerationFlags::empty());
        assert_eq!(fonts.mappings().len(), 1);
        fonts.reset();
        assert!(fonts.mappings().is_empty());
    }
}
