//! Build configuration: generation flags, imports, the file header and the
//! element filter.

use crate::error::EngineError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_IMAGE_DIMENSION: u32 = 1024;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_MAX_POLL_INTERVAL: Duration = Duration::from_secs(8);

const GRAPHICAL_EFFECTS: &str = "Qt5Compat.GraphicalEffects";
const ACCESS_IMPORT: &str = "DesignmarkInterface";

/// Bit set of options that change what the generator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GenerationFlags(u32);

impl GenerationFlags {
    /// Inline images as base64 data URIs instead of writing image files.
    pub const EMBED_IMAGES: Self = Self(0x1);
    /// Emit font families exactly as the design names them.
    pub const KEEP_FONT_NAMES: Self = Self(0x2);
    /// Resolve unknown fonts to the installed family with the smallest edit distance.
    pub const FUZZY_FONT_FALLBACK: Self = Self(0x4);
    /// Import the accessor interface module in every artifact.
    pub const GENERATE_ACCESS: Self = Self(0x8);
    /// Restricted module target: no graphical-effects import.
    pub const MODULE_MODE: Self = Self(0x10);
    /// Report phase timings as info events.
    pub const TIMED: Self = Self(0x20);

    const ALL: u32 = 0x3f;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Unknown bits are dropped.
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self(bits & Self::ALL)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn set(&mut self, other: Self, enabled: bool) {
        if enabled {
            self.insert(other);
        } else {
            self.remove(other);
        }
    }
}

impl BitOr for GenerationFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for GenerationFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// How import versions are checked when the header is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImportVersioning {
    /// Versions are optional and emitted verbatim.
    #[default]
    Lenient,
    /// Every import must carry a dotted numeric version.
    Strict,
}

/// Settings for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub(crate) output_dir: PathBuf,
    pub(crate) flags: GenerationFlags,
    pub(crate) imports: BTreeMap<String, String>,
    pub(crate) versioning: ImportVersioning,
    pub(crate) max_image_dimension: u32,
    pub(crate) extension: String,
    pub(crate) poll_interval: Duration,
    pub(crate) max_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut config = Self {
            output_dir: PathBuf::from("designmark-out"),
            flags: GenerationFlags::empty(),
            imports: BTreeMap::new(),
            versioning: ImportVersioning::default(),
            max_image_dimension: DEFAULT_IMAGE_DIMENSION,
            extension: "qml".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_interval: DEFAULT_MAX_POLL_INTERVAL,
        };
        config.imports = default_imports(config.flags);
        config
    }
}

/// The import set a fresh configuration starts with.
pub fn default_imports(flags: GenerationFlags) -> BTreeMap<String, String> {
    let mut imports = BTreeMap::new();
    imports.insert("QtQuick".to_string(), String::new());
    if !flags.contains(GenerationFlags::MODULE_MODE) {
        imports.insert(GRAPHICAL_EFFECTS.to_string(), String::new());
    }
    imports.insert("QtQuick.Shapes".to_string(), String::new());
    imports
}

impl EngineConfig {
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Directory that referenced images are written to.
    pub fn images_dir(&self) -> PathBuf {
        self.output_dir.join("images")
    }

    pub fn flags(&self) -> GenerationFlags {
        self.flags
    }

    /// Replaces the flags and re-syncs the default imports they affect.
    /// Returns `true` when the import set changed.
    pub fn set_flags(&mut self, flags: GenerationFlags) -> bool {
        self.flags = flags;
        self.sync_default_imports()
    }

    fn sync_default_imports(&mut self) -> bool {
        let defaults = default_imports(self.flags);
        let wanted = defaults.contains_key(GRAPHICAL_EFFECTS);
        let present = self.imports.contains_key(GRAPHICAL_EFFECTS);
        if wanted && !present {
            self.imports.insert(GRAPHICAL_EFFECTS.to_string(), String::new());
            true
        } else if !wanted && present {
            self.imports.remove(GRAPHICAL_EFFECTS);
            true
        } else {
            false
        }
    }

    pub fn imports(&self) -> &BTreeMap<String, String> {
        &self.imports
    }

    pub fn set_import(&mut self, module: impl Into<String>, version: impl Into<String>) {
        self.imports.insert(module.into(), version.into());
    }

    pub fn remove_import(&mut self, module: &str) -> bool {
        self.imports.remove(module).is_some()
    }

    pub fn versioning(&self) -> ImportVersioning {
        self.versioning
    }

    pub fn max_image_dimension(&self) -> u32 {
        self.max_image_dimension
    }

    /// Zero restores the default.
    pub fn set_max_image_dimension(&mut self, dimension: u32) {
        self.max_image_dimension = if dimension == 0 {
            DEFAULT_IMAGE_DIMENSION
        } else {
            dimension
        };
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn max_poll_interval(&self) -> Duration {
        self.max_poll_interval
    }

    /// Builds the text every generated file starts with: the generator line,
    /// a blank line, then one import per configured module.
    pub fn header(&self) -> Result<String, EngineError> {
        let mut header = format!("//Generated by designmark {}\n\n", env!("CARGO_PKG_VERSION"));
        for (module, version) in &self.imports {
            if self.versioning == ImportVersioning::Strict && !is_numeric_version(version) {
                return Err(EngineError::InvalidImportVersion {
                    module: module.clone(),
                    version: version.clone(),
                });
            }
            if version.is_empty() {
                header.push_str(&format!("import {}\n", module));
            } else {
                header.push_str(&format!("import {} {}\n", module, version));
            }
        }
        if self.flags.contains(GenerationFlags::GENERATE_ACCESS)
            && !self.flags.contains(GenerationFlags::MODULE_MODE)
        {
            header.push_str(&format!("import {}\n", ACCESS_IMPORT));
        }
        Ok(header)
    }
}

fn is_numeric_version(version: &str) -> bool {
    !version.is_empty()
        && version
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

/// Restricts which elements get real markup.
///
/// Positions are 1-based: the first canvas is 1 and the first element of each
/// canvas is 1. An empty filter selects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementFilter {
    selection: BTreeMap<usize, BTreeSet<usize>>,
}

impl ElementFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, canvas: usize, element: usize) {
        self.selection.entry(canvas).or_default().insert(element);
    }

    pub fn with(mut self, canvas: usize, element: usize) -> Self {
        self.insert(canvas, element);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.selection.is_empty()
    }

    pub fn includes(&self, canvas: usize, element: usize) -> bool {
        self.is_empty()
            || self
                .selection
                .get(&canvas)
                .is_some_and(|elements| elements.contains(&element))
    }
}

impl fmt::Display for ElementFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .selection
            .iter()
            .flat_map(|(c, elements)| elements.iter().map(move |e| format!("{}:{}", c, e)))
            .collect();
        write!(f, "{}", pairs.join(","))
    }
}

/// Parses `canvas:element` pairs separated by commas, e.g. `1:2,3:1`.
impl FromStr for ElementFilter {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut filter = ElementFilter::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let parsed = pair
                .split_once(':')
                .and_then(|(c, e)| Some((c.trim().parse::<usize>().ok()?, e.trim().parse::<usize>().ok()?)));
            match parsed {
                Some((canvas, element)) if canvas > 0 && element > 0 => filter.insert(canvas, element),
                _ => {
                    return Err(EngineError::Parse(format!(
                        "invalid filter entry '{}', expected <canvas>:<element>",
                        pair
                    )));
                }
            }
        }
        Ok(filter)
    }
}
