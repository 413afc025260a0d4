//! Command line front end: converts a design snapshot directory into markup.
//!
//! ```bash
//! # Generate into ./out and copy the result into ./export
//! designmark build snapshot/ --output out --export export
//!
//! # Only the second element of the first canvas, images inlined
//! designmark build snapshot/ --filter 1:2 --flag embed-images
//!
//! # Show a snapshot's description re-indented
//! designmark pretty snapshot/document.json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use designmark::{
    BuildState, ElementFilter, EngineBuilder, EngineError, GenerationFlags, SnapshotProvider,
};
use log::info;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Parser)]
#[command(name = "designmark")]
#[command(about = "Converts design documents into declarative markup files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate markup for a snapshot directory
    Build(BuildArgs),

    /// Print a description file re-indented
    Pretty {
        /// Description JSON file
        file: PathBuf,
    },

    /// Remove generated files from an output directory
    Clean {
        #[arg(short, long, default_value = "designmark-out")]
        output: PathBuf,
    },
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Snapshot directory containing document.json
    snapshot: PathBuf,

    /// Directory generated files are written to
    #[arg(short, long, default_value = "designmark-out")]
    output: PathBuf,

    /// Generation flags (repeatable)
    #[arg(long = "flag", value_enum)]
    flags: Vec<Flag>,

    /// Only generate these elements, as 1-based "canvas:element" pairs
    #[arg(long)]
    filter: Option<ElementFilter>,

    /// Extra imports as MODULE or MODULE=VERSION (repeatable)
    #[arg(long = "import")]
    imports: Vec<String>,

    /// Require dotted numeric versions on every import
    #[arg(long)]
    strict_imports: bool,

    /// Longest image edge requested from the provider
    #[arg(long, default_value_t = 1024)]
    max_image_dimension: u32,

    /// Additional font directories (repeatable)
    #[arg(long = "font-dir")]
    font_dirs: Vec<PathBuf>,

    /// JSON object of font substitutions to start from
    #[arg(long)]
    font_map: Option<PathBuf>,

    /// Write the font substitutions used by this build as JSON
    #[arg(long)]
    save_font_map: Option<PathBuf>,

    /// JPEG shown for images that cannot be resolved
    #[arg(long)]
    broken_image: Option<PathBuf>,

    /// Copy the generated files into this folder
    #[arg(long)]
    export: Option<PathBuf>,

    /// Remove files left in the output directory before building
    #[arg(long)]
    clean: bool,

    /// Print the generated elements
    #[arg(long)]
    list: bool,

    /// Do not scan the host for installed fonts
    #[arg(long)]
    no_system_fonts: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Flag {
    EmbedImages,
    KeepFontNames,
    FuzzyFonts,
    GenerateAccess,
    ModuleMode,
    Timed,
}

impl Flag {
    fn bits(self) -> GenerationFlags {
        match self {
            Flag::EmbedImages => GenerationFlags::EMBED_IMAGES,
            Flag::KeepFontNames => GenerationFlags::KEEP_FONT_NAMES,
            Flag::FuzzyFonts => GenerationFlags::FUZZY_FONT_FALLBACK,
            Flag::GenerateAccess => GenerationFlags::GENERATE_ACCESS,
            Flag::ModuleMode => GenerationFlags::MODULE_MODE,
            Flag::Timed => GenerationFlags::TIMED,
        }
    }
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid font map: {0}")]
    FontMap(#[from] serde_json::Error),
    #[error("Build did not complete (state: {0:?})")]
    Incomplete(BuildState),
}

fn read(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Build(args) => build(args).await,
        Commands::Pretty { file } => {
            println!("{}", designmark::pretty(&read(&file)?));
            Ok(())
        }
        Commands::Clean { output } => {
            let removed = designmark::output::clean_dir(&output)?
                + designmark::output::clean_dir(&output.join("images"))?;
            info!("Removed {} files from {}", removed, output.display());
            Ok(())
        }
    }
}

async fn build(args: BuildArgs) -> Result<(), CliError> {
    let provider = Arc::new(SnapshotProvider::new(&args.snapshot));
    let description = provider.document().map_err(EngineError::from)?;

    let flags = args
        .flags
        .iter()
        .fold(GenerationFlags::empty(), |acc, flag| acc | flag.bits());

    let mut builder = EngineBuilder::new()
        .with_provider(provider)
        .with_output_dir(&args.output)
        .with_flags(flags)
        .with_strict_imports(args.strict_imports)
        .with_max_image_dimension(args.max_image_dimension)
        .with_poll_interval(Duration::from_millis(50));
    for import in &args.imports {
        builder = match import.split_once('=') {
            Some((module, version)) => builder.with_import(module, version),
            None => builder.with_import(import.as_str(), ""),
        };
    }
    builder = with_fonts(builder, !args.no_system_fonts);
    for dir in &args.font_dirs {
        builder = builder.with_font_dir(dir);
    }
    if let Some(path) = &args.broken_image {
        builder = builder.with_broken_placeholder(path);
    }
    let mut engine = builder.build()?;

    if let Some(path) = &args.font_map {
        let mappings: BTreeMap<String, String> = serde_json::from_slice(&read(path)?)?;
        engine.set_fonts(mappings);
    }
    if args.clean {
        engine.clean_output()?;
    }

    engine.request_build(&description, args.filter.unwrap_or_default())?;
    let state = engine.run().await;
    if state != BuildState::Done {
        return Err(CliError::Incomplete(state));
    }

    if args.list {
        for entry in engine.elements() {
            println!(
                "{}:{}\t{} / {}",
                entry.canvas + 1,
                entry.element + 1,
                entry.canvas_name,
                entry.element_name
            );
        }
    }
    if let Some(path) = &args.save_font_map {
        let mappings: BTreeMap<&str, &str> = engine.fonts().iter().collect();
        let json = serde_json::to_vec_pretty(&mappings)?;
        designmark::output::write_atomic(path, &json)?;
    }
    if let Some(folder) = &args.export {
        engine.save_all(folder)?;
    }
    Ok(())
}

#[cfg(feature = "system-fonts")]
fn with_fonts(builder: EngineBuilder, system_fonts: bool) -> EngineBuilder {
    let catalog = designmark::SystemFontCatalog::new().with_system_fonts(system_fonts);
    builder.with_font_catalog(Box::new(catalog))
}

#[cfg(not(feature = "system-fonts"))]
fn with_fonts(builder: EngineBuilder, _system_fonts: bool) -> EngineBuilder {
    builder
}
