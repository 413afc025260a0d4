pub mod fixtures;

use designmark::{
    BuildEvent, BuildState, Engine, EngineBuilder, GenerationFlags, MemoryProvider,
    StaticFontCatalog,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Engine writing into `out`, with a small static font catalog.
pub fn engine(provider: &Arc<MemoryProvider>, out: &Path, flags: GenerationFlags) -> Engine {
    EngineBuilder::new()
        .with_provider(provider.clone())
        .with_output_dir(out)
        .with_flags(flags)
        .with_font_catalog(Box::new(StaticFontCatalog::new(["Arial", "Courier New"])))
        .build()
        .expect("engine builds")
}

/// Ticks the engine until it leaves the suspended state, completing one
/// outstanding fetch between attempts. Returns the final state and the number
/// of attempts made.
pub fn drive_one_by_one(engine: &mut Engine, provider: &MemoryProvider) -> (BuildState, usize) {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let state = engine.tick();
        if state != BuildState::Suspended {
            return (state, attempts);
        }
        assert!(provider.deliver_one().unwrap(), "suspended without a pending fetch");
        assert!(attempts < 1000, "build does not converge");
    }
}

/// Like [`drive_one_by_one`] but completes every outstanding fetch at once.
pub fn drive(engine: &mut Engine, provider: &MemoryProvider) -> BuildState {
    loop {
        let state = engine.tick();
        if state != BuildState::Suspended {
            return state;
        }
        provider.deliver_pending().unwrap();
    }
}

/// Every file under `dir`, keyed by its path relative to `dir`.
pub fn snapshot_dir(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    collect(dir, dir, &mut files);
    files
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<String, Vec<u8>>) {
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            collect(root, &path, files);
        } else {
            let key = path.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/");
            files.insert(key, fs::read(&path).unwrap());
        }
    }
}

pub fn read_text(path: &Path) -> String {
    String::from_utf8(fs::read(path).unwrap()).unwrap()
}

pub fn drain(events: &async_channel::Receiver<BuildEvent>) -> Vec<BuildEvent> {
    std::iter::from_fn(|| events.try_recv().ok()).collect()
}
