mod common;

use common::fixtures;
use common::{TestResult, drain, drive, engine, init_logging, snapshot_dir};
use designmark::{BuildEvent, BuildState, ElementFilter, Engine, EngineError, GenerationFlags, MemoryProvider};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn built_engine(out: &Path) -> Engine {
    let provider = Arc::new(MemoryProvider::new());
    fixtures::sample_provider(&provider);
    let mut engine = engine(&provider, out, GenerationFlags::empty());
    engine
        .request_build(&fixtures::sample_description(), ElementFilter::new())
        .unwrap();
    assert_eq!(drive(&mut engine, &provider), BuildState::Done);
    engine
}

#[test]
fn test_save_all_mirrors_output() -> TestResult {
    init_logging();
    let out = tempdir()?;
    let target = tempdir()?;
    let engine = built_engine(out.path());
    let events = engine.events();
    drain(&events);

    let report = engine.save_all(target.path())?;
    assert_eq!(report.elements, 3);
    assert_eq!(report.components, 3);
    assert_eq!(report.images.copied.len(), 3);
    assert_eq!(snapshot_dir(target.path()), snapshot_dir(out.path()));

    let info: Vec<String> = drain(&events)
        .into_iter()
        .filter_map(|e| match e {
            BuildEvent::Info(message) => Some(message),
            _ => None,
        })
        .collect();
    assert_eq!(info, vec![format!("9 files written into {}", target.path().display())]);
    Ok(())
}

#[test]
fn test_repeated_export_skips_equal_images() -> TestResult {
    init_logging();
    let out = tempdir()?;
    let target = tempdir()?;
    let engine = built_engine(out.path());
    let events = engine.events();

    engine.save_all(target.path())?;
    drain(&events);
    let again = engine.save_all(target.path())?;
    assert!(again.images.copied.is_empty());
    assert_eq!(again.images.skipped.len(), 3);
    let warnings = drain(&events)
        .into_iter()
        .filter(|e| matches!(e, BuildEvent::Warning(m) if m.starts_with("Are equal")))
        .count();
    assert_eq!(warnings, 3);
    Ok(())
}

#[test]
fn test_conflicting_image_is_never_overwritten() -> TestResult {
    init_logging();
    let out = tempdir()?;
    let target = tempdir()?;
    let engine = built_engine(out.path());
    let events = engine.events();
    drain(&events);

    let images = target.path().join("images");
    fs::create_dir_all(&images)?;
    fs::write(images.join("hero.png"), b"something else entirely")?;

    let result = engine.save_all(target.path());
    assert!(matches!(result, Err(EngineError::CopyConflict(ref path)) if path.ends_with("hero.png")));
    assert_eq!(fs::read(images.join("hero.png"))?, b"something else entirely");
    assert!(drain(&events).iter().any(|e| matches!(e, BuildEvent::Failed(m) if m.starts_with("Cannot replace"))));
    Ok(())
}

#[test]
fn test_save_selection_exports_closure_only() -> TestResult {
    init_logging();
    let out = tempdir()?;
    let target = tempdir()?;
    let engine = built_engine(out.path());

    let report = engine.save_selection(target.path(), &[(1, 0)])?;
    assert_eq!(report.elements, 1);
    assert_eq!(report.components, 1);

    let files = snapshot_dir(target.path());
    let names: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec!["Page_2_Settings.qml", "Primary_button_component.qml", "images/btn-bg.jpg"]
    );
    Ok(())
}

#[test]
fn test_selection_follows_nested_components() -> TestResult {
    init_logging();
    let out = tempdir()?;
    let target = tempdir()?;
    let engine = built_engine(out.path());

    engine.save_selection(target.path(), &[(0, 0)])?;
    for name in [
        "Page_1_Home.qml",
        "Card_component.qml",
        "Primary_button_component.qml",
        "Badge_component.qml",
        "images/hero.png",
        "images/btn-bg.jpg",
    ] {
        assert!(target.path().join(name).is_file(), "{} missing", name);
    }
    assert!(!target.path().join("images").join("v_1.png").exists());
    Ok(())
}

#[test]
fn test_failed_write_leaves_no_partial_files() -> TestResult {
    init_logging();
    let out = tempdir()?;
    let provider = Arc::new(MemoryProvider::new());
    fixtures::sample_provider(&provider);
    provider.cache_all()?;
    // A plain file where the images directory should go.
    fs::write(out.path().join("images"), b"not a directory")?;
    let mut engine = engine(&provider, out.path(), GenerationFlags::empty());

    engine.request_build(&fixtures::sample_description(), ElementFilter::new())?;
    assert_eq!(engine.tick(), BuildState::Failed);
    assert!(engine.document().is_none());
    for name in fs::read_dir(out.path())? {
        let name = name?.file_name().to_string_lossy().to_string();
        assert!(!name.starts_with(".designmark"), "temporary file {} left behind", name);
    }
    Ok(())
}

#[test]
fn test_clean_output_removes_generated_files() -> TestResult {
    init_logging();
    let out = tempdir()?;
    let engine = built_engine(out.path());
    fs::create_dir(out.path().join("keep"))?;

    assert_eq!(engine.clean_output()?, 9);
    assert!(snapshot_dir(out.path()).is_empty());
    assert!(out.path().join("keep").is_dir());
    Ok(())
}
