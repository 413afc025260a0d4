//! Copies a completed build into a user-chosen folder.

use crate::assets::{self, CopyReport, IMAGES_DIR};
use crate::error::EngineError;
use crate::events::EventSink;
use crate::orchestrator::CompletedBuild;
use crate::output;
use designmark_types::names::{element_owner, make_file_name};
use designmark_types::{ComponentId, Document};
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// What an export wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub elements: usize,
    pub components: usize,
    pub images: CopyReport,
}

impl ExportReport {
    pub fn files_written(&self) -> usize {
        self.elements + self.components + self.images.total()
    }
}

/// Exports every element of the build.
pub fn save_all(
    build: &CompletedBuild,
    folder: &Path,
    events: &EventSink,
) -> Result<ExportReport, EngineError> {
    let positions: Vec<(usize, usize)> = build
        .document()
        .element_entries()
        .into_iter()
        .map(|entry| (entry.canvas, entry.element))
        .collect();
    export(build, folder, &positions, false, events)
}

/// Exports the elements at the given 0-based `(canvas, element)` positions.
/// Only images used by the exported elements and components are copied.
pub fn save_selection(
    build: &CompletedBuild,
    folder: &Path,
    selection: &[(usize, usize)],
    events: &EventSink,
) -> Result<ExportReport, EngineError> {
    export(build, folder, selection, true, events)
}

fn export(
    build: &CompletedBuild,
    folder: &Path,
    positions: &[(usize, usize)],
    filter_images: bool,
    events: &EventSink,
) -> Result<ExportReport, EngineError> {
    let document = build.document();
    output::ensure_dir(folder)?;

    let mut written_elements: BTreeSet<(usize, usize)> = BTreeSet::new();
    let mut owners: BTreeSet<String> = BTreeSet::new();
    let mut components: BTreeSet<String> = BTreeSet::new();
    for &(canvas_index, element_index) in positions {
        if !written_elements.insert((canvas_index, element_index)) {
            continue;
        }
        let canvas = document.canvas(canvas_index).ok_or_else(|| {
            EngineError::Structure(format!("no canvas at {}", canvas_index))
        })?;
        let element = canvas.element(element_index).ok_or_else(|| {
            EngineError::Structure(format!(
                "no element at {}:{}",
                canvas_index, element_index
            ))
        })?;
        if element.markup().is_empty() {
            return Err(EngineError::EmptyMarkup(element.name().to_string()));
        }
        let path = folder.join(format!(
            "{}_{}.{}",
            make_file_name(canvas.name()),
            element.name(),
            build.extension()
        ));
        output::write_atomic(&path, element.markup())?;
        owners.insert(element_owner(canvas.name(), element.name()));
        components.extend(component_closure(document, element.name(), element.components())?);
    }

    for name in &components {
        let component = document
            .component(name)
            .ok_or_else(|| EngineError::MissingComponent {
                owner: folder.display().to_string(),
                component: name.clone(),
            })?;
        let path = folder.join(format!("{}.{}", name, build.extension()));
        output::write_atomic(&path, component.markup())?;
    }
    owners.extend(components.iter().cloned());

    let images = if filter_images && owners.is_empty() {
        CopyReport::default()
    } else {
        let filter = if filter_images { owners } else { BTreeSet::new() };
        assets::copy_images(
            build.image_files(),
            build.image_contexts(),
            &folder.join(IMAGES_DIR),
            &filter,
            events,
        )?
    };

    let report = ExportReport {
        elements: written_elements.len(),
        components: components.len(),
        images,
    };
    events.info(format!(
        "{} files written into {}",
        report.files_written(),
        folder.display()
    ));
    Ok(report)
}

/// Names of every component reachable from `roots`, following dependencies.
fn component_closure(
    document: &Document,
    owner: &str,
    roots: &[String],
) -> Result<BTreeSet<String>, EngineError> {
    let by_id: HashMap<&ComponentId, &str> = document
        .components()
        .map(|component| (component.id(), component.name()))
        .collect();

    let mut seen = BTreeSet::new();
    let mut queue: Vec<(String, String)> = roots
        .iter()
        .map(|name| (owner.to_string(), name.clone()))
        .collect();
    while let Some((user, name)) = queue.pop() {
        if seen.contains(&name) {
            continue;
        }
        let component = document
            .component(&name)
            .ok_or_else(|| EngineError::MissingComponent {
                owner: user,
                component: name.clone(),
            })?;
        for id in component.dependencies() {
            match by_id.get(id) {
                Some(dependency) => queue.push((name.clone(), dependency.to_string())),
                None => debug!("Dependency {} of {} has no component of its own", id, name),
            }
        }
        seen.insert(name);
    }
    Ok(seen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use designmark_types::{
        Component, ComponentKind, Element, ImageContextIndex, ImageFileRecord, ImageFileTable,
        ImageRef,
    };
    use std::fs;
    use tempfile::tempdir;

    fn component(id: &str, name: &str, deps: &[&str]) -> Component {
        Component::new(
            ComponentId::from(id),
            name,
            format!("// {}\n", name).into_bytes(),
            deps.iter().map(|d| ComponentId::from(*d)).collect(),
            ComponentKind::Shared,
        )
    }

    fn build(images_dir: &Path) -> CompletedBuild {
        let mut document = Document::new("Demo");
        let canvas = document.add_canvas("Page 1");
        canvas
            .add_element(Element::new(
                "Home",
                b"Item {}\n".to_vec(),
                vec!["Card_component".to_string()],
                [ImageRef::from("hero")].into_iter().collect(),
            ))
            .unwrap();
        canvas
            .add_element(Element::new(
                "About",
                b"Item {}\n".to_vec(),
                Vec::new(),
                [ImageRef::from("team")].into_iter().collect(),
            ))
            .unwrap();
        document.insert_component(component("1:1", "Card_component", &["1:2"]));
        document.insert_component(component("1:2", "Badge_component", &[]));
        document.insert_component(component("1:3", "Unused_component", &[]));

        let mut files = ImageFileTable::new();
        let mut contexts = ImageContextIndex::new();
        for image in ["hero", "team"] {
            fs::create_dir_all(images_dir).unwrap();
            fs::write(images_dir.join(format!("{}.png", image)), image).unwrap();
            files.insert(
                ImageRef::from(image),
                ImageFileRecord::new(images_dir, format!("{}.png", image)),
            );
        }
        contexts.record(ImageRef::from("hero"), "Page_1_Home");
        contexts.record(ImageRef::from("team"), "Page_1_About");

        CompletedBuild::new(
            document,
            files,
            contexts,
            images_dir.to_path_buf(),
            String::new(),
            "qml".to_string(),
        )
    }

    #[test]
    fn test_save_all_writes_closure_and_images() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let (sink, events) = EventSink::channel();
        let report = save_all(&build(source.path()), target.path(), &sink).unwrap();

        assert_eq!(report.elements, 2);
        assert_eq!(report.components, 2);
        assert_eq!(report.images.copied.len(), 2);
        assert!(target.path().join("Page_1_Home.qml").is_file());
        assert!(target.path().join("Badge_component.qml").is_file());
        assert!(!target.path().join("Unused_component.qml").exists());
        assert!(target.path().join("images").join("team.png").is_file());
        assert!(std::iter::from_fn(|| events.try_recv().ok())
            .any(|e| matches!(e, crate::events::BuildEvent::Info(m) if m.starts_with("6 files written into"))));
    }

    #[test]
    fn test_save_selection_filters_images() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let (sink, _events) = EventSink::channel();
        let report = save_selection(&build(source.path()), target.path(), &[(0, 1)], &sink).unwrap();

        assert_eq!(report.elements, 1);
        assert_eq!(report.components, 0);
        assert!(target.path().join("Page_1_About.qml").is_file());
        assert!(!target.path().join("Page_1_Home.qml").exists());
        assert!(target.path().join("images").join("team.png").is_file());
        assert!(!target.path().join("images").join("hero.png").exists());
    }

    #[test]
    fn test_selection_keeps_same_named_elements_apart() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let mut document = Document::new("Demo");
        let mut files = ImageFileTable::new();
        let mut contexts = ImageContextIndex::new();
        fs::create_dir_all(source.path()).unwrap();
        for (canvas_name, image) in [("Mobile", "small"), ("Desktop", "wide")] {
            document
                .add_canvas(canvas_name)
                .add_element(Element::new(
                    "Home",
                    b"Item {}\n".to_vec(),
                    Vec::new(),
                    [ImageRef::from(image)].into_iter().collect(),
                ))
                .unwrap();
            fs::write(source.path().join(format!("{}.png", image)), image).unwrap();
            files.insert(
                ImageRef::from(image),
                ImageFileRecord::new(source.path(), format!("{}.png", image)),
            );
            contexts.record(ImageRef::from(image), element_owner(canvas_name, "Home"));
        }
        let completed = CompletedBuild::new(
            document,
            files,
            contexts,
            source.path().to_path_buf(),
            String::new(),
            "qml".to_string(),
        );
        let (sink, _events) = EventSink::channel();

        let report = save_selection(&completed, target.path(), &[(0, 0)], &sink).unwrap();
        assert_eq!(report.images.copied.len(), 1);
        assert!(target.path().join("Mobile_Home.qml").is_file());
        assert!(target.path().join("images").join("small.png").is_file());
        assert!(!target.path().join("images").join("wide.png").exists());
    }

    #[test]
    fn test_second_export_skips_equal_images() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let (sink, _events) = EventSink::channel();
        let completed = build(source.path());
        save_all(&completed, target.path(), &sink).unwrap();
        let again = save_all(&completed, target.path(), &sink).unwrap();
        assert_eq!(again.images.skipped.len(), 2);
        assert!(again.images.copied.is_empty());
    }

    #[test]
    fn test_out_of_range_selection_fails() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let (sink, _events) = EventSink::channel();
        let result = save_selection(&build(source.path()), target.path(), &[(3, 0)], &sink);
        assert!(matches!(result, Err(EngineError::Structure(_))));
    }
}
