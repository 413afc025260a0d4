//! The generated document: canvases of elements plus a shared component table.
//!
//! Instances are built fresh for every build attempt and only handed out once
//! the attempt completes, so nothing here needs interior mutability.

use crate::ids::{ComponentId, ImageRef};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised when the model's structural invariants would be broken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Element '{element}' already exists in canvas '{canvas}'")]
    DuplicateElement { canvas: String, element: String },
}

/// Where a component came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ComponentKind {
    /// Listed in the description's component table.
    Shared,
    /// Discovered inline while generating `parent`.
    Sub { parent: String },
}

/// A named, reusable markup fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    id: ComponentId,
    name: String,
    markup: Vec<u8>,
    dependencies: BTreeSet<ComponentId>,
    kind: ComponentKind,
}

impl Component {
    pub fn new(
        id: ComponentId,
        name: impl Into<String>,
        markup: Vec<u8>,
        dependencies: BTreeSet<ComponentId>,
        kind: ComponentKind,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            markup,
            dependencies,
            kind,
        }
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn markup(&self) -> &[u8] {
        &self.markup
    }

    /// Ids of the shared components this one instantiates.
    pub fn dependencies(&self) -> &BTreeSet<ComponentId> {
        &self.dependencies
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    pub fn is_sub_component(&self) -> bool {
        matches!(self.kind, ComponentKind::Sub { .. })
    }
}

/// A generated, non-reusable unit of markup (one design frame).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    markup: Vec<u8>,
    components: Vec<String>,
    image_refs: BTreeSet<ImageRef>,
}

impl Element {
    pub fn new(
        name: impl Into<String>,
        markup: Vec<u8>,
        components: Vec<String>,
        image_refs: BTreeSet<ImageRef>,
    ) -> Self {
        Self {
            name: name.into(),
            markup,
            components,
            image_refs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn markup(&self) -> &[u8] {
        &self.markup
    }

    /// Names of the components (shared and sub) this element references.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn image_refs(&self) -> &BTreeSet<ImageRef> {
        &self.image_refs
    }
}

/// A top-level grouping of elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    name: String,
    elements: Vec<Element>,
    current: usize,
}

impl Canvas {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
            current: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends an element; names must be unique within the canvas.
    pub fn add_element(&mut self, element: Element) -> Result<(), ModelError> {
        if self.element_by_name(element.name()).is_some() {
            return Err(ModelError::DuplicateElement {
                canvas: self.name.clone(),
                element: element.name,
            });
        }
        self.elements.push(element);
        Ok(())
    }

    /// Returns `base`, or `base_N` for the smallest N that is not taken yet.
    pub fn unique_element_name(&self, base: &str) -> String {
        if self.element_by_name(base).is_none() {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{}_{}", base, n))
            .find(|candidate| self.element_by_name(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    pub fn element_by_name(&self, name: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.name() == name)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Element> {
        self.elements.get(self.current)
    }

    /// Selects the current element. Returns `false` when out of range.
    pub fn set_current(&mut self, index: usize) -> bool {
        if index >= self.elements.len() {
            return false;
        }
        self.current = index;
        true
    }
}

/// One row of [`Document::element_entries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementEntry {
    pub canvas: usize,
    pub element: usize,
    pub canvas_name: String,
    pub element_name: String,
}

/// The complete generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    name: String,
    canvases: Vec<Canvas>,
    current: usize,
    components: BTreeMap<String, Component>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            canvases: Vec::new(),
            current: 0,
            components: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_canvas(&mut self, name: impl Into<String>) -> &mut Canvas {
        self.canvases.push(Canvas::new(name));
        let last = self.canvases.len() - 1;
        &mut self.canvases[last]
    }

    pub fn canvases(&self) -> &[Canvas] {
        &self.canvases
    }

    pub fn canvas(&self, index: usize) -> Option<&Canvas> {
        self.canvases.get(index)
    }

    pub fn canvas_mut(&mut self, index: usize) -> Option<&mut Canvas> {
        self.canvases.get_mut(index)
    }

    pub fn canvas_by_name(&self, name: &str) -> Option<&Canvas> {
        self.canvases.iter().find(|c| c.name() == name)
    }

    pub fn len(&self) -> usize {
        self.canvases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.canvases.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&Canvas> {
        self.canvases.get(self.current)
    }

    /// Selects the current canvas, clamping its element index into range.
    /// Returns `false` when out of range.
    pub fn set_current(&mut self, index: usize) -> bool {
        let Some(canvas) = self.canvases.get_mut(index) else {
            return false;
        };
        if canvas.current >= canvas.len() {
            canvas.current = canvas.len().saturating_sub(1);
        }
        self.current = index;
        true
    }

    /// Selects the current element of the current canvas.
    pub fn set_current_element(&mut self, index: usize) -> bool {
        match self.canvases.get_mut(self.current) {
            Some(canvas) => canvas.set_current(index),
            None => false,
        }
    }

    /// Inserts a component under its name. An existing component with the
    /// same name is replaced (last write wins) and returned.
    pub fn insert_component(&mut self, component: Component) -> Option<Component> {
        self.components.insert(component.name.clone(), component)
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    pub fn contains_component(&self, name: &str) -> bool {
        self.components.contains_key(name)
    }

    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn element_count(&self) -> usize {
        self.canvases.iter().map(Canvas::len).sum()
    }

    /// Every element in document order with its position and names.
    pub fn element_entries(&self) -> Vec<ElementEntry> {
        self.canvases
            .iter()
            .enumerate()
            .flat_map(|(ci, canvas)| {
                canvas.elements().iter().enumerate().map(move |(ei, element)| ElementEntry {
                    canvas: ci,
                    element: ei,
                    canvas_name: canvas.name().to_string(),
                    element_name: element.name().to_string(),
                })
            })
            .collect()
    }

    pub fn element(&self, canvas: usize, element: usize) -> Option<&Element> {
        self.canvases.get(canvas)?.element(element)
    }

    /// Component names referenced by elements but absent from the table,
    /// as `(element, component)` pairs.
    pub fn missing_components(&self) -> Vec<(String, String)> {
        self.canvases
            .iter()
            .flat_map(|c| c.elements())
            .flat_map(|e| {
                e.components()
                    .iter()
                    .filter(|name| !self.components.contains_key(name.as_str()))
                    .map(move |name| (e.name().to_string(), name.clone()))
            })
            .collect()
    }

    /// Shared-component dependency ids that no component in the table carries.
    pub fn dangling_dependencies(&self) -> Vec<ComponentId> {
        let known: BTreeSet<&ComponentId> = self.components.values().map(Component::id).collect();
        let mut missing: BTreeSet<ComponentId> = BTreeSet::new();
        for component in self.components.values() {
            for dep in component.dependencies() {
                if !known.contains(dep) {
                    missing.insert(dep.clone());
                }
            }
        }
        missing.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(name: &str, components: &[&str]) -> Element {
        Element::new(
            name,
            b"Item {}".to_vec(),
            components.iter().map(|s| s.to_string()).collect(),
            BTreeSet::new(),
        )
    }

    fn component(id: &str, name: &str, markup: &[u8]) -> Component {
        Component::new(
            ComponentId::from(id),
            name,
            markup.to_vec(),
            BTreeSet::new(),
            ComponentKind::Shared,
        )
    }

    #[test]
    fn test_insert_component_last_write_wins() {
        let mut doc = Document::new("doc");
        assert!(doc.insert_component(component("1", "A_component", b"one")).is_none());
        let previous = doc.insert_component(component("2", "A_component", b"two"));
        assert_eq!(previous.unwrap().markup(), b"one");
        assert_eq!(doc.component_count(), 1);
        assert_eq!(doc.component("A_component").unwrap().markup(), b"two");
    }

    #[test]
    fn test_canvas_rejects_duplicate_element_names() {
        let mut canvas = Canvas::new("Page");
        canvas.add_element(element("Home", &[])).unwrap();
        let err = canvas.add_element(element("Home", &[])).unwrap_err();
        assert!(err.to_string().contains("Home"));
        assert_eq!(canvas.unique_element_name("Home"), "Home_1");
        assert_eq!(canvas.unique_element_name("Other"), "Other");
    }

    #[test]
    fn test_navigation_clamps_element_index() {
        let mut doc = Document::new("doc");
        let first = doc.add_canvas("First");
        first.add_element(element("a", &[])).unwrap();
        first.add_element(element("b", &[])).unwrap();
        first.add_element(element("c", &[])).unwrap();
        doc.add_canvas("Second").add_element(element("x", &[])).unwrap();

        assert!(doc.set_current_element(2));
        assert!(!doc.set_current(5));
        doc.canvas_mut(1).unwrap().current = 3;
        assert!(doc.set_current(1));
        assert_eq!(doc.current().unwrap().current_index(), 0);
        assert_eq!(doc.current().unwrap().current().unwrap().name(), "x");
    }

    #[test]
    fn test_element_entries_and_lookup() {
        let mut doc = Document::new("doc");
        doc.add_canvas("P1").add_element(element("a", &[])).unwrap();
        doc.add_canvas("P2").add_element(element("b", &[])).unwrap();

        let entries = doc.element_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].canvas, 1);
        assert_eq!(entries[1].element_name, "b");
        assert_eq!(doc.element(1, 0).unwrap().name(), "b");
        assert!(doc.element(2, 0).is_none());
        assert_eq!(doc.element_count(), 2);
    }

    #[test]
    fn test_missing_components_reported() {
        let mut doc = Document::new("doc");
        doc.insert_component(component("1", "Known_component", b"Item {}"));
        doc.add_canvas("P")
            .add_element(element("e", &["Known_component", "Gone_component"]))
            .unwrap();
        assert_eq!(
            doc.missing_components(),
            vec![("e".to_string(), "Gone_component".to_string())]
        );
    }

    #[test]
    fn test_dangling_dependencies() {
        let mut doc = Document::new("doc");
        let deps: BTreeSet<ComponentId> = ["1", "9"].iter().map(|s| ComponentId::from(*s)).collect();
        doc.insert_component(Component::new(
            ComponentId::from("1"),
            "A_component",
            b"Item {}".to_vec(),
            deps,
            ComponentKind::Shared,
        ));
        assert_eq!(doc.dangling_dependencies(), vec![ComponentId::from("9")]);
    }
}
