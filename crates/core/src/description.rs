//! Deserialization of the design document description.
//!
//! The description is the JSON the design service returns for a whole file:
//! a tree of canvases holding element nodes, and a table of shared components
//! keyed by their stable id.

use crate::error::EngineError;
use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Deserialize;
use serde_json::Value;

const DEFAULT_DOCUMENT_NAME: &str = "Untitled";

/// Node type as reported by the design service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Document,
    Canvas,
    Frame,
    Group,
    Section,
    Component,
    ComponentSet,
    Instance,
    Rectangle,
    Ellipse,
    Text,
    Vector,
    BooleanOperation,
    Star,
    Line,
    Polygon,
    RegularPolygon,
    #[default]
    #[serde(other)]
    Other,
}

impl NodeKind {
    /// Kinds drawn from a pre-rendered export rather than generated shapes.
    pub fn is_rendered(self) -> bool {
        matches!(
            self,
            NodeKind::Vector
                | NodeKind::BooleanOperation
                | NodeKind::Star
                | NodeKind::Line
                | NodeKind::Polygon
                | NodeKind::RegularPolygon
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct BoundingBox {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    #[serde(default = "one")]
    pub a: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaintKind {
    Solid,
    Image,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paint {
    #[serde(rename = "type", default)]
    pub kind: PaintKind,
    #[serde(default = "yes")]
    pub visible: bool,
    pub opacity: Option<f64>,
    pub color: Option<Color>,
    pub image_ref: Option<String>,
    pub scale_mode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<f64>,
    #[serde(default)]
    pub italic: bool,
    pub text_align_horizontal: Option<String>,
}

/// One node of the design tree.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignNode {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
    #[serde(default = "yes")]
    pub visible: bool,
    pub opacity: Option<f64>,
    pub absolute_bounding_box: Option<BoundingBox>,
    #[serde(default)]
    pub fills: Vec<Paint>,
    #[serde(default)]
    pub strokes: Vec<Paint>,
    pub stroke_weight: Option<f64>,
    pub corner_radius: Option<f64>,
    pub characters: Option<String>,
    pub style: Option<TextStyle>,
    pub component_id: Option<String>,
    #[serde(default)]
    pub children: Vec<DesignNode>,
}

fn yes() -> bool {
    true
}

fn one() -> f64 {
    1.0
}

impl DesignNode {
    pub fn bounds(&self) -> BoundingBox {
        self.absolute_bounding_box.unwrap_or_default()
    }

    /// First visible solid fill.
    pub fn solid_fill(&self) -> Option<&Paint> {
        first_solid(&self.fills)
    }

    /// First visible solid stroke.
    pub fn solid_stroke(&self) -> Option<&Paint> {
        first_solid(&self.strokes)
    }

    /// First visible image fill.
    pub fn image_fill(&self) -> Option<&Paint> {
        self.fills
            .iter()
            .find(|p| p.visible && p.kind == PaintKind::Image)
    }
}

fn first_solid(paints: &[Paint]) -> Option<&Paint> {
    paints
        .iter()
        .find(|p| p.visible && p.kind == PaintKind::Solid && p.color.is_some())
}

/// A canvas and the element nodes directly below it.
#[derive(Debug, Clone, PartialEq)]
pub struct CanvasNode {
    pub name: String,
    pub elements: Vec<DesignNode>,
}

/// A parsed description, ready for the tree walk.
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub name: String,
    pub canvases: Vec<CanvasNode>,
    /// Shared components in description order, deduplicated by id.
    pub components: IndexMap<String, DesignNode>,
}

#[derive(Deserialize)]
struct RawDescription {
    name: Option<String>,
    document: RawDocument,
    #[serde(default)]
    components: RawComponents,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    children: Vec<DesignNode>,
}

#[derive(Deserialize, Default)]
#[serde(untagged)]
enum RawComponents {
    Keyed(IndexMap<String, DesignNode>),
    Listed(Vec<DesignNode>),
    #[default]
    Absent,
}

impl Description {
    /// Parses raw description bytes.
    pub fn parse(data: &[u8]) -> Result<Self, EngineError> {
        let value = object(data)?;
        let raw: RawDescription = serde_json::from_value(value)?;

        let components = match raw.components {
            RawComponents::Keyed(map) => map
                .into_iter()
                .map(|(id, mut node)| {
                    if node.id.is_empty() {
                        node.id = id.clone();
                    }
                    (id, node)
                })
                .collect(),
            RawComponents::Listed(list) => {
                let mut components = IndexMap::new();
                for node in list {
                    if node.id.is_empty() {
                        return Err(EngineError::Structure(format!(
                            "component '{}' has no id",
                            node.name
                        )));
                    }
                    if let Entry::Vacant(slot) = components.entry(node.id.clone()) {
                        slot.insert(node);
                    }
                }
                components
            }
            RawComponents::Absent => IndexMap::new(),
        };

        let canvases = raw
            .document
            .children
            .into_iter()
            .map(|canvas| CanvasNode {
                name: canvas.name,
                elements: canvas.children,
            })
            .collect();

        Ok(Description {
            name: raw
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_DOCUMENT_NAME.to_string()),
            canvases,
            components,
        })
    }

    pub fn element_count(&self) -> usize {
        self.canvases.iter().map(|c| c.elements.len()).sum()
    }
}

/// Parses a node body returned by the provider: either the node itself or an
/// object wrapping it under `document`.
pub fn parse_node(data: &[u8]) -> Result<DesignNode, EngineError> {
    let mut value = object(data)?;
    if let Some(inner) = value.get_mut("document").map(Value::take) {
        value = inner;
    }
    Ok(serde_json::from_value(value)?)
}

fn object(data: &[u8]) -> Result<Value, EngineError> {
    if data.is_empty() {
        return Err(EngineError::Parse("No data".to_string()));
    }
    let value: Value = serde_json::from_slice(data)
        .map_err(|e| EngineError::Parse(format!("When reading JSON: {}", e)))?;
    if !value.is_object() {
        return Err(EngineError::Parse("Object expected".to_string()));
    }
    Ok(value)
}

/// Re-indents raw description bytes for display. Unparseable input is
/// returned as-is behind the parse error text.
pub fn pretty(data: &[u8]) -> String {
    if data.is_empty() {
        return "No data".to_string();
    }
    match serde_json::from_slice::<Value>(data) {
        Ok(value) => serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| String::from_utf8_lossy(data).into_owned()),
        Err(e) => format!("JSON parse error: {}\n\n{}", e, String::from_utf8_lossy(data)),
    }
}
