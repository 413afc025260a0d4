//! Per-node markup generation.
//!
//! A body (component, sub-component or element) is generated in one pass over
//! its node tree. Anything that needs data the provider has not cached yet
//! interrupts the pass; nothing generated so far is kept.

use crate::assets::PLACEHOLDER_REF;
use crate::description::{self, BoundingBox, DesignNode, NodeKind, Paint};
use crate::error::{EngineError, Interrupt, Step};
use crate::markup::{self, MarkupWriter, number, quoted};
use crate::walk::{Attempt, FILTERED_OUT};
use designmark_traits::{Fetch, PendingFetch};
use designmark_types::names;
use designmark_types::{Component, ComponentId, ComponentKind, ImageRef};
use log::debug;
use std::collections::BTreeSet;

/// Nesting limit for a single body, sub-components included.
pub(crate) const MAX_DEPTH: usize = 64;

/// Generated markup of one body and what it depends on.
#[derive(Debug, Default)]
pub(crate) struct Fragment {
    pub markup: Vec<u8>,
    /// Components referenced by id, shared and sub-components alike.
    pub dependencies: BTreeSet<ComponentId>,
    /// Names of sub-components referenced, in first-use order.
    pub sub_components: Vec<String>,
    pub image_refs: BTreeSet<ImageRef>,
}

impl Fragment {
    pub fn filtered_out() -> Self {
        Self {
            markup: FILTERED_OUT.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    fn use_sub_component(&mut self, id: ComponentId, name: &str) {
        self.dependencies.insert(id);
        if !self.sub_components.iter().any(|n| n == name) {
            self.sub_components.push(name.to_string());
        }
    }
}

fn too_deep(node: &DesignNode) -> Interrupt {
    Interrupt::Fatal(EngineError::Structure(format!(
        "'{}' ({}) nests deeper than {} levels",
        node.name, node.id, MAX_DEPTH
    )))
}

fn geometry(w: &mut MarkupWriter, node: &DesignNode, x: f64, y: f64) {
    let bounds = node.bounds();
    w.property("x", number(x));
    w.property("y", number(y));
    w.property("width", number(bounds.width));
    w.property("height", number(bounds.height));
    if !node.visible {
        w.property("visible", "false");
    }
    if let Some(opacity) = node.opacity
        && opacity != 1.0
    {
        w.property("opacity", number(opacity));
    }
}

fn paint_color(paint: &Paint) -> Option<String> {
    paint
        .color
        .as_ref()
        .map(|c| markup::color(c, paint.opacity.unwrap_or(1.0)))
}

fn fill_mode(scale_mode: Option<&str>) -> &'static str {
    match scale_mode {
        Some("FILL") => "Image.PreserveAspectCrop",
        Some("FIT") => "Image.PreserveAspectFit",
        Some("TILE") => "Image.Tile",
        _ => "Image.Stretch",
    }
}

fn horizontal_alignment(align: &str) -> Option<&'static str> {
    match align {
        "LEFT" => Some("Text.AlignLeft"),
        "CENTER" => Some("Text.AlignHCenter"),
        "RIGHT" => Some("Text.AlignRight"),
        "JUSTIFIED" => Some("Text.AlignJustify"),
        _ => None,
    }
}

fn reference(w: &mut MarkupWriter, type_name: &str, node: &DesignNode, x: f64, y: f64) {
    w.open(type_name);
    geometry(w, node, x, y);
    w.close();
}

impl Attempt<'_> {
    /// Generates the markup of a body whose root sits at 0,0.
    pub(crate) fn generate_body(&mut self, node: &DesignNode, owner: &str, depth: usize) -> Step<Fragment> {
        let mut fragment = Fragment::default();
        let mut w = MarkupWriter::new();
        self.emit_node(&mut w, &mut fragment, node, None, owner, depth)?;
        fragment.markup = w.into_bytes();
        Ok(fragment)
    }

    fn emit_node(
        &mut self,
        w: &mut MarkupWriter,
        frag: &mut Fragment,
        node: &DesignNode,
        parent: Option<&BoundingBox>,
        owner: &str,
        depth: usize,
    ) -> Step<()> {
        if depth > MAX_DEPTH {
            return Err(too_deep(node));
        }
        let bounds = node.bounds();
        let (x, y) = match parent {
            Some(p) => (bounds.x - p.x, bounds.y - p.y),
            None => (0.0, 0.0),
        };
        match node.kind {
            NodeKind::Instance => self.emit_instance(w, frag, node, x, y, owner, depth),
            NodeKind::Component | NodeKind::ComponentSet if parent.is_some() => {
                self.emit_nested_component(w, frag, node, x, y, owner, depth)
            }
            NodeKind::Text => {
                self.emit_text(w, node, x, y);
                Ok(())
            }
            kind if kind.is_rendered() => self.emit_rendering(w, frag, node, x, y),
            NodeKind::Rectangle | NodeKind::Ellipse => self.emit_box(w, frag, node, x, y, true, owner, depth),
            _ => self.emit_box(w, frag, node, x, y, false, owner, depth),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_box(
        &mut self,
        w: &mut MarkupWriter,
        frag: &mut Fragment,
        node: &DesignNode,
        x: f64,
        y: f64,
        shape: bool,
        owner: &str,
        depth: usize,
    ) -> Step<()> {
        let fill = node.solid_fill().and_then(paint_color);
        let stroke = node.solid_stroke().and_then(paint_color);
        let is_rect = shape || fill.is_some() || stroke.is_some();

        w.open(if is_rect { "Rectangle" } else { "Item" });
        geometry(w, node, x, y);
        if is_rect {
            w.property("color", fill.as_deref().unwrap_or("\"transparent\""));
            if let Some(stroke) = stroke {
                w.property("border.color", stroke);
                w.property("border.width", number(node.stroke_weight.unwrap_or(1.0)));
            }
            let bounds = node.bounds();
            if node.kind == NodeKind::Ellipse {
                w.property("radius", number(bounds.width.min(bounds.height) / 2.0));
            } else if let Some(radius) = node.corner_radius
                && radius > 0.0
            {
                w.property("radius", number(radius));
            }
        }
        self.emit_image_fill(w, frag, node)?;

        let bounds = node.bounds();
        for child in &node.children {
            self.emit_node(w, frag, child, Some(&bounds), owner, depth + 1)?;
        }
        w.close();
        Ok(())
    }

    fn emit_image_fill(&mut self, w: &mut MarkupWriter, frag: &mut Fragment, node: &DesignNode) -> Step<()> {
        let Some(paint) = node.image_fill() else {
            return Ok(());
        };
        let image_ref = paint.image_ref.as_deref().unwrap_or(PLACEHOLDER_REF);
        let source = self.image_source(frag, image_ref, false)?;
        w.open("Image");
        w.property("anchors.fill", "parent");
        w.property("source", quoted(&source));
        w.property("fillMode", fill_mode(paint.scale_mode.as_deref()));
        if let Some(opacity) = paint.opacity
            && opacity != 1.0
        {
            w.property("opacity", number(opacity));
        }
        w.close();
        Ok(())
    }

    fn emit_rendering(
        &mut self,
        w: &mut MarkupWriter,
        frag: &mut Fragment,
        node: &DesignNode,
        x: f64,
        y: f64,
    ) -> Step<()> {
        let image_ref = if node.id.is_empty() { PLACEHOLDER_REF } else { node.id.as_str() };
        let source = self.image_source(frag, image_ref, true)?;
        w.open("Image");
        geometry(w, node, x, y);
        w.property("source", quoted(&source));
        w.property("fillMode", "Image.PreserveAspectFit");
        w.close();
        Ok(())
    }

    fn image_source(&mut self, frag: &mut Fragment, image_ref: &str, rendering: bool) -> Step<String> {
        let source = self.assets.resolve(self.provider, image_ref, rendering)?;
        if image_ref != PLACEHOLDER_REF {
            frag.image_refs.insert(ImageRef::from(image_ref));
        }
        Ok(source)
    }

    fn emit_text(&mut self, w: &mut MarkupWriter, node: &DesignNode, x: f64, y: f64) {
        w.open("Text");
        geometry(w, node, x, y);
        w.property("text", quoted(node.characters.as_deref().unwrap_or("")));
        if let Some(color) = node.solid_fill().and_then(paint_color) {
            w.property("color", color);
        }
        if let Some(style) = &node.style {
            if let Some(family) = style.font_family.as_deref() {
                let resolved = self.resolve_font(family);
                w.property("font.family", quoted(&resolved));
            }
            if let Some(size) = style.font_size {
                w.property("font.pixelSize", number(size.round()));
            }
            if style.font_weight.is_some_and(|weight| weight >= 600.0) {
                w.property("font.bold", "true");
            }
            if style.italic {
                w.property("font.italic", "true");
            }
            if let Some(align) = style
                .text_align_horizontal
                .as_deref()
                .and_then(horizontal_alignment)
            {
                w.property("horizontalAlignment", align);
            }
        }
        w.property("wrapMode", "Text.WordWrap");
        w.close();
    }

    fn resolve_font(&mut self, requested: &str) -> String {
        let resolution = self.fonts.resolve(requested, self.config.flags());
        if resolution.fresh && resolution.family != requested {
            self.events.warning(format!(
                "Font \"{}\" not found, using \"{}\"",
                requested, resolution.family
            ));
        }
        resolution.family
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_instance(
        &mut self,
        w: &mut MarkupWriter,
        frag: &mut Fragment,
        node: &DesignNode,
        x: f64,
        y: f64,
        owner: &str,
        depth: usize,
    ) -> Step<()> {
        let Some(component_id) = node.component_id.as_deref() else {
            return Err(EngineError::Structure(format!(
                "instance '{}' ({}) has no componentId",
                node.name, node.id
            ))
            .into());
        };

        if let Some(name) = self.table_name(component_id) {
            frag.dependencies.insert(ComponentId::from(component_id));
            reference(w, &name, node, x, y);
            return Ok(());
        }

        let (id, name) = match self.sub_component_name(component_id) {
            Some(name) => (ComponentId::from(component_id), name),
            None => {
                let body = match self.provider.fetch_node(component_id)? {
                    Fetch::Ready(bytes) => bytes,
                    Fetch::Pending => {
                        return Err(Interrupt::Suspend(PendingFetch::Node(component_id.to_string())));
                    }
                };
                let source = description::parse_node(&body)?;
                self.sub_component(component_id, &source, owner, depth + 1)?
            }
        };
        frag.use_sub_component(id, &name);
        reference(w, &name, node, x, y);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_nested_component(
        &mut self,
        w: &mut MarkupWriter,
        frag: &mut Fragment,
        node: &DesignNode,
        x: f64,
        y: f64,
        owner: &str,
        depth: usize,
    ) -> Step<()> {
        if let Some(name) = self.table_name(&node.id) {
            frag.dependencies.insert(ComponentId::from(node.id.as_str()));
            reference(w, &name, node, x, y);
            return Ok(());
        }
        let (id, name) = self.sub_component(&node.id, node, owner, depth + 1)?;
        frag.use_sub_component(id, &name);
        reference(w, &name, node, x, y);
        Ok(())
    }

    /// Generates `source` as a sub-component of `parent` and writes it out
    /// before the parent continues. Generated once per `key` per attempt;
    /// an empty key falls back to the generated name as id.
    fn sub_component(
        &mut self,
        key: &str,
        source: &DesignNode,
        parent: &str,
        depth: usize,
    ) -> Step<(ComponentId, String)> {
        if let Some(name) = self.sub_component_name(key) {
            return Ok((ComponentId::from(key), name));
        }
        if depth > MAX_DEPTH {
            return Err(too_deep(source));
        }
        self.checkpoint()?;

        let name = names::component_name(&source.name);
        debug!("Generating sub-component {} of {}", name, parent);
        let fragment = self.generate_body(source, &name, depth)?;
        if fragment.markup.is_empty() {
            return Err(EngineError::EmptyMarkup(name).into());
        }
        let id = ComponentId::from(if key.is_empty() { name.as_str() } else { key });
        let component = Component::new(
            id.clone(),
            name.clone(),
            self.with_header(&fragment.markup),
            fragment.dependencies,
            ComponentKind::Sub {
                parent: parent.to_string(),
            },
        );
        self.materialize(component, &fragment.image_refs)?;
        self.remember_sub_component(key, &name);
        Ok((id, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::config::ElementFilter;
    use crate::description::Description;
    use crate::events::EventSink;
    use crate::fonts::FontResolver;
    use crate::orchestrator::CancelHandle;
    use crate::walk::BuildContext;
    use designmark_traits::{ImageData, ImageFormat, MemoryProvider, StaticFontCatalog};
    use serde_json::json;
    use tempfile::tempdir;

    fn node(value: serde_json::Value) -> DesignNode {
        serde_json::from_value(value).unwrap()
    }

    /// Runs `f` against a fresh attempt over an empty description.
    fn with_attempt<R>(provider: &MemoryProvider, f: impl FnOnce(&mut Attempt<'_>) -> R) -> R {
        let dir = tempdir().unwrap();
        let config = EngineConfig {
            output_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        let description = Description::parse(br#"{"document": {"children": []}}"#).unwrap();
        let filter = ElementFilter::new();
        let mut fonts = FontResolver::new(Box::new(StaticFontCatalog::new(["Arial"])));
        let (events, _rx) = EventSink::channel();
        let cancel = CancelHandle::new();
        let ctx = BuildContext {
            provider,
            config: &config,
            header: "",
            placeholder: "data:broken",
            events: &events,
            cancel: &cancel,
        };
        let mut attempt = Attempt::new(ctx, &description, &filter, &mut fonts);
        f(&mut attempt)
    }

    fn text(fragment: &Fragment) -> String {
        String::from_utf8(fragment.markup.clone()).unwrap()
    }

    #[test]
    fn test_frame_with_children_uses_relative_positions() {
        let provider = MemoryProvider::new();
        let frame = node(json!({
            "id": "1:1", "type": "FRAME", "name": "Home",
            "absoluteBoundingBox": {"x": 100, "y": 50, "width": 320, "height": 200},
            "fills": [{"type": "SOLID", "color": {"r": 1, "g": 1, "b": 1}}],
            "children": [{
                "id": "1:2", "type": "RECTANGLE", "name": "Box",
                "absoluteBoundingBox": {"x": 110, "y": 60, "width": 20, "height": 10},
                "cornerRadius": 4,
                "fills": [{"type": "SOLID", "color": {"r": 1, "g": 0, "b": 0}}]
            }]
        }));
        let fragment = with_attempt(&provider, |a| a.generate_body(&frame, "Home", 0).unwrap());
        let expected = "Rectangle {\n    x: 0\n    y: 0\n    width: 320\n    height: 200\n    color: \"#ffffff\"\n    Rectangle {\n        x: 10\n        y: 10\n        width: 20\n        height: 10\n        color: \"#ff0000\"\n        radius: 4\n    }\n}\n";
        assert_eq!(text(&fragment), expected);
    }

    #[test]
    fn test_text_resolves_font() {
        let provider = MemoryProvider::new();
        let label = node(json!({
            "id": "2:1", "type": "TEXT", "name": "Label", "characters": "Hi \"there\"",
            "style": {"fontFamily": "arial", "fontSize": 14.4, "fontWeight": 700, "textAlignHorizontal": "CENTER"}
        }));
        let fragment = with_attempt(&provider, |a| a.generate_body(&label, "Label", 0).unwrap());
        let text = text(&fragment);
        assert!(text.contains("text: \"Hi \\\"there\\\"\""));
        assert!(text.contains("font.family: \"Arial\""));
        assert!(text.contains("font.pixelSize: 14"));
        assert!(text.contains("font.bold: true"));
        assert!(text.contains("horizontalAlignment: Text.AlignHCenter"));
    }

    #[test]
    fn test_vector_suspends_until_rendering_cached() {
        let provider = MemoryProvider::new();
        provider
            .insert_rendering("3:1", ImageData::new(b"png".to_vec(), ImageFormat::Png))
            .unwrap();
        let icon = node(json!({"id": "3:1", "type": "VECTOR", "name": "Icon"}));

        let result = with_attempt(&provider, |a| a.generate_body(&icon, "Icon", 0).map(|_| ()));
        assert!(matches!(result, Err(Interrupt::Suspend(PendingFetch::Rendering(_)))));

        provider.deliver_pending().unwrap();
        let fragment = with_attempt(&provider, |a| a.generate_body(&icon, "Icon", 0).unwrap());
        assert!(text(&fragment).contains("source: \"images/3_1.png\""));
        assert!(fragment.image_refs.contains("3:1"));
    }

    #[test]
    fn test_image_fill_without_ref_uses_placeholder() {
        let provider = MemoryProvider::new();
        let frame = node(json!({
            "id": "4:1", "type": "FRAME", "name": "Hero",
            "fills": [{"type": "IMAGE", "scaleMode": "FIT"}]
        }));
        let fragment = with_attempt(&provider, |a| a.generate_body(&frame, "Hero", 0).unwrap());
        let text = text(&fragment);
        assert!(text.contains("source: \"data:broken\""));
        assert!(text.contains("fillMode: Image.PreserveAspectFit"));
        assert!(fragment.image_refs.is_empty());
        assert_eq!(provider.fetch_requests(), 0);
    }

    #[test]
    fn test_external_instance_becomes_sub_component() {
        let provider = MemoryProvider::new();
        provider
            .insert_node(
                "ext:1",
                serde_json::to_vec(&json!({"document": {"id": "ext:1", "type": "COMPONENT", "name": "badge"}})).unwrap(),
            )
            .unwrap();
        provider.cache_all().unwrap();
        let frame = node(json!({
            "id": "5:1", "type": "FRAME", "name": "Card",
            "children": [
                {"id": "5:2", "type": "INSTANCE", "componentId": "ext:1", "name": "b1"},
                {"id": "5:3", "type": "INSTANCE", "componentId": "ext:1", "name": "b2"}
            ]
        }));
        let fragment = with_attempt(&provider, |a| a.generate_body(&frame, "Card", 0).unwrap());
        assert_eq!(fragment.sub_components, vec!["Badge_component".to_string()]);
        assert!(fragment.dependencies.contains("ext:1"));
        assert_eq!(text(&fragment).matches("Badge_component {").count(), 2);
        assert_eq!(provider.fetch_requests(), 0);
    }

    #[test]
    fn test_self_instancing_component_hits_depth_limit() {
        let provider = MemoryProvider::new();
        provider
            .insert_node(
                "loop",
                serde_json::to_vec(&json!({
                    "id": "loop", "type": "COMPONENT", "name": "Loop",
                    "children": [{"id": "l:1", "type": "INSTANCE", "componentId": "loop", "name": "again"}]
                }))
                .unwrap(),
            )
            .unwrap();
        provider.cache_all().unwrap();
        let root = node(json!({"id": "r", "type": "INSTANCE", "componentId": "loop", "name": "root"}));
        let result = with_attempt(&provider, |a| a.generate_body(&root, "Root", 0).map(|_| ()));
        assert!(matches!(result, Err(Interrupt::Fatal(EngineError::Structure(_)))));
    }

    #[test]
    fn test_instance_without_component_id_is_structural() {
        let provider = MemoryProvider::new();
        let bad = node(json!({"id": "6:1", "type": "INSTANCE", "name": "broken"}));
        let result = with_attempt(&provider, |a| a.generate_body(&bad, "X", 0).map(|_| ()));
        assert!(matches!(result, Err(Interrupt::Fatal(EngineError::Structure(_)))));
    }
}
