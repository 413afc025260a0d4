//! One build attempt: components first, then canvases and their elements.
//!
//! An attempt owns everything it produces. It is discarded on any interrupt
//! and the next attempt starts again from the root of the description.

use crate::assets::{AssetPipeline, ImageMode};
use crate::config::{ElementFilter, EngineConfig, GenerationFlags};
use crate::description::Description;
use crate::error::{EngineError, Interrupt, Step};
use crate::events::{BuildEvent, EventSink};
use crate::fonts::FontResolver;
use crate::generator::Fragment;
use crate::orchestrator::{CancelHandle, CompletedBuild};
use crate::output;
use designmark_traits::DesignProvider;
use designmark_types::names::{self, make_file_name};
use designmark_types::{
    Canvas, Component, ComponentId, ComponentKind, Document, Element, ImageContextIndex, ImageRef,
};
use log::debug;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

/// Markup emitted for elements excluded by the filter or generating nothing.
pub const FILTERED_OUT: &str = "Text{text: \"filtered out\"}";

/// Everything an attempt borrows from the engine besides the font resolver.
pub(crate) struct BuildContext<'a> {
    pub provider: &'a dyn DesignProvider,
    pub config: &'a EngineConfig,
    pub header: &'a str,
    pub placeholder: &'a str,
    pub events: &'a EventSink,
    pub cancel: &'a CancelHandle,
}

pub(crate) struct Attempt<'a> {
    pub(crate) provider: &'a dyn DesignProvider,
    pub(crate) config: &'a EngineConfig,
    header: &'a str,
    pub(crate) events: &'a EventSink,
    cancel: &'a CancelHandle,
    description: &'a Description,
    filter: &'a ElementFilter,
    pub(crate) fonts: &'a mut FontResolver,
    /// Component id -> generated name, for every component in the description.
    table: HashMap<&'a str, String>,
    pub(crate) assets: AssetPipeline<'a>,
    document: Document,
    contexts: ImageContextIndex,
    /// Source node id -> name of the sub-component generated from it.
    sub_components: HashMap<String, String>,
}

impl<'a> Attempt<'a> {
    pub fn new(
        ctx: BuildContext<'a>,
        description: &'a Description,
        filter: &'a ElementFilter,
        fonts: &'a mut FontResolver,
    ) -> Self {
        let mode = if ctx.config.flags().contains(GenerationFlags::EMBED_IMAGES) {
            ImageMode::Embedded
        } else {
            ImageMode::Referenced
        };
        let table = description
            .components
            .iter()
            .map(|(id, node)| (id.as_str(), names::component_name(&node.name)))
            .collect();
        Self {
            provider: ctx.provider,
            config: ctx.config,
            header: ctx.header,
            events: ctx.events,
            cancel: ctx.cancel,
            description,
            filter,
            fonts,
            table,
            assets: AssetPipeline::new(
                mode,
                ctx.config.images_dir(),
                ctx.config.max_image_dimension(),
                ctx.placeholder,
                ctx.events,
            ),
            document: Document::new(description.name.clone()),
            contexts: ImageContextIndex::new(),
            sub_components: HashMap::new(),
        }
    }

    /// Runs the whole walk. Any interrupt aborts it immediately.
    pub fn run(mut self) -> Step<CompletedBuild> {
        output::ensure_dir(self.config.output_dir())?;

        let started = Instant::now();
        self.resolve_components()?;
        self.timed("components", started);

        let started = Instant::now();
        self.resolve_canvases()?;
        self.timed("elements", started);

        if let Some((owner, component)) = self.document.missing_components().into_iter().next() {
            return Err(EngineError::MissingComponent { owner, component }.into());
        }

        Ok(CompletedBuild::new(
            self.document,
            self.assets.into_files(),
            self.contexts,
            self.config.output_dir().to_path_buf(),
            self.header.to_string(),
            self.config.extension().to_string(),
        ))
    }

    /// Cancellation checkpoint.
    pub(crate) fn checkpoint(&self) -> Step<()> {
        if self.cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }
        Ok(())
    }

    fn timed(&self, phase: &str, started: Instant) {
        if self.config.flags().contains(GenerationFlags::TIMED) {
            self.events
                .info(format!("timed {} {}ms", phase, started.elapsed().as_millis()));
        }
    }

    pub(crate) fn table_name(&self, id: &str) -> Option<String> {
        self.table.get(id).cloned()
    }

    pub(crate) fn sub_component_name(&self, key: &str) -> Option<String> {
        self.sub_components.get(key).cloned()
    }

    pub(crate) fn remember_sub_component(&mut self, key: &str, name: &str) {
        if !key.is_empty() {
            self.sub_components.insert(key.to_string(), name.to_string());
        }
    }

    pub(crate) fn with_header(&self, body: &[u8]) -> Vec<u8> {
        let mut markup = Vec::with_capacity(self.header.len() + body.len());
        markup.extend_from_slice(self.header.as_bytes());
        markup.extend_from_slice(body);
        markup
    }

    fn resolve_components(&mut self) -> Step<()> {
        let description = self.description;
        for (id, node) in &description.components {
            self.checkpoint()?;
            let name = names::component_name(&node.name);
            debug!("Generating component {} ({})", name, id);
            let fragment = self.generate_body(node, &name, 0)?;
            if fragment.markup.is_empty() {
                return Err(EngineError::EmptyMarkup(name).into());
            }
            let component = Component::new(
                ComponentId::from(id.as_str()),
                name,
                self.with_header(&fragment.markup),
                fragment.dependencies,
                ComponentKind::Shared,
            );
            self.materialize(component, &fragment.image_refs)?;
        }
        Ok(())
    }

    /// Writes a component file and registers it in the document.
    ///
    /// A second component under an already registered name is accepted only
    /// when its bytes are identical; it is then not written again.
    pub(crate) fn materialize(
        &mut self,
        component: Component,
        image_refs: &BTreeSet<ImageRef>,
    ) -> Step<()> {
        for image_ref in image_refs {
            self.contexts.record(image_ref.clone(), component.name());
        }
        if let Some(existing) = self.document.component(component.name()) {
            if existing.markup() == component.markup() {
                debug!("Component {} already written", component.name());
                return Ok(());
            }
            return Err(EngineError::NameCollision {
                name: component.name().to_string(),
                first: existing.id().to_string(),
                second: component.id().to_string(),
            }
            .into());
        }
        let path = self
            .config
            .output_dir()
            .join(format!("{}.{}", component.name(), self.config.extension()));
        output::write_atomic(&path, component.markup())?;
        self.document.insert_component(component);
        Ok(())
    }

    fn canvas(&mut self, index: usize) -> Step<&mut Canvas> {
        self.document.canvas_mut(index).ok_or_else(|| {
            Interrupt::Fatal(EngineError::Structure(format!("canvas {} vanished", index)))
        })
    }

    fn resolve_canvases(&mut self) -> Step<()> {
        let description = self.description;
        for (canvas_pos, canvas_node) in description.canvases.iter().enumerate() {
            self.checkpoint()?;
            let canvas_index = self.document.len();
            self.document.add_canvas(canvas_node.name.clone());
            let file_prefix = make_file_name(&canvas_node.name);

            for (element_pos, node) in canvas_node.elements.iter().enumerate() {
                self.checkpoint()?;
                let name = self
                    .canvas(canvas_index)?
                    .unique_element_name(&names::element_name(&node.name));

                let fragment = if self.filter.includes(canvas_pos + 1, element_pos + 1) {
                    self.generate_body(node, &name, 0)?
                } else {
                    Fragment::filtered_out()
                };
                let Fragment {
                    markup,
                    dependencies,
                    sub_components,
                    image_refs,
                } = fragment;
                let body = if markup.is_empty() {
                    FILTERED_OUT.as_bytes().to_vec()
                } else {
                    markup
                };

                let mut components: Vec<String> = Vec::new();
                let referenced = dependencies
                    .iter()
                    .filter_map(|id| self.table_name(id.as_str()))
                    .chain(sub_components);
                for component in referenced {
                    if !components.contains(&component) {
                        components.push(component);
                    }
                }
                let owner = names::element_owner(&canvas_node.name, &name);
                for image_ref in &image_refs {
                    self.contexts.record(image_ref.clone(), owner.clone());
                }

                let markup = self.with_header(&body);
                let path = self.config.output_dir().join(format!(
                    "{}_{}.{}",
                    file_prefix,
                    name,
                    self.config.extension()
                ));
                output::write_atomic(&path, &markup)?;
                self.canvas(canvas_index)?
                    .add_element(Element::new(name, markup, components, image_refs))?;
                self.events.emit(BuildEvent::Progressed {
                    canvas: canvas_index,
                    element: element_pos,
                });
            }
        }
        Ok(())
    }
}
