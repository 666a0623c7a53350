// src/core/discovery.rs

//! # Discovery
//!
//! Finds every widget a page may render without rendering it, so the page
//! head can list all the CSS and JS those widgets need.
//!
//! The walk follows constant `extends` parents and constant `include`s.
//! Parents are walked in full, including blocks a child overrides, so a page
//! may load more media than it uses but never less. Targets named by a
//! variable cannot be known before render; callers pass them explicitly as
//! `variable_includes`.

use crate::{
    constants::{MAX_RECURSION_DEPTH, PAGE_WIDGETS_KEY},
    core::{
        context::Context,
        engine::Engine,
        media::Media,
        render::RenderError,
        template::{Template, TemplateError, TemplateRef, WidgetNode},
    },
};
use serde_json::json;
use std::{collections::HashSet, sync::Arc};

/// Widget nodes reachable from `template`, in discovery order: the
/// template's own widgets, then its parent's, then those of its includes.
/// Repeated widget tags are all kept. A template reached more than once
/// (a partial included from several places) is walked the first time only.
pub fn find_widget_nodes(engine: &Engine, template: &Template) -> Result<Vec<Arc<WidgetNode>>, TemplateError> {
    let mut discovery = Discovery {
        engine,
        walked: HashSet::new(),
    };
    let mut widgets = Vec::new();
    discovery.walk(template, 0, &mut widgets)?;
    log::debug!(
        "Discovered {} widget node(s) from '{}'",
        widgets.len(),
        template.name()
    );
    Ok(widgets)
}

struct Discovery<'e> {
    engine: &'e Engine,
    walked: HashSet<String>,
}

impl Discovery<'_> {
    fn walk(
        &mut self,
        template: &Template,
        depth: u32,
        widgets: &mut Vec<Arc<WidgetNode>>,
    ) -> Result<(), TemplateError> {
        if depth >= MAX_RECURSION_DEPTH {
            return Err(TemplateError::RecursionLimit {
                limit: MAX_RECURSION_DEPTH,
                name: template.name().to_string(),
            });
        }

        widgets.extend(template.widget_nodes());
        if let Some(parent) = template.parent() {
            self.walk_ref(template, parent, depth, widgets)?;
        }
        for include in template.includes() {
            self.walk_ref(template, include, depth, widgets)?;
        }

        // Only completed walks are recorded, so a cycle still runs into the depth limit.
        self.walked.insert(template.name().to_string());
        Ok(())
    }

    fn walk_ref(
        &mut self,
        template: &Template,
        target: &TemplateRef,
        depth: u32,
        widgets: &mut Vec<Arc<WidgetNode>>,
    ) -> Result<(), TemplateError> {
        match target {
            TemplateRef::Constant(name) if self.walked.contains(name) => {
                log::debug!("'{}' already walked, skipping it in '{}'", name, template.name());
                Ok(())
            }
            TemplateRef::Constant(name) => {
                let referenced = self.engine.get_template(name)?;
                self.walk(&referenced, depth.saturating_add(1), widgets)
            }
            TemplateRef::Variable(placeholder) => {
                log::debug!(
                    "Skipping variable template reference '{}' in '{}'",
                    placeholder,
                    template.name()
                );
                Ok(())
            }
        }
    }
}

/// Merges the media of every node, in order, without duplicates.
pub fn aggregate_media(nodes: &[Arc<WidgetNode>]) -> Media {
    nodes.iter().map(|node| node.media()).collect()
}

/// A page template together with every widget it may render and their
/// merged media.
#[derive(Debug)]
pub struct WidgetTemplateWrapper<'e> {
    engine: &'e Engine,
    template: Arc<Template>,
    widget_nodes: Vec<Arc<WidgetNode>>,
    media: Media,
}

impl<'e> WidgetTemplateWrapper<'e> {
    /// Discovers the widgets of `template` and of each variable include
    /// target. Their media is added to `media`, or to a new descriptor.
    pub fn new(
        engine: &'e Engine,
        template: Arc<Template>,
        variable_includes: &[Arc<Template>],
        media: Option<Media>,
    ) -> Result<Self, TemplateError> {
        let mut widget_nodes = find_widget_nodes(engine, &template)?;
        for include in variable_includes {
            widget_nodes.extend(find_widget_nodes(engine, include)?);
        }

        let media = media
            .unwrap_or_default()
            .merge(&aggregate_media(&widget_nodes));

        Ok(Self {
            engine,
            template,
            widget_nodes,
            media,
        })
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn widget_nodes(&self) -> &[Arc<WidgetNode>] {
        &self.widget_nodes
    }

    pub fn media(&self) -> &Media {
        &self.media
    }

    /// Renders the page with `widgets.media` (the rendered tags),
    /// `widgets.css` and `widgets.js` in scope.
    pub fn render(&self, context: &mut Context) -> Result<String, RenderError> {
        let media_url = &self.engine.settings().media_url;
        context.set(
            PAGE_WIDGETS_KEY,
            json!({
                "media": self.media.render(media_url),
                "css": self.media.css().collect::<Vec<_>>(),
                "js": self.media.js().collect::<Vec<_>>(),
            }),
        );
        self.engine.render(&self.template, context)
    }
}

/// Renders the first existing template of `names` as a page, with the
/// media of all its widgets available under `widgets`.
pub fn render_page<S: AsRef<str>>(
    engine: &Engine,
    names: &[S],
    context: &mut Context,
    variable_includes: &[S],
) -> Result<String, RenderError> {
    let template = engine.select_template(names)?;
    let variable_includes = variable_includes
        .iter()
        .map(|name| engine.get_template(name.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    WidgetTemplateWrapper::new(engine, template, &variable_includes, None)?.render(context)
}
