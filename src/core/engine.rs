// src/core/engine.rs

use crate::{
    core::{
        context::Context,
        loader::TemplateLoader,
        registry::WidgetRegistry,
        render::{self, RenderError},
        template::{Template, TemplateError},
    },
    models::Settings,
};
use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

/// Name given to templates compiled from strings.
pub const STRING_TEMPLATE_NAME: &str = "<string>";

/// Loads, compiles and caches templates, and renders them.
///
/// Compiled templates (and the widget nodes inside them) are cached by name
/// and reused across renders.
#[derive(Debug)]
pub struct Engine {
    registry: Arc<WidgetRegistry>,
    loader: Box<dyn TemplateLoader>,
    settings: Settings,
    cache: RwLock<HashMap<String, Arc<Template>>>,
}

impl Engine {
    pub fn new(
        registry: Arc<WidgetRegistry>,
        loader: impl TemplateLoader + 'static,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            loader: Box::new(loader),
            settings,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &WidgetRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &dyn TemplateLoader {
        self.loader.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Returns the compiled template, compiling it on first use.
    pub fn get_template(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();
        if let Some(template) = cached {
            return Ok(template);
        }

        let source = self.loader.load_source(name)?;
        let compiled = Template::compile(name, &source, &self.registry)?;
        // Another thread may have stored the same name meanwhile; its entry wins.
        let template = self
            .cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(compiled))
            .clone();
        Ok(template)
    }

    /// The first of `names` that exists. Errors other than a missing template
    /// are returned as is.
    pub fn select_template<S: AsRef<str>>(&self, names: &[S]) -> Result<Arc<Template>, TemplateError> {
        for name in names {
            match self.get_template(name.as_ref()) {
                Err(TemplateError::NotFound(_)) => continue,
                other => return other,
            }
        }
        let tried: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        Err(TemplateError::NotFound(tried.join(", ")))
    }

    /// Compiles a template from source without caching it.
    pub fn from_string(&self, source: &str) -> Result<Template, TemplateError> {
        Template::compile(STRING_TEMPLATE_NAME, source, &self.registry)
    }

    pub fn render(&self, template: &Template, context: &mut Context) -> Result<String, RenderError> {
        render::render_template(self, template, context, 0)
    }

    pub fn render_to_string(&self, name: &str, context: &mut Context) -> Result<String, RenderError> {
        let template = self.get_template(name)?;
        self.render(&template, context)
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
