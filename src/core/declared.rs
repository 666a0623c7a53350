// src/core/declared.rs

//! Widgets declared in the settings file instead of in code. They render a
//! template with the usual widget scope (`options`, `uid`, ...).

use crate::{
    core::{
        config_loader::ConfigError,
        context::Context,
        engine::Engine,
        options::{Choices, OptionDef},
        registry::WidgetRegistry,
        render::RenderError,
        values::Values,
        widget::{Widget, render_to_response},
    },
    models::{OptionManifest, OptionManifestKind, Settings, WidgetManifest},
};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct DeclaredWidget {
    name: String,
    template: String,
    description: Option<String>,
    css: Vec<String>,
    js: Vec<String>,
    options: Vec<OptionDef>,
}

impl DeclaredWidget {
    pub fn from_manifest(name: &str, manifest: &WidgetManifest) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut options = Vec::with_capacity(manifest.options.len());

        for option in &manifest.options {
            if !seen.insert(option.name.as_str()) {
                return Err(invalid(name, option, "declared more than once"));
            }
            options.push(build_option(name, option)?);
        }

        Ok(Self {
            name: name.to_string(),
            template: manifest.template.clone(),
            description: manifest.description.clone(),
            css: manifest.css.clone(),
            js: manifest.js.clone(),
            options,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

fn invalid(widget: &str, option: &OptionManifest, message: &str) -> ConfigError {
    ConfigError::InvalidOption {
        widget: widget.to_string(),
        option: option.name.clone(),
        message: message.to_string(),
    }
}

fn build_option(widget: &str, manifest: &OptionManifest) -> Result<OptionDef, ConfigError> {
    if manifest.name.is_empty() {
        return Err(invalid(widget, manifest, "name cannot be empty"));
    }
    let choices = || Choices::Static(manifest.choices.clone());
    let mut option = match manifest.kind {
        OptionManifestKind::Scalar => OptionDef::scalar(&manifest.name),
        OptionManifestKind::Bool => OptionDef::boolean(&manifest.name),
        OptionManifestKind::Choice => OptionDef::choice(&manifest.name, choices()),
        OptionManifestKind::Multi => OptionDef::multi(&manifest.name, choices()),
        OptionManifestKind::List => OptionDef::list(&manifest.name),
    };
    if !manifest.choices.is_empty()
        && !matches!(
            manifest.kind,
            OptionManifestKind::Choice | OptionManifestKind::Multi
        )
    {
        return Err(invalid(widget, manifest, "only choice and multi options take choices"));
    }

    if let Some(short) = &manifest.short {
        let valid = short.len() == 2 && short.starts_with('-') && !short.starts_with("--");
        if !valid {
            return Err(invalid(widget, manifest, "short form must look like '-x'"));
        }
        option = option.short(short);
    }
    if let Some(long) = &manifest.long {
        if !long.starts_with("--") || long.len() < 3 {
            return Err(invalid(widget, manifest, "long form must look like '--name'"));
        }
        option = option.long(long);
    }
    if let Some(default) = &manifest.default {
        option = option.with_default(default.clone());
    }
    if let Some(required) = manifest.required {
        option = option.required(required);
    }
    if let Some(help) = &manifest.help {
        option = option.help(help);
    }
    Ok(option)
}

impl Widget for DeclaredWidget {
    fn qualified_name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn options(&self) -> &[OptionDef] {
        &self.options
    }

    fn css_media(&self) -> Vec<String> {
        self.css.clone()
    }

    fn js_media(&self) -> Vec<String> {
        self.js.clone()
    }

    fn render(&self, _values: &Values, context: &mut Context, engine: &Engine) -> Result<String, RenderError> {
        render_to_response(engine, &self.template, context)
    }
}

/// A registry with the built-in widgets plus every widget declared in `settings`.
pub fn build_registry(settings: &Settings) -> Result<WidgetRegistry, ConfigError> {
    let mut registry = WidgetRegistry::with_builtins();
    for (name, manifest) in &settings.widgets {
        let widget = DeclaredWidget::from_manifest(name, manifest)?;
        if !registry.register(move || Box::new(widget.clone())) {
            log::warn!("Declared widget '{}' clashes with a registered widget, skipping it", name);
        }
    }
    Ok(registry)
}
