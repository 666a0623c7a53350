// src/core/widget.rs

//! The capability set every widget exposes to templates and to out-of-band
//! (AJAX, download) rendering.

use crate::{
    constants::{GENERATED_UID_PREFIX, UID_HASH_LENGTH},
    core::{
        context::{Context, display_value},
        engine::Engine,
        media::Media,
        options::OptionDef,
        render::RenderError,
        values::Values,
    },
};
use serde_json::{Value, json};
use std::{fmt, io::Write, str::FromStr};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Html,
    Csv,
    Svg,
    Png,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Csv,
        ExportFormat::Svg,
        ExportFormat::Png,
        ExportFormat::Html,
    ];

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Html => "text/html",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Png => "image/png",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Html => "html",
            ExportFormat::Csv => "csv",
            ExportFormat::Svg => "svg",
            ExportFormat::Png => "png",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportFormat::Html => "HTML",
            ExportFormat::Csv => "CSV",
            ExportFormat::Svg => "SVG",
            ExportFormat::Png => "PNG",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(ExportFormat::Html),
            "csv" => Ok(ExportFormat::Csv),
            "svg" => Ok(ExportFormat::Svg),
            "png" => Ok(ExportFormat::Png),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Sorry, the {0} format is not available for this widget.")]
    Unsupported(ExportFormat),
    #[error("Unknown export format '{0}'.")]
    UnknownFormat(String),
    #[error("Failed to render widget for export: {0}")]
    Render(#[from] RenderError),
    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

/// A self-contained, parametrized view fragment.
///
/// Only [`Widget::qualified_name`] is mandatory. Everything else has the
/// behavior of an empty widget: no options, no media, renders `""`, exports
/// HTML only.
pub trait Widget: Send + Sync + fmt::Debug {
    /// The stable identifier used in widget tags, e.g. `reports.widgets.Chart`.
    fn qualified_name(&self) -> &str;

    /// The last segment of the qualified name.
    fn classname(&self) -> &str {
        let name = self.qualified_name();
        name.rsplit('.').next().unwrap_or(name)
    }

    fn description(&self) -> Option<&str> {
        None
    }

    fn options(&self) -> &[OptionDef] {
        &[]
    }

    fn css_media(&self) -> Vec<String> {
        Vec::new()
    }

    fn js_media(&self) -> Vec<String> {
        Vec::new()
    }

    fn media(&self) -> Media {
        Media::new(self.css_media(), self.js_media())
    }

    /// Produces the HTML that replaces the widget tag.
    fn render(
        &self,
        _values: &Values,
        _context: &mut Context,
        _engine: &Engine,
    ) -> Result<String, RenderError> {
        Ok(String::new())
    }

    /// Formats this widget implements. HTML is always available through `render`.
    fn export_formats(&self) -> Vec<ExportFormat> {
        vec![ExportFormat::Html]
    }

    /// Writes the widget data as CSV, or only the header row when `headers` is set.
    fn as_csv(&self, _values: &Values, _out: &mut dyn Write, _headers: bool) -> Result<(), ExportError> {
        Err(ExportError::Unsupported(ExportFormat::Csv))
    }

    fn as_svg(&self, _values: &Values, _out: &mut dyn Write) -> Result<(), ExportError> {
        Err(ExportError::Unsupported(ExportFormat::Svg))
    }

    fn as_png(&self, _values: &Values, _out: &mut dyn Write) -> Result<(), ExportError> {
        Err(ExportError::Unsupported(ExportFormat::Png))
    }
}

/// A uid that is stable for one widget class and option set, so it can be
/// used as an HTML id.
pub fn generate_uid(widget: &dyn Widget, values: &Values) -> String {
    let mut items: Vec<(&String, &Value)> = values.iter().collect();
    items.sort_by(|a, b| a.0.cmp(b.0));

    let mut hasher = blake3::Hasher::new();
    for (name, value) in items {
        hasher.update(format!("({name:?}, {value})").as_bytes());
    }
    hasher.update(widget.classname().as_bytes());

    let hash = hasher.finalize();
    let truncated = hash.as_bytes().get(..UID_HASH_LENGTH).unwrap_or(hash.as_bytes());
    format!("{GENERATED_UID_PREFIX}{}", hex::encode(truncated))
}

/// Formats this widget can be downloaded as, with display labels.
pub fn downloadable_as(widget: &dyn Widget) -> Vec<(ExportFormat, &'static str)> {
    let implemented = widget.export_formats();
    ExportFormat::ALL
        .into_iter()
        .filter(|format| implemented.contains(format))
        .map(|format| (format, format.label()))
        .collect()
}

/// Invokes the export hook for `format`.
pub fn export(
    widget: &dyn Widget,
    format: ExportFormat,
    values: &Values,
    engine: &Engine,
    out: &mut dyn Write,
) -> Result<(), ExportError> {
    log::debug!("Exporting '{}' as {}", widget.qualified_name(), format);
    match format {
        ExportFormat::Html => {
            let mut context = Context::from_value(json!({ "options": values.to_value() }));
            let html = widget.render(values, &mut context, engine)?;
            out.write_all(html.as_bytes())?;
            Ok(())
        }
        ExportFormat::Csv => widget.as_csv(values, out, false),
        ExportFormat::Svg => widget.as_svg(values, out),
        ExportFormat::Png => widget.as_png(values, out),
    }
}

/// File name offered for a download, e.g. `Chart_2f1c.csv`.
pub fn download_filename(widget: &dyn Widget, values: &Values, format: ExportFormat) -> String {
    let uid = generate_uid(widget, values);
    let short = uid
        .strip_prefix(GENERATED_UID_PREFIX)
        .and_then(|hash| hash.get(..8))
        .unwrap_or(&uid);
    format!("{}_{}.{}", widget.classname(), short, format.extension())
}

/// Renders a widget template and, when configured, wraps it in the wrapper
/// template. The wrapper sees `rendered_widget` and `widget_template`.
pub fn render_to_response(
    engine: &Engine,
    template_name: &str,
    context: &mut Context,
) -> Result<String, RenderError> {
    let rendered = engine.render_to_string(template_name, context)?;

    let Some(wrapper) = engine.settings().wrapper_template.as_deref() else {
        return Ok(rendered);
    };

    context.set("rendered_widget", Value::String(rendered));
    context.set("widget_template", Value::String(template_name.to_string()));
    engine.render_to_string(wrapper, context)
}

/// Debug description of a value map, sorted by key.
pub(crate) fn describe_values(values: &Values) -> String {
    let mut items: Vec<String> = values
        .iter()
        .map(|(k, v)| format!("{k}={}", display_value(v)))
        .collect();
    items.sort();
    items.join(", ")
}
