// src/models.rs

use crate::constants::DEFAULT_MEDIA_URL;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The contents of `widgets.toml`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Prefix for relative media paths.
    pub media_url: String,
    pub template_dirs: Vec<String>,
    /// Template that wraps every widget rendered through `render_to_response`.
    pub wrapper_template: Option<String>,
    /// When false, failing widgets are logged and replaced by a comment.
    pub strict: bool,
    pub debug: bool,
    /// Declarative widgets, keyed by qualified name.
    pub widgets: IndexMap<String, WidgetManifest>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            media_url: DEFAULT_MEDIA_URL.to_string(),
            template_dirs: Vec::new(),
            wrapper_template: None,
            strict: true,
            debug: false,
            widgets: IndexMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WidgetManifest {
    pub template: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub css: Vec<String>,
    #[serde(default)]
    pub js: Vec<String>,
    #[serde(default)]
    pub options: Vec<OptionManifest>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OptionManifest {
    pub name: String,
    #[serde(default)]
    pub kind: OptionManifestKind,
    #[serde(default)]
    pub short: Option<String>,
    #[serde(default)]
    pub long: Option<String>,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub default: Option<Value>,
    /// `[value, label]` pairs.
    #[serde(default)]
    pub choices: Vec<(Value, String)>,
    #[serde(default)]
    pub help: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OptionManifestKind {
    #[default]
    Scalar,
    Bool,
    Choice,
    Multi,
    List,
}
