// src/core/registry.rs

use crate::core::widget::Widget;
use indexmap::IndexMap;
use std::{collections::BTreeMap, fmt, sync::Arc};

pub type WidgetFactory = Arc<dyn Fn() -> Box<dyn Widget> + Send + Sync>;

/// Maps qualified widget names to factories.
///
/// Filled once at startup through [`WidgetRegistry::register`], then shared
/// read-only (usually behind an `Arc`) by every template compilation.
#[derive(Clone, Default)]
pub struct WidgetRegistry {
    factories: IndexMap<String, WidgetFactory>,
}

impl fmt::Debug for WidgetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WidgetRegistry")
            .field("widgets", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding only [`WidgetBase`].
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(|| Box::new(WidgetBase));
        registry
    }

    /// Registers a factory under the qualified name of the widget it builds.
    /// Returns `false`, keeping the existing entry, if the name is taken.
    pub fn register<F>(&mut self, factory: F) -> bool
    where
        F: Fn() -> Box<dyn Widget> + Send + Sync + 'static,
    {
        let name = factory().qualified_name().to_string();
        if self.factories.contains_key(&name) {
            log::debug!("Widget '{}' is already registered, keeping the first one", name);
            return false;
        }
        log::debug!("Registered widget '{}'", name);
        self.factories.insert(name, Arc::new(factory));
        true
    }

    /// Builds a new instance of the named widget.
    pub fn find(&self, name: &str) -> Option<Box<dyn Widget>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Qualified names grouped by their first dotted segment.
    pub fn widgets_by_app(&self) -> BTreeMap<String, Vec<String>> {
        let mut apps: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in self.factories.keys() {
            let app = name.split('.').next().unwrap_or(name);
            apps.entry(app.to_string()).or_default().push(name.clone());
        }
        apps
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// The empty widget: no options, no media, renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct WidgetBase;

impl Widget for WidgetBase {
    fn qualified_name(&self) -> &str {
        "widgets.base.WidgetBase"
    }

    fn description(&self) -> Option<&str> {
        Some("Base widget. Renders nothing.")
    }
}
