// src/core/render.rs

//! Rendering of compiled templates against a [`Context`].
//!
//! Widget tags go through the full option pipeline on every render:
//! resolve the parsed arguments, validate them, pick the uid, then hand the
//! values to the widget inside a scope that is popped afterwards.

use crate::{
    constants::{MAX_RECURSION_DEPTH, WIDGET_DEBUG_KEY},
    core::{
        context::{Context, ResolveError, display_value},
        engine::Engine,
        query::{escape_html, options_to_query_string, options_to_tag_string},
        template::{Node, Template, TemplateError, WidgetNode},
        values::{OptionError, process_values, resolve_all},
        widget::{describe_values, generate_uid},
    },
};
use serde_json::{Map, Value, json};
use std::{collections::HashMap, iter, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Options(#[from] OptionError),
    /// Raised by widget implementations whose own render step fails.
    #[error("Widget '{widget}' failed to render: {message}")]
    Widget { widget: String, message: String },
}

/// Block bodies by name, taken from the most derived template defining them.
type Blocks<'t> = HashMap<&'t str, &'t [Node]>;

fn check_depth(depth: u32, name: &str) -> Result<(), TemplateError> {
    if depth >= MAX_RECURSION_DEPTH {
        return Err(TemplateError::RecursionLimit {
            limit: MAX_RECURSION_DEPTH,
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Renders `template`, following its `extends` chain to the root template
/// and overriding the root's blocks with the most derived definitions.
pub(crate) fn render_template(
    engine: &Engine,
    template: &Template,
    context: &mut Context,
    depth: u32,
) -> Result<String, RenderError> {
    check_depth(depth, template.name())?;

    let mut ancestors: Vec<Arc<Template>> = Vec::new();
    let mut next = template.parent().cloned();
    while let Some(target) = next {
        let level = u32::try_from(ancestors.len()).unwrap_or(u32::MAX);
        check_depth(depth.saturating_add(level).saturating_add(1), template.name())?;

        let name = target.resolve(context)?;
        let parent = engine.get_template(&name)?;
        next = parent.parent().cloned();
        ancestors.push(parent);
    }

    let mut blocks: Blocks<'_> = HashMap::new();
    for level in iter::once(template).chain(ancestors.iter().map(Arc::as_ref)) {
        for (name, nodes) in level.blocks() {
            blocks.entry(name).or_insert(nodes);
        }
    }

    let root = ancestors.last().map(Arc::as_ref).unwrap_or(template);
    let renderer = Renderer {
        engine,
        blocks,
        depth,
    };
    renderer.render_nodes(root.nodes(), context)
}

struct Renderer<'t> {
    engine: &'t Engine,
    blocks: Blocks<'t>,
    depth: u32,
}

impl Renderer<'_> {
    fn render_nodes(&self, nodes: &[Node], context: &mut Context) -> Result<String, RenderError> {
        let mut output = String::new();
        for node in nodes {
            output.push_str(&self.render_node(node, context)?);
        }
        Ok(output)
    }

    fn render_node(&self, node: &Node, context: &mut Context) -> Result<String, RenderError> {
        match node {
            Node::Text(text) => Ok(text.clone()),
            Node::Variable(placeholder) => match placeholder.resolve(context) {
                Ok(value) => Ok(display_value(&value)),
                Err(e) => {
                    log::debug!("{}", e);
                    Ok(String::new())
                }
            },
            Node::Block { name, nodes } => {
                let body = self.blocks.get(name.as_str()).copied().unwrap_or(nodes.as_slice());
                self.render_nodes(body, context)
            }
            Node::Include(target) => {
                let name = target.resolve(context)?;
                let included = self.engine.get_template(&name)?;
                render_template(self.engine, &included, context, self.depth.saturating_add(1))
            }
            Node::With { bindings, nodes } => {
                let mut scope = Map::new();
                for (name, placeholder) in bindings {
                    scope.insert(name.clone(), placeholder.resolve(context)?);
                }
                context.push();
                let mut context = scopeguard::guard(context, |c| {
                    c.pop();
                });
                context.update(scope);
                self.render_nodes(nodes, &mut context)
            }
            Node::Widget(node) => self.render_widget_tag(node, context),
        }
    }

    fn render_widget_tag(&self, node: &WidgetNode, context: &mut Context) -> Result<String, RenderError> {
        let result = run_widget(self.engine, node, context).and_then(|(uid, rendered)| {
            match node.box_spec() {
                Some(_) => self.render_box(node, uid, rendered, context),
                None => Ok(rendered),
            }
        });

        match result {
            Ok(rendered) => Ok(rendered),
            Err(e) if !self.engine.settings().strict => {
                let name = node.widget().qualified_name();
                log::error!("Widget '{}' failed to render: {}", name, e);
                Ok(format!(
                    "<!-- widget {} failed: {} -->",
                    name,
                    escape_html(&e.to_string()).replace("--", "- -")
                ))
            }
            Err(e) => Err(e),
        }
    }

    fn render_box(
        &self,
        node: &WidgetNode,
        uid: String,
        rendered: String,
        context: &mut Context,
    ) -> Result<String, RenderError> {
        let Some(spec) = node.box_spec() else {
            return Ok(rendered);
        };
        let name = spec.template.resolve(context)?;
        let template = self.engine.get_template(&name)?;
        let widget = node.widget();

        context.push();
        let mut context = scopeguard::guard(context, |c| {
            c.pop();
        });
        context.set("box_widget", Value::String(rendered));
        context.set("box_title", Value::String(spec.title.clone()));
        context.set("uid", Value::String(uid));
        context.set(
            "widget",
            json!({
                "classname": widget.classname(),
                "qualified_classname": widget.qualified_name(),
            }),
        );
        render_template(self.engine, &template, &mut context, self.depth.saturating_add(1))
    }
}

/// Runs one widget tag: resolve, validate, pick the uid, render in a fresh scope.
pub fn render_widget_node(engine: &Engine, node: &WidgetNode, context: &mut Context) -> Result<String, RenderError> {
    run_widget(engine, node, context).map(|(_, rendered)| rendered)
}

/// Returns the uid used together with the rendered widget.
fn run_widget(engine: &Engine, node: &WidgetNode, context: &mut Context) -> Result<(String, String), RenderError> {
    let widget = node.widget();
    let resolved = resolve_all(node.arguments(), context)?;
    let values = process_values(&resolved, widget.options())?;
    log::debug!("Rendering '{}' with {}", widget.qualified_name(), describe_values(&values));

    let uid = match node.as_name() {
        Some(placeholder) => display_value(&placeholder.resolve(context)?),
        None => generate_uid(widget, &values),
    };
    let query_string = options_to_query_string(widget.options(), &values);
    let debug = engine.settings().debug || context.flag(WIDGET_DEBUG_KEY);

    context.push();
    let mut context = scopeguard::guard(context, |c| {
        c.pop();
    });
    context.set("uid", Value::String(uid.clone()));
    context.set("classname", Value::String(widget.classname().to_string()));
    context.set("qualified_classname", Value::String(widget.qualified_name().to_string()));
    context.set("options", values.to_value());
    context.set("raw_options", Value::Object(resolved.into_iter().collect()));
    context.set("query_string", Value::String(query_string));
    if debug {
        let media = widget.media();
        context.set("css", json!(media.css().collect::<Vec<_>>()));
        context.set("js", json!(media.js().collect::<Vec<_>>()));
        context.set(
            "tag_string",
            Value::String(options_to_tag_string(widget.options(), &values)),
        );
    }

    let rendered = widget.render(&values, &mut context, engine)?;
    Ok((uid, rendered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        core::{
            loader::MemoryLoader, options::OptionDef, registry::WidgetRegistry, values::Values,
            widget::Widget,
        },
        models::Settings,
    };

    /// Renders `<testing>`.
    #[derive(Debug)]
    struct Echo {
        options: Vec<OptionDef>,
    }

    impl Widget for Echo {
        fn qualified_name(&self) -> &str {
            "widgets.tests.Echo"
        }

        fn options(&self) -> &[OptionDef] {
            &self.options
        }

        fn render(&self, values: &Values, _context: &mut Context, _engine: &Engine) -> Result<String, RenderError> {
            Ok(format!("<{}>", display_value(&values["testing"])))
        }
    }

    /// Renders a template showing the widget scope.
    #[derive(Debug)]
    struct Scoped;

    impl Widget for Scoped {
        fn qualified_name(&self) -> &str {
            "widgets.tests.Scoped"
        }

        fn css_media(&self) -> Vec<String> {
            vec!["scoped.css".into()]
        }

        fn render(&self, _values: &Values, context: &mut Context, engine: &Engine) -> Result<String, RenderError> {
            engine.render_to_string("scoped.html", context)
        }
    }

    /// Always fails with a message that needs escaping inside a comment.
    #[derive(Debug)]
    struct Failing;

    impl Widget for Failing {
        fn qualified_name(&self) -> &str {
            "widgets.tests.Failing"
        }

        fn render(&self, _values: &Values, _context: &mut Context, _engine: &Engine) -> Result<String, RenderError> {
            Err(RenderError::Widget {
                widget: self.qualified_name().to_string(),
                message: "no data for <b>--year</b>".to_string(),
            })
        }
    }

    fn registry() -> Arc<WidgetRegistry> {
        let mut registry = WidgetRegistry::with_builtins();
        registry.register(|| {
            Box::new(Echo {
                options: vec![OptionDef::scalar("testing").short("-t").with_default(json!("xxx"))],
            })
        });
        registry.register(|| Box::new(Scoped));
        registry.register(|| Box::new(Failing));
        Arc::new(registry)
    }

    fn engine_with(loader: MemoryLoader, settings: Settings) -> Engine {
        Engine::new(registry(), loader, settings)
    }

    fn engine(loader: MemoryLoader) -> Engine {
        engine_with(loader, Settings::default())
    }

    fn render(engine: &Engine, source: &str, context: &mut Context) -> Result<String, RenderError> {
        let template = engine.from_string(source)?;
        engine.render(&template, context)
    }

    fn assert_arg(args: &str, expected: &str, context: serde_json::Value) {
        let engine = engine(MemoryLoader::new());
        let source = format!("{{% load widget_tags %}}{{% widget widgets.tests.Echo {args} %}}");
        let mut context = Context::from_value(context);
        assert_eq!(render(&engine, &source, &mut context).unwrap(), expected);
    }

    #[test]
    fn test_widget_options() {
        assert_arg("--testing \"xyz\"", "<xyz>", json!({}));
        assert_arg("-t \"xyz\"", "<xyz>", json!({}));
        assert_arg("-t xyz", "<abc>", json!({"xyz": "abc"}));
        assert_arg("-t 100", "<100>", json!({}));
    }

    #[test]
    fn test_bad_option_fails_compilation() {
        let engine = engine(MemoryLoader::new());
        let result = engine.from_string("{% widget widgets.tests.Echo -t \"xyz\" -a 1 %}");
        assert!(matches!(result, Err(TemplateError::Arguments { .. })));
    }

    #[test]
    fn test_missing_required_option() {
        let engine = engine(MemoryLoader::new());
        let result = render(&engine, "{% widget widgets.tests.Echo %}", &mut Context::new());
        assert!(matches!(
            result,
            Err(RenderError::Options(OptionError::MissingArguments(names))) if names == ["testing"]
        ));
    }

    #[test]
    fn test_unknown_variable_in_arguments() {
        let engine = engine(MemoryLoader::new());
        let result = render(&engine, "{% widget widgets.tests.Echo -t nope %}", &mut Context::new());
        assert!(matches!(result, Err(RenderError::Resolve(_))));
    }

    #[test]
    fn test_non_strict_degrades_to_comment() {
        let settings = Settings {
            strict: false,
            ..Settings::default()
        };
        let engine = engine_with(MemoryLoader::new(), settings);
        let rendered = render(
            &engine,
            "a{% widget widgets.tests.Echo %}b{% widget widgets.tests.Echo -t 1 %}",
            &mut Context::new(),
        )
        .unwrap();
        assert!(rendered.starts_with("a<!-- widget widgets.tests.Echo failed: Missing arguments: testing -->b"));
        assert!(rendered.ends_with("<1>"));
    }

    #[test]
    fn test_failing_widget_render() {
        let source = "a{% widget widgets.tests.Failing %}b";
        let engine = engine(MemoryLoader::new());
        let result = render(&engine, source, &mut Context::new());
        assert!(matches!(
            result,
            Err(RenderError::Widget { widget, message })
                if widget == "widgets.tests.Failing" && message == "no data for <b>--year</b>"
        ));

        let settings = Settings {
            strict: false,
            ..Settings::default()
        };
        let engine = engine_with(MemoryLoader::new(), settings);
        let rendered = render(&engine, source, &mut Context::new()).unwrap();
        assert!(rendered.starts_with("a<!-- widget widgets.tests.Failing failed: "));
        assert!(rendered.contains("no data for &lt;b&gt;- -year&lt;/b&gt;"));
        assert!(rendered.ends_with(" -->b"));
        assert_eq!(rendered.matches("--").count(), 2);
    }

    #[test]
    fn test_empty_widget() {
        let engine = engine(MemoryLoader::new());
        let rendered = render(&engine, "{% widget widgets.base.WidgetBase %}", &mut Context::new()).unwrap();
        assert_eq!(rendered, "");
    }

    #[test]
    fn test_widget_scope_is_popped() {
        let loader = MemoryLoader::new().with(
            "scoped.html",
            "{{ uid }}|{{ classname }}|{{ qualified_classname }}|{{ css }}",
        );
        let engine = engine(loader);
        let mut context = Context::from_value(json!({"uid": "page"}));

        let rendered = render(
            &engine,
            "{% widget widgets.tests.Scoped as \"mine\" %}/{{ uid }}",
            &mut context,
        )
        .unwrap();
        assert_eq!(rendered, "mine|Scoped|widgets.tests.Scoped|/page");
        assert_eq!(context.depth(), 1);
    }

    #[test]
    fn test_generated_uid_and_debug_scope() {
        let loader = MemoryLoader::new().with("scoped.html", "{{ uid }} {{ css.0 }}");
        let engine = engine(loader);
        let mut context = Context::new();
        context.set(WIDGET_DEBUG_KEY, json!(true));

        let rendered = render(&engine, "{% widget widgets.tests.Scoped %}", &mut context).unwrap();
        let (uid, css) = rendered.split_once(' ').unwrap();
        assert!(uid.starts_with("generated_"));
        assert_eq!(css, "scoped.css");
    }

    #[test]
    fn test_extends_overrides_blocks() {
        let loader = MemoryLoader::new()
            .with("base.html", "[{% block a %}A{% endblock %}|{% block b %}B{% block c %}C{% endblock %}{% endblock %}]")
            .with("middle.html", "{% extends \"base.html\" %}ignored{% block c %}c{% endblock %}")
            .with("child.html", "{% extends \"middle.html\" %}{% block a %}a{% endblock %}");
        let engine = engine(loader);
        let rendered = engine.render_to_string("child.html", &mut Context::new()).unwrap();
        assert_eq!(rendered, "[a|Bc]");
    }

    #[test]
    fn test_includes_and_with() {
        let loader = MemoryLoader::new()
            .with("part.html", "<{{ name }}>")
            .with("page.html", "{% include \"part.html\" %}{% with \"x\" as name %}{% include tpl %}{% endwith %}");
        let engine = engine(loader);
        let mut context = Context::from_value(json!({"name": "n", "tpl": "part.html"}));
        let rendered = engine.render_to_string("page.html", &mut context).unwrap();
        assert_eq!(rendered, "<n><x>");
        assert_eq!(context.depth(), 1);
    }

    #[test]
    fn test_box_widget() {
        let loader = MemoryLoader::new().with(
            "box.html",
            "<div id=\"{{ uid }}\"><h2>{{ box_title }}</h2>{{ box_widget }}</div>",
        );
        let engine = engine(loader);
        let rendered = render(
            &engine,
            "{% box_widget \"box.html\" \"Sales\" widgets.tests.Echo -t 5 as \"sales\" %}",
            &mut Context::new(),
        )
        .unwrap();
        assert_eq!(rendered, "<div id=\"sales\"><h2>Sales</h2><5></div>");
    }

    #[test]
    fn test_include_cycle_is_bounded() {
        let loader = MemoryLoader::new().with("loop.html", "{% include \"loop.html\" %}");
        let engine = engine(loader);
        let result = engine.render_to_string("loop.html", &mut Context::new());
        assert!(matches!(
            result,
            Err(RenderError::Template(TemplateError::RecursionLimit { .. }))
        ));
    }
}
