// src/core/template.rs

//! # Template
//!
//! Compiles template sources into a node tree. The syntax is a small subset
//! of the usual `{% tag %}` / `{{ variable }}` / `{# comment #}` family:
//!
//! ```text
//! {% load widget_tags %}
//! {% extends "base.html" %}
//! {% block content %}
//!     {% include "widgets/head.html" %}
//!     {% with report.title as title %}{{ title }}{% endwith %}
//!     {% widget reports.widgets.Chart --title "Sales" -c as "sales" %}
//!     {% box_widget "box.html" "Sales" reports.widgets.Chart --title "Sales" %}
//! {% endblock %}
//! ```
//!
//! Widget tags are resolved against the [`WidgetRegistry`] and their argument
//! lists parsed here, once per compilation. Errors abort the compilation.

use crate::{
    constants::{BOX_WIDGET_TAG, WIDGET_TAG},
    core::{
        arg_parser::{ParseError, parse_argument_list},
        context::{Context, Placeholder, ResolveError, display_value, strip_quotes},
        lexer::tokenize,
        media::Media,
        options::{OptionDef, RawValue},
        registry::WidgetRegistry,
        widget::Widget,
    },
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"(?s)\{%\s*(.*?)\s*%\}|\{\{\s*(.*?)\s*\}\}|\{#.*?#\}")
        .expect("template tag regex is valid");
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template '{0}' does not exist.")]
    NotFound(String),
    #[error("Failed to read template '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Syntax error in template '{template}': {message}")]
    Syntax { template: String, message: String },
    #[error("Unknown widget '{0}'.")]
    UnknownWidget(String),
    #[error("Invalid arguments for widget '{widget}': {source}")]
    Arguments {
        widget: String,
        #[source]
        source: ParseError,
    },
    #[error("Template nesting exceeded {limit} levels at '{name}'.")]
    RecursionLimit { limit: u32, name: String },
}

/// The target of an `extends` or `include` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateRef {
    /// A quoted name, known at compile time.
    Constant(String),
    /// A name only known once a context is available.
    Variable(Placeholder),
}

impl TemplateRef {
    pub fn parse(token: &str) -> Self {
        match Placeholder::parse(token) {
            Placeholder::Literal(Value::String(name)) => TemplateRef::Constant(name),
            other => TemplateRef::Variable(other),
        }
    }

    pub fn constant(&self) -> Option<&str> {
        match self {
            TemplateRef::Constant(name) => Some(name),
            TemplateRef::Variable(_) => None,
        }
    }

    pub fn resolve(&self, context: &Context) -> Result<String, ResolveError> {
        match self {
            TemplateRef::Constant(name) => Ok(name.clone()),
            TemplateRef::Variable(placeholder) => {
                placeholder.resolve(context).map(|v| display_value(&v))
            }
        }
    }
}

/// The box part of a `box_widget` tag.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpec {
    pub template: TemplateRef,
    pub title: String,
}

/// One widget tag: the widget instance, its parsed but unresolved arguments,
/// and an optional explicit uid.
#[derive(Debug)]
pub struct WidgetNode {
    widget: Box<dyn Widget>,
    arguments: Vec<(String, RawValue)>,
    as_name: Option<Placeholder>,
    boxed: Option<BoxSpec>,
}

impl WidgetNode {
    pub fn new(
        widget: Box<dyn Widget>,
        arguments: Vec<String>,
        as_name: Option<Placeholder>,
    ) -> Result<Self, ParseError> {
        let arguments = parse_argument_list(widget.options(), arguments)?
            .into_iter()
            .map(|(option, raw)| (option.name().to_string(), raw))
            .collect();
        Ok(Self {
            widget,
            arguments,
            as_name,
            boxed: None,
        })
    }

    pub fn boxed(mut self, spec: BoxSpec) -> Self {
        self.boxed = Some(spec);
        self
    }

    pub fn widget(&self) -> &dyn Widget {
        self.widget.as_ref()
    }

    pub fn as_name(&self) -> Option<&Placeholder> {
        self.as_name.as_ref()
    }

    pub fn box_spec(&self) -> Option<&BoxSpec> {
        self.boxed.as_ref()
    }

    pub fn media(&self) -> Media {
        self.widget.media()
    }

    /// Parsed arguments in tag order, paired with their options.
    pub fn arguments(&self) -> impl Iterator<Item = (&OptionDef, &RawValue)> {
        let options = self.widget.options();
        self.arguments.iter().filter_map(move |(name, raw)| {
            options
                .iter()
                .find(|option| option.name() == name)
                .map(|option| (option, raw))
        })
    }
}

#[derive(Debug)]
pub enum Node {
    Text(String),
    Variable(Placeholder),
    Block { name: String, nodes: Vec<Node> },
    Include(TemplateRef),
    With {
        bindings: Vec<(String, Placeholder)>,
        nodes: Vec<Node>,
    },
    Widget(Arc<WidgetNode>),
}

impl Node {
    fn children(&self) -> &[Node] {
        match self {
            Node::Block { nodes, .. } | Node::With { nodes, .. } => nodes,
            _ => &[],
        }
    }
}

/// Calls `visit` on every node of the tree, depth first, in source order.
fn walk<'a>(nodes: &'a [Node], visit: &mut impl FnMut(&'a Node)) {
    for node in nodes {
        visit(node);
        walk(node.children(), visit);
    }
}

/// A compiled template.
#[derive(Debug)]
pub struct Template {
    name: String,
    parent: Option<TemplateRef>,
    nodes: Vec<Node>,
}

impl Template {
    pub fn compile(name: &str, source: &str, registry: &WidgetRegistry) -> Result<Self, TemplateError> {
        log::debug!("Compiling template '{}'", name);
        let mut parser = Parser {
            template: name,
            pieces: scan(source).into_iter(),
            registry,
            parent: None,
        };
        let (nodes, _) = parser.parse_until(&[])?;
        Ok(Self {
            name: name.to_string(),
            parent: parser.parent,
            nodes,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The `extends` target, if any.
    pub fn parent(&self) -> Option<&TemplateRef> {
        self.parent.as_ref()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Every widget tag in this template, nested ones included.
    pub fn widget_nodes(&self) -> Vec<Arc<WidgetNode>> {
        let mut widgets = Vec::new();
        walk(&self.nodes, &mut |node| {
            if let Node::Widget(widget) = node {
                widgets.push(Arc::clone(widget));
            }
        });
        widgets
    }

    /// Every `include` target in this template, nested ones included.
    pub fn includes(&self) -> Vec<&TemplateRef> {
        let mut includes = Vec::new();
        walk(&self.nodes, &mut |node| {
            if let Node::Include(target) = node {
                includes.push(target);
            }
        });
        includes
    }

    /// Every block, nested ones included, outermost first.
    pub fn blocks(&self) -> Vec<(&str, &[Node])> {
        let mut blocks = Vec::new();
        walk(&self.nodes, &mut |node| {
            if let Node::Block { name, nodes } = node {
                blocks.push((name.as_str(), nodes.as_slice()));
            }
        });
        blocks
    }
}

enum Piece<'s> {
    Text(&'s str),
    Variable(&'s str),
    Tag(&'s str),
}

fn scan(source: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut last = 0;

    for caps in TAG_RE.captures_iter(source) {
        let Some(whole) = caps.get(0) else { continue };
        if let Some(text) = source.get(last..whole.start()).filter(|t| !t.is_empty()) {
            pieces.push(Piece::Text(text));
        }
        if let Some(tag) = caps.get(1) {
            pieces.push(Piece::Tag(tag.as_str()));
        } else if let Some(variable) = caps.get(2) {
            pieces.push(Piece::Variable(variable.as_str()));
        }
        last = whole.end();
    }

    if let Some(text) = source.get(last..).filter(|t| !t.is_empty()) {
        pieces.push(Piece::Text(text));
    }
    pieces
}

/// Tag arguments are separated by single spaces. Tabs and newlines between
/// them become spaces; quoted spans are left as written.
fn spaces_outside_quotes(content: &str) -> String {
    let mut quote = None;
    content
        .chars()
        .map(|c| match quote {
            Some(open) if c == open => {
                quote = None;
                c
            }
            Some(_) => c,
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                c
            }
            None if c.is_whitespace() => ' ',
            None => c,
        })
        .collect()
}

struct Parser<'a> {
    template: &'a str,
    pieces: std::vec::IntoIter<Piece<'a>>,
    registry: &'a WidgetRegistry,
    parent: Option<TemplateRef>,
}

impl Parser<'_> {
    fn syntax(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::Syntax {
            template: self.template.to_string(),
            message: message.into(),
        }
    }

    /// Parses nodes until one of `ends` is reached, returning the end tag found.
    fn parse_until(&mut self, ends: &[&str]) -> Result<(Vec<Node>, Option<Vec<String>>), TemplateError> {
        let mut nodes = Vec::new();

        while let Some(piece) = self.pieces.next() {
            match piece {
                Piece::Text(text) => nodes.push(Node::Text(text.to_string())),
                Piece::Variable("") => return Err(self.syntax("empty variable tag")),
                Piece::Variable(expression) => {
                    nodes.push(Node::Variable(Placeholder::parse(expression)));
                }
                Piece::Tag(content) => {
                    let tokens = tokenize(&spaces_outside_quotes(content));
                    let Some(tag) = tokens.first() else {
                        return Err(self.syntax("empty block tag"));
                    };
                    if ends.contains(&tag.as_str()) {
                        return Ok((nodes, Some(tokens)));
                    }
                    if let Some(node) = self.parse_tag(tokens)? {
                        nodes.push(node);
                    }
                }
            }
        }

        Ok((nodes, None))
    }

    fn parse_tag(&mut self, tokens: Vec<String>) -> Result<Option<Node>, TemplateError> {
        let mut args = tokens.into_iter();
        let tag = args.next().unwrap_or_default();

        match tag.as_str() {
            "load" => Ok(None),
            "extends" => {
                let target = args.next().ok_or_else(|| self.syntax("'extends' takes one argument"))?;
                if self.parent.is_some() {
                    return Err(self.syntax("'extends' cannot appear more than once"));
                }
                self.parent = Some(TemplateRef::parse(&target));
                Ok(None)
            }
            "include" => {
                let target = args.next().ok_or_else(|| self.syntax("'include' takes one argument"))?;
                Ok(Some(Node::Include(TemplateRef::parse(&target))))
            }
            "block" => {
                let name = args.next().ok_or_else(|| self.syntax("'block' takes one argument"))?;
                let (nodes, end) = self.parse_until(&["endblock"])?;
                let end = end.ok_or_else(|| self.syntax(format!("unclosed block '{name}'")))?;
                if let Some(end_name) = end.get(1)
                    && *end_name != name
                {
                    return Err(self.syntax(format!(
                        "'endblock {end_name}' does not close block '{name}'"
                    )));
                }
                Ok(Some(Node::Block { name, nodes }))
            }
            "with" => {
                let bindings = self.parse_bindings(args.collect())?;
                let (nodes, end) = self.parse_until(&["endwith"])?;
                if end.is_none() {
                    return Err(self.syntax("unclosed 'with'"));
                }
                Ok(Some(Node::With { bindings, nodes }))
            }
            WIDGET_TAG | BOX_WIDGET_TAG => {
                let node = self.parse_widget(&tag, args.collect())?;
                Ok(Some(Node::Widget(Arc::new(node))))
            }
            other => Err(self.syntax(format!("invalid block tag '{other}'"))),
        }
    }

    /// `with value as name` or `with name=value other=value`.
    fn parse_bindings(&self, args: Vec<String>) -> Result<Vec<(String, Placeholder)>, TemplateError> {
        if let [value, keyword, name] = args.as_slice()
            && keyword == "as"
        {
            return Ok(vec![(name.clone(), Placeholder::parse(value))]);
        }

        if args.is_empty() {
            return Err(self.syntax("'with' expects at least one binding"));
        }

        // The tokenizer splits `b="x"` into `b=` and `"x"`.
        let mut joined: Vec<String> = Vec::with_capacity(args.len());
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg.ends_with('=')
                && let Some(value) = args.next()
            {
                joined.push(arg + &value);
            } else {
                joined.push(arg);
            }
        }

        joined
            .iter()
            .map(|arg| {
                arg.split_once('=')
                    .filter(|(name, _)| !name.is_empty())
                    .map(|(name, value)| (name.to_string(), Placeholder::parse(value)))
                    .ok_or_else(|| self.syntax(format!("invalid 'with' binding '{arg}'")))
            })
            .collect()
    }

    /// `widget class [args...] [as uid]` or
    /// `box_widget template title class [args...] [as uid]`.
    fn parse_widget(&self, tag: &str, mut args: Vec<String>) -> Result<WidgetNode, TemplateError> {
        let has_as = args
            .len()
            .checked_sub(2)
            .and_then(|i| args.get(i))
            .is_some_and(|keyword| keyword == "as");
        let as_name = if has_as {
            let uid = args.pop().unwrap_or_default();
            args.pop();
            Some(Placeholder::parse(&uid))
        } else {
            None
        };

        let mut args = args.into_iter();
        let boxed = if tag == BOX_WIDGET_TAG {
            let (Some(template), Some(title)) = (args.next(), args.next()) else {
                return Err(self.syntax(
                    "syntax: {% box_widget template title class [arguments...] [as uid] %}",
                ));
            };
            Some(BoxSpec {
                template: TemplateRef::parse(&template),
                title: strip_quotes(&title).unwrap_or(&title).to_string(),
            })
        } else {
            None
        };

        let classname = args
            .next()
            .ok_or_else(|| self.syntax(format!("syntax: {{% {tag} class [arguments...] [as uid] %}}")))?;
        let widget = self
            .registry
            .find(&classname)
            .ok_or_else(|| TemplateError::UnknownWidget(classname.clone()))?;

        let node = WidgetNode::new(widget, args.collect(), as_name).map_err(|source| {
            TemplateError::Arguments {
                widget: classname.clone(),
                source,
            }
        })?;
        log::debug!("Compiled widget tag for '{}' in '{}'", classname, self.template);

        Ok(match boxed {
            Some(spec) => node.boxed(spec),
            None => node,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Titled {
        options: Vec<OptionDef>,
    }

    impl Widget for Titled {
        fn qualified_name(&self) -> &str {
            "tests.widgets.Titled"
        }

        fn options(&self) -> &[OptionDef] {
            &self.options
        }
    }

    fn registry() -> WidgetRegistry {
        let mut registry = WidgetRegistry::with_builtins();
        registry.register(|| {
            Box::new(Titled {
                options: vec![OptionDef::scalar("title").short("-t")],
            })
        });
        registry
    }

    fn compile(source: &str) -> Result<Template, TemplateError> {
        Template::compile("test.html", source, &registry())
    }

    #[test]
    fn test_text_variables_and_comments() {
        let template = compile("Hi {{ user.name }}{# hidden #}!").unwrap();
        assert!(matches!(
            template.nodes(),
            [Node::Text(_), Node::Variable(Placeholder::Variable(_)), Node::Text(_)]
        ));
    }

    #[test]
    fn test_widget_tag() {
        let template =
            compile("{% load widget_tags %}{% widget tests.widgets.Titled -t \"Sales\" as 'sales' %}")
                .unwrap();
        let widgets = template.widget_nodes();
        assert_eq!(widgets.len(), 1);

        let node = &widgets[0];
        assert_eq!(node.widget().qualified_name(), "tests.widgets.Titled");
        assert_eq!(node.as_name(), Some(&Placeholder::Literal(json!("sales"))));
        let arguments: Vec<(&str, &RawValue)> =
            node.arguments().map(|(option, raw)| (option.name(), raw)).collect();
        assert_eq!(
            arguments,
            vec![("title", &RawValue::Single(Placeholder::Literal(json!("Sales"))))]
        );
    }

    #[test]
    fn test_box_widget_tag() {
        let template =
            compile("{% box_widget \"box.html\" \"My box\" tests.widgets.Titled -t x %}").unwrap();
        let widgets = template.widget_nodes();
        let spec = widgets[0].box_spec().unwrap();
        assert_eq!(spec.template, TemplateRef::Constant("box.html".into()));
        assert_eq!(spec.title, "My box");
        assert!(widgets[0].as_name().is_none());

        assert!(matches!(
            compile("{% box_widget \"box.html\" %}"),
            Err(TemplateError::Syntax { .. })
        ));
    }

    #[test]
    fn test_widget_tag_errors_abort_compilation() {
        assert!(matches!(
            compile("{% widget tests.widgets.Missing %}"),
            Err(TemplateError::UnknownWidget(name)) if name == "tests.widgets.Missing"
        ));
        assert!(matches!(
            compile("{% widget tests.widgets.Titled -t \"xyz\" -a 1 %}"),
            Err(TemplateError::Arguments {
                source: ParseError::UnknownArgument(_),
                ..
            })
        ));
        assert!(matches!(compile("{% widget %}"), Err(TemplateError::Syntax { .. })));
    }

    #[test]
    fn test_extends_include_and_blocks() {
        let template = compile(
            "{% extends \"base.html\" %}\
             {% block a %}{% include \"x.html\" %}{% block inner %}{% endblock inner %}{% endblock %}\
             {% with name as n %}{% include partial %}{% endwith %}",
        )
        .unwrap();

        assert_eq!(template.parent(), Some(&TemplateRef::Constant("base.html".into())));
        let blocks: Vec<&str> = template.blocks().into_iter().map(|(name, _)| name).collect();
        assert_eq!(blocks, vec!["a", "inner"]);

        let includes = template.includes();
        assert_eq!(includes[0].constant(), Some("x.html"));
        assert_eq!(includes[1], &TemplateRef::Variable(Placeholder::Variable("partial".into())));
    }

    #[test]
    fn test_with_bindings() {
        let template = compile("{% with a=1 b=\"x\" %}{{ a }}{% endwith %}").unwrap();
        let [Node::With { bindings, nodes }] = template.nodes() else {
            panic!("expected a single with node");
        };
        assert_eq!(bindings[0], ("a".to_string(), Placeholder::Literal(json!(1))));
        assert_eq!(bindings[1], ("b".to_string(), Placeholder::Literal(json!("x"))));
        assert_eq!(nodes.len(), 1);

        let template = compile("{% with title=\"Q3 sales\" %}{% endwith %}").unwrap();
        let [Node::With { bindings, .. }] = template.nodes() else {
            panic!("expected a single with node");
        };
        assert_eq!(
            bindings.as_slice(),
            [("title".to_string(), Placeholder::Literal(json!("Q3 sales")))]
        );
    }

    #[test]
    fn test_tabs_and_newlines_separate_tag_arguments() {
        let template = compile("{% widget\ttests.widgets.Titled\n  --title \"a\tb\" %}").unwrap();
        let widgets = template.widget_nodes();
        assert_eq!(widgets.len(), 1);
        let (option, raw) = widgets[0].arguments().next().unwrap();
        assert_eq!(option.name(), "title");
        assert_eq!(raw, &RawValue::Single(Placeholder::Literal(json!("a\tb"))));

        assert_eq!(spaces_outside_quotes("a\t'b\tc'\r\nd"), "a 'b\tc'  d");
    }

    #[test]
    fn test_syntax_errors() {
        for source in [
            "{% block a %}",
            "{% endblock %}",
            "{% block a %}{% endblock b %}",
            "{% bogus %}",
            "{% with %}{% endwith %}",
            "{% extends \"a\" %}{% extends \"b\" %}",
            "{{ }}",
        ] {
            assert!(
                matches!(compile(source), Err(TemplateError::Syntax { .. })),
                "{source} should not compile"
            );
        }
    }

    #[test]
    fn test_template_ref_resolution() {
        let context = Context::from_value(json!({"partial": "p.html"}));
        assert_eq!(TemplateRef::parse("'a.html'").resolve(&context), Ok("a.html".into()));
        assert_eq!(TemplateRef::parse("partial").resolve(&context), Ok("p.html".into()));
        assert!(TemplateRef::parse("missing").resolve(&context).is_err());
    }
}
