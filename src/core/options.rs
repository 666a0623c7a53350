// src/core/options.rs

//! Typed option descriptors for the `options` of a widget.
//!
//! Every option knows how to consume its tokens from an [`OptionLexer`], how to
//! resolve the parsed placeholder against a render [`Context`], and how to
//! filter the resolved value before it reaches the widget.

use crate::{
    constants::DEFAULT_REFERENCE_KEY,
    core::{
        arg_parser::ParseError,
        context::{Context, Placeholder, ResolveError, is_truthy},
        lexer::OptionLexer,
        lookup::{Choice, Lookup, LookupError},
        query::Query,
    },
};
use serde_json::Value;
use std::{fmt, sync::Arc};

/// Choices offered for presentation. They never restrict parsing.
#[derive(Clone)]
pub enum Choices {
    Static(Vec<Choice>),
    Dynamic(Arc<dyn Fn() -> Vec<Choice> + Send + Sync>),
}

impl Choices {
    pub fn dynamic(f: impl Fn() -> Vec<Choice> + Send + Sync + 'static) -> Self {
        Choices::Dynamic(Arc::new(f))
    }

    pub fn list(&self) -> Vec<Choice> {
        match self {
            Choices::Static(choices) => choices.clone(),
            Choices::Dynamic(f) => f(),
        }
    }
}

impl Default for Choices {
    fn default() -> Self {
        Choices::Static(Vec::new())
    }
}

impl fmt::Debug for Choices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choices::Static(choices) => f.debug_tuple("Static").field(choices).finish(),
            Choices::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Where a reference option looks its values up, and by which field.
#[derive(Debug, Clone)]
pub struct Reference {
    lookup: Arc<dyn Lookup>,
    fields: Vec<String>,
}

impl Reference {
    pub fn new(lookup: Arc<dyn Lookup>) -> Self {
        Self {
            lookup,
            fields: Vec::new(),
        }
    }

    /// The first field is the lookup key, the second (if any) the label.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn key(&self) -> &str {
        self.fields
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_REFERENCE_KEY)
    }

    fn choices(&self) -> Vec<Choice> {
        self.lookup.choices(&self.fields)
    }
}

#[derive(Debug, Clone)]
pub enum OptionKind {
    /// One value, read as a context reference.
    Scalar,
    /// No value; presence of the flag means `true`.
    Boolean,
    /// A scalar with a presentation-only list of choices.
    Choice(Choices),
    /// Consecutive values up to the next flag.
    Multi(Choices),
    /// Like `Multi`, for plain untyped lists.
    List,
    /// A scalar resolved to one record of a lookup.
    Reference(Reference),
    /// A multi-valued option resolved to the matching records of a lookup.
    MultiReference(Reference),
}

/// What the parser produced for one option, before any context is available.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Present,
    Single(Placeholder),
    Many(Vec<Placeholder>),
}

#[derive(Debug, Clone)]
pub struct OptionDef {
    name: String,
    short_form: Option<String>,
    long_form: String,
    default: Value,
    required: bool,
    help: Option<String>,
    kind: OptionKind,
}

impl OptionDef {
    fn with_kind(name: &str, kind: OptionKind) -> Self {
        let (required, default) = match kind {
            OptionKind::Scalar | OptionKind::Choice(_) | OptionKind::Reference(_) => {
                (true, Value::Null)
            }
            OptionKind::Boolean => (false, Value::Bool(false)),
            OptionKind::Multi(_) | OptionKind::List | OptionKind::MultiReference(_) => {
                (false, Value::Array(Vec::new()))
            }
        };
        Self {
            name: name.to_string(),
            short_form: None,
            long_form: format!("--{}", name.replace('_', "-")),
            default,
            required,
            help: None,
            kind,
        }
    }

    pub fn scalar(name: &str) -> Self {
        Self::with_kind(name, OptionKind::Scalar)
    }

    pub fn boolean(name: &str) -> Self {
        Self::with_kind(name, OptionKind::Boolean)
    }

    pub fn choice(name: &str, choices: Choices) -> Self {
        Self::with_kind(name, OptionKind::Choice(choices))
    }

    pub fn multi(name: &str, choices: Choices) -> Self {
        Self::with_kind(name, OptionKind::Multi(choices))
    }

    pub fn list(name: &str) -> Self {
        Self::with_kind(name, OptionKind::List)
    }

    pub fn reference(name: &str, reference: Reference) -> Self {
        Self::with_kind(name, OptionKind::Reference(reference))
    }

    pub fn multi_reference(name: &str, reference: Reference) -> Self {
        Self::with_kind(name, OptionKind::MultiReference(reference))
    }

    pub fn short(mut self, flag: &str) -> Self {
        self.short_form = Some(flag.to_string());
        self
    }

    pub fn long(mut self, flag: &str) -> Self {
        self.long_form = flag.to_string();
        self
    }

    /// Boolean options always default to `false`.
    pub fn with_default(mut self, value: Value) -> Self {
        if !matches!(self.kind, OptionKind::Boolean) {
            self.default = value;
        }
        self
    }

    /// Boolean options are never required.
    pub fn required(mut self, required: bool) -> Self {
        if !matches!(self.kind, OptionKind::Boolean) {
            self.required = required;
        }
        self
    }

    pub fn help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_form(&self) -> Option<&str> {
        self.short_form.as_deref()
    }

    pub fn long_form(&self) -> &str {
        &self.long_form
    }

    pub fn default_value(&self) -> &Value {
        &self.default
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn kind(&self) -> &OptionKind {
        &self.kind
    }

    /// Name of the option variant, for templates and listings.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            OptionKind::Scalar => "scalar",
            OptionKind::Boolean => "bool",
            OptionKind::Choice(_) => "choice",
            OptionKind::Multi(_) => "multi",
            OptionKind::List => "list",
            OptionKind::Reference(_) => "reference",
            OptionKind::MultiReference(_) => "multi_reference",
        }
    }

    /// Exact match against the short or long form. No prefix matching.
    pub fn matches_flag(&self, flag: &str) -> bool {
        self.short_form.as_deref() == Some(flag) || self.long_form == flag
    }

    pub fn takes_argument(&self) -> bool {
        !matches!(self.kind, OptionKind::Boolean)
    }

    fn is_multi_valued(&self) -> bool {
        matches!(
            self.kind,
            OptionKind::Multi(_) | OptionKind::List | OptionKind::MultiReference(_)
        )
    }

    fn parse_placeholder(&self, lexer: &mut OptionLexer) -> Result<Placeholder, ParseError> {
        if lexer.token_is_flag() {
            return Err(ParseError::UnexpectedOption {
                option: self.name.clone(),
                token: lexer.token().unwrap_or_default().to_string(),
            });
        }
        let token = lexer.take().ok_or_else(|| ParseError::MissingValue {
            option: self.name.clone(),
        })?;
        Ok(Placeholder::parse(&token))
    }

    /// Consumes this option's tokens, starting at the lexer's current token.
    /// Leaves the cursor on the first unconsumed token.
    pub fn parse(&self, lexer: &mut OptionLexer) -> Result<RawValue, ParseError> {
        match self.kind {
            OptionKind::Boolean => Ok(RawValue::Present),
            _ if self.is_multi_valued() => {
                let mut values = Vec::new();
                while !lexer.is_exhausted() && !lexer.token_is_flag() {
                    values.push(self.parse_placeholder(lexer)?);
                }
                Ok(RawValue::Many(values))
            }
            _ => self.parse_placeholder(lexer).map(RawValue::Single),
        }
    }

    /// Resolves a parsed value against the render context.
    pub fn resolve(&self, context: &Context, raw: &RawValue) -> Result<Value, ResolveError> {
        match raw {
            RawValue::Present => Ok(Value::Bool(true)),
            RawValue::Single(placeholder) => placeholder.resolve(context),
            RawValue::Many(placeholders) => placeholders
                .iter()
                .map(|p| p.resolve(context))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }

    /// Validates and coerces a resolved value. Identity except for references,
    /// which are looked up.
    pub fn filter(&self, value: Value) -> Result<Value, LookupError> {
        match &self.kind {
            OptionKind::Reference(reference) => match value {
                Value::Object(_) => Ok(value),
                v if is_truthy(&v) => reference.lookup.get(reference.key(), &v),
                _ => Ok(Value::Null),
            },
            OptionKind::MultiReference(reference) => match value {
                Value::Object(_) => Ok(value),
                v if is_truthy(&v) => {
                    let keys: Vec<Value> = match v {
                        Value::Array(items) => items
                            .iter()
                            .map(|item| record_key(item, reference.key()))
                            .collect(),
                        other => vec![other],
                    };
                    Ok(Value::Array(reference.lookup.filter(reference.key(), &keys)))
                }
                _ => Ok(Value::Array(Vec::new())),
            },
            _ => Ok(value),
        }
    }

    /// The value as it was on input: referenced records collapse back to their key.
    pub fn raw_value(&self, value: &Value) -> Value {
        match &self.kind {
            OptionKind::Reference(reference) => record_key(value, reference.key()),
            OptionKind::MultiReference(reference) => match value {
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| record_key(item, reference.key()))
                        .collect(),
                ),
                other => record_key(other, reference.key()),
            },
            _ => value.clone(),
        }
    }

    /// Reads this option from a query string. `None` when absent and without a default.
    pub fn value_from_query(&self, query: &Query) -> Option<Value> {
        if matches!(self.kind, OptionKind::Boolean) {
            return Some(Value::Bool(query.contains(&self.name)));
        }
        if self.is_multi_valued() {
            let values: Vec<Value> = query
                .get_all(&self.name)
                .into_iter()
                .map(|v| Value::String(v.to_string()))
                .collect();
            return Some(Value::Array(values));
        }
        match query.get(&self.name) {
            Some(value) => Some(Value::String(value.to_string())),
            None if !self.default.is_null() => Some(self.default.clone()),
            None => None,
        }
    }

    /// Choices for forms. Empty for options without any.
    pub fn choices(&self) -> Vec<Choice> {
        match &self.kind {
            OptionKind::Choice(choices) | OptionKind::Multi(choices) => choices.list(),
            OptionKind::Reference(reference) | OptionKind::MultiReference(reference) => {
                reference.choices()
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for OptionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind_name(), self.name)
    }
}

fn record_key(value: &Value, key: &str) -> Value {
    match value {
        Value::Object(record) => record.get(key).cloned().unwrap_or(Value::Null),
        other => other.clone(),
    }
}
