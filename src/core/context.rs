// src/core/context.rs

//! Render-time context and the deferred references that get resolved against it.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Variable '{path}' does not exist in the current context.")]
    VariableDoesNotExist { path: String },
}

/// A stack of scopes. Lookups walk from the innermost scope outwards.
#[derive(Debug, Clone)]
pub struct Context {
    scopes: Vec<Map<String, Value>>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            scopes: vec![Map::new()],
        }
    }

    /// Builds a context from a JSON object. Non-object values give an empty context.
    pub fn from_value(value: Value) -> Self {
        let mut context = Self::new();
        if let Value::Object(map) = value {
            context.update(map);
        }
        context
    }

    pub fn push(&mut self) {
        self.scopes.push(Map::new());
    }

    /// Pops the innermost scope. The root scope is never removed.
    pub fn pop(&mut self) -> Option<Map<String, Value>> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Sets a key in the innermost scope.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(key.into(), value);
        }
    }

    pub fn update(&mut self, values: Map<String, Value>) {
        for (key, value) in values {
            self.set(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Resolves a dotted path (`user.name`, `items.0`) through objects and arrays.
    pub fn resolve(&self, path: &str) -> Result<Value, ResolveError> {
        let missing = || ResolveError::VariableDoesNotExist {
            path: path.to_string(),
        };

        let mut parts = path.split('.');
        let head = parts.next().ok_or_else(missing)?;
        let mut current = self.get(head).ok_or_else(missing)?;

        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part),
                Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(missing)?;
        }

        Ok(current.clone())
    }

    /// Is the value stored under `key` truthy?
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(is_truthy)
    }
}

/// Template truthiness: null, false, zero, and empty strings/collections are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Renders a value the way a template prints it.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

/// A parsed but unresolved value.
///
/// Quoted strings, numbers and `True`/`False`/`None` are literals. Anything
/// else is a reference into the render context.
#[derive(Debug, Clone, PartialEq)]
pub enum Placeholder {
    Literal(Value),
    Variable(String),
}

impl Placeholder {
    pub fn parse(token: &str) -> Self {
        if let Some(text) = strip_quotes(token) {
            return Placeholder::Literal(Value::String(text.to_string()));
        }
        match token {
            "True" => return Placeholder::Literal(Value::Bool(true)),
            "False" => return Placeholder::Literal(Value::Bool(false)),
            "None" => return Placeholder::Literal(Value::Null),
            _ => {}
        }
        if let Ok(int) = token.parse::<i64>() {
            return Placeholder::Literal(Value::from(int));
        }
        if let Ok(float) = token.parse::<f64>()
            && float.is_finite()
        {
            return Placeholder::Literal(Value::from(float));
        }
        Placeholder::Variable(token.to_string())
    }

    pub fn resolve(&self, context: &Context) -> Result<Value, ResolveError> {
        match self {
            Placeholder::Literal(value) => Ok(value.clone()),
            Placeholder::Variable(path) => context.resolve(path),
        }
    }

    /// The literal value, if this placeholder does not need a context.
    pub fn literal(&self) -> Option<&Value> {
        match self {
            Placeholder::Literal(value) => Some(value),
            Placeholder::Variable(_) => None,
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placeholder::Literal(Value::String(s)) => write!(f, "\"{s}\""),
            Placeholder::Literal(value) => write!(f, "{}", display_value(value)),
            Placeholder::Variable(path) => write!(f, "{path}"),
        }
    }
}

/// Returns the inner text of a `"..."` or `'...'` token.
pub fn strip_quotes(token: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|quote| {
        token
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
    })
}
