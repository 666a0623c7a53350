// src/core/query.rs

//! Moving option values in and out of query strings and widget tag strings,
//! so a widget can be invoked out-of-band (AJAX, downloads) with the same
//! option set it was embedded with.

use crate::core::{
    context::display_value,
    options::OptionDef,
    values::{OptionError, Values, process_values},
};
use indexmap::IndexMap;
use serde_json::Value;
use url::form_urlencoded;

/// An ordered multimap of query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    /// Parses `a=1&b=2&b=3`. A leading `?` is ignored.
    pub fn parse(input: &str) -> Self {
        let input = input.strip_prefix('?').unwrap_or(input);
        Self {
            pairs: form_urlencoded::parse(input.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// The last value given for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Query {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Reads every declared option from a query. Options absent from the query
/// and without a default are left out, so required ones fail validation.
pub fn values_from_query(options: &[OptionDef], query: &Query) -> IndexMap<String, Value> {
    options
        .iter()
        .filter_map(|opt| {
            opt.value_from_query(query)
                .map(|value| (opt.name().to_string(), value))
        })
        .collect()
}

/// Query values straight through validation, for out-of-band renders.
pub fn process_query(options: &[OptionDef], query: &Query) -> Result<Values, OptionError> {
    process_values(&values_from_query(options, query), options)
}

/// Renders option values as a query string. Booleans appear as a bare key
/// when set; lists repeat the key; empty values are left out.
pub fn options_to_query_string(options: &[OptionDef], values: &Values) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut list_pairs = Vec::new();

    for opt in options {
        let Some(value) = values.get(opt.name()) else {
            continue;
        };
        match opt.raw_value(value) {
            Value::Bool(true) => {
                serializer.append_key_only(opt.name());
            }
            Value::Array(items) => {
                list_pairs.extend(
                    items
                        .iter()
                        .map(|item| (opt.name().to_string(), display_value(item))),
                );
            }
            raw if crate::core::context::is_truthy(&raw) => {
                serializer.append_pair(opt.name(), &display_value(&raw));
            }
            _ => {}
        }
    }

    for (key, value) in &list_pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Renders the argument part of a widget tag (without the widget name), e.g.
/// `--title "Hello" --compact --tags "a" "b"`.
pub fn options_to_tag_string(options: &[OptionDef], values: &Values) -> String {
    let mut parts = Vec::new();

    for opt in options {
        let Some(value) = values.get(opt.name()) else {
            continue;
        };
        match opt.raw_value(value) {
            Value::Bool(true) => parts.push(opt.long_form().to_string()),
            Value::Array(items) if !items.is_empty() => {
                let quoted: Vec<String> = items
                    .iter()
                    .map(|item| format!("\"{}\"", escape_html(&display_value(item))))
                    .collect();
                parts.push(format!("{} {}", opt.long_form(), quoted.join(" ")));
            }
            Value::Array(_) | Value::Bool(false) => {}
            raw if crate::core::context::is_truthy(&raw) => parts.push(format!(
                "{} \"{}\"",
                opt.long_form(),
                escape_html(&display_value(&raw))
            )),
            _ => {}
        }
    }

    parts.join(" ")
}

/// Escapes the five HTML-significant characters.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{arg_parser::parse_argument_list, context::Context, values::resolve_all};
    use serde_json::json;

    fn options() -> Vec<OptionDef> {
        vec![
            OptionDef::scalar("title").short("-t"),
            OptionDef::boolean("compact").short("-c"),
            OptionDef::list("tags"),
            OptionDef::scalar("note").required(false),
        ]
    }

    fn values(pairs: &[(&str, Value)]) -> Values {
        let map: IndexMap<String, Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        process_values(&map, &options()).unwrap()
    }

    #[test]
    fn test_query_multimap() {
        let query = Query::parse("?a=1&b=2&b=3&flag");
        assert_eq!(query.get("a"), Some("1"));
        assert_eq!(query.get("b"), Some("3"));
        assert_eq!(query.get_all("b"), vec!["2", "3"]);
        assert!(query.contains("flag"));
        assert!(!query.contains("c"));
    }

    #[test]
    fn test_query_string() {
        let values = values(&[
            ("title", json!("Hello world")),
            ("compact", json!(true)),
            ("tags", json!(["a", "b"])),
        ]);
        assert_eq!(
            options_to_query_string(&options(), &values),
            "title=Hello+world&compact&tags=a&tags=b"
        );
    }

    #[test]
    fn test_tag_string() {
        let values = values(&[
            ("title", json!("<b>")),
            ("compact", json!(true)),
            ("tags", json!(["a", "b"])),
        ]);
        assert_eq!(
            options_to_tag_string(&options(), &values),
            "--title \"&lt;b&gt;\" --compact --tags \"a\" \"b\""
        );
    }

    #[test]
    fn test_tag_string_parses_back() {
        let values = values(&[("title", json!("Hi")), ("tags", json!(["x"]))]);
        let tag = options_to_tag_string(&options(), &values);

        let options = options();
        let parsed = parse_argument_list(&options, tag.as_str()).unwrap();
        let resolved = resolve_all(parsed.iter().map(|(o, r)| (*o, r)), &Context::new()).unwrap();
        assert_eq!(process_values(&resolved, &options).unwrap(), values);
    }

    #[test]
    fn test_query_round_trip_through_validation() {
        let query = Query::parse("title=Report&tags=q1&tags=q2");
        let values = process_query(&options(), &query).unwrap();
        assert_eq!(values["title"], json!("Report"));
        assert_eq!(values["tags"], json!(["q1", "q2"]));
        assert!(!values.flag("compact"));

        let missing = process_query(&options(), &Query::parse("tags=x"));
        assert!(matches!(missing, Err(OptionError::MissingArguments(_))));
    }
}
