// src/core/values.rs

use crate::core::{
    context::{Context, ResolveError},
    lookup::LookupError,
    options::{OptionDef, RawValue},
};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::{collections::BTreeSet, ops::Index};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptionError {
    #[error("Missing arguments: {}", .0.join(", "))]
    MissingArguments(Vec<String>),
    #[error("Unknown arguments: {}", .0.join(", "))]
    UnknownArguments(Vec<String>),
    #[error("Invalid value for option '{option}': {source}")]
    Lookup {
        option: String,
        #[source]
        source: LookupError,
    },
}

/// The final option values handed to a widget.
///
/// Keys are option names in declaration order. Values are readable with
/// `values["name"]`, [`Values::get`], or as a JSON object (dotted access in
/// templates, e.g. `{{ options.name }}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Values(IndexMap<String, Value>);

impl Values {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// The value as a string slice, if it is one.
    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Map<String, Value>>(),
        )
    }
}

impl Index<&str> for Values {
    type Output = Value;

    /// Missing names index to `null`, like a JSON object.
    fn index(&self, name: &str) -> &Self::Output {
        static NULL: Value = Value::Null;
        self.0.get(name).unwrap_or(&NULL)
    }
}

impl FromIterator<(String, Value)> for Values {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Resolves every parsed pair against the context. Later pairs for the same
/// option overwrite earlier ones.
pub fn resolve_all<'a, I>(parsed: I, context: &Context) -> Result<IndexMap<String, Value>, ResolveError>
where
    I: IntoIterator<Item = (&'a OptionDef, &'a RawValue)>,
{
    let mut resolved = IndexMap::new();
    for (option, raw) in parsed {
        resolved.insert(option.name().to_string(), option.resolve(context, raw)?);
    }
    Ok(resolved)
}

/// Checks required and unknown names, then filters every declared option's
/// value (or its default).
pub fn process_values(
    values: &IndexMap<String, Value>,
    options: &[OptionDef],
) -> Result<Values, OptionError> {
    let present: BTreeSet<&str> = values.keys().map(String::as_str).collect();

    let missing: Vec<String> = options
        .iter()
        .filter(|opt| opt.is_required() && !present.contains(opt.name()))
        .map(|opt| opt.name().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if !missing.is_empty() {
        return Err(OptionError::MissingArguments(missing));
    }

    let declared: BTreeSet<&str> = options.iter().map(OptionDef::name).collect();
    let unknown: Vec<String> = present
        .difference(&declared)
        .map(|name| name.to_string())
        .collect();
    if !unknown.is_empty() {
        return Err(OptionError::UnknownArguments(unknown));
    }

    log::debug!("Processing values {:?}", values);
    options
        .iter()
        .map(|opt| {
            let value = values
                .get(opt.name())
                .cloned()
                .unwrap_or_else(|| opt.default_value().clone());
            opt.filter(value)
                .map(|filtered| (opt.name().to_string(), filtered))
                .map_err(|source| OptionError::Lookup {
                    option: opt.name().to_string(),
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        arg_parser::parse_argument_list,
        lookup::RecordSet,
        options::Reference,
    };
    use serde_json::json;
    use std::sync::Arc;

    fn mapping(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_missing_required() {
        let options = vec![OptionDef::scalar("testing")];
        let error = process_values(&IndexMap::new(), &options).unwrap_err();
        assert_eq!(error, OptionError::MissingArguments(vec!["testing".into()]));
        assert_eq!(error.to_string(), "Missing arguments: testing");
    }

    #[test]
    fn test_required_with_default_is_still_required() {
        let options = vec![OptionDef::scalar("testing").with_default(json!("xxx"))];
        assert!(matches!(
            process_values(&IndexMap::new(), &options),
            Err(OptionError::MissingArguments(_))
        ));
    }

    #[test]
    fn test_unknown_names() {
        let options = vec![OptionDef::scalar("testing")];
        let values = mapping(&[("testing", json!("x")), ("bogus", json!("y"))]);
        assert_eq!(
            process_values(&values, &options).unwrap_err(),
            OptionError::UnknownArguments(vec!["bogus".into()])
        );
    }

    #[test]
    fn test_defaults_fill_every_declared_option() {
        let options = vec![
            OptionDef::scalar("title"),
            OptionDef::boolean("compact"),
            OptionDef::list("tags"),
            OptionDef::scalar("subtitle").required(false),
        ];
        let values = process_values(&mapping(&[("title", json!("Hi"))]), &options).unwrap();

        let keys: Vec<&String> = values.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["title", "compact", "tags", "subtitle"]);
        assert_eq!(values["title"], json!("Hi"));
        assert_eq!(values.str("title"), Some("Hi"));
        assert!(!values.flag("compact"));
        assert_eq!(values["tags"], json!([]));
        assert_eq!(values["subtitle"], Value::Null);
        assert_eq!(values.to_value()["title"], json!("Hi"));
    }

    #[test]
    fn test_filter_runs_for_defaults() {
        let lookup = Arc::new(RecordSet::from_value(json!([{"pk": 1, "name": "North"}])));
        let options =
            vec![OptionDef::reference("region", Reference::new(lookup)).with_default(json!(1)).required(false)];
        let values = process_values(&IndexMap::new(), &options).unwrap();
        assert_eq!(values["region"]["name"], json!("North"));
    }

    #[test]
    fn test_lookup_failure_names_option() {
        let lookup = Arc::new(RecordSet::from_value(json!([])));
        let options = vec![OptionDef::reference("region", Reference::new(lookup))];
        let error = process_values(&mapping(&[("region", json!(5))]), &options).unwrap_err();
        assert!(matches!(error, OptionError::Lookup { ref option, .. } if option == "region"));
    }

    #[test]
    fn test_resolve_all_later_flag_wins() {
        let options = vec![OptionDef::scalar("testing").short("-t")];
        let parsed = parse_argument_list(&options, "-t \"a\" -t \"b\"").unwrap();
        let context = Context::new();
        let resolved = resolve_all(parsed.iter().map(|(o, r)| (*o, r)), &context).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["testing"], json!("b"));
    }
}
