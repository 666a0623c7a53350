// src/core/arg_parser.rs

use crate::core::{
    lexer::{Arguments, OptionLexer},
    options::{OptionDef, RawValue},
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown argument: {0}")]
    UnknownArgument(String),
    #[error("Unexpected option '{token}' where a value for '{option}' was expected.")]
    UnexpectedOption { option: String, token: String },
    #[error("Option '{option}' expects a value but the arguments ended.")]
    MissingValue { option: String },
}

/// Finds an option by its short or long form.
fn find_option<'a>(options: &'a [OptionDef], flag: &str) -> Result<&'a OptionDef, ParseError> {
    options
        .iter()
        .find(|opt| opt.matches_flag(flag))
        .ok_or_else(|| ParseError::UnknownArgument(flag.to_string()))
}

/// Parses an argument list against `options`.
///
/// Returns `(option, raw value)` pairs in the order the flags appear. A flag
/// given twice yields two pairs; the later one wins once values are mapped.
/// Any error aborts the whole parse.
pub fn parse_argument_list<'a>(
    options: &'a [OptionDef],
    arguments: impl Into<Arguments>,
) -> Result<Vec<(&'a OptionDef, RawValue)>, ParseError> {
    let mut values = Vec::new();
    let mut lexer = OptionLexer::new(arguments);

    lexer.advance();

    while let Some(flag) = lexer.token() {
        let option = find_option(options, flag)?;
        lexer.advance();
        let raw = option.parse(&mut lexer)?;
        log::trace!("Parsed {} => {:?}", option, raw);
        values.push((option, raw));
    }

    Ok(values)
}
