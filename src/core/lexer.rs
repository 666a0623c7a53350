// src/core/lexer.rs

//! Lexing of command-style argument strings, as found in widget tags:
//!
//! ```text
//! {% widget <name> --arg1 "literal string" --arg2 variable %}
//! ```

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // A separator is a single space or a whole quoted span. Quotes are kept.
    static ref SPLIT_RE: Regex =
        Regex::new(r#"( |".*?"|'.*?')"#).expect("split regex is valid");
}

/// Input accepted by [`OptionLexer`]: either a raw string that still has to be
/// split, or a list of tokens built programmatically (only expanded).
#[derive(Debug, Clone)]
pub enum Arguments {
    Raw(String),
    Tokens(Vec<String>),
}

impl From<&str> for Arguments {
    fn from(value: &str) -> Self {
        Arguments::Raw(value.to_string())
    }
}

impl From<String> for Arguments {
    fn from(value: String) -> Self {
        Arguments::Raw(value)
    }
}

impl From<Vec<String>> for Arguments {
    fn from(value: Vec<String>) -> Self {
        Arguments::Tokens(value)
    }
}

impl From<&[String]> for Arguments {
    fn from(value: &[String]) -> Self {
        Arguments::Tokens(value.to_vec())
    }
}

impl From<&[&str]> for Arguments {
    fn from(value: &[&str]) -> Self {
        Arguments::Tokens(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Splits a raw argument string into tokens.
///
/// Quoted spans (`"..."` or `'...'`) are atomic and keep their quotes. There is
/// no escaping inside quotes. Empty and whitespace-only fragments are dropped.
pub fn tokenize(input: &str) -> Vec<String> {
    let input = input.trim();
    let mut pieces = Vec::new();
    let mut last = 0;

    for m in SPLIT_RE.find_iter(input) {
        pieces.push(input.get(last..m.start()).unwrap_or_default());
        pieces.push(m.as_str());
        last = m.end();
    }
    pieces.push(input.get(last..).unwrap_or_default());

    pieces
        .into_iter()
        .filter(|piece| !piece.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Expands short flag clusters (`-abc` => `-a -b -c`) and drops whitespace.
///
/// Long flags (`--xyz`) and values pass through unchanged.
pub fn expand<I, S>(tokens: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut expanded = Vec::new();
    for token in tokens {
        let token = token.as_ref();
        if let Some(cluster) = token.strip_prefix('-')
            && !cluster.starts_with('-')
        {
            expanded.extend(cluster.chars().map(|flag| format!("-{flag}")));
        } else if !token.trim().is_empty() {
            expanded.push(token.to_string());
        }
    }
    expanded
}

/// A single-pass cursor over expanded argument tokens.
#[derive(Debug)]
pub struct OptionLexer {
    tokens: std::vec::IntoIter<String>,
    token: Option<String>,
    exhausted: bool,
}

impl OptionLexer {
    pub fn new(arguments: impl Into<Arguments>) -> Self {
        let tokens = match arguments.into() {
            Arguments::Raw(raw) => expand(tokenize(&raw)),
            Arguments::Tokens(tokens) => expand(tokens),
        };
        log::trace!("Lexed argument tokens: {:?}", tokens);

        Self {
            tokens: tokens.into_iter(),
            token: None,
            exhausted: false,
        }
    }

    /// The current token. `None` before the first [`advance`](Self::advance)
    /// and once the stream is exhausted.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Is the current token a flag?
    pub fn token_is_flag(&self) -> bool {
        self.token.as_deref().is_some_and(|t| t.starts_with('-'))
    }

    /// Drops the current token and moves to the next one. Past the end this
    /// keeps the lexer exhausted.
    pub fn advance(&mut self) {
        match self.tokens.next() {
            Some(next) => self.token = Some(next),
            None => {
                self.token = None;
                self.exhausted = true;
            }
        }
    }

    /// Takes the current token and advances past it.
    pub(crate) fn take(&mut self) -> Option<String> {
        let token = self.token.take();
        self.advance();
        token
    }
}

impl Iterator for OptionLexer {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance();
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_lex(arguments: &str, expected: &[&str]) {
        let tokens: Vec<String> = OptionLexer::new(arguments).collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_simple_lex() {
        assert_lex("a", &["a"]);
        assert_lex("a b c", &["a", "b", "c"]);
        assert_lex("  one   two  ", &["one", "two"]);
        assert_lex("", &[]);
    }

    #[test]
    fn test_expand() {
        assert_lex("-a", &["-a"]);
        assert_lex("-abc", &["-a", "-b", "-c"]);
        assert_lex("--xyz -abc", &["--xyz", "-a", "-b", "-c"]);
        assert_eq!(expand(["--xyz", "-abc"]), vec!["--xyz", "-a", "-b", "-c"]);
    }

    #[test]
    fn test_quotes() {
        assert_lex("\"a\"", &["\"a\""]);
        assert_lex("a \"b c\" d", &["a", "\"b c\"", "d"]);
        assert_lex("--title 'x -y z'", &["--title", "'x -y z'"]);
        assert_eq!(tokenize("a \"b c\" d"), vec!["a", "\"b c\"", "d"]);
    }

    #[test]
    fn test_token_list_is_only_expanded() {
        let tokens: &[&str] = &["-tv", "a b", " "];
        let lexed: Vec<String> = OptionLexer::new(tokens).collect();
        assert_eq!(lexed, vec!["-t", "-v", "a b"]);
    }

    #[test]
    fn test_advance() {
        let mut lexer = OptionLexer::new("--a 1 --b 2");
        assert_eq!(lexer.token(), None);
        assert!(!lexer.is_exhausted());

        lexer.advance();
        assert_eq!(lexer.token(), Some("--a"));
        assert!(lexer.token_is_flag());
        lexer.advance();
        assert_eq!(lexer.token(), Some("1"));
        assert!(!lexer.token_is_flag());
        lexer.advance();
        assert_eq!(lexer.token(), Some("--b"));
        lexer.advance();
        assert_eq!(lexer.token(), Some("2"));
        assert!(!lexer.is_exhausted());

        lexer.advance();
        assert!(lexer.is_exhausted());
        assert_eq!(lexer.token(), None);

        lexer.advance();
        assert!(lexer.is_exhausted());
        assert_eq!(lexer.token(), None);
    }
}
