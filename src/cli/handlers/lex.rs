// src/cli/handlers/lex.rs

use crate::{
    cli::GlobalArgs,
    core::{
        context::strip_quotes,
        lexer::{OptionLexer, tokenize},
    },
};
use anyhow::{Result, bail};
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Shows how a widget argument string is split into tokens."
)]
struct LexArgs {
    /// Do not expand short flag clusters such as `-abc`.
    #[arg(long)]
    no_expand: bool,

    /// The argument string. Several arguments are joined with spaces.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    arguments: Vec<String>,
}

pub fn handle(args: Vec<String>, _global: &GlobalArgs) -> Result<()> {
    let lex_args = LexArgs::try_parse_from(&args)?;
    if lex_args.arguments.is_empty() {
        bail!("Nothing to lex. Usage: widgets lex '--title \"Sales\" -vq'");
    }

    let input = lex_args.arguments.join(" ");
    let tokens: Vec<String> = if lex_args.no_expand {
        tokenize(&input)
    } else {
        OptionLexer::new(input.as_str()).collect()
    };

    for (i, token) in tokens.iter().enumerate() {
        let styled = if token.starts_with('-') {
            token.cyan().bold()
        } else if strip_quotes(token).is_some() {
            token.green()
        } else {
            token.normal()
        };
        println!("{:>3}  {}", i.to_string().dimmed(), styled);
    }
    Ok(())
}
