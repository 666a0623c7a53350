// src/cli/mod.rs

use clap::Parser;
use std::path::PathBuf;

pub mod handlers;

/// widgets: parse widget tags, aggregate page media and render templates.
///
/// Commands:
///   lex <ARGS>...                     Show how an argument string is tokenized
///   media <TEMPLATE>                  List the CSS/JS a page needs
///   render <TEMPLATE>                 Render a page template
///   list                              List registered widgets by app
///   check                             Compile every template and report errors
///
/// Run `widgets <command> --help` for the options of each command.
#[derive(Parser, Debug)]
#[command(author, version, about, verbatim_doc_comment)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Settings file. Defaults to `widgets.toml` in the current directory.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// The command to run.
    pub command: Option<String>,

    /// Arguments for the command.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
}
