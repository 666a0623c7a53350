// src/cli/handlers/list.rs

use crate::{
    cli::{GlobalArgs, handlers::commons},
    core::options::OptionDef,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Lists registered widgets grouped by app.")]
struct ListArgs {
    /// Also show each widget's options and media.
    #[arg(long, short)]
    verbose: bool,
}

fn describe_option(option: &OptionDef) -> String {
    let flags = match option.short_form() {
        Some(short) => format!("{short}, {}", option.long_form()),
        None => option.long_form().to_string(),
    };
    let mut line = format!("{:<28} {:<16}", flags, option.kind_name());
    if option.is_required() {
        line.push_str(" required");
    }
    if let Some(help) = option.help_text() {
        line.push_str(&format!("  {help}"));
    }
    line
}

pub fn handle(args: Vec<String>, global: &GlobalArgs) -> Result<()> {
    let list_args = ListArgs::try_parse_from(&args)?;
    let engine = commons::load_engine(global)?;
    let registry = engine.registry();

    for (app, names) in registry.widgets_by_app() {
        println!("\n{}", app.yellow().bold());
        for name in names {
            let Some(widget) = registry.find(&name) else {
                continue;
            };
            match widget.description() {
                Some(description) => println!("  {}  {}", name.cyan(), description.dimmed()),
                None => println!("  {}", name.cyan()),
            }
            if !list_args.verbose {
                continue;
            }
            for option in widget.options() {
                println!("      {}", describe_option(option));
            }
            let media = widget.media();
            for path in media.css().chain(media.js()) {
                println!("      {} {}", "media".dimmed(), path);
            }
        }
    }
    Ok(())
}
