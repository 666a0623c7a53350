// src/cli/handlers/media.rs

use crate::{
    cli::{GlobalArgs, handlers::commons},
    core::{discovery::WidgetTemplateWrapper, media::absolute_path},
};
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Lists the widgets a page template may render and the media they need."
)]
struct MediaArgs {
    /// The page template.
    template: String,

    /// A template included through a variable. Can be repeated.
    #[arg(long = "variable-include", short = 'i')]
    variable_includes: Vec<String>,

    /// Print the rendered <link>/<script> tags instead of a listing.
    #[arg(long)]
    html: bool,
}

pub fn handle(args: Vec<String>, global: &GlobalArgs) -> Result<()> {
    let media_args = MediaArgs::try_parse_from(&args)?;
    let engine = commons::load_engine(global)?;

    let template = engine
        .get_template(&media_args.template)
        .with_context(|| format!("Failed to load template '{}'", media_args.template))?;
    let includes = commons::load_templates(&engine, &media_args.variable_includes)?;
    let wrapper = WidgetTemplateWrapper::new(&engine, template, &includes, None)
        .context("Widget discovery failed")?;

    let media_url = &engine.settings().media_url;
    if media_args.html {
        println!("{}", wrapper.media().render(media_url));
        return Ok(());
    }

    println!(
        "\n--- {} '{}' ---",
        "Widgets in".bold(),
        media_args.template.yellow()
    );
    if wrapper.widget_nodes().is_empty() {
        println!("  {}", "(none)".dimmed());
    }
    for node in wrapper.widget_nodes() {
        println!("  {}", node.widget().qualified_name().cyan());
    }

    println!("\n{}", "CSS".bold());
    for path in wrapper.media().css() {
        println!("  {}", absolute_path(media_url, path));
    }
    println!("\n{}", "JS".bold());
    for path in wrapper.media().js() {
        println!("  {}", absolute_path(media_url, path));
    }
    Ok(())
}
