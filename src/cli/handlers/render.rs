// src/cli/handlers/render.rs

use crate::{
    cli::{GlobalArgs, handlers::commons},
    core::{context::Context, discovery::render_page},
};
use anyhow::{Context as _, Result, bail};
use clap::Parser;
use serde_json::Value;
use std::{fs, path::PathBuf};

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Renders a page template with its widgets and their media."
)]
struct RenderArgs {
    /// Candidate templates. The first one that exists is rendered.
    #[arg(required = true)]
    templates: Vec<String>,

    /// A JSON file whose top-level object becomes the render context.
    #[arg(long)]
    context: Option<PathBuf>,

    /// A template included through a variable. Can be repeated.
    #[arg(long = "variable-include", short = 'i')]
    variable_includes: Vec<String>,
}

fn load_context(path: Option<&PathBuf>) -> Result<Context> {
    let Some(path) = path else {
        return Ok(Context::new());
    };
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read context file '{}'", path.display()))?;
    let value: Value = serde_json::from_str(&source)
        .with_context(|| format!("Failed to parse context file '{}'", path.display()))?;
    if !value.is_object() {
        bail!("Context file '{}' must contain a JSON object", path.display());
    }
    Ok(Context::from_value(value))
}

pub fn handle(args: Vec<String>, global: &GlobalArgs) -> Result<()> {
    let render_args = RenderArgs::try_parse_from(&args)?;
    let engine = commons::load_engine(global)?;
    let mut context = load_context(render_args.context.as_ref())?;

    let html = render_page(
        &engine,
        &render_args.templates,
        &mut context,
        &render_args.variable_includes,
    )
    .with_context(|| format!("Failed to render '{}'", render_args.templates.join(", ")))?;

    print!("{html}");
    Ok(())
}
