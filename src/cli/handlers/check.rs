// src/cli/handlers/check.rs

use crate::cli::{GlobalArgs, handlers::commons};
use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::*;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Compiles every template under the template dirs and reports errors."
)]
struct CheckArgs {
    /// Only report templates that fail.
    #[arg(long, short)]
    quiet: bool,
}

pub fn handle(args: Vec<String>, global: &GlobalArgs) -> Result<()> {
    let check_args = CheckArgs::try_parse_from(&args)?;
    let engine = commons::load_engine(global)?;
    let names = engine
        .loader()
        .template_names()
        .context("Failed to list templates")?;

    let mut failures = 0usize;
    for name in &names {
        match engine.get_template(name) {
            Ok(template) => {
                if !check_args.quiet {
                    let widgets = template.widget_nodes().len();
                    println!("  {} {} ({} widget tag(s))", "ok".green(), name, widgets);
                }
            }
            Err(e) => {
                failures += 1;
                println!("  {} {}: {}", "error".red().bold(), name, e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} template(s) failed to compile", failures, names.len());
    }
    println!("\n{} template(s) checked.", names.len());
    Ok(())
}
