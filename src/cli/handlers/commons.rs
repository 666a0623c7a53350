// src/cli/handlers/commons.rs

// Shared helpers for the handlers.

use crate::{
    cli::GlobalArgs,
    core::{config_loader, engine::Engine, template::Template},
};
use anyhow::{Context, Result};
use std::{env, sync::Arc};

/// Loads the settings and builds the engine every command works with.
pub fn load_engine(global: &GlobalArgs) -> Result<Engine> {
    let cwd = env::current_dir().context("Could not determine the current directory")?;
    let (settings, base) = config_loader::resolve_settings(global.config.as_deref(), &cwd)
        .context("Failed to load settings")?;
    log::debug!("Settings resolved relative to {}", base.display());
    config_loader::build_engine(settings, &base).context("Failed to build the template engine")
}

/// Loads each named template, for `--variable-include` arguments.
pub fn load_templates(engine: &Engine, names: &[String]) -> Result<Vec<Arc<Template>>> {
    names
        .iter()
        .map(|name| {
            engine
                .get_template(name)
                .with_context(|| format!("Failed to load template '{name}'"))
        })
        .collect()
}
