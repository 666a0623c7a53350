// src/core/config_loader.rs

//! # Config Loader
//!
//! Reads `widgets.toml` into [`Settings`] and turns settings into a ready
//! [`Engine`]: built-in and declared widgets in the registry, configured
//! template dirs in the loader.

use crate::{
    constants::{DEBUG_ENV_VAR, SETTINGS_FILENAME},
    core::{declared, engine::Engine, loader::FileSystemLoader},
    models::Settings,
};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML file at '{path}': {source}")]
    TomlParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid option '{option}' on widget '{widget}': {message}")]
    InvalidOption {
        widget: String,
        option: String,
        message: String,
    },
}

/// Parses settings from TOML source. `path` is only used in errors.
pub fn parse_settings(source: &str, path: &Path) -> Result<Settings, ConfigError> {
    toml::from_str(source).map_err(|source| ConfigError::TomlParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and parses a settings file, then applies the environment override.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    log::debug!("Loading settings from {}", path.display());
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut settings = parse_settings(&source, path)?;
    apply_debug_override(&mut settings, std::env::var(DEBUG_ENV_VAR).ok().as_deref());
    Ok(settings)
}

/// Loads `explicit` if given. Otherwise loads `widgets.toml` from `dir` when
/// it exists, and falls back to the defaults.
///
/// Returns the settings and the directory relative template dirs start from.
pub fn resolve_settings(explicit: Option<&Path>, dir: &Path) -> Result<(Settings, PathBuf), ConfigError> {
    if let Some(path) = explicit {
        let base = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.to_path_buf());
        return Ok((load_settings(path)?, base));
    }

    let default_path = dir.join(SETTINGS_FILENAME);
    if default_path.is_file() {
        return Ok((load_settings(&default_path)?, dir.to_path_buf()));
    }

    log::debug!("No {} in {}, using defaults", SETTINGS_FILENAME, dir.display());
    let mut settings = Settings::default();
    apply_debug_override(&mut settings, std::env::var(DEBUG_ENV_VAR).ok().as_deref());
    Ok((settings, dir.to_path_buf()))
}

/// Any value other than empty, `0`, `false` or `no` forces debug on.
pub fn apply_debug_override(settings: &mut Settings, value: Option<&str>) {
    let Some(value) = value.map(str::trim) else {
        return;
    };
    let disabled = value.is_empty()
        || value == "0"
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no");
    if !disabled {
        log::debug!("{} is set, enabling widget debug output", DEBUG_ENV_VAR);
        settings.debug = true;
    }
}

/// Builds an engine over the configured template dirs, with the built-in
/// widgets and every declared widget registered.
pub fn build_engine(settings: Settings, base: &Path) -> Result<Engine, ConfigError> {
    let registry = declared::build_registry(&settings)?;
    let loader = FileSystemLoader::from_config(&settings.template_dirs, base);
    Ok(Engine::new(Arc::new(registry), loader, settings))
}
