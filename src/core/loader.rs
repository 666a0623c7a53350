// src/core/loader.rs

use crate::core::template::TemplateError;
use std::{
    collections::{BTreeSet, HashMap},
    fmt, fs,
    path::{Component, Path, PathBuf},
};
use walkdir::WalkDir;

/// Where template sources come from.
pub trait TemplateLoader: Send + Sync + fmt::Debug {
    fn load_source(&self, name: &str) -> Result<String, TemplateError>;

    /// Every template name this loader can serve, sorted.
    fn template_names(&self) -> Result<Vec<String>, TemplateError>;
}

/// Loads templates from a list of directories. The first directory holding
/// a template wins.
#[derive(Debug, Clone, Default)]
pub struct FileSystemLoader {
    dirs: Vec<PathBuf>,
}

impl FileSystemLoader {
    pub fn new<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a loader from configured directory strings. `~` and environment
    /// variables are expanded, relative paths are taken from `base`, and
    /// directories that do not exist are skipped.
    pub fn from_config(dirs: &[String], base: &Path) -> Self {
        let dirs = dirs
            .iter()
            .filter_map(|dir| {
                let expanded = shellexpand::full(dir).map(|s| s.into_owned()).unwrap_or_else(|e| {
                    log::warn!("Could not expand template dir '{}': {}", dir, e);
                    dir.clone()
                });
                let path = base.join(expanded);
                match dunce::canonicalize(&path) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        log::warn!("Skipping template dir '{}': {}", path.display(), e);
                        None
                    }
                }
            })
            .collect();
        Self { dirs }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

/// Template names are relative paths that never leave the template dirs.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}

impl TemplateLoader for FileSystemLoader {
    fn load_source(&self, name: &str) -> Result<String, TemplateError> {
        if !is_safe_name(name) {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        for dir in &self.dirs {
            let path = dir.join(name);
            if path.is_file() {
                log::debug!("Loading template '{}' from {}", name, path.display());
                return fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                    name: name.to_string(),
                    source,
                });
            }
        }
        Err(TemplateError::NotFound(name.to_string()))
    }

    fn template_names(&self) -> Result<Vec<String>, TemplateError> {
        let mut names = BTreeSet::new();
        for dir in &self.dirs {
            for entry in WalkDir::new(dir).follow_links(true) {
                let entry = entry.map_err(|e| TemplateError::Io {
                    name: dir.display().to_string(),
                    source: e.into(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                if let Ok(relative) = entry.path().strip_prefix(dir) {
                    let name: Vec<String> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    names.insert(name.join("/"));
                }
            }
        }
        Ok(names.into_iter().collect())
    }
}

/// Templates held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }

    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MemoryLoader {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            templates: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl TemplateLoader for MemoryLoader {
    fn load_source(&self, name: &str) -> Result<String, TemplateError> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }

    fn template_names(&self) -> Result<Vec<String>, TemplateError> {
        let mut names: Vec<String> = self.templates.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_loader() {
        let loader: MemoryLoader = [("b.html", "B"), ("a.html", "A")].into_iter().collect();
        assert_eq!(loader.load_source("a.html").unwrap(), "A");
        assert!(matches!(
            loader.load_source("c.html"),
            Err(TemplateError::NotFound(name)) if name == "c.html"
        ));
        assert_eq!(loader.template_names().unwrap(), vec!["a.html", "b.html"]);
    }

    #[test]
    fn test_file_system_loader_search_order() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::create_dir_all(first.path().join("widgets")).unwrap();
        fs::write(first.path().join("widgets/head.html"), "first").unwrap();
        fs::write(second.path().join("page.html"), "page").unwrap();
        fs::create_dir_all(second.path().join("widgets")).unwrap();
        fs::write(second.path().join("widgets/head.html"), "second").unwrap();

        let loader = FileSystemLoader::new([first.path(), second.path()]);
        assert_eq!(loader.load_source("widgets/head.html").unwrap(), "first");
        assert_eq!(loader.load_source("page.html").unwrap(), "page");
        assert_eq!(
            loader.template_names().unwrap(),
            vec!["page.html", "widgets/head.html"]
        );
    }

    #[test]
    fn test_file_system_loader_rejects_escaping_names() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("templates");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("secret.html"), "secret").unwrap();

        let loader = FileSystemLoader::new([&nested]);
        assert!(matches!(
            loader.load_source("../secret.html"),
            Err(TemplateError::NotFound(_))
        ));
        assert!(matches!(loader.load_source("/etc/passwd"), Err(TemplateError::NotFound(_))));
    }

    #[test]
    fn test_from_config_skips_missing_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("templates")).unwrap();

        let loader = FileSystemLoader::from_config(
            &["templates".to_string(), "missing".to_string()],
            dir.path(),
        );
        assert_eq!(loader.dirs().len(), 1);
        assert!(loader.dirs()[0].ends_with("templates"));
    }
}
