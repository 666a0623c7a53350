// src/core/media.rs

use indexmap::IndexSet;
use serde::Serialize;

/// CSS and JS asset references, each ordered by first appearance and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Media {
    css: IndexSet<String>,
    js: IndexSet<String>,
}

impl Media {
    pub fn new<C, J>(css: C, js: J) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        J: IntoIterator,
        J::Item: Into<String>,
    {
        let mut media = Self::default();
        media.add_css(css);
        media.add_js(js);
        media
    }

    /// Adds stylesheets, skipping ones already present.
    pub fn add_css<I>(&mut self, paths: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for path in paths {
            self.css.insert(path.into());
        }
    }

    /// Adds scripts, skipping ones already present.
    pub fn add_js<I>(&mut self, paths: I)
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        for path in paths {
            self.js.insert(path.into());
        }
    }

    /// Returns `self` followed by whatever `other` adds.
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        merged.add_css(other.css.iter().cloned());
        merged.add_js(other.js.iter().cloned());
        merged
    }

    pub fn css(&self) -> impl Iterator<Item = &str> {
        self.css.iter().map(String::as_str)
    }

    pub fn js(&self) -> impl Iterator<Item = &str> {
        self.js.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.css.is_empty() && self.js.is_empty()
    }

    /// `<link>` tags for every stylesheet.
    pub fn render_css(&self, media_url: &str) -> Vec<String> {
        self.css
            .iter()
            .map(|path| {
                format!(
                    "<link href=\"{}\" type=\"text/css\" media=\"all\" rel=\"stylesheet\">",
                    absolute_path(media_url, path)
                )
            })
            .collect()
    }

    /// `<script>` tags for every script.
    pub fn render_js(&self, media_url: &str) -> Vec<String> {
        self.js
            .iter()
            .map(|path| {
                format!(
                    "<script type=\"text/javascript\" src=\"{}\"></script>",
                    absolute_path(media_url, path)
                )
            })
            .collect()
    }

    /// All tags, stylesheets first, one per line.
    pub fn render(&self, media_url: &str) -> String {
        let mut tags = self.render_css(media_url);
        tags.extend(self.render_js(media_url));
        tags.join("\n")
    }
}

impl FromIterator<Media> for Media {
    fn from_iter<T: IntoIterator<Item = Media>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::default(), |acc, media| acc.merge(&media))
    }
}

/// Absolute URLs and rooted paths are kept; anything else is prefixed with `media_url`.
pub fn absolute_path(media_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") || path.starts_with('/') {
        path.to_string()
    } else {
        format!("{media_url}{path}")
    }
}
