//! Documentation source pages and where they live on the site.

use crate::config::NavEntry;
use crate::error::BuildError;
use ignore::WalkBuilder;
use std::path::Path;

/// One Markdown page of the documentation source, in navigation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentationPage {
    /// Path relative to the source directory, `/`-separated (`guide/setup.md`).
    pub source: String,
    /// Display name; taken from the first level-1 heading when absent.
    pub title: Option<String>,
    /// Site location; derived from `source` when absent.
    pub location: Option<String>,
    /// Markdown body.
    pub content: String,
}

impl DocumentationPage {
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into().replace('\\', "/"),
            title: None,
            location: None,
            content: content.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Resolves the page's site location.
    ///
    /// Derived locations use pretty URLs:
    /// - `index.md` → `./`
    /// - `examples.md` → `examples/`
    /// - `guide/index.md` → `guide/`
    /// - `guide/setup.md` → `guide/setup/`
    pub fn resolve_location(&self) -> Result<String, BuildError> {
        let location = match &self.location {
            Some(location) => location.trim().to_string(),
            None => self.derive_location()?,
        };
        validate_location(&location).map_err(|reason| BuildError::malformed(&self.source, reason))?;
        Ok(location)
    }

    fn derive_location(&self) -> Result<String, BuildError> {
        let Some(stem) = strip_markdown_extension(&self.source) else {
            return Err(BuildError::malformed(
                &self.source,
                "not a Markdown file and no explicit location",
            ));
        };

        if stem == "index" {
            Ok("./".to_string())
        } else if let Some(dir) = stem.strip_suffix("/index") {
            Ok(format!("{}/", dir))
        } else {
            Ok(format!("{}/", stem))
        }
    }

    /// Fallback display name when neither config nor content provides one.
    pub(crate) fn fallback_title(&self) -> String {
        let stem = strip_markdown_extension(&self.source).unwrap_or(&self.source);
        let mut segments = stem.rsplit('/');
        match segments.next() {
            Some("index") => segments
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or("Home")
                .to_string(),
            Some(name) if !name.is_empty() => name.to_string(),
            _ => "Home".to_string(),
        }
    }
}

fn strip_markdown_extension(source: &str) -> Option<&str> {
    source
        .strip_suffix(".md")
        .or_else(|| source.strip_suffix(".markdown"))
        .filter(|stem| !stem.is_empty())
}

/// Checks that a location is a usable relative URL without an anchor.
fn validate_location(location: &str) -> Result<(), String> {
    if location.is_empty() {
        return Err("location is empty".to_string());
    }
    if location.starts_with('/') {
        return Err(format!("location '{}' is absolute", location));
    }
    if let Some((scheme, _)) = location.split_once(':')
        && !scheme.contains('/')
    {
        return Err(format!("location '{}' has a URL scheme", location));
    }
    if let Some(c) = location
        .chars()
        .find(|c| matches!(c, '#' | '?') || c.is_whitespace())
    {
        return Err(format!("location '{}' contains {:?}", location, c));
    }
    if location.split('/').any(|segment| segment == "..") {
        return Err(format!("location '{}' escapes the site root", location));
    }
    Ok(())
}

/// Reads the pages of a documentation source directory.
///
/// With a navigation list, pages are read in that order. Without one, every
/// Markdown file under `source` is included, `index.md` first and the rest by
/// path, so the order never depends on the filesystem.
pub fn load_pages(source: &Path, nav: &[NavEntry]) -> Result<Vec<DocumentationPage>, BuildError> {
    let entries: Vec<NavEntry> = if nav.is_empty() {
        discover_pages(source)
    } else {
        nav.to_vec()
    };

    tracing::debug!("Loading {} pages from {}", entries.len(), source.display());

    entries
        .into_iter()
        .map(|entry| {
            let path = source.join(&entry.file);
            let content = std::fs::read_to_string(&path).map_err(|error| BuildError::Io {
                path: path.clone(),
                error,
            })?;

            let mut page = DocumentationPage::new(entry.file, content);
            page.title = entry.title;
            page.location = entry.location;
            Ok(page)
        })
        .collect()
}

/// Markdown files under `source`, relative and sorted with `index.md` first.
fn discover_pages(source: &Path) -> Vec<NavEntry> {
    let mut files: Vec<String> = WalkBuilder::new(source)
        .sort_by_file_path(|a, b| a.cmp(b))
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Skipping unreadable path under {}: {}", source.display(), e);
                None
            }
        })
        .filter(|e| e.file_type().is_some_and(|t| t.is_file()))
        .filter_map(|e| {
            let relative = e.path().strip_prefix(source).ok()?;
            let relative = relative.to_string_lossy().replace('\\', "/");
            strip_markdown_extension(&relative).is_some().then_some(relative)
        })
        .collect();

    files.sort_by(|a, b| (a != "index.md", a).cmp(&(b != "index.md", b)));
    files.into_iter().map(NavEntry::from_file).collect()
}
