//! Site configuration read from `docsearch.toml`.
//!
//! ```toml
//! [site]
//! source = "src"
//! output = "build/search_index.js"
//!
//! [[site.pages]]
//! file = "index.md"
//! title = "Home"
//!
//! [search]
//! min_token_length = 2
//! stem = true
//! top_k = 20
//!
//! [build]
//! retain_code = false
//! ```
//!
//! Every key is optional. Relative paths are resolved against the directory
//! holding the config file.

use crate::builder::BuildOptions;
use crate::error::Result;
use crate::search::{QueryOptions, TokenizerConfig};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name looked up in the working directory.
pub const CONFIG_FILE: &str = "docsearch.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub search: SearchConfig,
    pub build: BuildOptions,
}

/// Where pages come from and where the index goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Navigation order. Empty means every Markdown file under `source`.
    pub pages: Vec<NavEntry>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("src"),
            output: PathBuf::from("build/search_index.js"),
            pages: Vec::new(),
        }
    }
}

/// One page in the navigation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavEntry {
    /// Path relative to the source directory.
    pub file: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

impl NavEntry {
    pub fn from_file(file: String) -> Self {
        Self {
            file,
            title: None,
            location: None,
        }
    }
}

/// The `[search]` table: tokenizer settings plus query defaults.
///
/// Both halves must match between building the index and querying it, so
/// they live in one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(flatten)]
    pub tokenizer: TokenizerConfig,
    #[serde(flatten)]
    pub query: QueryOptions,
}

impl Config {
    /// Parses a config document. Relative paths are left as written.
    pub fn parse(input: &str) -> Result<Self> {
        let config: Self = toml::from_str(input).context("Failed to parse docsearch config")?;
        Ok(config)
    }

    /// Reads a config file and resolves its paths against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.site.source = base.join(&config.site.source);
            config.site.output = base.join(&config.site.output);
        }

        tracing::debug!(
            "Loaded config from {} (source: {}, output: {}, {} nav entries)",
            path.display(),
            config.site.source.display(),
            config.site.output.display(),
            config.site.pages.len()
        );

        Ok(config)
    }

    /// Loads `path` if given, else `docsearch.toml` if present, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    tracing::debug!("No {} found, using defaults", CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }
}
