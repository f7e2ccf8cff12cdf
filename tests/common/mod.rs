//! Shared test fixtures and utilities for integration tests.
//!
//! # Test Isolation Strategy
//!
//! Every test builds its own site in a fresh temporary directory, so index
//! files and `.cache` snapshots never leak between tests.
//!
//! # Available Fixtures
//!
//! - `docs_site`: a small two-page site with the index already built
//! - `engine`: a [`QueryEngine`] over the `docs_site` records

use docsearch::{BuildOptions, Config, DocumentationPage, QueryEngine, QueryOptions, Record, TokenizerConfig};
use rstest::fixture;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const HOME: &str = r#"# Desmos.jl

Generate interactive [Desmos](https://www.desmos.com) graphs from Julia.

## First example

Plot sin and cos curves side by side.

## Installation

```julia
pkg> add Desmos
```

Install the package from the registry.
"#;

pub const EXAMPLES: &str = r#"# Examples

Each example below plots functions such as cos and sin in an embedded graph.

## Basic function definitions

```julia
state = @desmos begin
    @expression cos(x)
    @expression sin(x)
end
```

Plot cos(x) and sin(x) together.

## Variable definitions

Sliders for variables with ranges.

## Parametric curves

A unit circle traced with a parameter.
"#;

/// A temporary workspace directory for test isolation.
///
/// Provides basic filesystem operations within a temp directory that is
/// automatically cleaned up when dropped.
#[allow(dead_code)] // Methods used across different integration test crates
pub struct TempWorkspace {
    _temp: TempDir,
    root: PathBuf,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl TempWorkspace {
    /// Creates a new empty temporary workspace.
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    /// Returns the root path of this workspace.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates a file with the given content within this workspace.
    ///
    /// Parent directories are created automatically if they don't exist.
    ///
    /// # Panics
    /// Panics if file creation fails.
    pub fn create_file(&self, path: &str, content: &str) {
        let full_path = self.root.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("Failed to create parent directory for '{}': {}", path, e)
            });
        }
        std::fs::write(&full_path, content)
            .unwrap_or_else(|e| panic!("Failed to write file '{}': {}", path, e));
    }

    /// Reads a file from this workspace.
    ///
    /// # Panics
    /// Panics if the file cannot be read.
    pub fn read_file(&self, path: &str) -> String {
        std::fs::read_to_string(self.root.join(path))
            .unwrap_or_else(|e| panic!("Failed to read file '{}': {}", path, e))
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// A documentation site on disk with `src/` pages and a config pointing at them.
#[allow(dead_code)] // Fields used across different integration test crates
pub struct DocsSite {
    pub workspace: TempWorkspace,
    pub config: Config,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl DocsSite {
    /// Writes the Home and Examples pages and a matching config.
    pub fn new() -> Self {
        let workspace = TempWorkspace::new();
        workspace.create_file("src/index.md", HOME);
        workspace.create_file("src/examples.md", EXAMPLES);

        let mut config = Config::default();
        config.site.source = workspace.path().join("src");
        config.site.output = workspace.path().join("build/search_index.js");

        Self { workspace, config }
    }

    pub fn index_path(&self) -> &Path {
        &self.config.site.output
    }

    /// Builds the index file with the current config.
    pub fn build(&self) {
        docsearch::cli::build_site(&self.config, docsearch::IndexFormat::Js).expect("build should succeed");
    }
}

/// The records the fixture site builds to, without touching the filesystem.
pub fn site_records() -> Vec<Record> {
    let pages = vec![
        DocumentationPage::new("index.md", HOME),
        DocumentationPage::new("examples.md", EXAMPLES),
    ];
    docsearch::build(&pages, &BuildOptions::default()).expect("fixture pages should build")
}

#[fixture]
pub fn docs_site() -> DocsSite {
    let site = DocsSite::new();
    site.build();
    site
}

#[fixture]
pub fn engine() -> QueryEngine {
    QueryEngine::new(site_records(), TokenizerConfig::default(), QueryOptions::default())
}
