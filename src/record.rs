//! The indexable unit of documentation and the serialized index file.
//!
//! An index file is `{"docs": [Record, ...]}`, either as plain JSON or wrapped
//! in a `var documenterSearchIndex = ...` assignment so the search widget can
//! load it with a `<script>` tag. Records carry their own `id` and `parent`;
//! files written before those keys existed are still accepted, with ids taken
//! from array position and parents resolved from the location prefix.

use crate::error::LoadError;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

/// Variable name the search widget reads the index from.
pub const JS_VARIABLE: &str = "documenterSearchIndex";

/// Stable record identifier, assigned in build order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u32);

impl RecordId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a record describes a whole page or a heading-delimited section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Page,
    Section,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Section => "section",
        }
    }
}

/// One indexable fragment of documentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Page path plus optional `#anchor`, relative to the site root.
    pub location: String,
    /// Display name of the containing page.
    pub page: String,
    /// Heading title; equal to `page` for page records.
    pub title: String,
    /// Plain-text body, markup stripped.
    pub text: String,
    pub category: Category,
    /// The page record a section belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RecordId>,
    /// Code block contents, only present when code retention is enabled.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub code: String,
}

impl Record {
    /// Path part of the location, without the anchor.
    pub fn path(&self) -> &str {
        self.location
            .split_once('#')
            .map_or(self.location.as_str(), |(path, _)| path)
    }

    /// Anchor part of the location, if any.
    pub fn anchor(&self) -> Option<&str> {
        self.location.split_once('#').map(|(_, anchor)| anchor)
    }

    pub fn is_page(&self) -> bool {
        self.category == Category::Page
    }
}

/// The serialized search index document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexFile {
    pub docs: Vec<Record>,
}

/// Encoding of an index file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFormat {
    /// `{"docs": [...]}`
    Json,
    /// `var documenterSearchIndex = {"docs": [...]}`
    #[default]
    Js,
}

impl IndexFormat {
    /// Picks the format from a file extension, defaulting to JavaScript.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Js,
        }
    }
}

/// Record shape accepted on load: `id` and `parent` may be missing.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    id: Option<RecordId>,
    location: String,
    page: String,
    title: String,
    text: String,
    category: Category,
    #[serde(default)]
    parent: Option<RecordId>,
    #[serde(default)]
    code: String,
}

#[derive(Deserialize)]
struct RawIndexFile {
    docs: Vec<RawRecord>,
}

impl IndexFile {
    pub fn new(docs: Vec<Record>) -> Self {
        Self { docs }
    }

    /// Serializes the index in the requested encoding.
    ///
    /// Output is a pure function of the records, so rebuilding from unchanged
    /// pages produces byte-identical files.
    pub fn render(&self, format: IndexFormat) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(match format {
            IndexFormat::Json => json,
            IndexFormat::Js => format!("var {} = {};\n", JS_VARIABLE, json),
        })
    }

    /// Parses an index in either encoding.
    pub fn parse(input: &str) -> Result<Self, LoadError> {
        let raw: RawIndexFile = serde_json::from_str(strip_js_wrapper(input))?;
        Self::from_raw(raw.docs)
    }

    /// Reads and parses an index file.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let input = std::fs::read_to_string(path).map_err(|error| LoadError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        Self::parse(&input)
    }

    fn from_raw(raw: Vec<RawRecord>) -> Result<Self, LoadError> {
        let mut docs = Vec::with_capacity(raw.len());

        for (position, record) in raw.into_iter().enumerate() {
            let expected = RecordId(position as u32);
            let id = record.id.unwrap_or(expected);
            if id != expected {
                return Err(LoadError::InvalidRecord {
                    position,
                    reason: format!("id {} does not match position", id),
                });
            }

            docs.push(Record {
                id,
                location: record.location,
                page: record.page,
                title: record.title,
                text: record.text,
                category: record.category,
                parent: record.parent,
                code: record.code,
            });
        }

        resolve_parents(&mut docs)?;
        Ok(Self { docs })
    }
}

/// Removes a `var name = ...;` wrapper, leaving the JSON object literal.
fn strip_js_wrapper(input: &str) -> &str {
    let trimmed = input.trim();
    if !trimmed.starts_with("var ") {
        return trimmed;
    }

    let start = trimmed.find('{').unwrap_or(0);
    let end = trimmed.rfind('}').map_or(trimmed.len(), |i| i + 1);
    if start < end { &trimmed[start..end] } else { trimmed }
}

/// Fills in missing section parents and validates the ones present.
///
/// A section's parent is the first page record whose location equals the
/// section's path part.
fn resolve_parents(docs: &mut [Record]) -> Result<(), LoadError> {
    let mut pages: AHashMap<String, RecordId> = AHashMap::new();
    for record in docs.iter().filter(|r| r.is_page()) {
        pages.entry(record.location.clone()).or_insert(record.id);
    }

    let total = docs.len();
    for (position, record) in docs.iter_mut().enumerate() {
        match (record.category, record.parent) {
            (Category::Page, Some(_)) => {
                return Err(LoadError::InvalidRecord {
                    position,
                    reason: "page records cannot have a parent".to_string(),
                });
            }
            (Category::Section, Some(parent)) if parent.index() >= total => {
                return Err(LoadError::InvalidRecord {
                    position,
                    reason: format!("parent {} is out of range", parent),
                });
            }
            (Category::Section, None) => {
                record.parent = pages.get(record.path()).copied();
                if record.parent.is_none() {
                    tracing::debug!("Section '{}' has no page record", record.location);
                }
            }
            _ => {}
        }
    }

    Ok(())
}
