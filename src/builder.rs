//! Turns documentation pages into search records.
//!
//! Every page yields one `page` record followed by one `section` record per
//! heading. Pages are parsed independently (in parallel by default); ids are
//! assigned afterwards in page order, so the output never depends on which
//! page finished parsing first.

use crate::error::BuildError;
use crate::page::DocumentationPage;
use crate::record::{Category, IndexFile, IndexFormat, Record, RecordId};
use ahash::{AHashMap, AHashSet};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// Matches HTML comments and tags in raw HTML blocks.
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|<[^>]*>").expect("valid regex")
});

/// Characters dropped from anchors because they would break the URL.
const ANCHOR_UNSAFE: &[char] = &['#', '?', '%', '"', '<', '>', '`'];

/// Build settings, read from the `[build]` table of the site config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Keep code block contents in the record's `code` field.
    pub retain_code: bool,
    /// Parse pages on the rayon thread pool.
    pub parallel: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            retain_code: false,
            parallel: true,
        }
    }
}

/// Everything extracted from one page before ids are known.
#[derive(Debug)]
struct ParsedPage {
    source: String,
    location: String,
    title: String,
    summary: String,
    intro_code: String,
    sections: Vec<ParsedSection>,
}

#[derive(Debug, Default)]
struct ParsedSection {
    title: String,
    anchor: String,
    text: String,
    code: String,
}

/// Builds the record sequence for a site.
///
/// Fails without producing any records if a page has no resolvable location
/// or two pages resolve to the same one.
pub fn build(pages: &[DocumentationPage], options: &BuildOptions) -> Result<Vec<Record>, BuildError> {
    let start = std::time::Instant::now();

    let parsed: Vec<ParsedPage> = if options.parallel {
        pages
            .par_iter()
            .map(|page| parse_page(page, options))
            .collect::<Result<_, _>>()?
    } else {
        pages
            .iter()
            .map(|page| parse_page(page, options))
            .collect::<Result<_, _>>()?
    };

    let mut seen: AHashMap<&str, &str> = AHashMap::new();
    for page in &parsed {
        if let Some(other) = seen.insert(&page.location, &page.source) {
            return Err(BuildError::malformed(
                &page.source,
                format!("location '{}' is already used by '{}'", page.location, other),
            ));
        }
    }

    let records = assign_ids(parsed);

    tracing::info!(
        "Built {} records from {} pages in {:?}",
        records.len(),
        pages.len(),
        start.elapsed()
    );

    Ok(records)
}

/// Flattens parsed pages into records with sequential ids, in page order.
fn assign_ids(parsed: Vec<ParsedPage>) -> Vec<Record> {
    let total = parsed.iter().map(|p| p.sections.len() + 1).sum();
    let mut records: Vec<Record> = Vec::with_capacity(total);

    for page in parsed {
        let page_id = RecordId(records.len() as u32);
        records.push(Record {
            id: page_id,
            location: page.location.clone(),
            page: page.title.clone(),
            title: page.title.clone(),
            text: page.summary,
            category: Category::Page,
            parent: None,
            code: page.intro_code,
        });

        for section in page.sections {
            records.push(Record {
                id: RecordId(records.len() as u32),
                location: format!("{}#{}", page.location, section.anchor),
                page: page.title.clone(),
                title: section.title,
                text: section.text,
                category: Category::Section,
                parent: Some(page_id),
                code: section.code,
            });
        }
    }

    records
}

/// Writes records as an index file, creating parent directories.
pub fn write_index(records: Vec<Record>, path: &Path, format: IndexFormat) -> Result<(), BuildError> {
    let rendered = IndexFile::new(records).render(format)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|error| BuildError::Io {
            path: parent.to_path_buf(),
            error,
        })?;
    }

    std::fs::write(path, rendered).map_err(|error| BuildError::Io {
        path: path.to_path_buf(),
        error,
    })?;

    tracing::info!("Wrote search index to {}", path.display());
    Ok(())
}

fn parse_page(page: &DocumentationPage, options: &BuildOptions) -> Result<ParsedPage, BuildError> {
    let location = page.resolve_location()?;
    let mut extractor = Extractor::new(options.retain_code);
    extractor.run(&page.content);

    let title = page
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or(extractor.first_h1.take())
        .unwrap_or_else(|| page.fallback_title());

    // Text under a heading belongs to that heading's section
    let intro = extractor.intro;

    tracing::trace!(
        "Parsed '{}' -> {} ({} sections)",
        page.source,
        location,
        extractor.sections.len()
    );

    Ok(ParsedPage {
        source: page.source.clone(),
        location,
        title,
        summary: intro.text,
        intro_code: intro.code,
        sections: extractor.sections,
    })
}

/// Walks Markdown events, splitting content at headings.
struct Extractor {
    retain_code: bool,
    /// Content before the first heading
    intro: ParsedSection,
    sections: Vec<ParsedSection>,
    /// Heading text being collected, if inside a heading
    heading: Option<(String, Option<String>, bool)>,
    in_code_block: bool,
    first_h1: Option<String>,
    anchors: AHashSet<String>,
}

impl Extractor {
    fn new(retain_code: bool) -> Self {
        Self {
            retain_code,
            intro: ParsedSection::default(),
            sections: Vec::new(),
            heading: None,
            in_code_block: false,
            first_h1: None,
            anchors: AHashSet::new(),
        }
    }

    fn current(&mut self) -> &mut ParsedSection {
        self.sections.last_mut().unwrap_or(&mut self.intro)
    }

    fn run(&mut self, markdown: &str) {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);
        options.insert(Options::ENABLE_MATH);

        for event in Parser::new_ext(markdown, options) {
            self.handle(event);
        }

        self.intro.text = collapse_whitespace(&self.intro.text);
        for section in &mut self.sections {
            section.text = collapse_whitespace(&section.text);
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::Heading { level, id, .. }) => {
                let is_h1 = level == pulldown_cmark::HeadingLevel::H1;
                self.heading = Some((String::new(), id.map(|id| id.to_string()), is_h1));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((text, id, is_h1)) = self.heading.take() {
                    self.open_section(&text, id, is_h1);
                }
            }
            Event::Start(Tag::CodeBlock(_)) => self.in_code_block = true,
            Event::End(TagEnd::CodeBlock) => {
                self.in_code_block = false;
                self.push_break();
            }
            Event::End(TagEnd::Paragraph) => self.push_break(),
            Event::Text(text) => {
                if self.in_code_block {
                    self.push_code(&text);
                } else {
                    self.push_text(&text);
                }
            }
            Event::Code(code) | Event::InlineMath(code) | Event::DisplayMath(code) => {
                self.push_text(&code);
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                let stripped = HTML_TAG.replace_all(&html, " ");
                self.push_text(&stripped);
            }
            Event::SoftBreak | Event::HardBreak => self.push_text(" "),
            Event::End(TagEnd::Item | TagEnd::TableCell | TagEnd::TableRow) => {
                self.push_break();
            }
            _ => {}
        }
    }

    fn open_section(&mut self, raw_title: &str, explicit_id: Option<String>, is_h1: bool) {
        let title = collapse_whitespace(raw_title);
        if is_h1 && self.first_h1.is_none() && !title.is_empty() {
            self.first_h1 = Some(title.clone());
        }

        let base = explicit_id.unwrap_or_else(|| slugify(&title));
        let mut anchor = base.clone();
        let mut n = 2;
        while !self.anchors.insert(anchor.clone()) {
            anchor = format!("{}-{}", base, n);
            n += 1;
        }

        self.sections.push(ParsedSection {
            title,
            anchor,
            ..ParsedSection::default()
        });
    }

    fn push_text(&mut self, text: &str) {
        if let Some((heading, _, _)) = &mut self.heading {
            heading.push_str(text);
            return;
        }
        self.current().text.push_str(text);
    }

    fn push_code(&mut self, code: &str) {
        if self.retain_code {
            self.current().code.push_str(code);
        }
    }

    fn push_break(&mut self) {
        if self.heading.is_none() {
            self.current().text.push('\n');
        }
    }
}

/// Heading anchor: whitespace runs become `-`, URL-breaking characters go.
pub fn slugify(title: &str) -> String {
    let slug = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace(ANCHOR_UNSAFE, "");
    if slug.is_empty() {
        "section".to_string()
    } else {
        slug
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    const EXAMPLES: &str = r#"# Examples

## Basic function definitions

Plot `cos(x)` and **sin(x)** together.

```julia
state = @desmos begin
    @expression cos(x)
end
```

<object type="text/html" data="../example_BasicFunctions.html"></object>

## Variable definitions

- slider `b`
- range `2..6`
"#;

    fn titles(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_page_and_section_records() {
        let pages = [DocumentationPage::new("examples.md", EXAMPLES)];
        let records = build(&pages, &BuildOptions::default()).unwrap();

        check!(titles(&records) == vec!["Examples", "Examples", "Basic function definitions", "Variable definitions"]);
        check!(records[0].category == Category::Page);
        check!(records[0].location == "examples/");
        check!(records[2].location == "examples/#Basic-function-definitions");
        check!(records[2].text == "Plot cos(x) and sin(x) together.");
        check!(records[2].code.is_empty());
        check!(records[3].text == "slider b range 2..6");
        check!(records.iter().skip(1).all(|r| r.parent == Some(RecordId(0))));
        check!(records.iter().all(|r| r.page == "Examples"));
    }

    #[test]
    fn test_page_text_excludes_section_text() {
        let pages = [DocumentationPage::new("examples.md", EXAMPLES)];
        let records = build(&pages, &BuildOptions::default()).unwrap();
        check!(records[0].text.is_empty());
        check!(records[0].code.is_empty());
        check!(records[2].text == "Plot cos(x) and sin(x) together.");
    }

    #[test]
    fn test_intro_text_is_summary() {
        let markdown = "Generate Desmos scripts.\n\nWith Julia.\n\n## Install\n\nRun it.\n";
        let records = build(&[DocumentationPage::new("index.md", markdown)], &BuildOptions::default()).unwrap();
        check!(records[0].title == "Home");
        check!(records[0].text == "Generate Desmos scripts. With Julia.");
        check!(records[1].location == "./#Install");
    }

    #[test]
    fn test_retain_code() {
        let pages = [DocumentationPage::new("examples.md", EXAMPLES)];
        let options = BuildOptions {
            retain_code: true,
            ..BuildOptions::default()
        };
        let records = build(&pages, &options).unwrap();
        check!(records[2].code.contains("@expression cos(x)"));
        check!(!records[2].text.contains("@desmos"));
    }

    #[test]
    fn test_html_is_stripped() {
        let markdown = "# Page\n\n<div class=\"note\">Be <em>careful</em></div>\n\n<!-- hidden -->\n";
        let records = build(&[DocumentationPage::new("page.md", markdown)], &BuildOptions::default()).unwrap();
        check!(records[1].text == "Be careful");
    }

    #[test]
    fn test_explicit_title_and_heading_ids() {
        let markdown = "# Intro {#start}\n\ntext\n";
        let page = DocumentationPage::new("guide.md", markdown).with_title("Guide");
        let records = build(&[page], &BuildOptions::default()).unwrap();
        check!(records[0].title == "Guide");
        check!(records[1].title == "Intro");
        check!(records[1].location == "guide/#start");
    }

    #[test]
    fn test_duplicate_anchors_are_numbered() {
        let markdown = "## Usage\n\na\n\n## Usage\n\nb\n\n## Usage\n\nc\n";
        let records = build(&[DocumentationPage::new("api.md", markdown)], &BuildOptions::default()).unwrap();
        let anchors: Vec<Option<&str>> = records.iter().map(|r| r.anchor()).collect();
        check!(anchors == vec![None, Some("Usage"), Some("Usage-2"), Some("Usage-3")]);
    }

    #[rstest]
    #[case("Basic function definitions", "Basic-function-definitions")]
    #[case("Newton's method", "Newton's-method")]
    #[case("Desmos.jl", "Desmos.jl")]
    #[case("Desmos Text I/O", "Desmos-Text-I/O")]
    #[case("  What is `x`? ", "What-is-x")]
    #[case("###", "section")]
    fn test_slugify(#[case] title: &str, #[case] expected: &str) {
        check!(slugify(title) == expected);
    }

    #[test]
    fn test_ids_follow_page_order() {
        let pages: Vec<DocumentationPage> = (0..20)
            .map(|i| DocumentationPage::new(format!("p{:02}.md", i), format!("Intro {}\n\n## A\n\n## B\n", i)))
            .collect();
        let records = build(&pages, &BuildOptions::default()).unwrap();
        let ids: Vec<u32> = records.iter().map(|r| r.id.0).collect();
        check!(ids == (0..60).collect::<Vec<u32>>());
        check!(records[3].location == "p01/");
        check!(records[5].parent == Some(RecordId(3)));
    }

    #[test]
    fn test_duplicate_locations_abort() {
        let pages = [
            DocumentationPage::new("a.md", "# A"),
            DocumentationPage::new("b.md", "# B").with_location("a/"),
        ];
        let_assert!(Err(BuildError::MalformedPage { page, reason }) = build(&pages, &BuildOptions::default()));
        check!(page == "b.md");
        check!(reason.contains("a.md"));
    }

    #[test]
    fn test_malformed_page_aborts_whole_build() {
        let pages = [
            DocumentationPage::new("a.md", "# A"),
            DocumentationPage::new("notes.txt", "# Notes"),
        ];
        let_assert!(Err(BuildError::MalformedPage { page, .. }) = build(&pages, &BuildOptions::default()));
        check!(page == "notes.txt");
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let pages: Vec<DocumentationPage> = (0..16)
            .map(|i| DocumentationPage::new(format!("p{}.md", i), EXAMPLES))
            .collect();
        let parallel = build(&pages, &BuildOptions::default()).unwrap();
        let sequential = build(
            &pages,
            &BuildOptions {
                parallel: false,
                ..BuildOptions::default()
            },
        )
        .unwrap();
        check!(parallel == sequential);
    }
}
