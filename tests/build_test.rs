mod common;

use assert2::{check, let_assert};
use common::{DocsSite, EXAMPLES, HOME, TempWorkspace, docs_site};
use docsearch::cli::build_site;
use docsearch::{BuildError, Category, Config, IndexFile, IndexFormat, LoadError, RecordId, load_engine};
use rstest::rstest;

/// Test: the built file is a JS assignment the site can include directly.
#[rstest]
fn build_writes_js_index(docs_site: DocsSite) {
    let content = docs_site.workspace.read_file("build/search_index.js");
    check!(content.starts_with("var documenterSearchIndex = {\"docs\":["));
    check!(content.ends_with("};\n"));
}

/// Test: ids run 0..n-1 and every section points at its page record.
#[rstest]
fn build_assigns_ids_and_parents(docs_site: DocsSite) {
    let file = IndexFile::load(docs_site.index_path()).unwrap();
    let docs = &file.docs;

    for (position, record) in docs.iter().enumerate() {
        check!(record.id == RecordId(position as u32));
        match record.category {
            Category::Page => {
                check!(record.parent.is_none());
            }
            Category::Section => {
                let_assert!(Some(parent) = record.parent);
                let page = &docs[parent.index()];
                check!(page.category == Category::Page);
                check!(record.location.starts_with(&page.location));
                check!(record.page == page.title);
            }
        }
    }

    let pages: Vec<(&str, &str)> = docs
        .iter()
        .filter(|r| r.is_page())
        .map(|r| (r.location.as_str(), r.title.as_str()))
        .collect();
    check!(pages == vec![("./", "Desmos.jl"), ("examples/", "Examples")]);
}

#[rstest]
fn build_strips_markup_and_code(docs_site: DocsSite) {
    let file = IndexFile::load(docs_site.index_path()).unwrap();
    let_assert!(Some(section) = file.docs.iter().find(|r| r.title == "Basic function definitions"));
    check!(section.text == "Plot cos(x) and sin(x) together.");
    check!(section.code.is_empty());

    // The home page starts with a heading, so its text lives on that section
    let_assert!(Some(home) = file.docs.first());
    check!(home.text.is_empty());
    let_assert!(Some(title) = file.docs.iter().find(|r| r.location == "./#Desmos.jl"));
    check!(title.text == "Generate interactive Desmos graphs from Julia.");
}

/// Test: rebuilding unchanged pages gives a byte-identical file.
#[rstest]
fn rebuild_is_byte_identical(docs_site: DocsSite) {
    let first = docs_site.workspace.read_file("build/search_index.js");
    docs_site.build();
    let second = docs_site.workspace.read_file("build/search_index.js");
    check!(first == second);
}

#[test]
fn build_json_with_code_retained() {
    let mut site = DocsSite::new();
    site.config.site.output = site.workspace.path().join("build/search_index.json");
    site.config.build.retain_code = true;
    build_site(&site.config, IndexFormat::Json).unwrap();

    let content = site.workspace.read_file("build/search_index.json");
    check!(content.starts_with("{\"docs\":["));

    let file = IndexFile::parse(&content).unwrap();
    let_assert!(Some(section) = file.docs.iter().find(|r| r.title == "Basic function definitions"));
    check!(section.code.contains("@expression cos(x)"));
}

/// Test: navigation from the config file sets order, titles and locations.
#[test]
fn build_follows_config_navigation() {
    let workspace = TempWorkspace::new();
    workspace.create_file("docs/index.md", HOME);
    workspace.create_file("docs/examples.md", EXAMPLES);
    workspace.create_file(
        "docsearch.toml",
        r#"
        [site]
        source = "docs"
        output = "public/search_index.js"

        [[site.pages]]
        file = "examples.md"
        title = "Gallery"
        location = "gallery/"

        [[site.pages]]
        file = "index.md"
        "#,
    );

    let config = Config::load(&workspace.path().join("docsearch.toml")).unwrap();
    build_site(&config, IndexFormat::Js).unwrap();

    let file = IndexFile::load(&workspace.path().join("public/search_index.js")).unwrap();
    check!(file.docs[0].title == "Gallery");
    check!(file.docs[0].location == "gallery/");
    check!(file.docs[1].location == "gallery/#Examples");
    check!(file.docs.iter().all(|r| r.page != "Examples"));
    check!(file.docs.iter().any(|r| r.location == "./"));
}

/// Test: a page without a usable location aborts the build and writes nothing.
#[test]
fn malformed_page_writes_no_index() {
    let mut site = DocsSite::new();
    site.workspace.create_file("src/notes.txt", "# Notes\n");
    site.config.site.pages = vec![
        docsearch::NavEntry::from_file("index.md".to_string()),
        docsearch::NavEntry::from_file("notes.txt".to_string()),
    ];

    let_assert!(Err(error) = build_site(&site.config, IndexFormat::Js));
    let_assert!(Some(BuildError::MalformedPage { page, .. }) = error.downcast_ref::<BuildError>());
    check!(page == "notes.txt");
    check!(!site.index_path().exists());
}

/// Test: files written before ids existed still load, with positional ids
/// and parents resolved from the location.
#[test]
fn legacy_index_loads() {
    let workspace = TempWorkspace::new();
    workspace.create_file(
        "search_index.js",
        r#"var documenterSearchIndex = {"docs":[
            {"location":"./","page":"Home","title":"Home","text":"Desmos graphs","category":"page"},
            {"location":"examples/","page":"Examples","title":"Examples","text":"","category":"page"},
            {"location":"examples/#Basic-function-definitions","page":"Examples","title":"Basic function definitions","text":"Plot cos(x)","category":"section"}
        ]}"#,
    );

    let path = workspace.path().join("search_index.js");
    let file = IndexFile::load(&path).unwrap();
    check!(file.docs[2].id == RecordId(2));
    check!(file.docs[2].parent == Some(RecordId(1)));

    let engine = load_engine(&path, Default::default(), Default::default()).unwrap();
    let results = engine.search_default("cos");
    check!(results[0].record.location == "examples/#Basic-function-definitions");
}

#[test]
fn load_rejects_invalid_index() {
    let workspace = TempWorkspace::new();
    workspace.create_file("broken.json", "{\"docs\": [");
    let_assert!(Err(LoadError::Parse(_)) = IndexFile::load(&workspace.path().join("broken.json")));
}
