mod common;

use assert2::{check, let_assert};
use common::{DocsSite, docs_site, site_records};
use docsearch::{QueryEngine, QueryOptions, SearchOutcome, SearchSession, SessionError, TokenizerConfig};
use rstest::rstest;
use std::sync::Arc;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn session_loads_built_index(docs_site: DocsSite) {
    let session = SearchSession::new();
    check!(!session.is_ready().await);

    session
        .load_path(
            docs_site.index_path().to_path_buf(),
            TokenizerConfig::default(),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    check!(session.is_ready().await);

    let outcome = session.search("cos").await.unwrap();
    let_assert!(SearchOutcome::Completed { generation, results } = outcome);
    check!(generation == 1);
    check!(results[0].record.location == "examples/#Basic-function-definitions");
}

#[tokio::test]
async fn session_without_index_reports_not_loaded() {
    let session = SearchSession::new();
    let_assert!(Err(error) = session.search("cos").await);
    check!(error == SessionError::IndexNotLoaded);
}

/// Test: when a newer query arrives, only the newest one delivers results.
#[tokio::test(flavor = "multi_thread")]
async fn newer_query_supersedes_older() {
    // Enough records that scoring the first query takes measurable time
    let mut records = site_records();
    let template = records.clone();
    for copy in 1..200u32 {
        for record in &template {
            let mut record = record.clone();
            record.id = docsearch::RecordId(records.len() as u32);
            record.parent = record.parent.map(|p| docsearch::RecordId(p.0 + copy * template.len() as u32));
            record.location = format!("copy{}/{}", copy, record.location);
            records.push(record);
        }
    }
    let engine = QueryEngine::new(records, TokenizerConfig::default(), QueryOptions::default());
    let session = Arc::new(SearchSession::with_engine(engine));

    let (older, newer) = tokio::join!(session.search("plot sin cos"), session.search("parametric"));

    let older = older.unwrap();
    let newer = newer.unwrap();
    check!(older.generation() == 1);
    check!(newer.generation() == 2);
    let_assert!(SearchOutcome::Superseded { .. } = older);
    let_assert!(Some(results) = newer.results());
    check!(!results.is_empty());
}

/// Test: repeating the newest query is answered again, with a new generation.
#[rstest]
#[tokio::test]
async fn repeated_query_completes(docs_site: DocsSite) {
    let session = SearchSession::new();
    let engine = docsearch::load_engine(docs_site.index_path(), TokenizerConfig::default(), QueryOptions::default())
        .unwrap();
    session.load(engine).await;

    let first = session.search("variables").await.unwrap();
    let second = session.search("variables").await.unwrap();
    check!(second.generation() == first.generation() + 1);
    check!(first.results() == second.results());
}
