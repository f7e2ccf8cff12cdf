//! Query evaluation against a loaded index.
//!
//! Ranking is coverage-first: a record matching more distinct query tokens
//! always ranks above one matching fewer, whatever their scores. Within the
//! same coverage, records are ordered by score, then by location and id so
//! identical queries always produce identical orderings.

use super::index::{Field, InvertedIndex, Occurrence};
use super::scoring::{
    ADJACENCY_BONUS, FUZZY_DISCOUNT, PREFIX_DISCOUNT, adjacent_pairs, term_score, title_bonus,
};
use super::tokenize::{Tokenizer, TokenizerConfig};
use crate::record::{Record, RecordId};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;

/// Default number of results returned per query.
pub const DEFAULT_TOP_K: usize = 20;

/// Upper bound on terms a trailing prefix may expand to.
const MAX_PREFIX_EXPANSIONS: usize = 32;

/// Occurrences scored between cancellation checks.
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// Query-time behaviour, read from the `[search]` table of the site config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Results returned when the caller does not ask for a specific count.
    pub top_k: usize,
    /// Let the last query token match longer terms (as-you-type search).
    pub prefix: bool,
    /// Substitute the closest known term for tokens with no match at all.
    pub fuzzy: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            prefix: true,
            fuzzy: true,
        }
    }
}

/// A record paired with its relevance for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    pub record: Record,
    pub score: f32,
    pub matched_fields: BTreeSet<Field>,
    /// Number of distinct query tokens this record matched.
    pub matched_terms: usize,
}

/// Results that share a parent page, in rank order.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultGroup {
    /// The page record, when the index has one for these results.
    pub page: Option<RecordId>,
    /// Display name of the page.
    pub page_title: String,
    pub results: Vec<ScoredResult>,
}

/// Per-record accumulator while a query is evaluated.
#[derive(Default)]
struct Candidate {
    matched: BTreeSet<usize>,
    fields: BTreeSet<Field>,
    score: f32,
    /// Exact-match positions per field, indexed by query token.
    positions: AHashMap<Field, Vec<Vec<u32>>>,
}

/// Immutable search engine over one built index.
///
/// All methods take `&self`; an engine behind an `Arc` can serve any number
/// of concurrent searches without locking.
#[derive(Debug)]
pub struct QueryEngine {
    records: Vec<Record>,
    index: InvertedIndex,
    tokenizer: Tokenizer,
    options: QueryOptions,
    /// Titles normalized once for the whole-query title bonus
    titles: Vec<String>,
}

impl QueryEngine {
    /// Tokenizes every record and builds a fresh index.
    pub fn new(records: Vec<Record>, config: TokenizerConfig, options: QueryOptions) -> Self {
        let start = std::time::Instant::now();
        let tokenizer = Tokenizer::new(config);
        let index = InvertedIndex::build(&records, &tokenizer);

        tracing::info!(
            "Built search index: {} unique terms, {} records in {:?}",
            index.term_count(),
            records.len(),
            start.elapsed()
        );

        Self::with_index(records, index, tokenizer, options)
    }

    /// Wraps an index built earlier (e.g. restored from cache) with the
    /// records and tokenizer it was built from.
    pub fn with_index(
        records: Vec<Record>,
        index: InvertedIndex,
        tokenizer: Tokenizer,
        options: QueryOptions,
    ) -> Self {
        let titles = records
            .iter()
            .map(|record| tokenizer.normalize_phrase(&record.title))
            .collect();

        Self {
            records,
            index,
            tokenizer,
            options,
            titles,
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        self.records.get(id.index())
    }

    /// Section records whose parent is `page`, in build order.
    pub fn children(&self, page: RecordId) -> impl Iterator<Item = &Record> {
        self.records
            .iter()
            .filter(move |record| record.parent == Some(page))
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Searches with the configured default result count.
    pub fn search_default(&self, query: &str) -> Vec<ScoredResult> {
        self.search(query, self.options.top_k)
    }

    /// Returns at most `top_k` records ranked for `query`.
    ///
    /// An empty or all-punctuation query yields an empty list.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<ScoredResult> {
        self.search_cancellable(query, top_k, &CancellationToken::new())
            .unwrap_or_default()
    }

    /// Like [`search`](Self::search), but gives up and returns `None` as soon
    /// as `cancel` fires.
    pub fn search_cancellable(
        &self,
        query: &str,
        top_k: usize,
        cancel: &CancellationToken,
    ) -> Option<Vec<ScoredResult>> {
        let mut terms: Vec<String> = Vec::new();
        for token in self.tokenizer.tokenize(query) {
            if !terms.contains(&token.text) {
                terms.push(token.text);
            }
        }

        if terms.is_empty() || top_k == 0 {
            return Some(vec![]);
        }

        let mut candidates: AHashMap<RecordId, Candidate> = AHashMap::new();
        let mut scored = 0usize;

        for (query_pos, term) in terms.iter().enumerate() {
            if cancel.is_cancelled() {
                return None;
            }

            for (occurrences, discount) in self.expand(term, query_pos + 1 == terms.len()) {
                for group in occurrences.chunk_by(|a, b| a.record == b.record && a.field == b.field) {
                    scored += group.len();
                    if scored >= CANCEL_CHECK_INTERVAL {
                        scored = 0;
                        if cancel.is_cancelled() {
                            return None;
                        }
                    }
                    self.accumulate(&mut candidates, group, query_pos, terms.len(), discount);
                }
            }
        }

        if cancel.is_cancelled() {
            return None;
        }

        let phrase = self.tokenizer.normalize_phrase(query);
        let mut results: Vec<ScoredResult> = candidates
            .into_iter()
            .filter_map(|(id, candidate)| self.finish_candidate(id, candidate, &phrase))
            .collect();

        results.sort_by(compare_results);
        results.truncate(top_k);

        tracing::debug!("Query '{}' matched {} results", query, results.len());
        Some(results)
    }

    /// Occurrence lists a query term resolves to, with their score discounts.
    fn expand<'a>(&'a self, term: &'a str, is_last: bool) -> Vec<(&'a [Occurrence], f32)> {
        let mut lists = Vec::new();

        let exact = self.index.lookup(term);
        if !exact.is_empty() {
            lists.push((exact, 1.0));
        }

        if is_last && self.options.prefix {
            lists.extend(
                self.index
                    .prefix_terms(term)
                    .take(MAX_PREFIX_EXPANSIONS)
                    .map(|t| (self.index.lookup(t), PREFIX_DISCOUNT)),
            );
        }

        if lists.is_empty()
            && self.options.fuzzy
            && let Some((closest, similarity)) = self.index.closest_term(term)
        {
            tracing::trace!("Fuzzy match '{}' -> '{}' ({:.2})", term, closest, similarity);
            lists.push((self.index.lookup(closest), FUZZY_DISCOUNT));
        }

        lists
    }

    /// Adds one (record, field) run of occurrences to its candidate.
    fn accumulate(
        &self,
        candidates: &mut AHashMap<RecordId, Candidate>,
        group: &[Occurrence],
        query_pos: usize,
        query_len: usize,
        discount: f32,
    ) {
        let Some(first) = group.first() else {
            return;
        };
        let Some(record) = self.record(first.record) else {
            return;
        };

        let field = first.field;
        let tf = term_score(
            group.len() as u32,
            self.index.field_length(record.id, field),
            self.index.average_length(field),
        );

        let candidate = candidates.entry(record.id).or_default();
        candidate.score += field.weight(record.category) * tf * discount;
        candidate.matched.insert(query_pos);
        candidate.fields.insert(field);

        if discount >= 1.0 {
            let positions = candidate
                .positions
                .entry(field)
                .or_insert_with(|| vec![Vec::new(); query_len]);
            positions[query_pos].extend(group.iter().map(|o| o.position));
        }
    }

    fn finish_candidate(&self, id: RecordId, candidate: Candidate, phrase: &str) -> Option<ScoredResult> {
        let record = self.record(id)?;
        let mut score = candidate.score;

        for (field, positions) in &candidate.positions {
            let pairs = adjacent_pairs(positions);
            score += pairs as f32 * ADJACENCY_BONUS * field.weight(record.category);
        }

        if let Some(bonus) = title_bonus(&self.titles[id.index()], phrase) {
            score += bonus;
        }

        Some(ScoredResult {
            record: record.clone(),
            score,
            matched_fields: candidate.fields,
            matched_terms: candidate.matched.len(),
        })
    }
}

/// Coverage first, then score, then location and id for determinism.
fn compare_results(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.matched_terms
        .cmp(&a.matched_terms)
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| a.record.location.cmp(&b.record.location))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

/// Groups ranked results under their page, ordered by each group's best hit.
///
/// Sections group under their `parent`; page records group under themselves.
pub fn group_by_page(results: Vec<ScoredResult>) -> Vec<ResultGroup> {
    let mut groups: Vec<ResultGroup> = Vec::new();

    for result in results {
        let key = if result.record.is_page() {
            Some(result.record.id)
        } else {
            result.record.parent
        };

        let existing = groups.iter_mut().find(|group| match (group.page, key) {
            (Some(a), Some(b)) => a == b,
            (None, None) => group.page_title == result.record.page,
            _ => false,
        });

        match existing {
            Some(group) => group.results.push(result),
            None => groups.push(ResultGroup {
                page: key,
                page_title: result.record.page.clone(),
                results: vec![result],
            }),
        }
    }

    groups
}
