//! Positional inverted index over record fields.

use super::tokenize::{Token, Tokenizer};
use crate::record::{Category, Record, RecordId};
use ahash::AHashMap;
use rapidfuzz::distance::jaro_winkler;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Minimum Jaro-Winkler similarity for a fuzzy term substitution.
const FUZZY_THRESHOLD: f64 = 0.88;

/// Record field a token occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Field {
    Title,
    Page,
    Text,
    Code,
}

impl Field {
    pub const ALL: [Self; 4] = [Self::Title, Self::Page, Self::Text, Self::Code];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Page => "page",
            Self::Text => "text",
            Self::Code => "code",
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }

    /// Relevance weight of a match in this field, fixed per record category.
    ///
    /// Page records index their title only once (it is the page name), and
    /// their summary text weighs less than a section body.
    pub fn weight(self, category: Category) -> f32 {
        match (category, self) {
            (_, Self::Title) => 5.0,
            (_, Self::Page) => 2.0,
            (Category::Section, Self::Text) => 1.0,
            (Category::Page, Self::Text) => 0.8,
            (_, Self::Code) => 0.5,
        }
    }
}

/// One place a term occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub record: RecordId,
    pub field: Field,
    pub position: u32,
}

/// Token counts of each field of one record.
pub(crate) type FieldLengths = [u32; 4];

/// Accumulates occurrences while records are indexed.
///
/// Insertion is only possible here; [`finish`](Self::finish) seals the
/// postings into an immutable [`InvertedIndex`].
#[derive(Debug, Default)]
pub struct InvertedIndexBuilder {
    postings: AHashMap<String, Vec<Occurrence>>,
    field_lengths: Vec<FieldLengths>,
}

impl InvertedIndexBuilder {
    /// Records that `tokens` appear in `field` of `record`.
    pub fn insert(&mut self, record: RecordId, field: Field, tokens: &[Token]) {
        if self.field_lengths.len() <= record.index() {
            self.field_lengths.resize(record.index() + 1, [0; 4]);
        }
        self.field_lengths[record.index()][field.slot()] += tokens.len() as u32;

        for token in tokens {
            self.postings
                .entry(token.text.clone())
                .or_default()
                .push(Occurrence {
                    record,
                    field,
                    position: token.position,
                });
        }
    }

    /// Tokenizes and inserts every searchable field of a record.
    pub fn insert_record(&mut self, record: &Record, tokenizer: &Tokenizer) {
        self.insert(record.id, Field::Title, &tokenizer.tokenize(&record.title));
        if record.category == Category::Section {
            self.insert(record.id, Field::Page, &tokenizer.tokenize(&record.page));
        }
        self.insert(record.id, Field::Text, &tokenizer.tokenize(&record.text));
        if !record.code.is_empty() {
            self.insert(record.id, Field::Code, &tokenizer.tokenize(&record.code));
        }
    }

    /// Sorts postings and computes per-field average lengths.
    pub fn finish(self) -> InvertedIndex {
        let start = std::time::Instant::now();

        let mut occurrence_count = 0;
        let mut terms: HashMap<String, Vec<Occurrence>> = HashMap::with_capacity(self.postings.len());
        for (term, mut occurrences) in self.postings {
            occurrences.sort_unstable();
            occurrences.dedup();
            occurrence_count += occurrences.len();
            terms.insert(term, occurrences);
        }

        let mut vocabulary: Vec<String> = terms.keys().cloned().collect();
        vocabulary.sort_unstable();

        let mut totals = [0f32; 4];
        let mut counts = [0f32; 4];
        for lengths in &self.field_lengths {
            for field in Field::ALL {
                let len = lengths[field.slot()];
                if len > 0 {
                    totals[field.slot()] += len as f32;
                    counts[field.slot()] += 1.0;
                }
            }
        }
        let mut average_lengths = [1f32; 4];
        for slot in 0..4 {
            if counts[slot] > 0.0 {
                average_lengths[slot] = totals[slot] / counts[slot];
            }
        }

        let index = InvertedIndex {
            terms,
            vocabulary,
            field_lengths: self.field_lengths,
            average_lengths,
        };

        tracing::debug!(
            "Sealed inverted index: {} unique terms, {} records, {} occurrences in {:?}",
            index.term_count(),
            index.record_count(),
            occurrence_count,
            start.elapsed()
        );

        index
    }
}

/// Immutable token → occurrences map with the statistics ranking needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    /// Occurrences per term, sorted by (record, field, position)
    terms: HashMap<String, Vec<Occurrence>>,
    /// All terms, sorted, for prefix and fuzzy expansion
    vocabulary: Vec<String>,
    field_lengths: Vec<FieldLengths>,
    average_lengths: [f32; 4],
}

impl InvertedIndex {
    /// Builds the index for a whole record sequence.
    pub fn build(records: &[Record], tokenizer: &Tokenizer) -> Self {
        let mut builder = InvertedIndexBuilder::default();
        for record in records {
            builder.insert_record(record, tokenizer);
        }
        builder.finish()
    }

    /// Occurrences of an exact term; empty when the term is unknown.
    pub fn lookup(&self, term: &str) -> &[Occurrence] {
        self.terms.get(term).map_or(&[], Vec::as_slice)
    }

    /// Terms that start with `prefix`, excluding `prefix` itself.
    pub fn prefix_terms<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let start = self.vocabulary.partition_point(|term| term.as_str() < prefix);
        self.vocabulary[start..]
            .iter()
            .take_while(move |term| term.starts_with(prefix))
            .filter(move |term| term.as_str() != prefix)
            .map(String::as_str)
    }

    /// The most similar known term, if it is similar enough to stand in for
    /// a misspelled query token.
    pub fn closest_term(&self, term: &str) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for candidate in &self.vocabulary {
            let score = jaro_winkler::similarity(term.chars(), candidate.chars());
            if score >= FUZZY_THRESHOLD && best.is_none_or(|(_, s)| score > s) {
                best = Some((candidate.as_str(), score));
            }
        }
        best
    }

    /// Number of tokens `record` has in `field`.
    pub fn field_length(&self, record: RecordId, field: Field) -> u32 {
        self.field_lengths
            .get(record.index())
            .map_or(0, |lengths| lengths[field.slot()])
    }

    /// Mean token count of `field` over records where it is non-empty.
    pub fn average_length(&self, field: Field) -> f32 {
        self.average_lengths[field.slot()]
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn record_count(&self) -> usize {
        self.field_lengths.len()
    }
}
