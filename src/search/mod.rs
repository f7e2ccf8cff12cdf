//! Full-text search over documentation records.
//!
//! This module provides tokenization, the positional inverted index,
//! relevance scoring and query evaluation.

// Module declarations
pub(crate) mod index;
pub(crate) mod query;
pub(crate) mod scoring;
pub(crate) mod tokenize;

// Public re-exports (used via lib.rs)
pub use index::{Field, InvertedIndex, InvertedIndexBuilder, Occurrence};
pub use query::{DEFAULT_TOP_K, QueryEngine, QueryOptions, ResultGroup, ScoredResult, group_by_page};
pub use tokenize::{DEFAULT_MIN_TOKEN_LENGTH, Token, Tokenizer, TokenizerConfig};
