pub mod builder;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod page;
pub mod record;
pub mod search;
pub mod session;
pub mod tracing;

pub use builder::{BuildOptions, build, write_index};
pub use cache::load_engine;
pub use config::{Config, NavEntry};
pub use error::{BuildError, LoadError, SessionError};
pub use page::{DocumentationPage, load_pages};
pub use record::{Category, IndexFile, IndexFormat, Record, RecordId};
pub use search::{
    Field, QueryEngine, QueryOptions, ResultGroup, ScoredResult, Tokenizer, TokenizerConfig,
    group_by_page,
};
pub use session::{SearchOutcome, SearchSession};
