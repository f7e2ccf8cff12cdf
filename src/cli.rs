use crate::builder::{build, write_index};
use crate::cache::load_engine;
use crate::config::Config;
use crate::error::Result;
use crate::page::load_pages;
use crate::record::IndexFormat;
use crate::search::{ScoredResult, group_by_page};
use crate::session::{SearchOutcome, SearchSession};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "docsearch")]
#[command(about = "Build and query search indexes for static documentation sites", long_about = None)]
pub struct Cli {
    /// Log as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the search index from Markdown pages
    Build {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Overrides `site.source`
        #[arg(short, long)]
        source: Option<PathBuf>,
        /// Overrides `site.output`
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Defaults to the output file extension
        #[arg(short, long, value_enum)]
        format: Option<IndexFormat>,
    },
    /// Run one query against a built index
    Search {
        query: String,
        #[arg(short, long)]
        index: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Group results under their page
        #[arg(short, long)]
        grouped: bool,
    },
    /// Read queries from stdin, one per line
    Interactive {
        #[arg(short, long)]
        index: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            config,
            source,
            output,
            format,
        } => {
            let mut config = Config::discover(config.as_deref())?;
            if let Some(source) = source {
                config.site.source = source;
            }
            if let Some(output) = output {
                config.site.output = output;
            }
            let format = format.unwrap_or_else(|| IndexFormat::from_path(&config.site.output));

            tokio::task::spawn_blocking(move || build_site(&config, format))
                .await
                .context("Build task panicked")?
        }
        Commands::Search {
            query,
            index,
            config,
            limit,
            grouped,
        } => {
            let config = Config::discover(config.as_deref())?;
            let engine = tokio::task::spawn_blocking(move || {
                load_engine(&index, config.search.tokenizer, config.search.query)
            })
            .await
            .context("Index loading task panicked")??;

            let top_k = limit.unwrap_or(engine.options().top_k);
            let results = engine.search(&query, top_k);
            let rendered = if grouped {
                render_grouped(results)
            } else {
                render_results(&results)
            };
            print!("{}", rendered);
            Ok(())
        }
        Commands::Interactive { index, config } => {
            let config = Config::discover(config.as_deref())?;
            interactive(index, config).await
        }
    }
}

/// Reads pages, builds records and writes the index file.
pub fn build_site(config: &Config, format: IndexFormat) -> Result<()> {
    let pages = load_pages(&config.site.source, &config.site.pages)
        .with_context(|| format!("Failed to read pages from {}", config.site.source.display()))?;
    let records = build(&pages, &config.build)?;
    write_index(records, &config.site.output, format)?;
    Ok(())
}

async fn interactive(index: PathBuf, config: Config) -> Result<()> {
    let session = Arc::new(SearchSession::new());
    session
        .load_path(index.clone(), config.search.tokenizer, config.search.query)
        .await
        .with_context(|| format!("Failed to load search index {}", index.display()))?;

    let mut stdout = tokio::io::stdout();
    run_interactive(session, BufReader::new(tokio::io::stdin()), &mut stdout).await
}

/// Answers one query per input line, writing each completed result list as
/// soon as it is ready. Superseded queries write nothing.
pub async fn run_interactive<R, W>(session: Arc<SearchSession>, reader: R, writer: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut tasks = JoinSet::new();
    let mut reading = true;

    while reading || !tasks.is_empty() {
        tokio::select! {
            line = lines.next_line(), if reading => {
                match line.context("Failed to read queries")? {
                    Some(line) => {
                        let session = session.clone();
                        tasks.spawn(async move { session.search(line.trim()).await });
                    }
                    None => reading = false,
                }
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                match joined.context("Query task panicked")? {
                    Ok(SearchOutcome::Completed { results, .. }) => {
                        writer.write_all(render_results(&results).as_bytes()).await?;
                        writer.flush().await?;
                    }
                    Ok(SearchOutcome::Superseded { generation }) => {
                        tracing::debug!("Dropped superseded query (generation {})", generation);
                    }
                    Err(e) => tracing::warn!("Query failed: {}", e),
                }
            }
        }
    }

    Ok(())
}

/// One line per result: score, title, page and location.
pub fn render_results(results: &[ScoredResult]) -> String {
    let mut output = String::new();
    if results.is_empty() {
        output.push_str("No results\n");
    }
    for result in results {
        let _ = writeln!(output, "{}", format_result(result));
    }
    output
}

fn render_grouped(results: Vec<ScoredResult>) -> String {
    let mut output = String::new();
    if results.is_empty() {
        output.push_str("No results\n");
    }
    for group in group_by_page(results) {
        let _ = writeln!(output, "{}", group.page_title);
        for result in &group.results {
            let _ = writeln!(output, "  {}", format_result(result));
        }
    }
    output
}

fn format_result(result: &ScoredResult) -> String {
    let record = &result.record;
    if record.is_page() {
        format!("{:>7.3}  {}  ({})", result.score, record.title, record.location)
    } else {
        format!(
            "{:>7.3}  {} > {}  ({})",
            result.score, record.page, record.title, record.location
        )
    }
}
