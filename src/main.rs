use clap::Parser;
use docsearch::cli::{Cli, run};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries search results
    docsearch::tracing::init(cli.json_logs);

    run(cli).await.inspect_err(|e| {
        tracing::error!("docsearch failed: {:#}", e);
    })
}
