//! Semantic indexer CLI.
//!
//! Re-indexes a source Solr collection into a destination collection,
//! enriching documents with inline embeddings and chunked child documents
//! along the way.
//!
//! # Usage
//!
//! ```bash
//! semantic-indexer --config indexer.toml run
//! semantic-indexer --config indexer.toml validate
//! semantic-indexer --config indexer.toml health
//! ```
//!
//! # Configuration
//!
//! Settings load from the TOML file given with `--config`, overridden by
//! `INDEXER_*` environment variables (`INDEXER_SOURCE__URL`, ...).

use anyhow::Result;
use clap::Parser;

use indexer_daemon::{init_tracing, load_settings, run_export, show_health, validate_destination};
use indexer_daemon::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let settings = load_settings(cli.config.as_deref())?;
    match cli.command {
        Commands::Run { crawl_id } => {
            run_export(&settings, crawl_id).await?;
        }
        Commands::Validate => {
            validate_destination(&settings).await?;
        }
        Commands::Health => {
            show_health(&settings).await?;
        }
    }
    Ok(())
}
