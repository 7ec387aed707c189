//! CLI argument parsing.

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Semantic Indexer
///
/// Re-indexes a source Solr collection into a destination collection with
/// vector enrichment.
#[derive(Parser, Debug)]
#[command(name = "semantic-indexer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Indexer commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one export job end to end
    Run {
        /// Crawl id to tag documents with (random when omitted)
        #[arg(long)]
        crawl_id: Option<Uuid>,
    },

    /// Validate destination collections and vector fields, then exit
    Validate,

    /// Report chunker, embedder, and destination health
    Health,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_parses_with_crawl_id() {
        let cli = Cli::parse_from([
            "semantic-indexer",
            "--config",
            "indexer.toml",
            "run",
            "--crawl-id",
            "a3bb189e-8bf9-3888-9912-ace4e6543002",
        ]);
        assert_eq!(cli.config.as_deref(), Some("indexer.toml"));
        match cli.command {
            Commands::Run { crawl_id } => assert!(crawl_id.is_some()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_health_parses() {
        let cli = Cli::parse_from(["semantic-indexer", "health"]);
        assert!(matches!(cli.command, Commands::Health));
    }
}
