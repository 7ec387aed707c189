//! Wiring and CLI for the semantic indexer.

pub mod cli;
pub mod commands;
pub mod service;

pub use cli::{Cli, Commands};
pub use commands::{
    build_service, init_tracing, load_settings, run_export, show_health, validate_destination,
};
pub use service::{IndexerService, ServiceHealth, StartError};
