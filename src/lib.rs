//! pinwatch library root.
//! Exposes the CLI parser, the high-level run() function, and the
//! episode store, fold and live-query modules.

pub mod cli;
pub mod config;
pub mod core;
pub mod db;
pub mod errors;
pub mod models;
pub mod ui;
pub mod utils;

use clap::Parser;
use cli::parser::{Cli, Commands};
use config::Config;
use errors::AppResult;
use tracing_subscriber::EnvFilter;

/// Central command dispatcher
pub fn dispatch(cli: &Cli, cfg: &Config) -> AppResult<()> {
    match &cli.command {
        Commands::Init => cli::commands::init::handle(cli),
        Commands::Ingest { .. } => cli::commands::ingest::handle(&cli.command, cfg),
        Commands::Fold { .. } => cli::commands::fold::handle(&cli.command, cfg),
        Commands::Status { .. } => cli::commands::status::handle(&cli.command, cfg),
        Commands::Events { .. } => cli::commands::events::handle(&cli.command, cfg),
        Commands::Readings { .. } => cli::commands::readings::handle(&cli.command, cfg),
        Commands::Series { .. } => cli::commands::series::handle(&cli.command, cfg),
        Commands::Db { .. } => cli::commands::db::handle(&cli.command, cfg),
        Commands::Log { .. } => cli::commands::log::handle(&cli.command, cfg),
        Commands::Config { .. } => cli::commands::config::handle(&cli.command, cfg),
    }
}

/// Diagnostics on stderr, filtered by `RUST_LOG` (default `pinwatch=info`).
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pinwatch=info"));
    // a second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Entry point used by main.rs
pub fn run() -> AppResult<()> {
    let cli = Cli::parse();
    init_tracing();

    // load config once; --db wins over the configured path
    let mut cfg = Config::load()?;
    if let Some(custom_db) = &cli.db {
        cfg.database = custom_db.clone();
    }

    dispatch(&cli, &cfg)
}
