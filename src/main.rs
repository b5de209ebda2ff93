//! # Pareto comparison CLI (`pareto`)
//!
//! ## Usage
//!
//! ```bash
//! pareto --config ./config/pareto.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pareto init` | Create the SQLite database and run schema migrations |
//! | `pareto import <file.json>` | Load catalog records (products, variants, offers) |
//! | `pareto compare <request.json>` | Run one comparison and print the response JSON |
//! | `pareto serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! pareto --config ./config/pareto.toml init
//! pareto --config ./config/pareto.toml import ./demos/phones.json
//! pareto --config ./config/pareto.toml compare ./demos/request.json
//! pareto --config ./config/pareto.toml serve
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use pareto_compare::compare::Comparator;
use pareto_compare::{config, import, logging, migrate, server, sqlite_catalog};
use pareto_core::models::ComparisonRequest;

/// Multi-criteria product comparison over a local catalog.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pareto.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pareto",
    about = "Pareto frontier product comparison: CLI and HTTP API",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pareto.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Import catalog records from a JSON array file.
    ///
    /// Each record replaces the stored offers of its product/variant.
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// Compare the products of a category.
    ///
    /// Reads a comparison request (the `POST /compare` body) from a JSON
    /// file and prints the response.
    Compare {
        /// Path to the request JSON file.
        request: PathBuf,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;
    logging::init_tracing(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Import { file } => {
            import::run_import(&cfg, &file).await?;
        }
        Commands::Compare { request } => {
            let content = std::fs::read_to_string(&request)
                .with_context(|| format!("Failed to read request file: {}", request.display()))?;
            let request: ComparisonRequest =
                serde_json::from_str(&content).with_context(|| "Failed to parse request file")?;

            let catalog = sqlite_catalog::open(&cfg).await?;
            let comparator = Comparator::from_config(&cfg, Arc::new(catalog));
            let cancel = CancellationToken::new();

            let response = tokio::time::timeout(
                cfg.server.request_timeout(),
                comparator.compare(&request, &cancel),
            )
            .await
            .with_context(|| "comparison timed out")??;

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
