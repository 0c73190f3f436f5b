//! Pizza Time CLI - Document store migrations and data import.
//!
//! # Usage
//!
//! ```bash
//! # Create the documents table
//! pizza-cli migrate
//!
//! # Copy a file-mode data directory into PostgreSQL
//! pizza-cli import ./data
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run the document store migrations
//! - `import` - Load `users.json`, `contacts.json` and `orders.json` into PostgreSQL

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "pizza-cli")]
#[command(author, version, about = "Pizza Time CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run document store migrations
    Migrate,
    /// Import a JSON data directory into PostgreSQL
    Import {
        /// Directory holding the collection files
        #[arg(default_value = "data")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Import { dir } => {
            let summary = commands::import::run(&dir).await?;
            tracing::info!(
                imported = summary.imported,
                skipped = summary.skipped,
                "Import complete"
            );
        }
    }
    Ok(())
}
