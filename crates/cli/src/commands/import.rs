//! Import a file-mode data directory into the `PostgreSQL` document store.
//!
//! # Usage
//!
//! ```bash
//! pizza-cli import ./data
//! ```
//!
//! Reads `users.json`, `contacts.json` and `orders.json` (missing files are
//! empty collections) and inserts every document with its existing id.
//! Documents already present are skipped, so the import can be re-run.
//!
//! # Environment Variables
//!
//! - `PIZZA_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

use std::path::Path;

use pizza_time_server::db::file::FileStore;
use pizza_time_server::db::postgres::PgDocumentStore;
use pizza_time_server::db::{COLLECTIONS, Document, DocumentStore, Query};

use super::{CommandError, connect};

/// Counts reported after an import.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: u64,
    pub skipped: u64,
}

/// Every document in `dir`, grouped by collection.
async fn load_collections(dir: &Path) -> Result<Vec<(&'static str, Vec<Document>)>, CommandError> {
    if !dir.is_dir() {
        return Err(CommandError::NotADirectory(dir.display().to_string()));
    }
    let source = FileStore::open(dir).await?;

    let mut collections = Vec::with_capacity(COLLECTIONS.len());
    for &collection in COLLECTIONS {
        let docs = source.find(collection, &Query::all()).await?;
        tracing::info!(collection, count = docs.len(), "Read collection");
        collections.push((collection, docs));
    }
    Ok(collections)
}

/// Copy every collection under `dir` into `PostgreSQL`.
///
/// # Errors
///
/// Returns an error if `dir` is not a directory, a collection file is
/// corrupt, or the database rejects a write. Documents written before the
/// failure stay written.
pub async fn run(dir: &Path) -> Result<ImportSummary, CommandError> {
    let collections = load_collections(dir).await?;
    let target = PgDocumentStore::new(connect().await?);

    let mut summary = ImportSummary::default();
    for (collection, docs) in collections {
        for doc in docs {
            if target.import(collection, doc).await? {
                summary.imported += 1;
            } else {
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}
