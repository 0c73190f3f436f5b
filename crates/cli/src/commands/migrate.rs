//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! pizza-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `PIZZA_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! `crates/server/migrations/`, applied in filename order:
//! ```text
//! migrations/
//! └── 20260101000000_create_documents.sql
//! ```

use super::{CommandError, connect};

/// Create or upgrade the `documents` table.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the database cannot be
/// reached, or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let pool = connect().await?;

    tracing::info!("Running document store migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Document store migrations complete!");
    Ok(())
}
