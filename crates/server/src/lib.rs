//! Pizza Time gateway library.
//!
//! This crate provides the HTTP gateway as a library, allowing the router to
//! be driven in tests and the store adapters to be reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use config::StorageConfig;
use db::file::FileStore;
use db::postgres::{PgDocumentStore, create_pool};
use db::{Db, StoreError};
use state::AppState;

/// Open the configured document store.
///
/// # Errors
///
/// Returns `StoreError` if the data directory cannot be created or the
/// database cannot be reached.
pub async fn open_store(storage: &StorageConfig) -> Result<Db, StoreError> {
    match storage {
        StorageConfig::File { data_dir } => {
            let store = FileStore::open(data_dir).await?;
            tracing::info!(data_dir = %data_dir.display(), "using JSON file storage");
            Ok(Db::new(Arc::new(store)))
        }
        StorageConfig::Postgres { database_url } => {
            let pool = create_pool(database_url).await?;
            tracing::info!("using PostgreSQL document store");
            Ok(Db::new(Arc::new(PgDocumentStore::new(pool))))
        }
    }
}

/// Build the full router with its middleware stack.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::routes())
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                    user_id = tracing::field::Empty,
                )
            }),
        )
}
