//! Entitle HTTP API Service.
//!
//! This crate provides the HTTP API for storing per-user subscription data
//! and reading the feature entitlements derived from the subscription plan:
//!
//! - Create/update a user (features derived atomically inside the store)
//! - Fetch a user with their feature record
//! - Check a single feature
//!
//! There is no authentication layer; callers are trusted.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Health handler is async for routing

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::{ServiceConfig, StoreBackend};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;

use std::sync::Arc;

use entitle_store::{MemoryStore, ScriptStore};

/// Open the store selected by `config`.
///
/// Embedded backends are given the native entitlement procedures.
///
/// # Errors
///
/// Returns an error if the store cannot be opened or the selected backend
/// was not compiled in.
pub async fn open_store(
    config: &ServiceConfig,
) -> Result<Arc<dyn ScriptStore>, Box<dyn std::error::Error + Send + Sync>> {
    let procedures = entitle_engine::procedures();

    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store - data will not survive a restart");
            Ok(Arc::new(MemoryStore::new(&procedures)))
        }

        #[cfg(feature = "redis-backend")]
        StoreBackend::Redis => {
            tracing::info!(url = %config.redis_url, "Connecting to Redis");
            let store = entitle_store::RedisStore::connect(&config.redis_url).await?;
            Ok(Arc::new(store))
        }

        #[cfg(feature = "rocksdb-backend")]
        StoreBackend::Rocksdb => {
            tracing::info!(path = %config.data_dir, "Opening RocksDB store");
            let store = entitle_store::RocksStore::open(&config.data_dir, &procedures)?;
            Ok(Arc::new(store))
        }

        #[allow(unreachable_patterns)]
        other => Err(format!("store backend `{other}` is not enabled in this build").into()),
    }
}
