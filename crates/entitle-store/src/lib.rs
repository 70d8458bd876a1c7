//! Script-capable key-value storage for entitle.
//!
//! This crate provides the connection abstraction the entitlement core runs
//! against, plus the Script Execution Gateway that invokes procedures on it.
//!
//! # Architecture
//!
//! Records are flat hashes (field name to string). A connection exposes bulk
//! hash writes and reads, and three scripting primitives modelled on Redis:
//!
//! - `script_load(body)` caches a body and returns its content-addressed handle
//! - `eval_sha(handle, keys, args)` runs a cached script, or fails with
//!   `NOSCRIPT` if the store forgot it
//! - `eval(body, keys, args)` runs a literal body
//!
//! Backends:
//!
//! - [`RedisStore`] (feature `redis-backend`): Lua procedures run natively
//!   inside Redis.
//! - [`RocksStore`] (feature `rocksdb-backend`): persistent embedded store.
//! - [`MemoryStore`]: in-process store for development and tests.
//!
//! Embedded backends run registered native twins of the procedure bodies
//! (see [`procedure`]) under a single execution lock, which gives the same
//! no-interleaving guarantee as Redis script execution.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use entitle_store::{MemoryStore, ScriptGateway, ScriptStore, ScriptTable};
//!
//! # async fn run(procedures: Vec<entitle_store::ProcedureDef>) -> entitle_store::Result<()> {
//! let store: Arc<dyn ScriptStore> = Arc::new(MemoryStore::new(&procedures));
//! let table = Arc::new(ScriptTable::from_procedures(&procedures));
//! let gateway = ScriptGateway::new(store, table);
//!
//! gateway.preload().await;
//! let reply = gateway.invoke("check_feature", &[], &[]).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod gateway;
pub mod memory;
pub mod procedure;
pub mod reply;

#[cfg(feature = "redis-backend")]
pub mod redis_store;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError, NOSCRIPT_CODE};
pub use gateway::{ScriptGateway, ScriptTable};
pub use memory::{CallCounts, MemoryStore};
pub use procedure::{script_handle, HashTx, NativeProcedure, ProcedureDef, ScriptRuntime};
pub use reply::Reply;

#[cfg(feature = "redis-backend")]
pub use redis_store::RedisStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use entitle_core::FieldMap;

/// Scripting primitives a connection supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Capabilities {
    /// Execute a cached script by handle.
    pub eval_sha: bool,
    /// Execute a literal script body.
    pub eval: bool,
    /// Cache a script body and return its handle.
    pub script_load: bool,
}

impl Capabilities {
    /// Every primitive available.
    pub const ALL: Self = Self {
        eval_sha: true,
        eval: true,
        script_load: true,
    };

    /// No scripting at all.
    pub const NONE: Self = Self {
        eval_sha: false,
        eval: false,
        script_load: false,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

/// A connection to a script-capable key-value store.
///
/// The store serializes script execution with respect to every other script
/// and data operation, so implementations need no locking on the caller side.
#[async_trait]
pub trait ScriptStore: Send + Sync {
    /// Which scripting primitives this connection supports.
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }

    // =========================================================================
    // Hash Operations
    // =========================================================================

    /// Set the given fields on a record, leaving other fields untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    async fn hset(&self, key: &str, fields: &FieldMap) -> Result<()>;

    /// Read every field of a record. A missing record reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store operation fails.
    async fn hgetall(&self, key: &str) -> Result<FieldMap>;

    // =========================================================================
    // Script Operations
    // =========================================================================

    /// Cache a script body and return its handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be compiled or the store fails.
    async fn script_load(&self, body: &str) -> Result<String>;

    /// Run a cached script by handle.
    ///
    /// # Errors
    ///
    /// - `StoreError::NoScript` if the store no longer caches the handle.
    /// - `StoreError::Script` if the script returned an error reply.
    async fn eval_sha(&self, handle: &str, keys: &[String], args: &[String]) -> Result<Reply>;

    /// Run a literal script body.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Script` if the script returned an error reply.
    async fn eval(&self, body: &str, keys: &[String], args: &[String]) -> Result<Reply>;
}
