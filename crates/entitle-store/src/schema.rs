//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Hash records (user and feature records), keyed by the full record key
    /// such as `user:101`. Values are CBOR-encoded field maps.
    pub const RECORDS: &str = "records";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::RECORDS]
}
