//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `ScriptStore`
//! trait. Records live in one column family as CBOR field maps. Scripts run
//! under an execution lock and commit their writes in a single `WriteBatch`.
//! The script cache is in memory only, so reopening the database starts with
//! an empty cache, like a restarted Redis.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
    WriteBatch,
};

use entitle_core::FieldMap;

use crate::error::{Result, StoreError};
use crate::procedure::{NativeProcedure, ProcedureDef, ScriptRuntime, StagedTx};
use crate::reply::Reply;
use crate::schema::{all_column_families, cf};
use crate::ScriptStore;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    exec: Mutex<()>,
    scripts: ScriptRuntime,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P, procedures: &[ProcedureDef]) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            exec: Mutex::new(()),
            scripts: ScriptRuntime::new(procedures),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.exec
            .lock()
            .map_err(|_| StoreError::Database("execution lock poisoned".into()))
    }

    /// Read a committed record.
    fn read(&self, key: &str) -> Result<FieldMap> {
        let cf = self.cf(cf::RECORDS)?;

        self.db
            .get_cf(&cf, key.as_bytes())
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
            .map(Option::unwrap_or_default)
    }

    /// Merge field updates into their records in one atomic batch.
    ///
    /// The caller must hold the execution lock.
    fn write_merged<'a>(
        &self,
        updates: impl IntoIterator<Item = (&'a str, &'a FieldMap)>,
    ) -> Result<()> {
        let cf = self.cf(cf::RECORDS)?;
        let mut batch = WriteBatch::default();

        for (key, fields) in updates {
            let mut record = self.read(key)?;
            record.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            batch.put_cf(&cf, key.as_bytes(), Self::serialize(&record)?);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Run a procedure under the execution lock and commit its writes.
    fn execute(
        &self,
        procedure: &Arc<dyn NativeProcedure>,
        keys: &[String],
        args: &[String],
    ) -> Result<Reply> {
        let _guard = self.lock()?;

        let mut tx = StagedTx::new(|key: &str| self.read(key));
        let reply = procedure.call(&mut tx, keys, args)?;
        let writes = tx.into_writes();

        self.write_merged(writes.iter().map(|(k, v)| (k.as_str(), v)))?;
        Ok(reply)
    }
}

#[async_trait]
impl ScriptStore for RocksStore {
    async fn hset(&self, key: &str, fields: &FieldMap) -> Result<()> {
        let _guard = self.lock()?;
        self.write_merged([(key, fields)])
    }

    async fn hgetall(&self, key: &str) -> Result<FieldMap> {
        self.read(key)
    }

    async fn script_load(&self, body: &str) -> Result<String> {
        self.scripts.load(body)
    }

    async fn eval_sha(&self, handle: &str, keys: &[String], args: &[String]) -> Result<Reply> {
        let procedure = self.scripts.by_handle(handle)?;
        self.execute(&procedure, keys, args)
    }

    async fn eval(&self, body: &str, keys: &[String], args: &[String]) -> Result<Reply> {
        let procedure = self.scripts.by_body(body)?;
        self.execute(&procedure, keys, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::script_handle;
    use crate::procedure::tests::echo_def;
    use tempfile::TempDir;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn records_persist_across_reopen() {
        let dir = TempDir::new().unwrap();

        {
            let store = RocksStore::open(dir.path(), &[]).unwrap();
            let mut fields = FieldMap::new();
            fields.insert("subscription_plan".into(), "free".into());
            store.hset("user:1", &fields).await.unwrap();
        }

        let store = RocksStore::open(dir.path(), &[]).unwrap();
        let record = store.hgetall("user:1").await.unwrap();
        assert_eq!(record["subscription_plan"], "free");
    }

    #[tokio::test]
    async fn script_cache_does_not_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let handle = script_handle(&echo_def().body);

        {
            let store = RocksStore::open(dir.path(), &[echo_def()]).unwrap();
            store.script_load(&echo_def().body).await.unwrap();
            store
                .eval_sha(&handle, &strings(&["k"]), &strings(&["v"]))
                .await
                .unwrap();
        }

        let store = RocksStore::open(dir.path(), &[echo_def()]).unwrap();
        assert!(store
            .eval_sha(&handle, &[], &strings(&["v"]))
            .await
            .unwrap_err()
            .is_no_script());
        assert_eq!(store.hgetall("k").await.unwrap()["echo"], "v");
    }

    #[tokio::test]
    async fn failed_script_leaves_no_writes() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path(), &[echo_def()]).unwrap();

        assert!(store
            .eval(&echo_def().body, &strings(&["k"]), &strings(&["fail"]))
            .await
            .is_err());
        assert!(store.hgetall("k").await.unwrap().is_empty());
    }
}
