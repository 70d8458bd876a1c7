//! In-memory storage implementation.
//!
//! Every operation, scripts included, runs under one mutex, which is the
//! execution lock that makes procedures atomic. The store also counts
//! scripting calls and lets callers flush its script cache or restrict its
//! capabilities, which is how the gateway's recovery paths get exercised
//! without a live Redis.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use entitle_core::FieldMap;

use crate::error::{Result, StoreError};
use crate::procedure::{NativeProcedure, ProcedureDef, ScriptRuntime, StagedTx};
use crate::reply::Reply;
use crate::{Capabilities, ScriptStore};

/// Snapshot of scripting calls received by a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `script_load` calls.
    pub script_load: usize,
    /// `eval_sha` calls.
    pub eval_sha: usize,
    /// `eval` calls.
    pub eval: usize,
}

#[derive(Default)]
struct Counters {
    script_load: AtomicUsize,
    eval_sha: AtomicUsize,
    eval: AtomicUsize,
}

/// In-process store backed by a `HashMap`.
pub struct MemoryStore {
    records: Mutex<HashMap<String, FieldMap>>,
    scripts: ScriptRuntime,
    capabilities: Capabilities,
    counters: Counters,
}

impl MemoryStore {
    /// Create an empty store that accepts the given procedure bodies.
    #[must_use]
    pub fn new(procedures: &[ProcedureDef]) -> Self {
        Self::with_capabilities(procedures, Capabilities::ALL)
    }

    /// Create an empty store that only supports some scripting primitives.
    #[must_use]
    pub fn with_capabilities(procedures: &[ProcedureDef], capabilities: Capabilities) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            scripts: ScriptRuntime::new(procedures),
            capabilities,
            counters: Counters::default(),
        }
    }

    /// Forget every cached script handle, as a restarted store would.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache lock is poisoned.
    pub fn flush_scripts(&self) -> Result<()> {
        self.scripts.flush()
    }

    /// Scripting calls received so far.
    #[must_use]
    pub fn call_counts(&self) -> CallCounts {
        CallCounts {
            script_load: self.counters.script_load.load(Ordering::Relaxed),
            eval_sha: self.counters.eval_sha.load(Ordering::Relaxed),
            eval: self.counters.eval.load(Ordering::Relaxed),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, FieldMap>>> {
        self.records
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    fn require(&self, supported: bool, primitive: &str) -> Result<()> {
        if supported {
            Ok(())
        } else {
            Err(StoreError::Configuration(format!(
                "{primitive} is not supported by this connection"
            )))
        }
    }

    /// Run a procedure under the execution lock and commit its writes.
    fn execute(
        &self,
        procedure: &Arc<dyn NativeProcedure>,
        keys: &[String],
        args: &[String],
    ) -> Result<Reply> {
        let mut records = self.lock()?;

        let (reply, writes) = {
            let committed = &*records;
            let mut tx =
                StagedTx::new(|key: &str| Ok(committed.get(key).cloned().unwrap_or_default()));
            let reply = procedure.call(&mut tx, keys, args)?;
            (reply, tx.into_writes())
        };

        for (key, fields) in writes {
            records.entry(key).or_default().extend(fields);
        }

        Ok(reply)
    }
}

#[async_trait]
impl ScriptStore for MemoryStore {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn hset(&self, key: &str, fields: &FieldMap) -> Result<()> {
        let mut records = self.lock()?;
        records
            .entry(key.to_string())
            .or_default()
            .extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<FieldMap> {
        Ok(self.lock()?.get(key).cloned().unwrap_or_default())
    }

    async fn script_load(&self, body: &str) -> Result<String> {
        self.require(self.capabilities.script_load, "script load")?;
        self.counters.script_load.fetch_add(1, Ordering::Relaxed);
        self.scripts.load(body)
    }

    async fn eval_sha(&self, handle: &str, keys: &[String], args: &[String]) -> Result<Reply> {
        self.require(self.capabilities.eval_sha, "eval by handle")?;
        self.counters.eval_sha.fetch_add(1, Ordering::Relaxed);
        let procedure = self.scripts.by_handle(handle)?;
        self.execute(&procedure, keys, args)
    }

    async fn eval(&self, body: &str, keys: &[String], args: &[String]) -> Result<Reply> {
        self.require(self.capabilities.eval, "eval")?;
        self.counters.eval.fetch_add(1, Ordering::Relaxed);
        let procedure = self.scripts.by_body(body)?;
        self.execute(&procedure, keys, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedure::tests::echo_def;
    use crate::procedure::script_handle;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn hset_merges_fields() {
        let store = MemoryStore::new(&[]);

        let mut first = FieldMap::new();
        first.insert("name".into(), "Ann".into());
        first.insert("plan".into(), "free".into());
        store.hset("user:1", &first).await.unwrap();

        let mut second = FieldMap::new();
        second.insert("plan".into(), "premium".into());
        store.hset("user:1", &second).await.unwrap();

        let record = store.hgetall("user:1").await.unwrap();
        assert_eq!(record["name"], "Ann");
        assert_eq!(record["plan"], "premium");
        assert!(store.hgetall("user:2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn eval_sha_requires_loaded_handle() {
        let store = MemoryStore::new(&[echo_def()]);
        let handle = script_handle(&echo_def().body);

        let err = store
            .eval_sha(&handle, &[], &strings(&["hi"]))
            .await
            .unwrap_err();
        assert!(err.is_no_script());

        assert_eq!(store.script_load(&echo_def().body).await.unwrap(), handle);
        let reply = store.eval_sha(&handle, &[], &strings(&["hi"])).await.unwrap();
        assert_eq!(reply, Reply::Text("hi".into()));

        store.flush_scripts().unwrap();
        assert!(store
            .eval_sha(&handle, &[], &strings(&["hi"]))
            .await
            .unwrap_err()
            .is_no_script());

        assert_eq!(
            store.call_counts(),
            CallCounts {
                script_load: 1,
                eval_sha: 3,
                eval: 0
            }
        );
    }

    #[tokio::test]
    async fn script_writes_commit_on_success() {
        let store = MemoryStore::new(&[echo_def()]);
        store
            .eval(&echo_def().body, &strings(&["k"]), &strings(&["v"]))
            .await
            .unwrap();
        assert_eq!(store.hgetall("k").await.unwrap()["echo"], "v");
    }

    #[tokio::test]
    async fn failed_script_leaves_no_writes() {
        let store = MemoryStore::new(&[echo_def()]);
        let err = store
            .eval(&echo_def().body, &strings(&["k"]), &strings(&["fail"]))
            .await
            .unwrap_err();
        assert_eq!(err.script_code(), Some("ECHOFAIL"));
        assert!(store.hgetall("k").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restricted_capabilities_refuse_calls() {
        let store = MemoryStore::with_capabilities(&[echo_def()], Capabilities::NONE);
        assert!(matches!(
            store.script_load(&echo_def().body).await,
            Err(StoreError::Configuration(_))
        ));
        assert!(matches!(
            store.eval(&echo_def().body, &[], &strings(&["x"])).await,
            Err(StoreError::Configuration(_))
        ));
    }
}
