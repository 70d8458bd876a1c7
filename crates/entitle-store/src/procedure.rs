//! Embedded procedure runtime.
//!
//! Embedded backends cannot run Lua. Instead each procedure body is paired
//! with a native implementation, and the backend accepts exactly those
//! bodies: loading or evaluating a body resolves it by content digest to its
//! native twin. Handles, the script cache and `NOSCRIPT` replies behave like
//! a Redis script cache, so the gateway protocol is the same against every
//! backend.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

use sha2::{Digest, Sha256};

use entitle_core::FieldMap;

use crate::error::{Result, StoreError};
use crate::reply::Reply;

/// Hash operations available to a procedure while it holds the store.
///
/// Writes made through the transaction are visible to later reads in the
/// same procedure and become visible to everyone else only when the
/// procedure returns successfully.
pub trait HashTx {
    /// Read one field of a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>>;

    /// Read a whole record. Missing records read as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    fn hgetall(&mut self, key: &str) -> Result<FieldMap>;

    /// Set one field of a record, creating the record if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<()>;
}

/// Native implementation of a procedure body.
pub trait NativeProcedure: Send + Sync {
    /// Run the procedure against `tx` with Redis-style `KEYS` and `ARGV`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Script` for procedure-level failures.
    fn call(&self, tx: &mut dyn HashTx, keys: &[String], args: &[String]) -> Result<Reply>;
}

/// A named procedure: its source body and the native equivalent.
#[derive(Clone)]
pub struct ProcedureDef {
    /// Name callers invoke the procedure by.
    pub name: &'static str,
    /// Script source submitted to the store.
    pub body: String,
    /// Native twin run by embedded backends.
    pub native: Arc<dyn NativeProcedure>,
}

impl fmt::Debug for ProcedureDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureDef")
            .field("name", &self.name)
            .field("handle", &script_handle(&self.body))
            .finish_non_exhaustive()
    }
}

/// Content-addressed handle of a script body (hex SHA-256).
#[must_use]
pub fn script_handle(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
}

/// Script cache and native dispatch shared by the embedded backends.
pub struct ScriptRuntime {
    natives: HashMap<String, Arc<dyn NativeProcedure>>,
    loaded: RwLock<HashSet<String>>,
}

impl ScriptRuntime {
    /// Create a runtime that accepts the given procedure bodies.
    #[must_use]
    pub fn new(procedures: &[ProcedureDef]) -> Self {
        let natives = procedures
            .iter()
            .map(|p| (script_handle(&p.body), Arc::clone(&p.native)))
            .collect();

        Self {
            natives,
            loaded: RwLock::new(HashSet::new()),
        }
    }

    /// Compile a body into the script cache and return its handle.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Script` if the body has no native twin.
    pub fn load(&self, body: &str) -> Result<String> {
        let handle = script_handle(body);
        if !self.natives.contains_key(&handle) {
            return Err(unsupported_body(&handle));
        }
        self.write_loaded()?.insert(handle.clone());
        Ok(handle)
    }

    /// Resolve a cached handle.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoScript` if the handle is not in the cache.
    pub fn by_handle(&self, handle: &str) -> Result<Arc<dyn NativeProcedure>> {
        let loaded = self
            .loaded
            .read()
            .map_err(|_| StoreError::Database("script cache lock poisoned".into()))?;

        if !loaded.contains(handle) {
            return Err(StoreError::NoScript {
                handle: handle.to_string(),
            });
        }

        self.natives
            .get(handle)
            .cloned()
            .ok_or_else(|| unsupported_body(handle))
    }

    /// Resolve a literal body, caching it as a side effect like `EVAL` does.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Script` if the body has no native twin.
    pub fn by_body(&self, body: &str) -> Result<Arc<dyn NativeProcedure>> {
        let handle = self.load(body)?;
        self.natives
            .get(&handle)
            .cloned()
            .ok_or_else(|| unsupported_body(&handle))
    }

    /// Drop every cached handle (`SCRIPT FLUSH`).
    ///
    /// # Errors
    ///
    /// Returns an error if the cache lock is poisoned.
    pub fn flush(&self) -> Result<()> {
        self.write_loaded()?.clear();
        Ok(())
    }

    fn write_loaded(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashSet<String>>> {
        self.loaded
            .write()
            .map_err(|_| StoreError::Database("script cache lock poisoned".into()))
    }
}

/// A [`HashTx`] that stages writes over a committed view.
///
/// The backend commits [`StagedTx::into_writes`] only after the procedure
/// succeeds, so a failing procedure leaves no trace.
pub(crate) struct StagedTx<R> {
    read: R,
    writes: HashMap<String, FieldMap>,
}

impl<R> StagedTx<R>
where
    R: FnMut(&str) -> Result<FieldMap>,
{
    pub(crate) fn new(read: R) -> Self {
        Self {
            read,
            writes: HashMap::new(),
        }
    }

    pub(crate) fn into_writes(self) -> HashMap<String, FieldMap> {
        self.writes
    }
}

impl<R> HashTx for StagedTx<R>
where
    R: FnMut(&str) -> Result<FieldMap>,
{
    fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>> {
        if let Some(value) = self.writes.get(key).and_then(|w| w.get(field)) {
            return Ok(Some(value.clone()));
        }
        Ok((self.read)(key)?.remove(field))
    }

    fn hgetall(&mut self, key: &str) -> Result<FieldMap> {
        let mut record = (self.read)(key)?;
        if let Some(staged) = self.writes.get(key) {
            record.extend(staged.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(record)
    }

    fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<()> {
        self.writes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }
}

fn unsupported_body(handle: &str) -> StoreError {
    StoreError::Script {
        code: "ERR".into(),
        message: format!("no native procedure for script {handle}"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Echoes `ARGV[1]`, or fails when asked to.
    pub(crate) struct Echo;

    impl NativeProcedure for Echo {
        fn call(&self, tx: &mut dyn HashTx, keys: &[String], args: &[String]) -> Result<Reply> {
            if args.first().map(String::as_str) == Some("fail") {
                return Err(StoreError::Script {
                    code: "ECHOFAIL".into(),
                    message: "asked to fail".into(),
                });
            }
            if let Some(key) = keys.first() {
                tx.hset(key, "echo", &args[0])?;
            }
            Ok(Reply::Text(args[0].clone()))
        }
    }

    pub(crate) fn echo_def() -> ProcedureDef {
        ProcedureDef {
            name: "echo",
            body: "return ARGV[1]".into(),
            native: Arc::new(Echo),
        }
    }

    #[test]
    fn handle_is_stable_hex_digest() {
        let a = script_handle("return 1");
        assert_eq!(a.len(), 64);
        assert_eq!(a, script_handle("return 1"));
        assert_ne!(a, script_handle("return 2"));
    }

    #[test]
    fn unknown_handle_is_no_script() {
        let runtime = ScriptRuntime::new(&[echo_def()]);
        let handle = script_handle(&echo_def().body);
        assert!(matches!(
            runtime.by_handle(&handle),
            Err(StoreError::NoScript { .. })
        ));

        assert_eq!(runtime.load(&echo_def().body).unwrap(), handle);
        assert!(runtime.by_handle(&handle).is_ok());

        runtime.flush().unwrap();
        assert!(runtime.by_handle(&handle).err().expect("expected NoScript error").is_no_script());
    }

    #[test]
    fn unregistered_body_rejected() {
        let runtime = ScriptRuntime::new(&[echo_def()]);
        let err = runtime.load("return 42").unwrap_err();
        assert_eq!(err.script_code(), Some("ERR"));
    }

    #[test]
    fn staged_writes_shadow_committed_view() {
        let mut committed = FieldMap::new();
        committed.insert("a".into(), "old".into());
        committed.insert("b".into(), "kept".into());

        let mut tx = StagedTx::new(|key: &str| {
            Ok(if key == "k" {
                committed.clone()
            } else {
                FieldMap::new()
            })
        });
        tx.hset("k", "a", "new").unwrap();

        assert_eq!(tx.hget("k", "a").unwrap().as_deref(), Some("new"));
        assert_eq!(tx.hget("k", "b").unwrap().as_deref(), Some("kept"));
        assert_eq!(tx.hget("other", "a").unwrap(), None);

        let all = tx.hgetall("k").unwrap();
        assert_eq!(all["a"], "new");
        assert_eq!(all["b"], "kept");

        let writes = tx.into_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes["k"].len(), 1);
    }

    #[test]
    fn eval_by_body_caches_handle() {
        let runtime = ScriptRuntime::new(&[echo_def()]);
        runtime.by_body(&echo_def().body).unwrap();
        assert!(runtime.by_handle(&script_handle(&echo_def().body)).is_ok());
    }
}
