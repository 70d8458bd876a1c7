//! Script Execution Gateway.
//!
//! Procedures are invoked by name. The gateway keeps each procedure's body
//! and the handle the store returned for it, runs the procedure by handle
//! when it can, and recovers from a store that forgot the handle by loading
//! the body again and retrying once.
//!
//! The [`ScriptTable`] is explicit shared state: it is built with every body
//! and no handles, handles are filled in by [`ScriptGateway::preload`], and
//! they are replaced only after a successful reload.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::join_all;

use crate::error::{Result, StoreError};
use crate::procedure::ProcedureDef;
use crate::reply::Reply;
use crate::ScriptStore;

/// A named procedure body and its cached handle.
#[derive(Debug)]
struct ScriptEntry {
    body: String,
    handle: RwLock<Option<String>>,
}

impl ScriptEntry {
    fn handle(&self) -> Option<String> {
        self.handle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_handle(&self, handle: String) {
        *self.handle.write().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }
}

/// Process-wide table of named procedures.
#[derive(Debug, Default)]
pub struct ScriptTable {
    entries: BTreeMap<String, ScriptEntry>,
}

impl ScriptTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding every procedure's body, with no handles yet.
    #[must_use]
    pub fn from_procedures(procedures: &[ProcedureDef]) -> Self {
        let mut table = Self::new();
        for procedure in procedures {
            table.register(procedure.name, procedure.body.clone());
        }
        table
    }

    /// Register a procedure body under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.entries.insert(
            name.into(),
            ScriptEntry {
                body: body.into(),
                handle: RwLock::new(None),
            },
        );
    }

    /// Names of every registered procedure.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The cached handle for `name`, if one has been loaded.
    #[must_use]
    pub fn handle(&self, name: &str) -> Option<String> {
        self.entries.get(name).and_then(ScriptEntry::handle)
    }

    #[cfg(test)]
    pub(crate) fn set_handle(&self, name: &str, handle: String) {
        if let Some(entry) = self.entries.get(name) {
            entry.set_handle(handle);
        }
    }

    fn entry(&self, name: &str) -> Result<&ScriptEntry> {
        self.entries
            .get(name)
            .ok_or_else(|| StoreError::UnknownProcedure(name.to_string()))
    }
}

/// Invokes named procedures on a store with handle caching and recovery.
#[derive(Clone)]
pub struct ScriptGateway {
    store: Arc<dyn ScriptStore>,
    table: Arc<ScriptTable>,
}

impl ScriptGateway {
    /// Create a gateway over `store` using the procedures in `table`.
    #[must_use]
    pub fn new(store: Arc<dyn ScriptStore>, table: Arc<ScriptTable>) -> Self {
        Self { store, table }
    }

    /// The underlying store connection.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ScriptStore> {
        &self.store
    }

    /// The procedure table.
    #[must_use]
    pub fn table(&self) -> &Arc<ScriptTable> {
        &self.table
    }

    /// Load every procedure body into the store and cache the handles.
    ///
    /// Loads are independent and best effort: a failure is logged and leaves
    /// that procedure without a handle, so it falls back to body submission.
    /// Returns the number of procedures loaded.
    pub async fn preload(&self) -> usize {
        if !self.store.capabilities().script_load {
            tracing::warn!("Script load not available, skipping script preload");
            return 0;
        }

        let loads = self.table.entries.iter().map(|(name, entry)| async move {
            match self.store.script_load(&entry.body).await {
                Ok(handle) => {
                    tracing::info!(script = %name, handle = %handle, "Loaded script");
                    entry.set_handle(handle);
                    true
                }
                Err(e) => {
                    tracing::error!(script = %name, error = %e, "Failed to load script");
                    false
                }
            }
        });

        join_all(loads).await.into_iter().filter(|loaded| *loaded).count()
    }

    /// Run the procedure registered as `name` with the given keys and args.
    ///
    /// # Errors
    ///
    /// - `StoreError::UnknownProcedure` if `name` is not registered.
    /// - `StoreError::Configuration` if the connection can run scripts
    ///   neither by handle nor by body.
    /// - Any error the store or the procedure returns. A `NOSCRIPT` reply is
    ///   retried once after reloading the body.
    pub async fn invoke(&self, name: &str, keys: &[String], args: &[String]) -> Result<Reply> {
        let entry = self.table.entry(name)?;
        let capabilities = self.store.capabilities();

        if capabilities.eval_sha {
            if let Some(handle) = entry.handle() {
                match self.store.eval_sha(&handle, keys, args).await {
                    Err(e) if e.is_no_script() && capabilities.script_load => {
                        tracing::info!(script = %name, "Script not cached, reloading");
                        let handle = self.store.script_load(&entry.body).await?;
                        entry.set_handle(handle.clone());
                        return self.store.eval_sha(&handle, keys, args).await;
                    }
                    result => return result,
                }
            }
        }

        if !capabilities.eval {
            return Err(StoreError::Configuration(
                "connection supports neither eval by handle nor eval".into(),
            ));
        }

        tracing::debug!(script = %name, "Submitting script body");
        self.store.eval(&entry.body, keys, args).await
    }
}
