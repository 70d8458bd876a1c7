//! Redis storage implementation.
//!
//! Procedures run as Lua scripts inside Redis, which executes each script
//! atomically and serializes it against every other command. Handles are the
//! SHA-1 digests Redis returns from `SCRIPT LOAD`.
//!
//! The connection is a [`ConnectionManager`], which reconnects after the
//! server drops the socket. A restarted server has an empty script cache; the
//! next `EVALSHA` answers NOSCRIPT and the gateway reloads the body.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, ErrorKind, RedisError, Value};

use entitle_core::FieldMap;

use crate::error::{Result, StoreError};
use crate::reply::Reply;
use crate::ScriptStore;

/// Redis-backed storage implementation.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://localhost:6379`).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the URL is invalid or the server is
    /// unreachable.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!(url = %url, "Connected to Redis server");

        Ok(Self { conn })
    }

    fn script_cmd(name: &str, target: &str, keys: &[String], args: &[String]) -> redis::Cmd {
        let mut cmd = redis::cmd(name);
        cmd.arg(target).arg(keys.len());
        for key in keys {
            cmd.arg(key);
        }
        for arg in args {
            cmd.arg(arg);
        }
        cmd
    }

    async fn run_script(&self, cmd: redis::Cmd, handle: Option<&str>) -> Result<Reply> {
        let mut conn = self.conn.clone();
        let value: Value = cmd.query_async(&mut conn).await.map_err(|e| {
            if e.kind() == ErrorKind::NoScriptError {
                StoreError::NoScript {
                    handle: handle.unwrap_or_default().to_string(),
                }
            } else {
                map_redis_error(&e)
            }
        })?;
        reply_from_value(value)
    }
}

#[async_trait]
impl ScriptStore for RedisStore {
    async fn hset(&self, key: &str, fields: &FieldMap) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(field).arg(value);
        }

        let mut conn = self.conn.clone();
        let _: () = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(&e))?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<FieldMap> {
        let mut conn = self.conn.clone();
        let record: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(&e))?;
        Ok(record.into_iter().collect())
    }

    async fn script_load(&self, body: &str) -> Result<String> {
        let mut conn = self.conn.clone();
        redis::cmd("SCRIPT")
            .arg("LOAD")
            .arg(body)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error(&e))
    }

    async fn eval_sha(&self, handle: &str, keys: &[String], args: &[String]) -> Result<Reply> {
        let cmd = Self::script_cmd("EVALSHA", handle, keys, args);
        self.run_script(cmd, Some(handle)).await
    }

    async fn eval(&self, body: &str, keys: &[String], args: &[String]) -> Result<Reply> {
        let cmd = Self::script_cmd("EVAL", body, keys, args);
        self.run_script(cmd, None).await
    }
}

/// Classify a Redis error into the store taxonomy.
fn map_redis_error(err: &RedisError) -> StoreError {
    if err.is_io_error()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
        || err.is_timeout()
    {
        return StoreError::Connection(err.to_string());
    }

    match err.code() {
        Some(code) => {
            let detail = err.detail().unwrap_or_default();
            if detail.is_empty() {
                StoreError::script_reply(code)
            } else {
                StoreError::script_reply(&format!("{code} {detail}"))
            }
        }
        None => StoreError::Database(err.to_string()),
    }
}

/// Convert a RESP value into a script reply.
fn reply_from_value(value: Value) -> Result<Reply> {
    match value {
        Value::Nil => Ok(Reply::Nil),
        Value::Int(n) => Ok(Reply::Int(n)),
        Value::BulkString(bytes) => String::from_utf8(bytes)
            .map(Reply::Text)
            .map_err(|e| StoreError::Serialization(e.to_string())),
        Value::SimpleString(s) => Ok(Reply::Text(s)),
        Value::Okay => Ok(Reply::Text("OK".into())),
        Value::Array(items) => items
            .into_iter()
            .map(reply_from_value)
            .collect::<Result<Vec<_>>>()
            .map(Reply::Array),
        other => Err(StoreError::Serialization(format!(
            "unsupported script reply: {other:?}"
        ))),
    }
}
