//! Service configuration.

use std::fmt;
use std::str::FromStr;

/// Which store the service runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Redis, with Lua procedures.
    Redis,
    /// In-process store; data is lost on exit.
    Memory,
    /// Embedded `RocksDB` under `data_dir`.
    Rocksdb,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            "rocksdb" | "rocks" => Ok(Self::Rocksdb),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
            Self::Rocksdb => "rocksdb",
        })
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:3000").
    pub listen_addr: String,

    /// Store backend (default: redis).
    pub store_backend: StoreBackend,

    /// Redis connection URL (default: `redis://localhost:6379`).
    pub redis_url: String,

    /// Path to `RocksDB` data directory (default: "/data/entitle").
    pub data_dir: String,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    #[must_use]
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let listen_addr = var("LISTEN_ADDR")
            .or_else(|| var("PORT").map(|port| format!("0.0.0.0:{port}")))
            .unwrap_or(defaults.listen_addr);

        let store_backend = match var("STORE_BACKEND").map(|s| s.parse::<StoreBackend>()) {
            Some(Ok(backend)) => backend,
            Some(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    default = %defaults.store_backend,
                    "Ignoring STORE_BACKEND"
                );
                defaults.store_backend
            }
            None => defaults.store_backend,
        };

        let redis_url = var("REDIS_URL").unwrap_or_else(|| {
            let host = var("REDIS_HOST").unwrap_or_else(|| "localhost".into());
            let port = var("REDIS_PORT")
                .and_then(|s| s.parse::<u16>().ok())
                .unwrap_or(6379);
            format!("redis://{host}:{port}")
        });

        Self {
            listen_addr,
            store_backend,
            redis_url,
            data_dir: var("DATA_DIR").unwrap_or(defaults.data_dir),
            cors_origins: var("CORS_ORIGINS")
                .unwrap_or_else(|| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: var("MAX_BODY_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: var("REQUEST_TIMEOUT_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".into(),
            store_backend: StoreBackend::Redis,
            redis_url: "redis://localhost:6379".into(),
            data_dir: "/data/entitle".into(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024, // 1MB
            request_timeout_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_env() {
        let config = load(&[]);
        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.cors_origins, vec!["*".to_string()]);
    }

    #[test]
    fn port_and_redis_host_are_honoured() {
        let config = load(&[
            ("PORT", "8081"),
            ("REDIS_HOST", "cache"),
            ("REDIS_PORT", "6380"),
        ]);
        assert_eq!(config.listen_addr, "0.0.0.0:8081");
        assert_eq!(config.redis_url, "redis://cache:6380");
    }

    #[test]
    fn explicit_values_win() {
        let config = load(&[
            ("LISTEN_ADDR", "127.0.0.1:9000"),
            ("PORT", "8081"),
            ("REDIS_URL", "redis://other:1"),
            ("STORE_BACKEND", "Memory"),
            ("CORS_ORIGINS", "https://a.test, https://b.test"),
            ("MAX_BODY_BYTES", "2048"),
        ]);
        assert_eq!(config.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.redis_url, "redis://other:1");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.cors_origins, vec!["https://a.test", "https://b.test"]);
        assert_eq!(config.max_body_bytes, 2048);
    }

    #[test]
    fn bad_backend_falls_back_to_default() {
        let config = load(&[("STORE_BACKEND", "mongo")]);
        assert_eq!(config.store_backend, StoreBackend::Redis);
    }
}
