//! Error types for entitle storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error code a store uses when a script handle is not cached.
pub const NOSCRIPT_CODE: &str = "NOSCRIPT";

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The connection to the store failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store does not know the script handle (its script cache was cleared).
    #[error("NOSCRIPT no matching script: {handle}")]
    NoScript {
        /// The handle that was not found.
        handle: String,
    },

    /// A script ran and returned an error reply.
    #[error("{code} {message}")]
    Script {
        /// Leading upper-case error code, e.g. `ERR`.
        code: String,
        /// Remainder of the error reply.
        message: String,
    },

    /// No procedure is registered under the name.
    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),

    /// The connection cannot execute scripts in the requested way.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl StoreError {
    /// Build a script error reply from a raw `CODE message` string.
    ///
    /// A reply without an upper-case leading word gets the generic `ERR` code.
    #[must_use]
    pub fn script_reply(raw: &str) -> Self {
        let (code, message) = match raw.split_once(' ') {
            Some((code, rest)) if is_error_code(code) => (code, rest),
            _ if is_error_code(raw) => (raw, ""),
            _ => ("ERR", raw),
        };

        if code == NOSCRIPT_CODE {
            return Self::NoScript {
                handle: message.to_string(),
            };
        }

        Self::Script {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether the error means the handle must be reloaded.
    #[must_use]
    pub fn is_no_script(&self) -> bool {
        matches!(self, Self::NoScript { .. })
    }

    /// The script error code, if this is a script error reply.
    #[must_use]
    pub fn script_code(&self) -> Option<&str> {
        match self {
            Self::Script { code, .. } => Some(code),
            _ => None,
        }
    }
}

fn is_error_code(word: &str) -> bool {
    !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

impl From<StoreError> for entitle_core::EntitlementError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Serialization(msg) => Self::Serialization(msg),
            StoreError::UnknownProcedure(_) | StoreError::Configuration(_) => {
                Self::Configuration(err.to_string())
            }
            StoreError::Connection(_)
            | StoreError::Database(_)
            | StoreError::NoScript { .. }
            | StoreError::Script { .. } => Self::Storage(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_reply_splits_code() {
        let err = StoreError::script_reply("NOFEATURE Feature not defined");
        assert_eq!(err.script_code(), Some("NOFEATURE"));
        assert_eq!(err.to_string(), "NOFEATURE Feature not defined");
    }

    #[test]
    fn script_reply_without_code_is_err() {
        let err = StoreError::script_reply("something broke");
        assert_eq!(err.script_code(), Some("ERR"));
    }

    #[test]
    fn noscript_reply_maps_to_no_script() {
        let err = StoreError::script_reply("NOSCRIPT No matching script.");
        assert!(err.is_no_script());
    }

    #[test]
    fn converts_to_entitlement_errors() {
        use entitle_core::EntitlementError;

        let err = EntitlementError::from(StoreError::UnknownProcedure("x".into()));
        assert!(matches!(err, EntitlementError::Configuration(_)));

        let err = EntitlementError::from(StoreError::Connection("refused".into()));
        assert!(matches!(err, EntitlementError::Storage(_)));
        assert!(!err.is_not_found());
    }
}
