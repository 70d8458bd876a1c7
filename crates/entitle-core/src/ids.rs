//! Identifier types for entitle.
//!
//! User identifiers are opaque caller-supplied strings. They are concatenated
//! verbatim onto key prefixes (see [`crate::keys`]), so no escaping happens
//! here either.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user identifier as supplied in the request path.
///
/// The only constraint is that it is non-empty. An identifier that itself
/// contains a prefix-like value (for example `1:features`) is accepted and
/// may collide with another user's keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a user identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Empty`] if `value` is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdError::Empty);
        }
        Ok(Self(value))
    }

    /// Return the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier is empty.
    #[error("user id must not be empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_keeps_raw_value() {
        let id: UserId = "101".parse().unwrap();
        assert_eq!(id.as_str(), "101");
        assert_eq!(id.to_string(), "101");
    }

    #[test]
    fn empty_user_id_rejected() {
        assert_eq!(UserId::new(""), Err(IdError::Empty));
        assert!(serde_json::from_str::<UserId>("\"\"").is_err());
    }

    #[test]
    fn user_id_serde_json() {
        let id = UserId::new("alice@example.com").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"alice@example.com\"");
        let parsed: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
