//! Error types for entitle.

use crate::ids::IdError;

/// Result type for entitle operations.
pub type Result<T> = std::result::Result<T, EntitlementError>;

/// Errors surfaced by the user operations.
#[derive(Debug, thiserror::Error)]
pub enum EntitlementError {
    /// The request payload could not be used.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The attribute map has no `subscription_plan`.
    #[error("subscription_plan is required (free or premium)")]
    MissingPlan,

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// No user record exists for the identifier.
    #[error("User not found")]
    UserNotFound {
        /// The user ID that was not found.
        user_id: String,
    },

    /// The feature record has no such field (or no record at all).
    #[error("Feature not defined")]
    FeatureNotDefined {
        /// The requested feature name.
        feature: String,
    },

    /// The store is unreachable or failed the operation.
    #[error("storage error: {0}")]
    Storage(String),

    /// A reply or payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The store connection cannot run procedures.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl EntitlementError {
    /// Whether the error is the caller's fault (bad payload or identifier).
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput(_) | Self::MissingPlan | Self::InvalidId(_)
        )
    }

    /// Whether the error reports a missing user or feature.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UserNotFound { .. } | Self::FeatureNotDefined { .. })
    }
}
