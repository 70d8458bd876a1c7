//! Key naming for records in the store.
//!
//! Keys are `prefix + user_id` with no separator escaping. The prefixes are
//! also handed to the procedures as `KEYS`, which build the same keys
//! server-side.

use crate::UserId;

/// Prefix of user record keys.
pub const USER_PREFIX: &str = "user:";

/// Prefix of feature record keys.
pub const FEATURES_PREFIX: &str = "features:";

/// Key of the user record for `user_id`.
#[must_use]
pub fn user_key(user_id: &UserId) -> String {
    join(USER_PREFIX, user_id.as_str())
}

/// Key of the feature record for `user_id`.
#[must_use]
pub fn features_key(user_id: &UserId) -> String {
    join(FEATURES_PREFIX, user_id.as_str())
}

/// Concatenate a prefix and a raw identifier.
#[must_use]
pub fn join(prefix: &str, id: &str) -> String {
    let mut key = String::with_capacity(prefix.len() + id.len());
    key.push_str(prefix);
    key.push_str(id);
    key
}
