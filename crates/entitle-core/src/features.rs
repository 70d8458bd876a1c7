//! Feature record fields and values.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A flat record as stored in the key-value store: field name to string.
pub type FieldMap = BTreeMap<String, String>;

/// Storage quota in megabytes.
pub const STORAGE_LIMIT_MB: &str = "storage_limit_mb";

/// Project count limit (numeric or `unlimited`).
pub const PROJECTS_LIMIT: &str = "projects_limit";

/// Daily API request quota.
pub const API_REQUESTS_PER_DAY: &str = "api_requests_per_day";

/// Seats on the team.
pub const TEAM_MEMBERS: &str = "team_members";

/// Export toggle. The only feature read back as a boolean.
pub const HAS_EXPORT_FEATURE: &str = "has_export_feature";

/// Timestamp of the most recent save.
pub const LAST_UPDATED: &str = "last_updated";

/// Every field a feature record can carry.
pub const FEATURE_FIELDS: [&str; 6] = [
    STORAGE_LIMIT_MB,
    PROJECTS_LIMIT,
    API_REQUESTS_PER_DAY,
    TEAM_MEMBERS,
    HAS_EXPORT_FEATURE,
    LAST_UPDATED,
];

/// Whether `name` is read back as a boolean by feature checks.
#[must_use]
pub fn is_flag_feature(name: &str) -> bool {
    name == HAS_EXPORT_FEATURE
}

/// The value of a single feature check.
///
/// Numeric limits are passed through as text; callers interpret `unlimited`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    /// A boolean feature toggle.
    Flag(bool),
    /// The raw stored value.
    Text(String),
}

/// Render a save timestamp the way it is stored in `last_updated`.
///
/// Format: RFC 3339 in UTC with millisecond precision, e.g.
/// `2023-10-25T10:30:00.000Z`.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
