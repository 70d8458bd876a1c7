//! Core types and utilities for entitle.
//!
//! This crate provides the foundational types shared by the store, engine and
//! HTTP service:
//!
//! - **Identifiers**: `UserId`
//! - **Keys**: `user:<id>` and `features:<id>` record naming
//! - **Plans**: `Plan`, `PlanFeatures` and the fixed plan catalog
//! - **Features**: feature record field names, `FeatureValue`, `FieldMap`
//! - **Attributes**: flattening caller-supplied JSON into a `FieldMap`
//!
//! # Plan catalog
//!
//! | plan | storage_limit_mb | projects_limit | api_requests_per_day | team_members | has_export_feature |
//! |---|---|---|---|---|---|
//! | free | 100 | 3 | 50 | 1 | 0 |
//! | premium | 10000 | unlimited | 1000 | 10 | 1 |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod attributes;
pub mod error;
pub mod features;
pub mod ids;
pub mod keys;
pub mod plan;

pub use attributes::{attributes_from_json, encode_attributes, subscription_plan};
pub use error::{EntitlementError, Result};
pub use features::{
    format_timestamp, is_flag_feature, FeatureValue, FieldMap, API_REQUESTS_PER_DAY,
    FEATURE_FIELDS, HAS_EXPORT_FEATURE, LAST_UPDATED, PROJECTS_LIMIT, STORAGE_LIMIT_MB,
    TEAM_MEMBERS,
};
pub use ids::{IdError, UserId};
pub use keys::{features_key, user_key, FEATURES_PREFIX, USER_PREFIX};
pub use plan::{
    Plan, PlanFeatures, UnknownPlan, FREE_PLAN_FEATURES, PREMIUM_PLAN_FEATURES,
    SUBSCRIPTION_PLAN_FIELD,
};
