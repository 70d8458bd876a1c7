//! Entitlement engine for entitle.
//!
//! Two atomic procedures run inside the store:
//!
//! - **`save_user`**: merges the caller's attributes into `user:<id>`, then
//!   overwrites the plan's feature values on `features:<id>` (unknown plans
//!   leave them as they were) and stamps `last_updated`.
//! - **`check_feature`**: reads one feature; `has_export_feature` comes back
//!   as a boolean, everything else as the stored text.
//!
//! Each procedure ships as Lua source ([`scripts`]) for Redis and as a
//! native twin ([`native`]) that embedded stores run for the same source.
//! [`UserService`] invokes them through the script gateway.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod native;
pub mod scripts;
pub mod users;

pub use users::{FeatureAccess, SavedUser, UserProfile, UserService};

use std::sync::Arc;

use entitle_store::ProcedureDef;

/// Every entitlement procedure, with source and native twin.
#[must_use]
pub fn procedures() -> Vec<ProcedureDef> {
    vec![
        ProcedureDef {
            name: scripts::SAVE_USER,
            body: scripts::save_user_source(),
            native: Arc::new(native::SaveUserProcedure),
        },
        ProcedureDef {
            name: scripts::CHECK_FEATURE,
            body: scripts::check_feature_source(),
            native: Arc::new(native::CheckFeatureProcedure),
        },
    ]
}
