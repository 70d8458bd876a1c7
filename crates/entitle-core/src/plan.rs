//! Subscription plans and the plan catalog.
//!
//! The catalog is fixed at compile time. Feature values are kept as the
//! strings that end up in the feature record, since `projects_limit` can be
//! the literal `unlimited`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::features::{
    API_REQUESTS_PER_DAY, HAS_EXPORT_FEATURE, PROJECTS_LIMIT, STORAGE_LIMIT_MB, TEAM_MEMBERS,
};

/// Name of the user attribute that selects the plan.
pub const SUBSCRIPTION_PLAN_FIELD: &str = "subscription_plan";

/// Feature values granted by the free plan.
pub const FREE_PLAN_FEATURES: PlanFeatures = PlanFeatures {
    storage_limit_mb: "100",
    projects_limit: "3",
    api_requests_per_day: "50",
    team_members: "1",
    has_export_feature: "0",
};

/// Feature values granted by the premium plan.
pub const PREMIUM_PLAN_FEATURES: PlanFeatures = PlanFeatures {
    storage_limit_mb: "10000",
    projects_limit: "unlimited",
    api_requests_per_day: "1000",
    team_members: "10",
    has_export_feature: "1",
};

/// Subscription plans known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Free tier.
    Free,

    /// Premium tier: unlimited projects, export enabled.
    Premium,
}

impl Plan {
    /// Every plan in the catalog.
    pub const ALL: [Plan; 2] = [Plan::Free, Plan::Premium];

    /// The plan name as stored in `subscription_plan`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    /// The catalog row for this plan.
    #[must_use]
    pub const fn features(&self) -> &'static PlanFeatures {
        match self {
            Self::Free => &FREE_PLAN_FEATURES,
            Self::Premium => &PREMIUM_PLAN_FEATURES,
        }
    }

    /// Look up a plan by its stored name. Matching is exact.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|plan| plan.as_str() == name)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownPlan(s.to_string()))
    }
}

/// A plan name that is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown subscription plan: {0}")]
pub struct UnknownPlan(pub String);

/// One row of the plan catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanFeatures {
    /// Storage quota in megabytes.
    pub storage_limit_mb: &'static str,
    /// Project count, or `unlimited`.
    pub projects_limit: &'static str,
    /// Daily API request quota.
    pub api_requests_per_day: &'static str,
    /// Seats on the team.
    pub team_members: &'static str,
    /// `1` if export is enabled, `0` otherwise.
    pub has_export_feature: &'static str,
}

impl PlanFeatures {
    /// Field/value pairs in feature record order.
    #[must_use]
    pub const fn fields(&self) -> [(&'static str, &'static str); 5] {
        [
            (STORAGE_LIMIT_MB, self.storage_limit_mb),
            (PROJECTS_LIMIT, self.projects_limit),
            (API_REQUESTS_PER_DAY, self.api_requests_per_day),
            (TEAM_MEMBERS, self.team_members),
            (HAS_EXPORT_FEATURE, self.has_export_feature),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_names_round_trip() {
        for plan in Plan::ALL {
            assert_eq!(plan.as_str().parse::<Plan>().unwrap(), plan);
        }
    }

    #[test]
    fn plan_lookup_is_exact() {
        assert_eq!(Plan::from_name("premium"), Some(Plan::Premium));
        assert_eq!(Plan::from_name("Premium"), None);
        assert_eq!(Plan::from_name("gold"), None);
        assert_eq!(
            "gold".parse::<Plan>(),
            Err(UnknownPlan("gold".to_string()))
        );
    }

    #[test]
    fn free_plan_row() {
        let fields = Plan::Free.features().fields();
        assert_eq!(
            fields,
            [
                ("storage_limit_mb", "100"),
                ("projects_limit", "3"),
                ("api_requests_per_day", "50"),
                ("team_members", "1"),
                ("has_export_feature", "0"),
            ]
        );
    }

    #[test]
    fn premium_plan_row() {
        let features = Plan::Premium.features();
        assert_eq!(features.storage_limit_mb, "10000");
        assert_eq!(features.projects_limit, "unlimited");
        assert_eq!(features.api_requests_per_day, "1000");
        assert_eq!(features.team_members, "10");
        assert_eq!(features.has_export_feature, "1");
    }
}
