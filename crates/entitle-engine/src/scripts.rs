//! Lua sources of the entitlement procedures.
//!
//! These are the bodies submitted to the store. The plan branches of the
//! save procedure are generated from the plan catalog, so Redis and the
//! native procedures grant identical values.

use entitle_core::{Plan, HAS_EXPORT_FEATURE, LAST_UPDATED, SUBSCRIPTION_PLAN_FIELD};

/// Name of the save-and-derive procedure.
pub const SAVE_USER: &str = "save_user";

/// Name of the single feature check procedure.
pub const CHECK_FEATURE: &str = "check_feature";

/// Error code returned when a feature is not on the record.
pub const FEATURE_UNDEFINED_CODE: &str = "NOFEATURE";

/// Error message returned when a feature is not on the record.
pub const FEATURE_UNDEFINED_MESSAGE: &str = "Feature not defined";

/// Source of the save procedure.
///
/// `KEYS = [user_prefix, features_prefix]`,
/// `ARGV = [user_id, user_data_json, timestamp]`.
#[must_use]
pub fn save_user_source() -> String {
    let branches: String = Plan::ALL
        .iter()
        .enumerate()
        .map(|(i, plan)| {
            let keyword = if i == 0 { "if" } else { "elseif" };
            let pairs: String = plan
                .features()
                .fields()
                .iter()
                .map(|(field, value)| format!(", '{field}', '{value}'"))
                .collect();
            format!(
                "{keyword} plan == '{}' then\n  redis.call('HSET', featuresKey{pairs})\n",
                plan.as_str()
            )
        })
        .collect();

    format!(
        "local userKey = KEYS[1] .. ARGV[1]
local featuresKey = KEYS[2] .. ARGV[1]
local userData = cjson.decode(ARGV[2])
local timestamp = ARGV[3]

for k, v in pairs(userData) do
  redis.call('HSET', userKey, k, v)
end

local plan = userData.{SUBSCRIPTION_PLAN_FIELD}

{branches}end

redis.call('HSET', featuresKey, '{LAST_UPDATED}', timestamp)

return redis.call('HGETALL', featuresKey)
"
    )
}

/// Source of the feature check procedure.
///
/// `KEYS = [features_prefix]`, `ARGV = [user_id, feature_name]`.
#[must_use]
pub fn check_feature_source() -> String {
    format!(
        "local featuresKey = KEYS[1] .. ARGV[1]
local featureName = ARGV[2]

local value = redis.call('HGET', featuresKey, featureName)
if not value then
  return redis.error_reply('{FEATURE_UNDEFINED_CODE} {FEATURE_UNDEFINED_MESSAGE}')
end

if featureName == '{HAS_EXPORT_FEATURE}' then
  return value == '1'
end

return value
"
    )
}
