//! Native twins of the entitlement procedures.
//!
//! Embedded stores run these when handed the matching Lua source. They follow
//! the Lua procedures step for step and return the same reply shapes.

use serde_json::{Map, Value};

use entitle_core::keys::join;
use entitle_core::{is_flag_feature, Plan, LAST_UPDATED, SUBSCRIPTION_PLAN_FIELD};
use entitle_store::{HashTx, NativeProcedure, Reply, Result, StoreError};

use crate::scripts::{FEATURE_UNDEFINED_CODE, FEATURE_UNDEFINED_MESSAGE};

/// Save user attributes and derive the feature record.
pub struct SaveUserProcedure;

impl NativeProcedure for SaveUserProcedure {
    fn call(&self, tx: &mut dyn HashTx, keys: &[String], args: &[String]) -> Result<Reply> {
        let user_id = arg(args, 0)?;
        let user_key = join(key(keys, 0)?, user_id);
        let features_key = join(key(keys, 1)?, user_id);
        let timestamp = arg(args, 2)?;

        let user_data: Map<String, Value> = serde_json::from_str(arg(args, 1)?)
            .map_err(|e| script_error(format!("malformed user data: {e}")))?;

        for (field, value) in &user_data {
            tx.hset(&user_key, field, &stored_text(field, value)?)?;
        }

        let plan = user_data
            .get(SUBSCRIPTION_PLAN_FIELD)
            .and_then(Value::as_str)
            .and_then(Plan::from_name);

        if let Some(plan) = plan {
            for (field, value) in plan.features().fields() {
                tx.hset(&features_key, field, value)?;
            }
        }

        tx.hset(&features_key, LAST_UPDATED, timestamp)?;

        Ok(Reply::from_fields(&tx.hgetall(&features_key)?))
    }
}

/// Read a single feature from the feature record.
pub struct CheckFeatureProcedure;

impl NativeProcedure for CheckFeatureProcedure {
    fn call(&self, tx: &mut dyn HashTx, keys: &[String], args: &[String]) -> Result<Reply> {
        let features_key = join(key(keys, 0)?, arg(args, 0)?);
        let feature = arg(args, 1)?;

        match tx.hget(&features_key, feature)? {
            None => Err(StoreError::Script {
                code: FEATURE_UNDEFINED_CODE.into(),
                message: FEATURE_UNDEFINED_MESSAGE.into(),
            }),
            Some(value) if is_flag_feature(feature) => Ok(Reply::from_bool(value == "1")),
            Some(value) => Ok(Reply::Text(value)),
        }
    }
}

fn key(keys: &[String], index: usize) -> Result<&str> {
    keys.get(index)
        .map(String::as_str)
        .ok_or_else(|| script_error(format!("missing KEYS[{}]", index + 1)))
}

fn arg(args: &[String], index: usize) -> Result<&str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| script_error(format!("missing ARGV[{}]", index + 1)))
}

/// Stored form of an attribute. Redis accepts strings and numbers only.
fn stored_text(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(script_error(format!(
            "user attribute `{field}` must be a string or number"
        ))),
    }
}

fn script_error(message: String) -> StoreError {
    StoreError::Script {
        code: "ERR".into(),
        message,
    }
}
