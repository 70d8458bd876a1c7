//! User attribute maps.
//!
//! Attributes arrive as a JSON object and are stored as a flat string map.
//! No schema is applied beyond flatness.

use serde_json::{Map, Value};

use crate::error::{EntitlementError, Result};
use crate::features::FieldMap;
use crate::plan::SUBSCRIPTION_PLAN_FIELD;

/// Flatten a JSON object into stored attribute strings.
///
/// Strings are kept verbatim; numbers and booleans are stored as their JSON
/// text. Nulls, arrays and nested objects are rejected, and so is a
/// `subscription_plan` that is not a string.
///
/// # Errors
///
/// Returns [`EntitlementError::MalformedInput`] naming the offending field.
pub fn attributes_from_json(object: Map<String, Value>) -> Result<FieldMap> {
    object
        .into_iter()
        .map(|(field, value)| match value {
            Value::String(s) => Ok((field, s)),
            _ if field == SUBSCRIPTION_PLAN_FIELD => Err(EntitlementError::MalformedInput(
                format!("`{SUBSCRIPTION_PLAN_FIELD}` must be a string"),
            )),
            Value::Number(n) => Ok((field, n.to_string())),
            Value::Bool(b) => Ok((field, b.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => Err(
                EntitlementError::MalformedInput(format!(
                    "attribute `{field}` must be a string, number or boolean"
                )),
            ),
        })
        .collect()
}

/// The `subscription_plan` attribute, if present and non-empty.
#[must_use]
pub fn subscription_plan(attributes: &FieldMap) -> Option<&str> {
    attributes
        .get(SUBSCRIPTION_PLAN_FIELD)
        .map(String::as_str)
        .filter(|plan| !plan.is_empty())
}

/// Serialize attributes as the JSON payload handed to the save procedure.
///
/// # Errors
///
/// Returns [`EntitlementError::Serialization`] if encoding fails.
pub fn encode_attributes(attributes: &FieldMap) -> Result<String> {
    serde_json::to_string(attributes).map_err(|e| EntitlementError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn scalars_are_flattened() {
        let attrs = attributes_from_json(object(json!({
            "name": "John Doe",
            "age": 42,
            "beta": true,
            "subscription_plan": "free"
        })))
        .unwrap();

        assert_eq!(attrs["name"], "John Doe");
        assert_eq!(attrs["age"], "42");
        assert_eq!(attrs["beta"], "true");
        assert_eq!(subscription_plan(&attrs), Some("free"));
    }

    #[test]
    fn nested_values_rejected() {
        let err = attributes_from_json(object(json!({ "tags": ["a"] }))).unwrap_err();
        assert!(matches!(err, EntitlementError::MalformedInput(msg) if msg.contains("tags")));

        assert!(attributes_from_json(object(json!({ "x": null }))).is_err());
        assert!(attributes_from_json(object(json!({ "x": {"y": 1} }))).is_err());
    }

    #[test]
    fn plan_must_be_a_string() {
        for plan in [json!(true), json!(1), json!(null), json!(["free"])] {
            let err = attributes_from_json(object(json!({ "subscription_plan": plan })))
                .unwrap_err();
            assert!(matches!(
                err,
                EntitlementError::MalformedInput(ref msg) if msg.contains("subscription_plan")
            ));
        }
    }

    #[test]
    fn empty_plan_counts_as_missing() {
        let mut attrs = FieldMap::new();
        assert_eq!(subscription_plan(&attrs), None);
        attrs.insert(SUBSCRIPTION_PLAN_FIELD.into(), String::new());
        assert_eq!(subscription_plan(&attrs), None);
    }

    #[test]
    fn encoded_payload_is_a_flat_object() {
        let mut attrs = FieldMap::new();
        attrs.insert("subscription_plan".into(), "premium".into());
        assert_eq!(
            encode_attributes(&attrs).unwrap(),
            r#"{"subscription_plan":"premium"}"#
        );
    }
}
