//! Script replies.
//!
//! Replies use the value model of Redis scripting so that every backend
//! returns the same shapes for the same procedure: Lua `true` becomes the
//! integer `1`, Lua `false` and `nil` become [`Reply::Nil`], and tables
//! become arrays.

use entitle_core::FieldMap;

use crate::error::{Result, StoreError};

/// A value returned by a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// No value (also Lua `false`).
    Nil,
    /// An integer (also Lua `true`, as `1`).
    Int(i64),
    /// A string.
    Text(String),
    /// An array of replies.
    Array(Vec<Reply>),
}

impl Reply {
    /// Encode a boolean the way Lua scripts return one.
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        if value {
            Self::Int(1)
        } else {
            Self::Nil
        }
    }

    /// Encode a record as a flat alternating field/value array.
    #[must_use]
    pub fn from_fields(fields: &FieldMap) -> Self {
        Self::Array(
            fields
                .iter()
                .flat_map(|(k, v)| [Self::Text(k.clone()), Self::Text(v.clone())])
                .collect(),
        )
    }

    /// Decode a boolean returned by a script.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Nil => false,
            Self::Int(n) => *n != 0,
            Self::Text(s) => s == "1",
            Self::Array(items) => !items.is_empty(),
        }
    }

    /// Decode a string reply. Integers are rendered as decimal text.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` for nil or array replies.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(s) => Ok(s),
            Self::Int(n) => Ok(n.to_string()),
            other => Err(StoreError::Serialization(format!(
                "expected a string reply, got {other:?}"
            ))),
        }
    }

    /// Decode a flat alternating field/value array into a record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Serialization` if the reply is not an array of
    /// strings with an even length.
    pub fn into_fields(self) -> Result<FieldMap> {
        let items = match self {
            Self::Array(items) => items,
            Self::Nil => return Ok(FieldMap::new()),
            other => {
                return Err(StoreError::Serialization(format!(
                    "expected a field/value array, got {other:?}"
                )))
            }
        };

        if items.len() % 2 != 0 {
            return Err(StoreError::Serialization(format!(
                "field/value array has odd length {}",
                items.len()
            )));
        }

        let mut fields = FieldMap::new();
        let mut iter = items.into_iter();
        while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
            fields.insert(field.into_text()?, value.into_text()?);
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_follow_lua_conversion() {
        assert_eq!(Reply::from_bool(true), Reply::Int(1));
        assert_eq!(Reply::from_bool(false), Reply::Nil);
        assert!(Reply::Int(1).is_truthy());
        assert!(!Reply::Nil.is_truthy());
    }

    #[test]
    fn field_array_decodes() {
        let mut fields = FieldMap::new();
        fields.insert("team_members".into(), "10".into());
        fields.insert("projects_limit".into(), "unlimited".into());

        let reply = Reply::from_fields(&fields);
        assert_eq!(reply.into_fields().unwrap(), fields);
    }

    #[test]
    fn odd_field_array_rejected() {
        let reply = Reply::Array(vec![Reply::Text("a".into())]);
        assert!(matches!(
            reply.into_fields(),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn integer_text_is_decimal() {
        assert_eq!(Reply::Int(42).into_text().unwrap(), "42");
        assert!(Reply::Nil.into_text().is_err());
    }
}
