//! Payload validation for table service writes

use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Which write a payload is destined for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
   Create,
   Update,
}

/// Hook run on every create/update payload before it reaches the database.
///
/// The default implementation only rejects payloads that are not JSON objects.
pub trait RecordValidator: Send + Sync {
   fn validate(&self, data: &JsonValue, operation: WriteOperation) -> Result<()> {
      let _ = operation;
      require_object(data)
   }
}

/// Validator with no rules beyond the object check
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectValidator;

impl RecordValidator for ObjectValidator {}

/// Rejects creates that leave any listed field absent or null.
///
/// Updates are partial and only get the object check.
#[derive(Debug, Clone, Default)]
pub struct RequiredFields {
   fields: Vec<String>,
}

impl RequiredFields {
   pub fn new<I, S>(fields: I) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      Self {
         fields: fields.into_iter().map(Into::into).collect(),
      }
   }
}

impl RecordValidator for RequiredFields {
   fn validate(&self, data: &JsonValue, operation: WriteOperation) -> Result<()> {
      require_object(data)?;
      if operation == WriteOperation::Update {
         return Ok(());
      }

      let missing: Vec<&str> = self
         .fields
         .iter()
         .filter(|f| data.get(f.as_str()).is_none_or(JsonValue::is_null))
         .map(String::as_str)
         .collect();

      if missing.is_empty() {
         Ok(())
      } else {
         Err(Error::Validation(format!(
            "missing required field(s): {}",
            missing.join(", ")
         )))
      }
   }
}

fn require_object(data: &JsonValue) -> Result<()> {
   if data.is_object() {
      Ok(())
   } else {
      Err(Error::Validation(format!(
         "expected a JSON object, got {}",
         type_name(data)
      )))
   }
}

fn type_name(value: &JsonValue) -> &'static str {
   match value {
      JsonValue::Null => "null",
      JsonValue::Bool(_) => "boolean",
      JsonValue::Number(_) => "number",
      JsonValue::String(_) => "string",
      JsonValue::Array(_) => "array",
      JsonValue::Object(_) => "object",
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   #[test]
   fn test_object_check() {
      let v = ObjectValidator;
      assert!(v.validate(&json!({"a": 1}), WriteOperation::Create).is_ok());

      let err = v.validate(&json!([1, 2]), WriteOperation::Create).unwrap_err();
      assert!(err.to_string().contains("array"));
      assert!(v.validate(&JsonValue::Null, WriteOperation::Update).is_err());
   }

   #[test]
   fn test_required_fields_on_create_only() {
      let v = RequiredFields::new(["email", "username"]);

      let err = v
         .validate(&json!({"username": "ann", "email": null}), WriteOperation::Create)
         .unwrap_err();
      assert_eq!(err.error_code(), "VALIDATION_ERROR");
      assert!(err.to_string().contains("email"));
      assert!(!err.to_string().contains("username"));

      assert!(v.validate(&json!({"username": "ann"}), WriteOperation::Update).is_ok());
      assert!(
         v.validate(&json!({"username": "ann", "email": "a@x.io"}), WriteOperation::Create)
            .is_ok()
      );
   }
}
