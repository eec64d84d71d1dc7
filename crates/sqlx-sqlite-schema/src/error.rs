//! Error types for sqlx-sqlite-schema

use thiserror::Error;

/// Errors that may occur when declaring or looking up schemas
#[derive(Error, Debug)]
pub enum Error {
   /// No schema has been registered under the requested key
   #[error("schema '{0}' not found")]
   NotFound(String),

   /// Schemas are immutable once registered
   #[error("schema '{0}' is already registered")]
   AlreadyRegistered(String),

   /// Schema document could not be parsed
   #[error("invalid schema document: {0}")]
   Json(#[from] serde_json::Error),

   /// A table, column or index name that cannot be safely placed in SQL text
   #[error(
      "invalid identifier '{0}': must contain only alphanumeric characters and underscores, and cannot start with a digit"
   )]
   InvalidIdentifier(String),

   /// Structurally valid JSON that does not describe a usable schema
   #[error("invalid schema declaration: {0}")]
   InvalidDeclaration(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> String {
      match self {
         Error::NotFound(_) => "SCHEMA_NOT_FOUND".to_string(),
         Error::AlreadyRegistered(_) => "SCHEMA_ALREADY_REGISTERED".to_string(),
         Error::Json(_) => "SCHEMA_PARSE_ERROR".to_string(),
         Error::InvalidIdentifier(_) => "INVALID_IDENTIFIER".to_string(),
         Error::InvalidDeclaration(_) => "INVALID_SCHEMA".to_string(),
      }
   }
}
