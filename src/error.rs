use serde::{Serialize, Serializer};

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for callers across a serialization boundary.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Failure of one item in an aggregate operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
   pub key: String,
   pub message: String,
}

impl Failure {
   pub fn new(key: impl Into<String>, error: &impl std::fmt::Display) -> Self {
      Self {
         key: key.into(),
         message: error.to_string(),
      }
   }
}

/// Coarse classification of every error this crate can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
   /// Schema, role, service or database file absent
   NotFound,
   /// Active roles do not grant the database
   AccessDenied,
   /// Operation on a closed or never-opened connection
   NotConnected,
   /// Malformed payload, missing field, or missing WHERE clause
   Validation,
   /// Begin while active, or commit/rollback without a transaction
   TransactionState,
   /// Connection ceiling reached
   ResourceExhausted,
   /// Anything the SQLite engine reported
   Engine,
}

/// Error types for role-aware connection management and table services.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from a connection handle.
   #[error(transparent)]
   Toolkit(#[from] sqlx_sqlite_toolkit::Error),

   /// Error from the underlying database connection.
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_sqlite_conn_mgr::Error),

   /// Error from the schema registry or a schema declaration.
   #[error(transparent)]
   Schema(#[from] sqlx_sqlite_schema::Error),

   /// IO error when accessing the data directory.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Role referenced before being registered.
   #[error("role '{0}' is not registered")]
   UnknownRole(String),

   /// Active roles do not grant access to the database.
   #[error("access denied: active roles do not grant database '{0}'")]
   AccessDenied(String),

   /// Access is granted but no connection is open for the database.
   #[error("database '{0}' is not connected")]
   NotConnected(String),

   /// Schema, table or service lookup failed.
   #[error("{0} not found")]
   NotFound(String),

   /// Malformed input.
   #[error("validation error: {0}")]
   Validation(String),

   /// Opening another connection would exceed the configured maximum.
   #[error("cannot open database '{key}': connection limit of {max} reached")]
   ResourceExhausted { key: String, max: usize },

   /// Database file was written by a different schema version.
   #[error("schema version mismatch for '{key}': database has {found}, schema declares {expected}")]
   SchemaVersionMismatch {
      key: String,
      found: i64,
      expected: i64,
   },

   /// One or more required databases failed to open during a role change.
   #[error("required database(s) could not be opened: {}", describe_failures(.0))]
   RequiredDatabasesUnavailable(Vec<Failure>),

   /// Transaction failed and rollback also failed. Classified by the original error.
   #[error("transaction failed: {transaction_error}; rollback also failed: {rollback_error}")]
   TransactionRollbackFailed {
      transaction_error: Box<Error>,
      rollback_error: String,
   },

   /// Error raised by caller-supplied code.
   #[error("{0}")]
   Other(String),
}

fn describe_failures(failures: &[Failure]) -> String {
   failures
      .iter()
      .map(|f| format!("{}: {}", f.key, f.message))
      .collect::<Vec<_>>()
      .join("; ")
}

impl Error {
   /// Where this error sits in the taxonomy.
   pub fn kind(&self) -> ErrorKind {
      use sqlx_sqlite_conn_mgr::Error as DbError;
      use sqlx_sqlite_toolkit::Error as HandleError;

      fn db_kind(e: &DbError) -> ErrorKind {
         match e {
            DbError::DatabaseClosed => ErrorKind::NotConnected,
            DbError::DatabaseNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Engine,
         }
      }

      fn schema_kind(e: &sqlx_sqlite_schema::Error) -> ErrorKind {
         match e {
            sqlx_sqlite_schema::Error::NotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Validation,
         }
      }

      match self {
         Error::Toolkit(e) => match e {
            HandleError::ConnectionManager(inner) => db_kind(inner),
            HandleError::Schema(inner) => schema_kind(inner),
            HandleError::Validation(_) => ErrorKind::Validation,
            HandleError::TransactionAlreadyActive(_) | HandleError::NoActiveTransaction(_) => {
               ErrorKind::TransactionState
            }
            _ => ErrorKind::Engine,
         },
         Error::ConnectionManager(e) => db_kind(e),
         Error::Schema(e) => schema_kind(e),
         Error::UnknownRole(_) | Error::NotFound(_) => ErrorKind::NotFound,
         Error::AccessDenied(_) => ErrorKind::AccessDenied,
         Error::NotConnected(_) => ErrorKind::NotConnected,
         Error::Validation(_) => ErrorKind::Validation,
         Error::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
         Error::Io(_)
         | Error::SchemaVersionMismatch { .. }
         | Error::RequiredDatabasesUnavailable(_)
         | Error::Other(_) => ErrorKind::Engine,
         Error::TransactionRollbackFailed {
            transaction_error, ..
         } => transaction_error.kind(),
      }
   }

   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::Toolkit(e) => e.error_code(),
         Error::ConnectionManager(sqlx_sqlite_conn_mgr::Error::DatabaseClosed) => {
            "DATABASE_CLOSED".to_string()
         }
         Error::ConnectionManager(sqlx_sqlite_conn_mgr::Error::DatabaseNotFound(_)) => {
            "DATABASE_NOT_FOUND".to_string()
         }
         Error::ConnectionManager(sqlx_sqlite_conn_mgr::Error::IntegrityCheckFailed { .. }) => {
            "INTEGRITY_CHECK_FAILED".to_string()
         }
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
         Error::Schema(e) => e.error_code(),
         Error::Io(_) => "IO_ERROR".to_string(),
         Error::UnknownRole(_) => "UNKNOWN_ROLE".to_string(),
         Error::AccessDenied(_) => "ACCESS_DENIED".to_string(),
         Error::NotConnected(_) => "NOT_CONNECTED".to_string(),
         Error::NotFound(_) => "NOT_FOUND".to_string(),
         Error::Validation(_) => "VALIDATION_ERROR".to_string(),
         Error::ResourceExhausted { .. } => "RESOURCE_EXHAUSTED".to_string(),
         Error::SchemaVersionMismatch { .. } => "SCHEMA_VERSION_MISMATCH".to_string(),
         Error::RequiredDatabasesUnavailable(_) => "REQUIRED_DATABASES_UNAVAILABLE".to_string(),
         Error::TransactionRollbackFailed { .. } => "TRANSACTION_ROLLBACK_FAILED".to_string(),
         Error::Other(_) => "ERROR".to_string(),
      }
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_kind_of_wrapped_errors() {
      let closed = Error::from(sqlx_sqlite_toolkit::Error::ConnectionManager(
         sqlx_sqlite_conn_mgr::Error::DatabaseClosed,
      ));
      assert_eq!(closed.kind(), ErrorKind::NotConnected);

      let missing = Error::from(sqlx_sqlite_conn_mgr::Error::DatabaseNotFound("x.db".into()));
      assert_eq!(missing.kind(), ErrorKind::NotFound);

      let tx = Error::from(sqlx_sqlite_toolkit::Error::NoActiveTransaction("core".into()));
      assert_eq!(tx.kind(), ErrorKind::TransactionState);

      let schema = Error::from(sqlx_sqlite_schema::Error::NotFound("core".into()));
      assert_eq!(schema.kind(), ErrorKind::NotFound);
   }

   #[test]
   fn test_aggregate_message_lists_every_key() {
      let err = Error::RequiredDatabasesUnavailable(vec![
         Failure::new("core", &"file missing"),
         Failure::new("billing", &"integrity check failed"),
      ]);
      let message = err.to_string();
      assert!(message.contains("core: file missing"));
      assert!(message.contains("billing: integrity check failed"));
      assert_eq!(err.error_code(), "REQUIRED_DATABASES_UNAVAILABLE");
   }

   #[test]
   fn test_rollback_failure_keeps_original_kind() {
      let err = Error::TransactionRollbackFailed {
         transaction_error: Box::new(Error::Validation("missing required field(s): email".into())),
         rollback_error: "core: disk I/O error".into(),
      };
      assert_eq!(err.kind(), ErrorKind::Validation);
      assert_eq!(err.error_code(), "TRANSACTION_ROLLBACK_FAILED");
      assert!(err.to_string().contains("email"));
      assert!(err.to_string().contains("disk I/O error"));
   }

   #[test]
   fn test_serializes_code_and_message() {
      let err = Error::AccessDenied("analytics".into());
      let value = serde_json::to_value(&err).unwrap();
      assert_eq!(value["code"], "ACCESS_DENIED");
      assert!(value["message"].as_str().unwrap().contains("analytics"));
   }
}
