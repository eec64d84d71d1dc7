/// Result type alias for toolkit operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for connection handle operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_sqlite_conn_mgr::Error),

   /// Identifier rejected before it could reach SQL text.
   #[error(transparent)]
   Schema(#[from] sqlx_sqlite_schema::Error),

   /// SQLite type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),

   /// Multiple rows returned from a single-row query.
   #[error("query_one() returned {0} rows, expected 0 or 1")]
   MultipleRowsReturned(usize),

   /// Malformed write: nothing to insert/set, or a missing WHERE clause.
   #[error("validation error: {0}")]
   Validation(String),

   /// Transaction failed and rollback also failed.
   #[error("transaction failed: {transaction_error}; rollback also failed: {rollback_error}")]
   TransactionRollbackFailed {
      transaction_error: String,
      rollback_error: String,
   },

   /// Transaction already active for this database.
   #[error("transaction already active for database: {0}")]
   TransactionAlreadyActive(String),

   /// No active transaction for this database.
   #[error("no active transaction for database: {0}")]
   NoActiveTransaction(String),

   /// JSON value could not be serialized for binding.
   #[error("json error: {0}")]
   Json(#[from] serde_json::Error),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::ConnectionManager(sqlx_sqlite_conn_mgr::Error::DatabaseClosed) => {
            "DATABASE_CLOSED".to_string()
         }
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
         Error::Schema(e) => e.error_code(),
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
         Error::MultipleRowsReturned(_) => "MULTIPLE_ROWS_RETURNED".to_string(),
         Error::Validation(_) => "VALIDATION_ERROR".to_string(),
         Error::TransactionRollbackFailed { .. } => "TRANSACTION_ROLLBACK_FAILED".to_string(),
         Error::TransactionAlreadyActive(_) => "TRANSACTION_ALREADY_ACTIVE".to_string(),
         Error::NoActiveTransaction(_) => "NO_ACTIVE_TRANSACTION".to_string(),
         Error::Json(_) => "JSON_ERROR".to_string(),
      }
   }

   /// True for errors caused by the connection being closed
   pub fn is_closed(&self) -> bool {
      matches!(
         self,
         Error::ConnectionManager(sqlx_sqlite_conn_mgr::Error::DatabaseClosed)
      )
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_error_code_multiple_rows_returned() {
      let err = Error::MultipleRowsReturned(5);
      assert_eq!(err.error_code(), "MULTIPLE_ROWS_RETURNED");
      assert!(err.to_string().contains("5 rows"));
   }

   #[test]
   fn test_error_code_transaction_rollback_failed() {
      let err = Error::TransactionRollbackFailed {
         transaction_error: "constraint".into(),
         rollback_error: "busy".into(),
      };
      assert_eq!(err.error_code(), "TRANSACTION_ROLLBACK_FAILED");
      assert!(err.to_string().contains("constraint"));
      assert!(err.to_string().contains("busy"));
   }

   #[test]
   fn test_error_code_transaction_state() {
      let err = Error::TransactionAlreadyActive("core".into());
      assert_eq!(err.error_code(), "TRANSACTION_ALREADY_ACTIVE");
      assert!(err.to_string().contains("core"));

      let err = Error::NoActiveTransaction("analytics".into());
      assert_eq!(err.error_code(), "NO_ACTIVE_TRANSACTION");
      assert!(err.to_string().contains("analytics"));
   }

   #[test]
   fn test_error_code_closed_database() {
      let err = Error::ConnectionManager(sqlx_sqlite_conn_mgr::Error::DatabaseClosed);
      assert_eq!(err.error_code(), "DATABASE_CLOSED");
      assert!(err.is_closed());
   }

   #[test]
   fn test_error_code_schema_passthrough() {
      let err = Error::Schema(sqlx_sqlite_schema::Error::InvalidIdentifier("a b".into()));
      assert_eq!(err.error_code(), "INVALID_IDENTIFIER");
   }

   #[test]
   fn test_error_code_sqlx_non_database() {
      // RowNotFound is not a database error, so no SQLite code
      let err = Error::Sqlx(sqlx::Error::RowNotFound);
      assert_eq!(err.error_code(), "SQLX_ERROR");
   }
}
