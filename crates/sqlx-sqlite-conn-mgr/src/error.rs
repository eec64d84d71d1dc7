//! Error types for sqlx-sqlite-conn-mgr

use std::path::PathBuf;

use thiserror::Error;

/// Errors that may occur when working with sqlx-sqlite-conn-mgr
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when accessing database files. Standard library IO errors
   /// are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library. Standard sqlx errors are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// Database has been closed and cannot be used
   #[error("Database has been closed")]
   DatabaseClosed,

   /// Attempted to open a database file that does not exist
   #[error("Database file not found: {}", .0.display())]
   DatabaseNotFound(PathBuf),

   /// `PRAGMA integrity_check` reported problems
   #[error("Integrity check failed for {}: {}", .path.display(), .details)]
   IntegrityCheckFailed { path: PathBuf, details: String },
}
