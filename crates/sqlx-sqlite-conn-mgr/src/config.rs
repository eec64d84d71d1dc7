//! Configuration for SQLite database connections

use serde::{Deserialize, Serialize};

/// Configuration applied to every connection a [`SqliteDatabase`] opens
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_conn_mgr::SqliteDatabaseConfig;
///
/// // Use defaults
/// let config = SqliteDatabaseConfig::default();
///
/// // Override just one field
/// let config = SqliteDatabaseConfig {
///     busy_timeout_ms: 10_000,
///     ..Default::default()
/// };
/// ```
///
/// [`SqliteDatabase`]: crate::SqliteDatabase
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteDatabaseConfig {
   /// How long a statement waits on a locked database before failing (in milliseconds)
   ///
   /// Default: 5000
   pub busy_timeout_ms: u64,

   /// Enforce declared foreign keys (`PRAGMA foreign_keys = ON`)
   ///
   /// Default: true
   pub foreign_keys: bool,

   /// Use Write-Ahead Logging with `synchronous = NORMAL`
   ///
   /// The WAL is checkpointed and truncated when the database is closed.
   ///
   /// Default: true
   pub journal_mode_wal: bool,
}

impl Default for SqliteDatabaseConfig {
   fn default() -> Self {
      Self {
         busy_timeout_ms: 5_000,
         foreign_keys: true,
         journal_mode_wal: true,
      }
   }
}
