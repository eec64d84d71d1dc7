//! Configuration for the connection manager

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sqlx_sqlite_conn_mgr::SqliteDatabaseConfig;

/// Configuration for [`ConnectionManager`](crate::ConnectionManager)
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_roles::ManagerConfig;
///
/// let config = ManagerConfig {
///     max_connections: 4,
///     ..ManagerConfig::new("/data/app/databases")
/// };
/// assert_eq!(config.default_database, "default");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
   /// Per-app data directory holding one file per logical database
   ///
   /// The host application supplies the platform location (e.g. the app's
   /// documents directory on iOS or files directory on Android).
   ///
   /// Default: current directory
   pub data_dir: PathBuf,

   /// Logical key of the database every user can reach regardless of roles
   ///
   /// Default: "default"
   pub default_database: String,

   /// Ceiling on connections opened lazily through
   /// [`get_lazy`](crate::ConnectionManager::get_lazy)
   ///
   /// Default: 10
   pub max_connections: usize,

   /// Fail to open a database whose `user_version` differs from the leading
   /// integer of its declared schema version (otherwise only warn)
   ///
   /// Default: false
   pub enforce_schema_version: bool,

   /// Pragmas applied to every connection
   pub database: SqliteDatabaseConfig,
}

impl ManagerConfig {
   pub fn new(data_dir: impl Into<PathBuf>) -> Self {
      Self {
         data_dir: data_dir.into(),
         ..Default::default()
      }
   }
}

impl Default for ManagerConfig {
   fn default() -> Self {
      Self {
         data_dir: PathBuf::from("."),
         default_database: "default".to_string(),
         max_connections: 10,
         enforce_schema_version: false,
         database: SqliteDatabaseConfig::default(),
      }
   }
}
