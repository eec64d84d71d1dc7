//! Connection handle for SQLite databases managed by `sqlx-sqlite-conn-mgr`.
//!
//! This crate sits between the single-connection database type
//! (`sqlx-sqlite-conn-mgr`) and the role-aware orchestration layer. It provides:
//!
//! - [`ConnectionHandle`]: statement execution, JSON row decoding and a
//!   single-depth transaction guard over one database file
//! - [`TableQuery`]: declarative single-table descriptors that build
//!   parameterized SELECT / COUNT / INSERT / UPDATE / DELETE statements
//! - [`convert_record_to_table`]: flat records into write descriptors
//!
//! # Example
//!
//! ```no_run
//! use sqlx_sqlite_toolkit::{ConnectionHandle, SqliteDatabase, TableQuery};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = SqliteDatabase::open("core.db", None).await?;
//! let handle = ConnectionHandle::new("core", db);
//!
//! // Write
//! handle
//!    .insert(&TableQuery::new("users").set("name", json!("Alice")))
//!    .await?;
//!
//! // Read
//! let rows = handle
//!    .select(&TableQuery::new("users").where_eq("name", json!("Alice")))
//!    .await?;
//!
//! handle.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod decode;
pub mod error;
pub mod handle;
pub mod query;
pub mod record;

pub use error::{Error, Result};
pub use handle::{ConnectionHandle, WriteQueryResult, bind_value};
pub use query::{BuiltQuery, ColumnValue, Condition, OrderBy, SortDirection, TableQuery};
pub use record::{Record, convert_record_to_table, record_from_json};

// Re-export commonly used types from dependencies
pub use sqlx_sqlite_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig};
