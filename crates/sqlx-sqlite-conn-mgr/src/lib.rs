//! # sqlx-sqlite-conn-mgr
//!
//! A minimal wrapper around SQLx that owns exactly one connection per SQLite
//! database file, with pragmatic open/close policies for mobile applications.
//!
//! ## Core Types
//!
//! - **[`SqliteDatabase`]**: One physical database file and its single connection
//! - **[`SqliteDatabaseConfig`]**: Connection pragmas (busy timeout, foreign keys, WAL)
//! - **[`ConnectionGuard`]**: Exclusive access to the connection for a sequence of statements
//! - **[`Error`]**: Error type for database operations
//!
//! ## Architecture
//!
//! - **One connection per file**: statements run in the order callers acquire the guard
//! - **Explicit creation**: [`SqliteDatabase::open`] never creates a file;
//!   [`SqliteDatabase::create`] does
//! - **WAL mode**: enabled on open, checkpointed (TRUNCATE) on close
//! - **Close is observable**: after [`SqliteDatabase::close`], every other holder of the
//!   `Arc` gets [`Error::DatabaseClosed`]
//!
//! ## Usage
//!
//! ```no_run
//! use sqlx_sqlite_conn_mgr::SqliteDatabase;
//!
//! #[tokio::main]
//! async fn main() -> sqlx_sqlite_conn_mgr::Result<()> {
//!     let db = SqliteDatabase::create("example.db", None).await?;
//!
//!     let mut conn = db.acquire().await?;
//!     sqlx::query("CREATE TABLE IF NOT EXISTS users (name TEXT)")
//!         .execute(&mut *conn)
//!         .await?;
//!     drop(conn);
//!
//!     db.integrity_check().await?;
//!     db.close().await?;
//!     Ok(())
//! }
//! ```
//!
mod config;
mod database;
mod error;
mod guard;

// Re-export public types
pub use config::SqliteDatabaseConfig;
pub use database::SqliteDatabase;
pub use error::Error;
pub use guard::ConnectionGuard;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
