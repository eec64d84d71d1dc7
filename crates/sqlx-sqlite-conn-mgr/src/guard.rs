//! ConnectionGuard for exclusive access to a database connection

use sqlx::sqlite::SqliteConnection;
use std::ops::{Deref, DerefMut};
use tokio::sync::MappedMutexGuard;

/// RAII guard for exclusive access to a database's single connection
///
/// Guards are handed out in FIFO order, so statements from different callers
/// run in the order they asked for the connection. The connection is released
/// when the guard is dropped.
///
/// The guard derefs to `SqliteConnection` allowing direct use with sqlx queries.
///
/// # Example
///
/// ```no_run
/// use sqlx_sqlite_conn_mgr::SqliteDatabase;
/// use sqlx::query;
///
/// # async fn example() -> Result<(), sqlx_sqlite_conn_mgr::Error> {
/// let db = SqliteDatabase::open("test.db", None).await?;
/// let mut conn = db.acquire().await?;
/// query("INSERT INTO users (name) VALUES (?)")
///     .bind("Alice")
///     .execute(&mut *conn)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConnectionGuard<'a> {
   conn: MappedMutexGuard<'a, SqliteConnection>,
}

impl<'a> ConnectionGuard<'a> {
   pub(crate) fn new(conn: MappedMutexGuard<'a, SqliteConnection>) -> Self {
      Self { conn }
   }
}

impl Deref for ConnectionGuard<'_> {
   type Target = SqliteConnection;

   fn deref(&self) -> &Self::Target {
      &self.conn
   }
}

impl DerefMut for ConnectionGuard<'_> {
   fn deref_mut(&mut self) -> &mut Self::Target {
      &mut self.conn
   }
}
