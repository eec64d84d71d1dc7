//! SQLite database file with a single exclusive connection

use crate::Result;
use crate::config::SqliteDatabaseConfig;
use crate::error::Error;
use crate::guard::ConnectionGuard;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteSynchronous};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// One SQLite database file and the single connection used to access it.
///
/// All statements go through [`acquire`](Self::acquire), which hands out the
/// connection to one caller at a time. Once [`close`](Self::close) has run,
/// every clone of the `Arc` sees [`Error::DatabaseClosed`].
///
/// # Example
///
/// ```no_run
/// use sqlx_sqlite_conn_mgr::SqliteDatabase;
///
/// # async fn example() -> Result<(), sqlx_sqlite_conn_mgr::Error> {
/// let db = SqliteDatabase::open("test.db", None).await?;
///
/// let mut conn = db.acquire().await?;
/// let rows = sqlx::query("SELECT * FROM users")
///     .fetch_all(&mut *conn)
///     .await?;
/// drop(conn);
///
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqliteDatabase {
   /// The connection; `None` once closed
   conn: Mutex<Option<SqliteConnection>>,

   /// Marks database as closed to prevent further operations
   closed: AtomicBool,

   /// Whether WAL was requested, so close knows to checkpoint
   wal: bool,

   /// Path to database file (used for cleanup)
   path: PathBuf,
}

impl SqliteDatabase {
   /// Open an existing database file.
   ///
   /// Fails with [`Error::DatabaseNotFound`] if the file is absent; this never
   /// creates a database.
   ///
   /// # Arguments
   ///
   /// * `path` - Path to the SQLite database file
   /// * `custom_config` - Optional connection configuration. Pass `None` for defaults
   ///   (5 second busy timeout, foreign keys on, WAL).
   pub async fn open(
      path: impl AsRef<Path>,
      custom_config: Option<SqliteDatabaseConfig>,
   ) -> Result<Arc<Self>> {
      let path = validate_path(path.as_ref())?;

      if !path.exists() {
         return Err(Error::DatabaseNotFound(path));
      }

      Self::connect(path, custom_config.unwrap_or_default(), false).await
   }

   /// Create the database file (and its parent directory) if missing, then open it.
   ///
   /// # Examples
   ///
   /// ```no_run
   /// use sqlx_sqlite_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig};
   ///
   /// # async fn example() -> Result<(), sqlx_sqlite_conn_mgr::Error> {
   /// let config = SqliteDatabaseConfig {
   ///    foreign_keys: false,
   ///    ..Default::default()
   /// };
   /// let db = SqliteDatabase::create("data/new.db", Some(config)).await?;
   /// # Ok(())
   /// # }
   /// ```
   pub async fn create(
      path: impl AsRef<Path>,
      custom_config: Option<SqliteDatabaseConfig>,
   ) -> Result<Arc<Self>> {
      let path = validate_path(path.as_ref())?;

      if let Some(parent) = path.parent()
         && !parent.as_os_str().is_empty()
      {
         tokio::fs::create_dir_all(parent).await?;
      }

      Self::connect(path, custom_config.unwrap_or_default(), true).await
   }

   async fn connect(
      path: PathBuf,
      config: SqliteDatabaseConfig,
      create_if_missing: bool,
   ) -> Result<Arc<Self>> {
      let mut options = SqliteConnectOptions::new()
         .filename(&path)
         .create_if_missing(create_if_missing)
         .read_only(false)
         .foreign_keys(config.foreign_keys)
         .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

      if config.journal_mode_wal {
         // https://www.sqlite.org/wal.html#performance_considerations
         options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
      }

      let conn = options.connect().await?;
      debug!("Opened database {}", path.display());

      Ok(Arc::new(Self {
         conn: Mutex::new(Some(conn)),
         closed: AtomicBool::new(false),
         wal: config.journal_mode_wal,
         path,
      }))
   }

   /// Acquire exclusive access to the connection
   ///
   /// Waits for earlier holders to drop their guards. Fails with
   /// [`Error::DatabaseClosed`] if the database has been closed.
   pub async fn acquire(&self) -> Result<ConnectionGuard<'_>> {
      if self.closed.load(Ordering::SeqCst) {
         return Err(Error::DatabaseClosed);
      }

      let slot = self.conn.lock().await;
      MutexGuard::try_map(slot, Option::as_mut)
         .map(ConnectionGuard::new)
         .map_err(|_| Error::DatabaseClosed)
   }

   /// Run `PRAGMA integrity_check`, failing unless SQLite reports `ok`
   pub async fn integrity_check(&self) -> Result<()> {
      let mut conn = self.acquire().await?;
      let rows: Vec<(String,)> = sqlx::query_as("PRAGMA integrity_check")
         .fetch_all(&mut *conn)
         .await?;

      let messages: Vec<String> = rows.into_iter().map(|(message,)| message).collect();
      if messages.len() == 1 && messages[0].eq_ignore_ascii_case("ok") {
         return Ok(());
      }

      Err(Error::IntegrityCheckFailed {
         path: self.path.clone(),
         details: messages.join("; "),
      })
   }

   /// Read `PRAGMA user_version`
   pub async fn user_version(&self) -> Result<i64> {
      let mut conn = self.acquire().await?;
      let (version,): (i64,) = sqlx::query_as("PRAGMA user_version")
         .fetch_one(&mut *conn)
         .await?;
      Ok(version)
   }

   /// Write `PRAGMA user_version`
   pub async fn set_user_version(&self, version: i64) -> Result<()> {
      let mut conn = self.acquire().await?;
      // PRAGMA arguments cannot be bound; `version` is an integer so formatting is safe
      sqlx::query(&format!("PRAGMA user_version = {}", version))
         .execute(&mut *conn)
         .await?;
      Ok(())
   }

   pub fn path(&self) -> &Path {
      &self.path
   }

   pub fn is_closed(&self) -> bool {
      self.closed.load(Ordering::SeqCst)
   }

   /// Close the connection
   ///
   /// Checkpoints the WAL (if enabled) and closes the connection. Waits for the
   /// current guard holder to finish. Closing an already-closed database is a no-op.
   pub async fn close(&self) -> Result<()> {
      // Mark as closed first so new callers fail fast instead of queueing
      self.closed.store(true, Ordering::SeqCst);

      let Some(mut conn) = self.conn.lock().await.take() else {
         return Ok(());
      };

      // Checkpoint WAL before closing to flush changes and truncate the WAL file
      if self.wal
         && let Err(e) = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&mut conn)
            .await
      {
         warn!(
            "WAL checkpoint failed while closing {}: {}",
            self.path.display(),
            e
         );
      }

      conn.close().await?;
      debug!("Closed database {}", self.path.display());
      Ok(())
   }

   /// Close the database and delete all database files
   ///
   /// This closes the connection and then deletes the database file,
   /// WAL file, and SHM file from disk. Use with caution!
   pub async fn remove(&self) -> Result<()> {
      if let Err(e) = self.close().await {
         error!(
            "Failed to close {} before removal: {}",
            self.path.display(),
            e
         );
      }

      // Remove main database file - propagate errors (file should exist)
      tokio::fs::remove_file(&self.path).await?;

      // Remove WAL and SHM files - ignore "not found" but propagate other errors
      // (these files may not exist if WAL was never initialized)
      for suffix in ["-wal", "-shm"] {
         let mut sidecar = self.path.clone().into_os_string();
         sidecar.push(suffix);

         if let Err(e) = tokio::fs::remove_file(PathBuf::from(sidecar)).await
            && e.kind() != std::io::ErrorKind::NotFound
         {
            return Err(Error::Io(e));
         }
      }

      Ok(())
   }
}

fn validate_path(path: &Path) -> Result<PathBuf> {
   if path.as_os_str().is_empty() {
      return Err(Error::Io(std::io::Error::new(
         std::io::ErrorKind::InvalidInput,
         "Database path cannot be empty",
      )));
   }
   Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_empty_path_rejected() {
      let err = validate_path(Path::new("")).unwrap_err();
      assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::InvalidInput));
   }

   #[tokio::test]
   async fn test_open_missing_file_is_not_found() {
      let dir = tempfile::TempDir::new().unwrap();
      let path = dir.path().join("missing.db");

      let err = SqliteDatabase::open(&path, None).await.unwrap_err();
      assert!(matches!(err, Error::DatabaseNotFound(ref p) if p == &path));
      assert!(!path.exists(), "open must never create the file");
   }

   #[tokio::test]
   async fn test_close_is_idempotent() {
      let dir = tempfile::TempDir::new().unwrap();
      let db = SqliteDatabase::create(dir.path().join("twice.db"), None)
         .await
         .unwrap();

      db.close().await.unwrap();
      db.close().await.unwrap();
      assert!(db.is_closed());
   }
}
