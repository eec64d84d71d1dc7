use std::path::PathBuf;
use std::sync::Arc;

use sqlx_sqlite_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig};
use sqlx_sqlite_schema::{SchemaDdl, SchemaDeclaration, SchemaRegistry};
use sqlx_sqlite_toolkit::ConnectionHandle;
use tracing::{debug, error, info, warn};

use crate::{Error, ManagerConfig, Result};

/// Turns a registered schema into an open [`ConnectionHandle`].
///
/// File names come from the schema's `database_name` and are joined to the
/// configured data directory.
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
   schemas: Arc<SchemaRegistry>,
   data_dir: PathBuf,
   db_config: SqliteDatabaseConfig,
   enforce_schema_version: bool,
}

impl ConnectionFactory {
   pub fn new(schemas: Arc<SchemaRegistry>, config: &ManagerConfig) -> Self {
      Self {
         schemas,
         data_dir: config.data_dir.clone(),
         db_config: config.database.clone(),
         enforce_schema_version: config.enforce_schema_version,
      }
   }

   pub fn schemas(&self) -> &Arc<SchemaRegistry> {
      &self.schemas
   }

   /// Resolve the database file for a logical key.
   ///
   /// Fails if no schema is registered under `key`.
   pub fn database_path(&self, key: &str) -> Result<PathBuf> {
      let schema = self.schemas.get(key)?;
      Ok(self.data_dir.join(schema.file_name()))
   }

   /// Whether the database file for `key` is present on disk
   pub async fn exists(&self, key: &str) -> Result<bool> {
      let path = self.database_path(key)?;
      Ok(tokio::fs::try_exists(&path).await?)
   }

   /// Create (or re-materialize) the database for `key`.
   ///
   /// All DDL runs in one transaction. On failure it is rolled back, the
   /// connection is closed and the error returned. On success `user_version`
   /// is set from the declared schema version.
   pub async fn create_new(&self, key: &str) -> Result<Arc<ConnectionHandle>> {
      let schema = self.schemas.get(key)?;
      let path = self.data_dir.join(schema.file_name());

      let db = SqliteDatabase::create(&path, Some(self.db_config.clone())).await?;
      let handle = Arc::new(ConnectionHandle::new(key, db));

      if let Err(e) = materialize(&handle, &schema).await {
         if let Err(close_err) = handle.close().await {
            warn!("[{}] failed to close after schema error: {}", key, close_err);
         }
         return Err(e);
      }

      info!("Created database '{}' at {}", key, path.display());
      Ok(handle)
   }

   /// Open the database for `key`, failing with a not-found error if the file
   /// is absent.
   ///
   /// The file must pass `PRAGMA integrity_check`; otherwise the connection is
   /// closed and the error returned.
   pub async fn open_existing(&self, key: &str) -> Result<Arc<ConnectionHandle>> {
      let schema = self.schemas.get(key)?;
      let path = self.data_dir.join(schema.file_name());

      let db = SqliteDatabase::open(&path, Some(self.db_config.clone())).await?;
      let handle = Arc::new(ConnectionHandle::new(key, db));

      if let Err(e) = self.verify(&handle, &schema).await {
         error!("[{}] rejected {}: {}", key, path.display(), e);
         if let Err(close_err) = handle.close().await {
            warn!("[{}] failed to close rejected database: {}", key, close_err);
         }
         return Err(e);
      }

      debug!("Opened database '{}' at {}", key, path.display());
      Ok(handle)
   }

   /// Open the database for `key`, creating it first if the file is absent
   pub async fn open_or_create(&self, key: &str) -> Result<Arc<ConnectionHandle>> {
      if self.exists(key).await? {
         self.open_existing(key).await
      } else {
         self.create_new(key).await
      }
   }

   /// Delete the database file for `key` along with its WAL sidecars.
   ///
   /// The caller must make sure no handle for `key` is still open.
   pub async fn remove(&self, key: &str) -> Result<()> {
      let path = self.database_path(key)?;

      let db = SqliteDatabase::open(&path, Some(self.db_config.clone())).await?;
      db.close().await?;
      db.remove().await?;

      info!("Removed database '{}' ({})", key, path.display());
      Ok(())
   }

   async fn verify(&self, handle: &ConnectionHandle, schema: &SchemaDeclaration) -> Result<()> {
      let db = handle.database();
      db.integrity_check().await?;

      let Some(expected) = schema.user_version() else {
         return Ok(());
      };
      let found = db.user_version().await?;
      if found == expected {
         return Ok(());
      }

      if self.enforce_schema_version {
         return Err(Error::SchemaVersionMismatch {
            key: handle.key().to_string(),
            found,
            expected,
         });
      }

      warn!(
         "[{}] user_version is {} but schema declares {} ({})",
         handle.key(),
         found,
         expected,
         schema.version
      );
      Ok(())
   }
}

async fn materialize(handle: &ConnectionHandle, schema: &SchemaDeclaration) -> Result<()> {
   let ddl = SchemaDdl::for_schema(schema);

   handle.begin_transaction().await?;

   let applied = async {
      for statement in ddl.statements() {
         handle.execute(statement, vec![]).await?;
      }
      if let Some(version) = schema.user_version() {
         handle.database().set_user_version(version).await?;
      }
      Ok::<_, Error>(())
   }
   .await;

   match applied {
      Ok(()) => {
         handle.commit().await?;
         debug!(
            "[{}] applied {} table(s) and {} index(es)",
            handle.key(),
            ddl.tables.len(),
            ddl.indexes.len()
         );
         Ok(())
      }
      Err(e) => {
         if let Err(rollback_err) = handle.rollback().await {
            error!("[{}] rollback after schema error failed: {}", handle.key(), rollback_err);
         }
         Err(e)
      }
   }
}
