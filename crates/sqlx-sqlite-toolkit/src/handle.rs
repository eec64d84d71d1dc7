use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx_sqlite_conn_mgr::SqliteDatabase;
use tracing::{debug, error};

use crate::decode::decode_rows;
use crate::query::{BuiltQuery, TableQuery};
use crate::record::Record;
use crate::{Error, Result};

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub rows_affected: u64,
   /// The last inserted row ID (SQLite ROWID).
   ///
   /// Only meaningful for INSERT operations on tables with a ROWID.
   pub last_insert_id: i64,
}

/// Live binding to one logical database.
///
/// Wraps the single connection of a [`SqliteDatabase`] and adds the
/// declarative query layer plus a single-depth transaction guard. Statements
/// run in call order. While a transaction is open every statement on this
/// handle runs inside it, regardless of caller, since there is only one
/// connection.
///
/// # Example
///
/// ```no_run
/// # async fn example(handle: &sqlx_sqlite_toolkit::ConnectionHandle) -> Result<(), sqlx_sqlite_toolkit::Error> {
/// use serde_json::json;
/// use sqlx_sqlite_toolkit::TableQuery;
///
/// handle.begin_transaction().await?;
/// handle
///    .insert(&TableQuery::new("users").set("email", json!("a@example.com")))
///    .await?;
/// handle.commit().await?;
///
/// let users = handle.select(&TableQuery::new("users")).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConnectionHandle {
   key: String,
   db: Arc<SqliteDatabase>,
   /// Id of the open transaction, if any
   transaction: Mutex<Option<String>>,
}

impl ConnectionHandle {
   /// Bind an open database to its logical key
   pub fn new(key: impl Into<String>, db: Arc<SqliteDatabase>) -> Self {
      Self {
         key: key.into(),
         db,
         transaction: Mutex::new(None),
      }
   }

   /// Logical database key this handle serves
   pub fn key(&self) -> &str {
      &self.key
   }

   pub fn database(&self) -> &Arc<SqliteDatabase> {
      &self.db
   }

   pub fn is_open(&self) -> bool {
      !self.db.is_closed()
   }

   pub fn in_transaction(&self) -> bool {
      self.transaction.lock().is_some()
   }

   /// Run a statement and report affected rows.
   ///
   /// Engine errors are logged and returned unchanged.
   pub async fn execute(&self, sql: &str, params: Vec<JsonValue>) -> Result<WriteQueryResult> {
      let mut conn = self.db.acquire().await?;

      let mut q = sqlx::query(sql);
      for value in params {
         q = bind_value(q, value);
      }

      match q.execute(&mut *conn).await {
         Ok(result) => Ok(WriteQueryResult {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_rowid(),
         }),
         Err(e) => {
            error!("[{}] statement failed: {} ({})", self.key, e, sql);
            Err(e.into())
         }
      }
   }

   /// Run a query and decode every row
   pub async fn query_all(&self, sql: &str, params: Vec<JsonValue>) -> Result<Vec<Record>> {
      let mut conn = self.db.acquire().await?;

      let mut q = sqlx::query(sql);
      for value in params {
         q = bind_value(q, value);
      }

      let rows = match q.fetch_all(&mut *conn).await {
         Ok(rows) => rows,
         Err(e) => {
            error!("[{}] query failed: {} ({})", self.key, e, sql);
            return Err(e.into());
         }
      };
      drop(conn);

      decode_rows(rows)
   }

   /// Run a query expected to return zero or one row.
   ///
   /// Fails with [`Error::MultipleRowsReturned`] if more than one row comes back.
   pub async fn query_one(&self, sql: &str, params: Vec<JsonValue>) -> Result<Option<Record>> {
      let mut rows = self.query_all(sql, params).await?;
      match rows.len() {
         0 | 1 => Ok(rows.pop()),
         count => Err(Error::MultipleRowsReturned(count)),
      }
   }

   /// Open a transaction; fails if one is already active on this handle
   pub async fn begin_transaction(&self) -> Result<()> {
      let transaction_id = {
         let mut tx = self.transaction.lock();
         if tx.is_some() {
            return Err(Error::TransactionAlreadyActive(self.key.clone()));
         }
         let id = uuid::Uuid::new_v4().to_string();
         *tx = Some(id.clone());
         id
      };

      if let Err(e) = self.execute("BEGIN IMMEDIATE", vec![]).await {
         *self.transaction.lock() = None;
         return Err(e);
      }

      debug!("[{}] transaction {} started", self.key, transaction_id);
      Ok(())
   }

   /// Commit the active transaction.
   ///
   /// If COMMIT itself fails the transaction stays active so the caller can roll back.
   pub async fn commit(&self) -> Result<()> {
      let transaction_id = self.active_transaction()?;
      self.execute("COMMIT", vec![]).await?;
      *self.transaction.lock() = None;

      debug!("[{}] transaction {} committed", self.key, transaction_id);
      Ok(())
   }

   /// Roll back the active transaction.
   ///
   /// The handle leaves the transaction state even if ROLLBACK fails.
   pub async fn rollback(&self) -> Result<()> {
      let transaction_id = self.active_transaction()?;
      let result = self.execute("ROLLBACK", vec![]).await;
      *self.transaction.lock() = None;

      result?;
      debug!("[{}] transaction {} rolled back", self.key, transaction_id);
      Ok(())
   }

   fn active_transaction(&self) -> Result<String> {
      self
         .transaction
         .lock()
         .clone()
         .ok_or_else(|| Error::NoActiveTransaction(self.key.clone()))
   }

   /// SELECT built from a table descriptor
   pub async fn select(&self, table: &TableQuery) -> Result<Vec<Record>> {
      let BuiltQuery { sql, params } = table.build_select()?;
      self.query_all(&sql, params).await
   }

   /// SELECT expecting at most one row
   pub async fn select_one(&self, table: &TableQuery) -> Result<Option<Record>> {
      let BuiltQuery { sql, params } = table.build_select()?;
      self.query_one(&sql, params).await
   }

   /// `COUNT(*)` over the descriptor's WHERE list
   pub async fn count(&self, table: &TableQuery) -> Result<i64> {
      let BuiltQuery { sql, params } = table.build_count()?;
      let row = self.query_one(&sql, params).await?;
      Ok(row
         .and_then(|r| r.get("count").and_then(JsonValue::as_i64))
         .unwrap_or(0))
   }

   pub async fn insert(&self, table: &TableQuery) -> Result<WriteQueryResult> {
      let BuiltQuery { sql, params } = table.build_insert()?;
      self.execute(&sql, params).await
   }

   pub async fn update(&self, table: &TableQuery) -> Result<WriteQueryResult> {
      let BuiltQuery { sql, params } = table.build_update()?;
      self.execute(&sql, params).await
   }

   pub async fn delete(&self, table: &TableQuery) -> Result<WriteQueryResult> {
      let BuiltQuery { sql, params } = table.build_delete()?;
      self.execute(&sql, params).await
   }

   /// Close the underlying connection.
   ///
   /// An open transaction is abandoned; SQLite rolls it back when the connection closes.
   pub async fn close(&self) -> Result<()> {
      if let Some(transaction_id) = self.transaction.lock().take() {
         debug!(
            "[{}] closing with transaction {} open (will auto-rollback)",
            self.key, transaction_id
         );
      }
      self.db.close().await?;
      Ok(())
   }
}

/// Helper function to bind a JSON value to a SQLx query
///
/// Booleans bind as 0/1 and objects/arrays as JSON text, matching how the
/// schema layer declares those columns.
pub fn bind_value<'a>(
   query: sqlx::query::Query<'a, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'a>>,
   value: JsonValue,
) -> sqlx::query::Query<'a, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'a>> {
   match value {
      JsonValue::Null => query.bind(None::<String>),
      JsonValue::Bool(b) => query.bind(i64::from(b)),
      JsonValue::String(s) => query.bind(s),
      JsonValue::Number(number) => {
         // Preserve integer precision by binding as i64 when possible
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            // u64 above i64::MAX cannot be stored as INTEGER; use f64 (will lose precision)
            query.bind(uint_val as f64)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      other @ (JsonValue::Array(_) | JsonValue::Object(_)) => query.bind(other.to_string()),
   }
}
