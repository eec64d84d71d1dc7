use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx_sqlite_toolkit::{
   ConnectionHandle, OrderBy, Record, TableQuery, convert_record_to_table, record_from_json,
};
use tokio::sync::broadcast;
use tracing::{debug, error};

use crate::events::{EventHub, EventKind, HandlerError, ServiceEvent};
use crate::validation::{ObjectValidator, RecordValidator, WriteOperation};
use crate::{ConnectionManager, Error, ErrorKind, Result};

/// Column selection, ordering and paging for reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FindOptions {
   /// Columns to return; empty selects `*`
   pub columns: Vec<String>,
   pub order_by: Vec<OrderBy>,
   pub limit: Option<u64>,
   pub offset: Option<u64>,
}

/// Outcome of a service health probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
   pub schema: String,
   pub table: String,
   pub healthy: bool,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub row_count: Option<i64>,
   #[serde(skip_serializing_if = "Option::is_none")]
   pub error: Option<String>,
}

/// CRUD facade over one table of one logical database.
///
/// The service borrows its connection from the [`ConnectionManager`] (opening
/// it lazily) and never closes it; connections belong to the manager. Every
/// operation emits a [`ServiceEvent`] on success, or an error event before the
/// error is returned.
///
/// Records are flat JSON objects. Ids are either a bare value (single-column
/// primary key) or an object holding every primary key column.
///
/// # Example
///
/// ```no_run
/// # async fn example(manager: std::sync::Arc<sqlx_sqlite_roles::ConnectionManager>) -> sqlx_sqlite_roles::Result<()> {
/// use serde_json::json;
/// use sqlx_sqlite_roles::{FindOptions, TableService};
///
/// let users = TableService::new(manager, "core", "users");
/// let created = users.create(json!({"username": "ada", "email": "ada@example.com"})).await?;
///
/// let same = users.find_by_id(created["id"].clone()).await?;
/// let active = users.find_all(json!({"active": 1}), FindOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
pub struct TableService {
   schema: String,
   table: String,
   primary_key: Vec<String>,
   manager: Arc<ConnectionManager>,
   validator: Arc<dyn RecordValidator>,
   handle: RwLock<Option<Arc<ConnectionHandle>>>,
   events: EventHub,
}

impl TableService {
   /// Service over `schema.table` with an `id` primary key and the default
   /// object-only validator
   pub fn new(
      manager: Arc<ConnectionManager>,
      schema: impl Into<String>,
      table: impl Into<String>,
   ) -> Self {
      let schema = schema.into();
      let table = table.into();
      let events = EventHub::new(format!("{}:{}", schema, table));
      Self {
         schema,
         table,
         primary_key: vec!["id".to_string()],
         manager,
         validator: Arc::new(ObjectValidator),
         handle: RwLock::new(None),
         events,
      }
   }

   pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      self.primary_key = columns.into_iter().map(Into::into).collect();
      self
   }

   pub fn with_validator(mut self, validator: Arc<dyn RecordValidator>) -> Self {
      self.validator = validator;
      self
   }

   pub fn schema(&self) -> &str {
      &self.schema
   }

   pub fn table(&self) -> &str {
      &self.table
   }

   pub fn primary_key(&self) -> &[String] {
      &self.primary_key
   }

   /// Whether the service holds an open connection
   pub fn is_initialized(&self) -> bool {
      self.handle.read().as_ref().is_some_and(|h| h.is_open())
   }

   pub fn on<F>(&self, kind: EventKind, handler: F)
   where
      F: Fn(&ServiceEvent) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
   {
      self.events.on(kind, handler);
   }

   pub fn on_error<F>(&self, kind: ErrorKind, handler: F)
   where
      F: Fn(&ServiceEvent) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
   {
      self.events.on_error(kind, handler);
   }

   pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
      self.events.subscribe()
   }

   /// Obtain the connection. Returns immediately if already initialized.
   pub async fn init(&self) -> Result<()> {
      let result = self.connection().await.map(|_| ());
      self.report("init", result)
   }

   pub async fn find_all(&self, conditions: JsonValue, options: FindOptions) -> Result<Vec<Record>> {
      let result: Result<Vec<Record>> = async {
         let query = self.read_query(conditions, options)?;
         let rows = self.connection().await?.select(&query).await?;
         self.emit_fetched(rows.len());
         Ok(rows)
      }
      .await;
      self.report("find_all", result)
   }

   /// Row whose primary key equals `id`, if any
   pub async fn find_by_id(&self, id: JsonValue) -> Result<Option<Record>> {
      let result: Result<Option<Record>> = async {
         let query = self.by_id(TableQuery::new(&self.table), &id)?;
         let row = self.connection().await?.select_one(&query).await?;
         self.emit_fetched(usize::from(row.is_some()));
         Ok(row)
      }
      .await;
      self.report("find_by_id", result)
   }

   /// First row matching `conditions` under the given ordering
   pub async fn find_first(
      &self,
      conditions: JsonValue,
      options: FindOptions,
   ) -> Result<Option<Record>> {
      let result: Result<Option<Record>> = async {
         let options = FindOptions {
            limit: Some(1),
            ..options
         };
         let query = self.read_query(conditions, options)?;
         let row = self.connection().await?.select_one(&query).await?;
         self.emit_fetched(usize::from(row.is_some()));
         Ok(row)
      }
      .await;
      self.report("find_first", result)
   }

   /// Insert a row.
   ///
   /// Returns the stored row when it can be located by primary key (from the
   /// payload, or the new ROWID for a single-column key); otherwise the
   /// payload as given.
   pub async fn create(&self, data: JsonValue) -> Result<Record> {
      let result: Result<Record> = async {
         let record = self.writable(data, WriteOperation::Create)?;
         let handle = self.connection().await?;

         let created = self.insert_and_fetch(&handle, record).await?;
         self.events.emit(ServiceEvent::DataCreated {
            source: self.events.source().to_string(),
            record: created.clone(),
         });
         Ok(created)
      }
      .await;
      self.report("create", result)
   }

   /// Update the row identified by `id` and return it as stored.
   ///
   /// Fails with a not-found error if no such row exists afterwards.
   pub async fn update(&self, id: JsonValue, data: JsonValue) -> Result<Record> {
      let result: Result<Record> = async {
         let mut record = self.writable(data, WriteOperation::Update)?;
         for (column, value) in self.id_conditions(&id)? {
            record.insert(column, value);
         }

         let handle = self.connection().await?;
         let query = convert_record_to_table(&self.table, &record, &self.primary_key);
         handle.update(&query).await?;

         let updated = handle
            .select_one(&self.by_id(TableQuery::new(&self.table), &id)?)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} row {}", self.events.source(), id)))?;

         self.events.emit(ServiceEvent::DataUpdated {
            source: self.events.source().to_string(),
            id,
            record: updated.clone(),
         });
         Ok(updated)
      }
      .await;
      self.report("update", result)
   }

   /// Delete the row identified by `id`. Deleting a missing row succeeds.
   pub async fn delete(&self, id: JsonValue) -> Result<bool> {
      let result: Result<bool> = async {
         let query = self.by_id(TableQuery::new(&self.table), &id)?;
         let outcome = self.connection().await?.delete(&query).await?;
         debug!(
            "[{}] delete {} removed {} row(s)",
            self.events.source(),
            id,
            outcome.rows_affected
         );

         self.events.emit(ServiceEvent::DataDeleted {
            source: self.events.source().to_string(),
            id,
         });
         Ok(true)
      }
      .await;
      self.report("delete", result)
   }

   /// Insert every item in one transaction; any failure rolls back all of them.
   pub async fn bulk_create(&self, items: Vec<JsonValue>) -> Result<Vec<Record>> {
      let result: Result<Vec<Record>> = async {
         if items.is_empty() {
            return Err(Error::Validation("bulk_create needs at least one item".to_string()));
         }
         let records = items
            .into_iter()
            .map(|item| self.writable(item, WriteOperation::Create))
            .collect::<Result<Vec<_>>>()?;

         let handle = self.connection().await?;
         let created = in_transaction(&handle, async {
            let mut created = Vec::with_capacity(records.len());
            for record in records {
               let outcome = handle
                  .insert(&convert_record_to_table(&self.table, &record, &[] as &[&str]))
                  .await?;
               created.push(self.with_generated_id(record, outcome.last_insert_id));
            }
            Ok(created)
         })
         .await?;

         self.events.emit(ServiceEvent::DataBulkCreated {
            source: self.events.source().to_string(),
            count: created.len(),
         });
         Ok(created)
      }
      .await;
      self.report("bulk_create", result)
   }

   /// Number of rows matching `conditions` (`null` counts every row)
   pub async fn count(&self, conditions: JsonValue) -> Result<i64> {
      let result: Result<i64> = async {
         let query = self.read_query(conditions, FindOptions::default())?;
         Ok(self.connection().await?.count(&query).await?)
      }
      .await;
      self.report("count", result)
   }

   /// Run `callback` inside a transaction on this service's connection.
   ///
   /// Commits if the callback succeeds, rolls back otherwise.
   pub async fn execute_transaction<F, Fut, T>(&self, callback: F) -> Result<T>
   where
      F: FnOnce(Arc<ConnectionHandle>) -> Fut,
      Fut: Future<Output = Result<T>>,
   {
      let result: Result<T> = async {
         let handle = self.connection().await?;
         let value = in_transaction(&handle, callback(Arc::clone(&handle))).await?;

         self.events.emit(ServiceEvent::TransactionCompleted {
            source: self.events.source().to_string(),
         });
         Ok(value)
      }
      .await;
      self.report("execute_transaction", result)
   }

   /// Initialize if needed, then count rows
   pub async fn health_check(&self) -> HealthStatus {
      let probe: Result<i64> = async {
         self.connection().await?;
         self.count(JsonValue::Null).await
      }
      .await;
      self.health(probe)
   }

   /// Health of an already-initialized service; never opens a connection
   pub async fn probe_health(&self) -> HealthStatus {
      let handle = self.handle.read().clone().filter(|h| h.is_open());
      let probe = match handle {
         Some(handle) => {
            let query = TableQuery::new(&self.table);
            handle.count(&query).await.map_err(Error::from)
         }
         None => Err(Error::NotConnected(format!(
            "{} (service not initialized)",
            self.schema
         ))),
      };
      self.health(probe)
   }

   /// Detach from the connection and drop every handler.
   ///
   /// The connection itself stays open; it belongs to the manager.
   pub async fn close(&self) {
      self.handle.write().take();
      self.events.emit(ServiceEvent::Closed {
         source: self.events.source().to_string(),
      });
      self.events.clear();
      debug!("[{}] service closed", self.events.source());
   }

   async fn connection(&self) -> Result<Arc<ConnectionHandle>> {
      if let Some(handle) = self.handle.read().clone().filter(|h| h.is_open()) {
         return Ok(handle);
      }

      let handle = self.manager.get_lazy(&self.schema).await?;
      let previous = self.handle.write().replace(Arc::clone(&handle));
      if !previous.is_some_and(|p| Arc::ptr_eq(&p, &handle)) {
         self.events.emit(ServiceEvent::Initialized {
            source: self.events.source().to_string(),
         });
      }
      Ok(handle)
   }

   fn report<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
      if let Err(e) = &result {
         error!("[{}] {} failed: {}", self.events.source(), operation, e);
         self.events.emit_error(operation, e);
      }
      result
   }

   fn emit_fetched(&self, count: usize) {
      self.events.emit(ServiceEvent::DataFetched {
         source: self.events.source().to_string(),
         count,
      });
   }

   fn writable(&self, data: JsonValue, operation: WriteOperation) -> Result<Record> {
      self.validator.validate(&data, operation)?;
      record_from_json(data)
         .ok_or_else(|| Error::Validation("record must be a JSON object".to_string()))
   }

   fn read_query(&self, conditions: JsonValue, options: FindOptions) -> Result<TableQuery> {
      let conditions = match conditions {
         JsonValue::Null => Record::new(),
         other => record_from_json(other).ok_or_else(|| {
            Error::Validation("conditions must be a JSON object or null".to_string())
         })?,
      };

      let mut query = TableQuery::new(&self.table).select(options.columns);
      for (column, value) in conditions {
         query = query.where_eq(column, value);
      }
      query.order_by = options.order_by;
      query.limit = options.limit;
      query.offset = options.offset;
      Ok(query)
   }

   /// Primary key column/value pairs for `id`
   fn id_conditions(&self, id: &JsonValue) -> Result<Vec<(String, JsonValue)>> {
      match (self.primary_key.as_slice(), id) {
         (_, JsonValue::Null) => Err(Error::Validation("id cannot be null".to_string())),
         ([column], value) if !value.is_object() => Ok(vec![(column.clone(), value.clone())]),
         (columns, JsonValue::Object(fields)) => columns
            .iter()
            .map(|column| match fields.get(column) {
               Some(value) if !value.is_null() => Ok((column.clone(), value.clone())),
               _ => Err(Error::Validation(format!("id is missing primary key column '{}'", column))),
            })
            .collect(),
         (columns, _) => Err(Error::Validation(format!(
            "composite primary key ({}) needs an object id",
            columns.join(", ")
         ))),
      }
   }

   fn by_id(&self, query: TableQuery, id: &JsonValue) -> Result<TableQuery> {
      Ok(self
         .id_conditions(id)?
         .into_iter()
         .fold(query, |q, (column, value)| q.where_eq(column, value)))
   }

   /// Id to look a freshly inserted record up by: its own primary key fields,
   /// or the new ROWID for a single-column key the payload left out
   fn inserted_id(&self, record: &Record, last_insert_id: i64) -> Option<JsonValue> {
      let present = self
         .primary_key
         .iter()
         .all(|c| record.get(c).is_some_and(|v| !v.is_null()));

      match self.primary_key.as_slice() {
         [column] if present => record.get(column).cloned(),
         [_] if last_insert_id > 0 => Some(JsonValue::from(last_insert_id)),
         _ if present => Some(JsonValue::Object(
            self
               .primary_key
               .iter()
               .filter_map(|c| record.get(c).map(|v| (c.clone(), v.clone())))
               .collect(),
         )),
         _ => None,
      }
   }

   fn with_generated_id(&self, mut record: Record, last_insert_id: i64) -> Record {
      if let [column] = self.primary_key.as_slice()
         && record.get(column).is_none_or(JsonValue::is_null)
         && last_insert_id > 0
      {
         record.insert(column.clone(), JsonValue::from(last_insert_id));
      }
      record
   }

   async fn insert_and_fetch(&self, handle: &ConnectionHandle, record: Record) -> Result<Record> {
      let outcome = handle
         .insert(&convert_record_to_table(&self.table, &record, &[] as &[&str]))
         .await?;

      let Some(id) = self.inserted_id(&record, outcome.last_insert_id) else {
         return Ok(record);
      };
      let stored = handle
         .select_one(&self.by_id(TableQuery::new(&self.table), &id)?)
         .await?;
      Ok(stored.unwrap_or(record))
   }

   fn health(&self, probe: Result<i64>) -> HealthStatus {
      let (healthy, row_count, error) = match probe {
         Ok(count) => (true, Some(count), None),
         Err(e) => (false, None, Some(e.to_string())),
      };
      HealthStatus {
         schema: self.schema.clone(),
         table: self.table.clone(),
         healthy,
         row_count,
         error,
      }
   }
}

impl std::fmt::Debug for TableService {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("TableService")
         .field("schema", &self.schema)
         .field("table", &self.table)
         .field("primary_key", &self.primary_key)
         .field("initialized", &self.is_initialized())
         .finish_non_exhaustive()
   }
}

/// Run `work` between BEGIN and COMMIT on `handle`, rolling back on failure
pub(crate) async fn in_transaction<T, Fut>(handle: &ConnectionHandle, work: Fut) -> Result<T>
where
   Fut: Future<Output = Result<T>>,
{
   handle.begin_transaction().await?;

   let outcome = match work.await {
      Ok(value) => match handle.commit().await {
         Ok(()) => return Ok(value),
         Err(e) => Error::from(e),
      },
      Err(e) => e,
   };

   match handle.rollback().await {
      Ok(()) => Err(outcome),
      Err(rollback_error) => {
         error!("[{}] rollback failed: {}", handle.key(), rollback_error);
         Err(Error::TransactionRollbackFailed {
            transaction_error: Box::new(outcome),
            rollback_error: rollback_error.to_string(),
         })
      }
   }
}
