use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;
use sqlx_sqlite_toolkit::ConnectionHandle;
use tracing::{debug, info, warn};

use crate::error::Failure;
use crate::service::HealthStatus;
use crate::validation::RecordValidator;
use crate::{ConnectionManager, Error, Result, TableService};

/// Per-table service settings
#[derive(Clone)]
pub struct TableConfig {
   pub name: String,
   /// Default: `["id"]`
   pub primary_key: Vec<String>,
   /// Initialize the service as soon as it is created
   pub auto_init: bool,
   pub validator: Option<Arc<dyn RecordValidator>>,
}

impl TableConfig {
   pub fn new(name: impl Into<String>) -> Self {
      Self {
         name: name.into(),
         primary_key: vec!["id".to_string()],
         auto_init: false,
         validator: None,
      }
   }

   pub fn primary_key<I, S>(mut self, columns: I) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      self.primary_key = columns.into_iter().map(Into::into).collect();
      self
   }

   pub fn auto_init(mut self, auto_init: bool) -> Self {
      self.auto_init = auto_init;
      self
   }

   pub fn validator(mut self, validator: Arc<dyn RecordValidator>) -> Self {
      self.validator = Some(validator);
      self
   }
}

impl std::fmt::Debug for TableConfig {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("TableConfig")
         .field("name", &self.name)
         .field("primary_key", &self.primary_key)
         .field("auto_init", &self.auto_init)
         .field("validator", &self.validator.is_some())
         .finish()
   }
}

/// Tables of one logical database that may get a [`TableService`]
#[derive(Debug, Clone)]
pub struct SchemaConfig {
   /// Logical database key
   pub name: String,
   pub tables: Vec<TableConfig>,
}

impl SchemaConfig {
   pub fn new(name: impl Into<String>) -> Self {
      Self {
         name: name.into(),
         tables: Vec::new(),
      }
   }

   pub fn table(mut self, table: TableConfig) -> Self {
      self.tables.push(table);
      self
   }
}

/// Result of an operation applied to every service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
   pub succeeded: Vec<String>,
   pub failed: Vec<Failure>,
}

impl BatchReport {
   pub fn is_success(&self) -> bool {
      self.failed.is_empty()
   }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaStatus {
   pub name: String,
   pub tables: Vec<String>,
   pub services: usize,
   pub initialized: usize,
}

/// Snapshot of the registry; taking it has no side effects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryStatus {
   pub schemas: Vec<SchemaStatus>,
   pub total_services: usize,
   pub initialized_services: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryHealth {
   pub healthy: bool,
   pub services: Vec<HealthStatus>,
}

/// Services handed to a schema transaction callback
pub struct SchemaTransaction {
   /// Connection the transaction runs on
   pub handle: Arc<ConnectionHandle>,
   /// Every service of the schema, keyed by table name
   pub services: IndexMap<String, Arc<TableService>>,
}

/// Owns at most one [`TableService`] per `schema:table`.
///
/// Schemas are registered up front; services are created on first request and
/// then shared.
pub struct ServiceRegistry {
   manager: Arc<ConnectionManager>,
   schemas: RwLock<IndexMap<String, SchemaConfig>>,
   services: RwLock<IndexMap<String, Arc<TableService>>>,
}

impl ServiceRegistry {
   pub fn new(manager: Arc<ConnectionManager>) -> Self {
      Self {
         manager,
         schemas: RwLock::new(IndexMap::new()),
         services: RwLock::new(IndexMap::new()),
      }
   }

   pub fn manager(&self) -> &Arc<ConnectionManager> {
      &self.manager
   }

   /// Register (or replace) a schema's table settings
   pub fn register_schema(&self, schema: SchemaConfig) -> Result<()> {
      if schema.name.trim().is_empty() {
         return Err(Error::Validation("schema name cannot be empty".to_string()));
      }
      if schema.tables.is_empty() {
         return Err(Error::Validation(format!(
            "schema '{}' declares no tables",
            schema.name
         )));
      }
      if let Some(table) = schema.tables.iter().find(|t| t.primary_key.is_empty()) {
         return Err(Error::Validation(format!(
            "table '{}.{}' needs at least one primary key column",
            schema.name, table.name
         )));
      }

      debug!(
         "Registered schema '{}' with {} table(s)",
         schema.name,
         schema.tables.len()
      );
      self.schemas.write().insert(schema.name.clone(), schema);
      Ok(())
   }

   pub fn register_schemas(&self, schemas: impl IntoIterator<Item = SchemaConfig>) -> Result<()> {
      for schema in schemas {
         self.register_schema(schema)?;
      }
      Ok(())
   }

   /// Names of registered schemas, in registration order
   pub fn registered_schemas(&self) -> Vec<String> {
      self.schemas.read().keys().cloned().collect()
   }

   /// Service for `schema.table`, created on first request.
   ///
   /// Repeated calls return the same instance. Fails with a not-found error
   /// if the schema or table is not registered. A service configured with
   /// `auto_init` is initialized before being returned.
   pub async fn create_service(&self, schema: &str, table: &str) -> Result<Arc<TableService>> {
      let (service, created) = self.get_or_insert(schema, table)?;

      let auto_init = created && service_auto_init(&self.schemas.read(), schema, table);
      if auto_init {
         service.init().await?;
      }
      Ok(service)
   }

   /// Same as [`create_service`](Self::create_service)
   pub async fn get_service(&self, schema: &str, table: &str) -> Result<Arc<TableService>> {
      self.create_service(schema, table).await
   }

   /// Service for `schema.table` only if it was already created
   pub fn get_existing_service(&self, schema: &str, table: &str) -> Option<Arc<TableService>> {
      self.services.read().get(&service_key(schema, table)).cloned()
   }

   /// Created services of `schema`, in creation order
   pub fn get_services_for_schema(&self, schema: &str) -> Vec<Arc<TableService>> {
      self
         .services
         .read()
         .values()
         .filter(|s| s.schema() == schema)
         .cloned()
         .collect()
   }

   /// Close and forget one service. Returns whether it existed.
   pub async fn remove_service(&self, schema: &str, table: &str) -> bool {
      let removed = self.services.write().shift_remove(&service_key(schema, table));
      match removed {
         Some(service) => {
            service.close().await;
            true
         }
         None => false,
      }
   }

   /// Initialize every created service in parallel
   pub async fn init_all_services(&self) -> BatchReport {
      let services = self.all_services();
      let results = join_all(services.iter().map(|(key, service)| async move {
         (key.clone(), service.init().await)
      }))
      .await;

      let mut report = BatchReport::default();
      for (key, result) in results {
         match result {
            Ok(()) => report.succeeded.push(key),
            Err(e) => {
               warn!("Service '{}' failed to initialize: {}", key, e);
               report.failed.push(Failure::new(key, &e));
            }
         }
      }
      info!(
         "Initialized {} service(s), {} failed",
         report.succeeded.len(),
         report.failed.len()
      );
      report
   }

   /// Close every service and empty the registry's service map
   pub async fn close_all_services(&self) -> BatchReport {
      let services: Vec<_> = self.services.write().drain(..).collect();
      join_all(services.iter().map(|(_, service)| service.close())).await;

      info!("Closed {} service(s)", services.len());
      BatchReport {
         succeeded: services.into_iter().map(|(key, _)| key).collect(),
         failed: Vec::new(),
      }
   }

   /// Run `callback` in one transaction on `schema`'s connection.
   ///
   /// Every created service of the schema is initialized first and handed to
   /// the callback; all their writes share the transaction.
   pub async fn execute_schema_transaction<F, Fut, T>(&self, schema: &str, callback: F) -> Result<T>
   where
      F: FnOnce(SchemaTransaction) -> Fut,
      Fut: Future<Output = Result<T>>,
   {
      let services = self.get_services_for_schema(schema);
      let Some(first) = services.first().cloned() else {
         return Err(Error::NotFound(format!(
            "services for schema '{}'",
            schema
         )));
      };

      let initialized = join_all(services.iter().map(|s| s.init())).await;
      if let Some(e) = initialized.into_iter().find_map(|r| r.err()) {
         return Err(e);
      }

      let services: IndexMap<String, Arc<TableService>> = services
         .into_iter()
         .map(|s| (s.table().to_string(), s))
         .collect();

      first
         .execute_transaction(|handle| callback(SchemaTransaction { handle, services }))
         .await
   }

   /// Counts of schemas and services
   pub fn get_status(&self) -> RegistryStatus {
      let schemas = self.schemas.read();
      let services = self.services.read();

      let statuses: Vec<SchemaStatus> = schemas
         .values()
         .map(|schema| {
            let live: Vec<_> = services.values().filter(|s| s.schema() == schema.name).collect();
            SchemaStatus {
               name: schema.name.clone(),
               tables: schema.tables.iter().map(|t| t.name.clone()).collect(),
               services: live.len(),
               initialized: live.iter().filter(|s| s.is_initialized()).count(),
            }
         })
         .collect();

      RegistryStatus {
         total_services: services.len(),
         initialized_services: services.values().filter(|s| s.is_initialized()).count(),
         schemas: statuses,
      }
   }

   /// Probe every created service without initializing any of them
   pub async fn health_check(&self) -> RegistryHealth {
      let services = self.all_services();
      let statuses = join_all(services.iter().map(|(_, s)| s.probe_health())).await;

      RegistryHealth {
         healthy: statuses.iter().all(|s| s.healthy),
         services: statuses,
      }
   }

   fn all_services(&self) -> Vec<(String, Arc<TableService>)> {
      self
         .services
         .read()
         .iter()
         .map(|(k, s)| (k.clone(), Arc::clone(s)))
         .collect()
   }

   /// Existing service, or a new one built from the registered table settings.
   /// Returns whether the service was created by this call.
   fn get_or_insert(&self, schema: &str, table: &str) -> Result<(Arc<TableService>, bool)> {
      let key = service_key(schema, table);
      if let Some(service) = self.services.read().get(&key) {
         return Ok((Arc::clone(service), false));
      }

      let config = {
         let schemas = self.schemas.read();
         let schema_config = schemas
            .get(schema)
            .ok_or_else(|| Error::NotFound(format!("schema '{}'", schema)))?;
         schema_config
            .tables
            .iter()
            .find(|t| t.name == table)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("table '{}' in schema '{}'", table, schema)))?
      };

      let mut services = self.services.write();
      if let Some(service) = services.get(&key) {
         return Ok((Arc::clone(service), false));
      }

      let mut service = TableService::new(Arc::clone(&self.manager), schema, table)
         .with_primary_key(config.primary_key);
      if let Some(validator) = config.validator {
         service = service.with_validator(validator);
      }

      let service = Arc::new(service);
      services.insert(key, Arc::clone(&service));
      debug!("Created service for '{}.{}'", schema, table);
      Ok((service, true))
   }
}

fn service_key(schema: &str, table: &str) -> String {
   format!("{}:{}", schema, table)
}

fn service_auto_init(schemas: &IndexMap<String, SchemaConfig>, schema: &str, table: &str) -> bool {
   schemas
      .get(schema)
      .and_then(|s| s.tables.iter().find(|t| t.name == table))
      .is_some_and(|t| t.auto_init)
}
