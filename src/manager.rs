use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use sqlx_sqlite_schema::SchemaRegistry;
use sqlx_sqlite_toolkit::ConnectionHandle;
use tokio::sync::{Mutex, RwLock as AsyncRwLock};
use tracing::{debug, error, info, warn};

use crate::error::Failure;
use crate::lifecycle::AppLifecycleEvent;
use crate::{ConnectionFactory, Error, ManagerConfig, Result, RoleDeclaration};

/// Open handles participating in a cross-database transaction, keyed by
/// logical database key
pub type TransactionHandles = IndexMap<String, Arc<ConnectionHandle>>;

/// Role-aware owner of every open database connection.
///
/// The set of open connections always converges to the databases granted by
/// the active roles plus the default database. Role changes, lifecycle
/// transitions, logout and lazy opens are serialized so they never interleave.
///
/// # Example
///
/// ```no_run
/// # async fn example(schemas: std::sync::Arc<sqlx_sqlite_schema::SchemaRegistry>) -> sqlx_sqlite_roles::Result<()> {
/// use sqlx_sqlite_roles::{ConnectionManager, ManagerConfig, RoleDeclaration};
///
/// let manager = ConnectionManager::new(schemas, ManagerConfig::new("/data/app"));
/// manager.initialize().await?;
///
/// manager.register_role(RoleDeclaration::new("staff").required(["core"]).optional(["analytics"]));
/// manager.set_active_roles(["staff"]).await?;
///
/// let core = manager.get("core").await?;
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
   config: ManagerConfig,
   factory: ConnectionFactory,
   roles: RwLock<IndexMap<String, RoleDeclaration>>,
   active_roles: RwLock<Vec<String>>,
   connections: AsyncRwLock<HashMap<String, Arc<ConnectionHandle>>>,
   /// Held for the whole of any operation that opens or closes connections
   reconcile: Mutex<()>,
}

impl ConnectionManager {
   pub fn new(schemas: Arc<SchemaRegistry>, config: ManagerConfig) -> Self {
      let factory = ConnectionFactory::new(schemas, &config);
      Self {
         config,
         factory,
         roles: RwLock::new(IndexMap::new()),
         active_roles: RwLock::new(Vec::new()),
         connections: AsyncRwLock::new(HashMap::new()),
         reconcile: Mutex::new(()),
      }
   }

   pub fn config(&self) -> &ManagerConfig {
      &self.config
   }

   pub fn factory(&self) -> &ConnectionFactory {
      &self.factory
   }

   pub fn schemas(&self) -> &Arc<SchemaRegistry> {
      self.factory.schemas()
   }

   pub fn default_database(&self) -> &str {
      &self.config.default_database
   }

   /// Register (or replace) a role declaration
   pub fn register_role(&self, role: RoleDeclaration) {
      let previous = self.roles.write().insert(role.name.clone(), role);
      if let Some(previous) = previous {
         debug!("Replaced role '{}'", previous.name);
      }
   }

   pub fn register_roles(&self, roles: impl IntoIterator<Item = RoleDeclaration>) {
      for role in roles {
         self.register_role(role);
      }
   }

   pub fn role(&self, name: &str) -> Option<RoleDeclaration> {
      self.roles.read().get(name).cloned()
   }

   /// Names of the currently active roles, in activation order
   pub fn active_roles(&self) -> Vec<String> {
      self.active_roles.read().clone()
   }

   /// Every key granted by the active roles, plus the default database
   pub fn wanted_databases(&self) -> Vec<String> {
      let active = self.active_roles.read().clone();
      self.wanted_for(&active).into_iter().collect()
   }

   /// Whether the active roles grant `key`. The default database is always
   /// accessible.
   pub fn has_access(&self, key: &str) -> bool {
      if key == self.config.default_database {
         return true;
      }
      let roles = self.roles.read();
      self
         .active_roles
         .read()
         .iter()
         .filter_map(|name| roles.get(name))
         .any(|role| role.databases().any(|k| k == key))
   }

   /// Keys with an open connection, sorted
   pub async fn open_databases(&self) -> Vec<String> {
      let mut keys: Vec<String> = self.connections.read().await.keys().cloned().collect();
      keys.sort();
      keys
   }

   pub async fn is_open(&self, key: &str) -> bool {
      self
         .connections
         .read()
         .await
         .get(key)
         .is_some_and(|handle| handle.is_open())
   }

   /// Open (creating if needed) the default database
   pub async fn initialize(&self) -> Result<()> {
      let _guard = self.reconcile.lock().await;
      self.ensure_default_open().await
   }

   /// Create the database file for `key` if it does not exist yet.
   ///
   /// The connection used for creation is closed again; role changes decide
   /// when the database is actually opened. Returns whether a file was created.
   pub async fn provision(&self, key: &str) -> Result<bool> {
      let _guard = self.reconcile.lock().await;

      if self.factory.exists(key).await? {
         return Ok(false);
      }

      let handle = self.factory.create_new(key).await?;
      handle.close().await?;
      info!("Provisioned database '{}'", key);
      Ok(true)
   }

   /// Replace the active role set and reconcile open connections.
   ///
   /// Newly wanted databases are opened before stale ones are closed. If any
   /// required database fails to open, connections opened by this call are
   /// closed again, the previous roles stay active and an aggregate error
   /// naming every failed key is returned. Optional databases that fail are
   /// only logged.
   pub async fn set_active_roles<I, S>(&self, roles: I) -> Result<()>
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      let roles: Vec<String> = roles
         .into_iter()
         .map(Into::into)
         .collect::<IndexSet<_>>()
         .into_iter()
         .collect();

      {
         let registered = self.roles.read();
         if let Some(unknown) = roles.iter().find(|r| !registered.contains_key(*r)) {
            return Err(Error::UnknownRole(unknown.clone()));
         }
      }

      let _guard = self.reconcile.lock().await;
      self.reconcile(roles).await
   }

   /// Return the open handle for `key`.
   ///
   /// Fails with an access error if the active roles do not grant `key`, or a
   /// not-connected error if no open connection exists.
   pub async fn get(&self, key: &str) -> Result<Arc<ConnectionHandle>> {
      if !self.has_access(key) {
         return Err(Error::AccessDenied(key.to_string()));
      }
      self.open_handle(key).await
   }

   /// Like [`get`](Self::get), but opens the database on demand.
   ///
   /// Opening fails with a resource error once
   /// [`max_connections`](ManagerConfig::max_connections) connections are open.
   pub async fn get_lazy(&self, key: &str) -> Result<Arc<ConnectionHandle>> {
      if !self.has_access(key) {
         return Err(Error::AccessDenied(key.to_string()));
      }
      if let Ok(handle) = self.open_handle(key).await {
         return Ok(handle);
      }

      let _guard = self.reconcile.lock().await;

      // Roles may have changed while waiting
      if !self.has_access(key) {
         return Err(Error::AccessDenied(key.to_string()));
      }
      if let Ok(handle) = self.open_handle(key).await {
         return Ok(handle);
      }

      let open = self.connections.read().await.len();
      if open >= self.config.max_connections {
         warn!(
            "Refusing to open '{}': {} of {} connections in use",
            key, open, self.config.max_connections
         );
         return Err(Error::ResourceExhausted {
            key: key.to_string(),
            max: self.config.max_connections,
         });
      }

      let handle = self.factory.open_existing(key).await?;
      self
         .connections
         .write()
         .await
         .insert(key.to_string(), Arc::clone(&handle));

      debug!("Lazily opened database '{}'", key);
      Ok(handle)
   }

   /// Close one database regardless of roles.
   ///
   /// Returns whether a connection was open.
   pub async fn close_database(&self, key: &str) -> Result<bool> {
      let _guard = self.reconcile.lock().await;

      let Some(handle) = self.connections.write().await.remove(key) else {
         return Ok(false);
      };
      handle.close().await?;
      debug!("Closed database '{}'", key);
      Ok(true)
   }

   /// React to an application lifecycle transition
   pub async fn handle_lifecycle_event(&self, event: AppLifecycleEvent) -> Result<()> {
      match event {
         AppLifecycleEvent::Background => {
            self.suspend().await;
            Ok(())
         }
         AppLifecycleEvent::Active => self.resume().await,
         AppLifecycleEvent::Inactive => Ok(()),
      }
   }

   /// Close every connection (default included). Active roles are retained so
   /// [`resume`](Self::resume) can restore the same set.
   pub async fn suspend(&self) {
      let _guard = self.reconcile.lock().await;

      let handles: Vec<_> = self.connections.write().await.drain().collect();
      let count = handles.len();
      close_all(handles).await;

      info!("Suspended: closed {} database(s)", count);
   }

   /// Reopen the default database, then every database the retained roles grant
   pub async fn resume(&self) -> Result<()> {
      let _guard = self.reconcile.lock().await;

      self.ensure_default_open().await?;
      let roles = self.active_roles();
      self.reconcile(roles).await?;

      info!("Resumed with role(s) {:?}", self.active_roles());
      Ok(())
   }

   /// Close every non-default connection and clear the active roles
   pub async fn logout(&self) {
      let _guard = self.reconcile.lock().await;

      let handles: Vec<_> = {
         let mut connections = self.connections.write().await;
         let keys: Vec<String> = connections
            .keys()
            .filter(|k| **k != self.config.default_database)
            .cloned()
            .collect();
         keys
            .into_iter()
            .filter_map(|k| connections.remove(&k).map(|h| (k, h)))
            .collect()
      };
      let count = handles.len();
      close_all(handles).await;

      self.active_roles.write().clear();
      info!("Logged out: closed {} database(s)", count);
   }

   /// Run `callback` with a transaction open on every listed database.
   ///
   /// All databases must be granted and already open. Transactions begin on
   /// every handle before the callback runs; on success each is committed, on
   /// any failure the transactions this call began and did not commit are
   /// rolled back. A database already inside another caller's transaction
   /// fails the call without touching that transaction.
   ///
   /// Commits are independent per file, so a failure after some commits have
   /// succeeded leaves those committed.
   pub async fn execute_cross_database_transaction<F, Fut, T>(
      &self,
      keys: &[&str],
      callback: F,
   ) -> Result<T>
   where
      F: FnOnce(TransactionHandles) -> Fut,
      Fut: Future<Output = Result<T>>,
   {
      let keys: IndexSet<&str> = keys.iter().copied().collect();
      if keys.is_empty() {
         return Err(Error::Validation(
            "cross-database transaction needs at least one database".to_string(),
         ));
      }

      let mut handles = TransactionHandles::new();
      for key in &keys {
         handles.insert(key.to_string(), self.get(key).await?);
      }

      let transaction_id = uuid::Uuid::new_v4();
      let begun = join_all(handles.values().map(|h| h.begin_transaction())).await;

      // Only transactions this call began are ours to roll back
      let mut owned = TransactionHandles::new();
      let mut begin_error = None;
      for ((key, handle), result) in handles.iter().zip(begun) {
         match result {
            Ok(()) => {
               owned.insert(key.clone(), Arc::clone(handle));
            }
            Err(e) => {
               begin_error.get_or_insert(e);
            }
         }
      }
      if let Some(e) = begin_error {
         rollback_owned(&owned).await;
         return Err(e.into());
      }
      debug!("Cross-database transaction {} started on {:?}", transaction_id, keys);

      let result = match callback(handles.clone()).await {
         Ok(value) => {
            let committed = join_all(handles.values().map(|h| h.commit())).await;
            let mut commit_error = None;
            for ((key, _), result) in handles.iter().zip(committed) {
               match result {
                  Ok(()) => {
                     owned.shift_remove(key);
                  }
                  Err(e) => {
                     commit_error.get_or_insert(e);
                  }
               }
            }
            match commit_error {
               None => Ok(value),
               Some(e) => Err(e.into()),
            }
         }
         Err(e) => Err(e),
      };

      match result {
         Ok(value) => {
            debug!("Cross-database transaction {} committed", transaction_id);
            Ok(value)
         }
         Err(e) => {
            error!("Cross-database transaction {} failed: {}", transaction_id, e);
            match rollback_owned(&owned).await {
               None => Err(e),
               Some(rollback_error) => Err(Error::TransactionRollbackFailed {
                  transaction_error: Box::new(e),
                  rollback_error,
               }),
            }
         }
      }
   }

   async fn open_handle(&self, key: &str) -> Result<Arc<ConnectionHandle>> {
      self
         .connections
         .read()
         .await
         .get(key)
         .filter(|h| h.is_open())
         .cloned()
         .ok_or_else(|| Error::NotConnected(key.to_string()))
   }

   async fn ensure_default_open(&self) -> Result<()> {
      let key = self.config.default_database.clone();
      if self.open_handle(&key).await.is_ok() {
         return Ok(());
      }

      let handle = self.factory.open_or_create(&key).await?;
      self.connections.write().await.insert(key, handle);
      Ok(())
   }

   /// Keys granted by `roles` (required first), plus the default database
   fn wanted_for(&self, roles: &[String]) -> IndexSet<String> {
      let registered = self.roles.read();
      let mut wanted = IndexSet::new();
      wanted.insert(self.config.default_database.clone());
      for role in roles.iter().filter_map(|name| registered.get(name)) {
         wanted.extend(role.required.iter().cloned());
      }
      for role in roles.iter().filter_map(|name| registered.get(name)) {
         wanted.extend(role.optional.iter().cloned());
      }
      wanted
   }

   fn required_for(&self, roles: &[String]) -> IndexSet<String> {
      let registered = self.roles.read();
      let mut required: IndexSet<String> = roles
         .iter()
         .filter_map(|name| registered.get(name))
         .flat_map(|role| role.required.iter().cloned())
         .collect();
      required.insert(self.config.default_database.clone());
      required
   }

   /// Converge open connections onto `roles`. Caller holds the reconcile lock.
   async fn reconcile(&self, roles: Vec<String>) -> Result<()> {
      let wanted = self.wanted_for(&roles);
      let required = self.required_for(&roles);

      let to_open: Vec<String> = {
         let connections = self.connections.read().await;
         wanted
            .iter()
            .filter(|k| !connections.get(*k).is_some_and(|h| h.is_open()))
            .cloned()
            .collect()
      };

      let results = join_all(to_open.into_iter().map(|key| async move {
         let result = self.factory.open_existing(&key).await;
         (key, result)
      }))
      .await;

      let mut opened = Vec::new();
      let mut failures = Vec::new();
      for (key, result) in results {
         match result {
            Ok(handle) => opened.push((key, handle)),
            Err(e) if required.contains(&key) => {
               error!("Required database '{}' failed to open: {}", key, e);
               failures.push(Failure::new(key, &e));
            }
            Err(e) => warn!("Optional database '{}' failed to open: {}", key, e),
         }
      }

      if !failures.is_empty() {
         close_all(opened).await;
         return Err(Error::RequiredDatabasesUnavailable(failures));
      }

      let stale: Vec<(String, Arc<ConnectionHandle>)> = {
         let mut connections = self.connections.write().await;
         for (key, handle) in opened {
            connections.insert(key, handle);
         }
         let stale_keys: Vec<String> = connections
            .keys()
            .filter(|k| !wanted.contains(*k))
            .cloned()
            .collect();
         stale_keys
            .into_iter()
            .filter_map(|k| connections.remove(&k).map(|h| (k, h)))
            .collect()
      };
      close_all(stale).await;

      info!("Active roles now {:?}", roles);
      *self.active_roles.write() = roles;
      Ok(())
   }
}

/// Close handles in parallel, logging failures
async fn close_all(handles: Vec<(String, Arc<ConnectionHandle>)>) {
   let results = join_all(handles.into_iter().map(|(key, handle)| async move {
      let result = handle.close().await;
      (key, result)
   }))
   .await;

   for (key, result) in results {
      match result {
         Ok(()) => debug!("Closed database '{}'", key),
         Err(e) => warn!("Error closing database '{}': {}", key, e),
      }
   }
}

/// Roll back every handle still in a transaction. Returns the combined
/// rollback failures, if any.
/// Roll back `handles` that are still inside a transaction; returns joined failure messages
async fn rollback_owned(handles: &TransactionHandles) -> Option<String> {
   let results = join_all(
      handles
         .iter()
         .filter(|(_, h)| h.in_transaction())
         .map(|(key, h)| async move { (key, h.rollback().await) }),
   )
   .await;

   let failures: Vec<String> = results
      .into_iter()
      .filter_map(|(key, result)| {
         result.err().map(|e| {
            error!("Rollback failed for '{}': {}", key, e);
            format!("{}: {}", key, e)
         })
      })
      .collect();

   if failures.is_empty() {
      None
   } else {
      Some(failures.join("; "))
   }
}
