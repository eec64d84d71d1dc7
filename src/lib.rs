//! Role-aware SQLite connection orchestration for offline-first apps.
//!
//! One app keeps several SQLite files on the device, one per logical
//! database. Which of them are open is decided by the signed-in user's roles:
//!
//! - [`ConnectionFactory`] turns a registered schema into an open connection,
//!   creating and materializing the file when asked to
//! - [`ConnectionManager`] keeps the open set equal to what the active roles
//!   grant plus the default database, and closes everything while the app is
//!   in the background
//! - [`TableService`] is a per-table CRUD facade that emits events
//! - [`ServiceRegistry`] hands out one shared service per table
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use sqlx_sqlite_roles::{
//!    ConnectionManager, ManagerConfig, RoleDeclaration, SchemaConfig, ServiceRegistry, TableConfig,
//! };
//! use sqlx_sqlite_schema::SchemaRegistry;
//!
//! # async fn example(core_schema: &str, default_schema: &str) -> sqlx_sqlite_roles::Result<()> {
//! let schemas = Arc::new(SchemaRegistry::new());
//! schemas.register_json("default", default_schema)?;
//! schemas.register_json("core", core_schema)?;
//!
//! let manager = Arc::new(ConnectionManager::new(schemas, ManagerConfig::new("/data/app")));
//! manager.initialize().await?;
//! manager.provision("core").await?;
//!
//! manager.register_role(RoleDeclaration::new("staff").required(["core"]));
//! manager.set_active_roles(["staff"]).await?;
//!
//! let registry = ServiceRegistry::new(Arc::clone(&manager));
//! registry.register_schema(SchemaConfig::new("core").table(TableConfig::new("users")))?;
//!
//! let users = registry.get_service("core", "users").await?;
//! users.create(json!({"username": "ada", "email": "ada@example.com"})).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod factory;
mod lifecycle;
mod manager;
mod registry;
mod roles;
mod service;
mod validation;

pub use config::ManagerConfig;
pub use error::{Error, ErrorKind, Failure, Result};
pub use events::{EventHandler, EventHub, EventKind, HandlerError, ServiceEvent};
pub use factory::ConnectionFactory;
pub use lifecycle::{AppLifecycleEvent, spawn_lifecycle_listener};
pub use manager::{ConnectionManager, TransactionHandles};
pub use registry::{
   BatchReport, RegistryHealth, RegistryStatus, SchemaConfig, SchemaStatus, SchemaTransaction,
   ServiceRegistry, TableConfig,
};
pub use roles::RoleDeclaration;
pub use service::{FindOptions, HealthStatus, TableService};
pub use validation::{ObjectValidator, RecordValidator, RequiredFields, WriteOperation};

// Re-export the layers callers interact with directly
pub use sqlx_sqlite_conn_mgr::SqliteDatabaseConfig;
pub use sqlx_sqlite_schema::{SchemaDeclaration, SchemaRegistry};
pub use sqlx_sqlite_toolkit::{ConnectionHandle, OrderBy, Record, SortDirection, WriteQueryResult};
