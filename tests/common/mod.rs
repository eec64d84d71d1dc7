#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use sqlx_sqlite_roles::{ConnectionManager, ManagerConfig, RoleDeclaration, SchemaRegistry};
use tempfile::TempDir;

pub fn schemas() -> Arc<SchemaRegistry> {
   let registry = Arc::new(SchemaRegistry::new());

   registry
      .register_json(
         "default",
         &json!({
            "version": "1.0.0",
            "database_name": "app",
            "schemas": {
               "settings": {
                  "cols": [
                     {"name": "key", "type": "string", "constraints": "PRIMARY KEY"},
                     {"name": "value", "type": "string"}
                  ]
               }
            }
         })
         .to_string(),
      )
      .unwrap();

   registry
      .register_json(
         "core",
         &json!({
            "version": "1.2.0",
            "database_name": "core",
            "schemas": {
               "users": {
                  "cols": [
                     {"name": "id", "type": "integer", "constraints": "PRIMARY KEY AUTOINCREMENT"},
                     {"name": "username", "type": "string", "constraints": "NOT NULL"},
                     {"name": "email", "type": "string", "constraints": "NOT NULL UNIQUE"},
                     {"name": "active", "type": "boolean", "constraints": "DEFAULT 1"}
                  ],
                  "indexes": [{"columns": ["username"]}]
               },
               "posts": {
                  "cols": [
                     {"name": "id", "type": "integer", "constraints": "PRIMARY KEY AUTOINCREMENT"},
                     {"name": "user_id", "type": "integer", "constraints": "NOT NULL"},
                     {"name": "title", "type": "string", "constraints": "NOT NULL"}
                  ],
                  "foreign_keys": [{
                     "column": "user_id",
                     "references": {"table": "users", "column": "id"},
                     "on_delete": "CASCADE"
                  }]
               }
            }
         })
         .to_string(),
      )
      .unwrap();

   registry
      .register_json(
         "analytics",
         &json!({
            "version": "1.0.0",
            "database_name": "analytics.sqlite",
            "schemas": {
               "events": {
                  "cols": [
                     {"name": "id", "type": "integer", "constraints": "PRIMARY KEY AUTOINCREMENT"},
                     {"name": "name", "type": "string", "constraints": "NOT NULL"}
                  ]
               }
            }
         })
         .to_string(),
      )
      .unwrap();

   registry
      .register_json(
         "billing",
         &json!({
            "version": "1.0.0",
            "database_name": "billing",
            "schemas": {
               "invoices": {
                  "cols": [
                     {"name": "id", "type": "integer", "constraints": "PRIMARY KEY AUTOINCREMENT"},
                     {"name": "amount", "type": "float", "constraints": "NOT NULL"}
                  ]
               }
            }
         })
         .to_string(),
      )
      .unwrap();

   registry
}

pub fn config(dir: &TempDir) -> ManagerConfig {
   ManagerConfig::new(dir.path())
}

/// Manager with the default database open and `staff` (core) and `analyst`
/// (core + optional analytics) roles registered. `core` and `analytics` files
/// exist; `billing` does not.
pub async fn manager_with(dir: &TempDir, config: ManagerConfig) -> Arc<ConnectionManager> {
   let manager = Arc::new(ConnectionManager::new(schemas(), config));
   manager.initialize().await.unwrap();
   manager.provision("core").await.unwrap();
   manager.provision("analytics").await.unwrap();

   manager.register_roles([
      RoleDeclaration::new("staff").required(["core"]),
      RoleDeclaration::new("analyst")
         .required(["core"])
         .optional(["analytics"])
         .priority(1),
      RoleDeclaration::new("accountant").required(["core", "billing"]),
      RoleDeclaration::new("guest"),
   ]);

   assert!(dir.path().join("app.db").exists());
   manager
}

pub async fn manager(dir: &TempDir) -> Arc<ConnectionManager> {
   manager_with(dir, config(dir)).await
}
