mod common;

use std::sync::Arc;

use serde_json::{Value as JsonValue, json};
use sqlx_sqlite_roles::{
   Error, ErrorKind, RequiredFields, SchemaConfig, ServiceRegistry, TableConfig,
};
use tempfile::TempDir;

async fn registry(dir: &TempDir) -> ServiceRegistry {
   let manager = common::manager(dir).await;
   manager.set_active_roles(["analyst"]).await.unwrap();

   let registry = ServiceRegistry::new(manager);
   registry
      .register_schemas([
         SchemaConfig::new("core")
            .table(TableConfig::new("users").validator(Arc::new(RequiredFields::new(["email"]))))
            .table(TableConfig::new("posts")),
         SchemaConfig::new("analytics").table(TableConfig::new("events").auto_init(true)),
      ])
      .unwrap();
   registry
}

#[tokio::test]
async fn test_get_service_returns_same_instance() {
   let dir = TempDir::new().unwrap();
   let registry = registry(&dir).await;

   let first = registry.get_service("core", "users").await.unwrap();
   let second = registry.create_service("core", "users").await.unwrap();
   assert!(Arc::ptr_eq(&first, &second));

   let existing = registry.get_existing_service("core", "users").unwrap();
   assert!(Arc::ptr_eq(&first, &existing));
   assert!(registry.get_existing_service("core", "posts").is_none());

   // Table settings flow into the service
   let err = first.create(json!({"username": "ada"})).await.unwrap_err();
   assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_unregistered_schema_or_table() {
   let dir = TempDir::new().unwrap();
   let registry = registry(&dir).await;

   let err = registry.get_service("billing", "invoices").await.unwrap_err();
   assert_eq!(err.kind(), ErrorKind::NotFound);

   let err = registry.get_service("core", "comments").await.unwrap_err();
   assert_eq!(err.kind(), ErrorKind::NotFound);
   assert!(err.to_string().contains("comments"));
}

#[tokio::test]
async fn test_register_schema_validation() {
   let dir = TempDir::new().unwrap();
   let registry = registry(&dir).await;

   let err = registry.register_schema(SchemaConfig::new("empty")).unwrap_err();
   assert_eq!(err.kind(), ErrorKind::Validation);

   let err = registry
      .register_schema(SchemaConfig::new("").table(TableConfig::new("t")))
      .unwrap_err();
   assert_eq!(err.kind(), ErrorKind::Validation);

   let err = registry
      .register_schema(
         SchemaConfig::new("core").table(TableConfig::new("users").primary_key(Vec::<String>::new())),
      )
      .unwrap_err();
   assert_eq!(err.kind(), ErrorKind::Validation);

   assert_eq!(registry.registered_schemas(), vec!["core", "analytics"]);
}

#[tokio::test]
async fn test_auto_init_and_status() {
   let dir = TempDir::new().unwrap();
   let registry = registry(&dir).await;

   let events = registry.get_service("analytics", "events").await.unwrap();
   assert!(events.is_initialized());

   let users = registry.get_service("core", "users").await.unwrap();
   assert!(!users.is_initialized());

   let status = registry.get_status();
   assert_eq!(status.total_services, 2);
   assert_eq!(status.initialized_services, 1);
   assert_eq!(status.schemas.len(), 2);
   assert_eq!(status.schemas[0].name, "core");
   assert_eq!(status.schemas[0].tables, vec!["users", "posts"]);
   assert_eq!(status.schemas[0].services, 1);
   assert_eq!(status.schemas[0].initialized, 0);

   // Health probing does not initialize anything
   let health = registry.health_check().await;
   assert!(!health.healthy);
   assert_eq!(health.services.len(), 2);
   assert!(!users.is_initialized());

   let report = registry.init_all_services().await;
   assert!(report.is_success());
   assert_eq!(report.succeeded.len(), 2);
   assert!(registry.health_check().await.healthy);
}

#[tokio::test]
async fn test_init_all_reports_failures() {
   let dir = TempDir::new().unwrap();
   let registry = registry(&dir).await;

   let users = registry.get_service("core", "users").await.unwrap();
   registry.manager().set_active_roles(["guest"]).await.unwrap();

   let report = registry.init_all_services().await;
   assert!(!report.is_success());
   assert_eq!(report.failed[0].key, "core:users");
   assert!(!users.is_initialized());
}

#[tokio::test]
async fn test_schema_transaction_commits_across_tables() {
   let dir = TempDir::new().unwrap();
   let registry = registry(&dir).await;
   let users = registry.get_service("core", "users").await.unwrap();
   let posts = registry.get_service("core", "posts").await.unwrap();

   registry
      .execute_schema_transaction("core", |tx| async move {
         let author = tx.services["users"]
            .create(json!({"username": "ada", "email": "ada@example.com"}))
            .await?;
         tx.services["posts"]
            .create(json!({"user_id": author["id"], "title": "Notes"}))
            .await?;
         Ok::<_, Error>(())
      })
      .await
      .unwrap();

   assert_eq!(users.count(JsonValue::Null).await.unwrap(), 1);
   assert_eq!(posts.count(JsonValue::Null).await.unwrap(), 1);
}

#[tokio::test]
async fn test_schema_transaction_rolls_back_across_tables() {
   let dir = TempDir::new().unwrap();
   let registry = registry(&dir).await;
   let users = registry.get_service("core", "users").await.unwrap();
   let posts = registry.get_service("core", "posts").await.unwrap();

   let err = registry
      .execute_schema_transaction("core", |tx| async move {
         let author = tx.services["users"]
            .create(json!({"username": "ada", "email": "ada@example.com"}))
            .await?;
         tx.services["posts"]
            .create(json!({"user_id": author["id"], "title": "Notes"}))
            .await?;
         // Violates the users.id foreign key
         tx.handle
            .execute(
               "INSERT INTO posts (user_id, title) VALUES (?, ?)",
               vec![json!(999), json!("Orphan")],
            )
            .await?;
         Ok::<_, Error>(())
      })
      .await
      .unwrap_err();
   assert_eq!(err.kind(), ErrorKind::Engine);

   assert_eq!(users.count(JsonValue::Null).await.unwrap(), 0);
   assert_eq!(posts.count(JsonValue::Null).await.unwrap(), 0);
}

#[tokio::test]
async fn test_schema_transaction_needs_services() {
   let dir = TempDir::new().unwrap();
   let registry = registry(&dir).await;

   let err = registry
      .execute_schema_transaction("core", |_| async { Ok::<_, Error>(()) })
      .await
      .unwrap_err();
   assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_remove_and_close_all() {
   let dir = TempDir::new().unwrap();
   let registry = registry(&dir).await;

   let users = registry.get_service("core", "users").await.unwrap();
   registry.get_service("core", "posts").await.unwrap();
   registry.get_service("analytics", "events").await.unwrap();
   assert_eq!(registry.get_services_for_schema("core").len(), 2);

   assert!(registry.remove_service("core", "users").await);
   assert!(!registry.remove_service("core", "users").await);
   assert!(!users.is_initialized());

   let replacement = registry.get_service("core", "users").await.unwrap();
   assert!(!Arc::ptr_eq(&users, &replacement));

   let report = registry.close_all_services().await;
   assert_eq!(report.succeeded.len(), 3);
   assert_eq!(registry.get_status().total_services, 0);
   assert!(registry.get_existing_service("analytics", "events").is_none());

   // Connections stay with the manager
   assert!(registry.manager().is_open("analytics").await);
}
