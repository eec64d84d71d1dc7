use sqlx_sqlite_schema::{Error, SchemaDdl, SchemaDeclaration, SchemaRegistry};

const CRM: &str = r#"{
   "version": "4.2.1",
   "database_name": "crm.sqlite3",
   "type_mapping": { "money": "INTEGER" },
   "schemas": {
      "accounts": {
         "cols": [
            { "name": "id", "type": "uuid", "constraints": "PRIMARY KEY" },
            { "name": "name", "type": "string", "constraints": "not null" },
            { "name": "balance", "type": "MONEY", "constraints": "DEFAULT 0" },
            { "name": "meta", "type": "json" }
         ],
         "indexes": [
            { "columns": ["name"], "unique": true }
         ]
      },
      "contacts": {
         "cols": [
            { "name": "id", "type": "integer", "constraints": "PRIMARY KEY AUTOINCREMENT" },
            { "name": "account_id", "type": "uuid", "constraints": "NOT NULL" },
            { "name": "email", "type": "email", "constraints": "UNIQUE" }
         ],
         "indexes": [
            { "name": "contacts_by_account", "columns": ["account_id", "email"] }
         ],
         "foreign_keys": [
            {
               "column": "account_id",
               "references": { "table": "accounts", "column": "id" },
               "on_delete": "cascade",
               "on_update": "no action"
            }
         ]
      }
   }
}"#;

#[test]
fn test_full_document_to_ddl() {
   let schema = SchemaDeclaration::from_json_str(CRM).unwrap();

   assert_eq!(schema.file_name(), "crm.sqlite3");
   assert_eq!(schema.user_version(), Some(4));
   assert_eq!(schema.table_names().collect::<Vec<_>>(), vec!["accounts", "contacts"]);

   let ddl = SchemaDdl::for_schema(&schema);
   assert_eq!(
      ddl.tables,
      vec![
         "CREATE TABLE IF NOT EXISTS accounts (id TEXT PRIMARY KEY, name TEXT NOT NULL, \
          balance INTEGER DEFAULT 0, meta TEXT)",
         "CREATE TABLE IF NOT EXISTS contacts (id INTEGER PRIMARY KEY AUTOINCREMENT, \
          account_id TEXT NOT NULL, email TEXT UNIQUE, \
          FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE ON UPDATE NO ACTION)",
      ]
   );
   assert_eq!(
      ddl.indexes,
      vec![
         "CREATE UNIQUE INDEX IF NOT EXISTS idx_accounts_name ON accounts (name)",
         "CREATE INDEX IF NOT EXISTS contacts_by_account ON contacts (account_id, email)",
      ]
   );

   // Tables always precede indexes
   let statements: Vec<_> = ddl.statements().collect();
   assert_eq!(statements.len(), 4);
   assert!(statements[..2].iter().all(|s| s.starts_with("CREATE TABLE")));
}

#[test]
fn test_registry_holds_one_declaration_per_key() {
   let registry = SchemaRegistry::new();
   registry.register_json("crm", CRM).unwrap();

   let err = registry.register_json("crm", CRM).unwrap_err();
   assert!(matches!(err, Error::AlreadyRegistered(_)));

   assert!(registry.contains("crm"));
   assert_eq!(registry.get("crm").unwrap().version, "4.2.1");
   assert!(matches!(registry.get("other"), Err(Error::NotFound(_))));
}

#[test]
fn test_rejects_unsafe_names() {
   let hostile = CRM.replace("\"contacts\": {", "\"contacts; DROP TABLE accounts\": {");
   let err = SchemaDeclaration::from_json_str(&hostile).unwrap_err();
   assert!(matches!(err, Error::InvalidIdentifier(_)));
}
