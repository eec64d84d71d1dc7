//! Declarative schema model and its JSON input format

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::constraints::ColumnConstraints;
use crate::error::Error;
use crate::identifier::validate_identifier;

/// File extensions recognized as already naming a SQLite database file
const DATABASE_EXTENSIONS: [&str; 3] = [".db", ".sqlite", ".sqlite3"];

/// Referential actions accepted in foreign key `ON DELETE` / `ON UPDATE` clauses
const REFERENTIAL_ACTIONS: [&str; 5] = ["CASCADE", "SET NULL", "SET DEFAULT", "RESTRICT", "NO ACTION"];

/// Schema of one logical database: one physical file, one connection when open.
///
/// Mirrors the JSON document shape:
///
/// ```json
/// {
///    "version": "1.0.0",
///    "database_name": "core",
///    "type_mapping": { "string": "TEXT" },
///    "schemas": {
///       "users": { "cols": [...], "indexes": [...], "foreign_keys": [...] }
///    }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDeclaration {
   pub version: String,

   /// Physical file base name; `.db` is appended when no database extension is present
   pub database_name: String,

   /// Generic column type keyword → SQLite type. Consulted before the built-in table.
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub type_mapping: Option<IndexMap<String, String>>,

   /// Tables in declaration order
   #[serde(rename = "schemas")]
   pub tables: IndexMap<String, TableDeclaration>,
}

/// Columns, indexes and foreign keys of one table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableDeclaration {
   #[serde(rename = "cols")]
   pub columns: Vec<ColumnDeclaration>,

   #[serde(default, skip_serializing_if = "Vec::is_empty")]
   pub indexes: Vec<IndexDeclaration>,

   #[serde(default, skip_serializing_if = "Vec::is_empty")]
   pub foreign_keys: Vec<ForeignKeyDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDeclaration {
   pub name: String,

   /// Generic type keyword (e.g. `string`, `integer`, `boolean`)
   #[serde(rename = "type")]
   pub column_type: String,

   /// Raw constraint string, e.g. `"NOT NULL UNIQUE DEFAULT 0"`
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub constraints: Option<String>,
}

impl ColumnDeclaration {
   pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
      Self {
         name: name.into(),
         column_type: column_type.into(),
         constraints: None,
      }
   }

   pub fn with_constraints(mut self, constraints: impl Into<String>) -> Self {
      self.constraints = Some(constraints.into());
      self
   }

   /// Parse the raw constraint string into flags and a DDL fragment
   pub fn parsed_constraints(&self) -> ColumnConstraints {
      self
         .constraints
         .as_deref()
         .map(ColumnConstraints::parse)
         .unwrap_or_default()
   }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDeclaration {
   /// Index name; derived from table and columns when omitted
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub name: Option<String>,

   pub columns: Vec<String>,

   #[serde(default)]
   pub unique: bool,
}

impl IndexDeclaration {
   /// The declared name, or `idx_<table>_<col1>_<col2>...`
   pub fn resolved_name(&self, table: &str) -> String {
      match &self.name {
         Some(name) => name.clone(),
         None => format!("idx_{}_{}", table, self.columns.join("_")),
      }
   }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyDeclaration {
   pub column: String,
   pub references: ForeignKeyReference,

   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub on_delete: Option<String>,

   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub on_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeyReference {
   pub table: String,
   pub column: String,
}

impl SchemaDeclaration {
   /// Parse and validate a schema document
   pub fn from_json_str(json: &str) -> Result<Self> {
      let schema: Self = serde_json::from_str(json)?;
      schema.validate()?;
      Ok(schema)
   }

   /// Parse and validate an already-decoded schema document
   pub fn from_json_value(value: serde_json::Value) -> Result<Self> {
      let schema: Self = serde_json::from_value(value)?;
      schema.validate()?;
      Ok(schema)
   }

   /// Physical file name: `database_name`, suffixed with `.db` unless it already
   /// carries a database extension.
   pub fn file_name(&self) -> String {
      let lower = self.database_name.to_ascii_lowercase();
      if DATABASE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
         self.database_name.clone()
      } else {
         format!("{}.db", self.database_name)
      }
   }

   /// Leading integer of the declared version string (`"3.1.0"` → 3), stored as
   /// SQLite's `user_version`.
   pub fn user_version(&self) -> Option<i64> {
      let digits: String = self
         .version
         .trim_start_matches(|c: char| !c.is_ascii_digit())
         .chars()
         .take_while(|c| c.is_ascii_digit())
         .collect();
      digits.parse().ok()
   }

   pub fn table(&self, name: &str) -> Option<&TableDeclaration> {
      self.tables.get(name)
   }

   pub fn table_names(&self) -> impl Iterator<Item = &str> {
      self.tables.keys().map(String::as_str)
   }

   /// Check that every name that ends up in DDL is a plain identifier and that
   /// indexes and foreign keys only mention declared columns and tables.
   pub fn validate(&self) -> Result<()> {
      if self.database_name.trim().is_empty() {
         return Err(Error::InvalidDeclaration(
            "database_name cannot be empty".to_string(),
         ));
      }

      for (table_name, table) in &self.tables {
         validate_identifier(table_name)?;

         if table.columns.is_empty() {
            return Err(Error::InvalidDeclaration(format!(
               "table '{}' declares no columns",
               table_name
            )));
         }

         for column in &table.columns {
            validate_identifier(&column.name)?;
         }

         let has_column = |name: &str| table.columns.iter().any(|c| c.name == name);

         for index in &table.indexes {
            if index.columns.is_empty() {
               return Err(Error::InvalidDeclaration(format!(
                  "index on table '{}' lists no columns",
                  table_name
               )));
            }
            validate_identifier(&index.resolved_name(table_name))?;
            for column in &index.columns {
               if !has_column(column) {
                  return Err(Error::InvalidDeclaration(format!(
                     "index on table '{}' references unknown column '{}'",
                     table_name, column
                  )));
               }
            }
         }

         for fk in &table.foreign_keys {
            if !has_column(&fk.column) {
               return Err(Error::InvalidDeclaration(format!(
                  "foreign key on table '{}' uses unknown column '{}'",
                  table_name, fk.column
               )));
            }
            validate_identifier(&fk.references.table)?;
            validate_identifier(&fk.references.column)?;
            if !self.tables.contains_key(&fk.references.table) {
               return Err(Error::InvalidDeclaration(format!(
                  "foreign key on table '{}' references undeclared table '{}'",
                  table_name, fk.references.table
               )));
            }
            for action in [&fk.on_delete, &fk.on_update].into_iter().flatten() {
               if !REFERENTIAL_ACTIONS.contains(&action.to_ascii_uppercase().as_str()) {
                  return Err(Error::InvalidDeclaration(format!(
                     "foreign key on table '{}' uses unsupported action '{}'",
                     table_name, action
                  )));
               }
            }
         }
      }

      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   fn schema(database_name: &str, version: &str) -> SchemaDeclaration {
      SchemaDeclaration {
         version: version.to_string(),
         database_name: database_name.to_string(),
         type_mapping: None,
         tables: IndexMap::new(),
      }
   }

   #[test]
   fn test_file_name_appends_extension() {
      assert_eq!(schema("core", "1").file_name(), "core.db");
      assert_eq!(schema("core.db", "1").file_name(), "core.db");
      assert_eq!(schema("cache.sqlite3", "1").file_name(), "cache.sqlite3");
      assert_eq!(schema("Core.DB", "1").file_name(), "Core.DB");
   }

   #[test]
   fn test_user_version_from_version_string() {
      assert_eq!(schema("a", "3.1.0").user_version(), Some(3));
      assert_eq!(schema("a", "v12").user_version(), Some(12));
      assert_eq!(schema("a", "beta").user_version(), None);
   }

   #[test]
   fn test_parse_document() {
      let schema = SchemaDeclaration::from_json_value(json!({
         "version": "2.0.0",
         "database_name": "analytics",
         "type_mapping": { "string": "VARCHAR(255)" },
         "schemas": {
            "events": {
               "cols": [
                  { "name": "id", "type": "integer", "constraints": "PRIMARY KEY AUTOINCREMENT" },
                  { "name": "name", "type": "string" }
               ],
               "indexes": [ { "columns": ["name"] } ]
            },
            "event_tags": {
               "cols": [
                  { "name": "event_id", "type": "integer" },
                  { "name": "tag", "type": "string" }
               ],
               "foreign_keys": [
                  { "column": "event_id", "references": { "table": "events", "column": "id" }, "on_delete": "CASCADE" }
               ]
            }
         }
      }))
      .unwrap();

      assert_eq!(
         schema.table_names().collect::<Vec<_>>(),
         vec!["events", "event_tags"]
      );
      let events = schema.table("events").unwrap();
      assert_eq!(events.indexes[0].resolved_name("events"), "idx_events_name");
      assert!(events.columns[0].parsed_constraints().primary_key);
   }

   #[test]
   fn test_rejects_unknown_index_column() {
      let err = SchemaDeclaration::from_json_value(json!({
         "version": "1",
         "database_name": "core",
         "schemas": {
            "users": {
               "cols": [ { "name": "id", "type": "integer" } ],
               "indexes": [ { "columns": ["email"] } ]
            }
         }
      }))
      .unwrap_err();

      assert_eq!(err.error_code(), "INVALID_SCHEMA");
      assert!(err.to_string().contains("email"));
   }

   #[test]
   fn test_rejects_unsafe_table_name() {
      let err = SchemaDeclaration::from_json_value(json!({
         "version": "1",
         "database_name": "core",
         "schemas": { "users; DROP": { "cols": [ { "name": "id", "type": "integer" } ] } }
      }))
      .unwrap_err();

      assert_eq!(err.error_code(), "INVALID_IDENTIFIER");
   }

   #[test]
   fn test_rejects_unknown_referential_action() {
      let err = SchemaDeclaration::from_json_value(json!({
         "version": "1",
         "database_name": "core",
         "schemas": {
            "a": { "cols": [ { "name": "id", "type": "integer" } ] },
            "b": {
               "cols": [ { "name": "a_id", "type": "integer" } ],
               "foreign_keys": [
                  { "column": "a_id", "references": { "table": "a", "column": "id" }, "on_update": "EXPLODE" }
               ]
            }
         }
      }))
      .unwrap_err();

      assert!(err.to_string().contains("EXPLODE"));
   }
}
