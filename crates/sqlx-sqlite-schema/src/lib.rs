//! # sqlx-sqlite-schema
//!
//! Declarative schema input for SQLite databases and the DDL it turns into.
//!
//! ## Core Types
//!
//! - **[`SchemaDeclaration`]**: One logical database: version, physical file base name,
//!   optional type mapping and its tables
//! - **[`SchemaRegistry`]**: Immutable map from logical database key to declaration
//! - **[`ColumnConstraints`]**: Flags and DDL fragment parsed from a raw constraint string
//! - **[`SchemaDdl`]**: Ordered `CREATE TABLE` / `CREATE INDEX` statements for a declaration
//!
//! ## Usage
//!
//! ```
//! use sqlx_sqlite_schema::{SchemaDeclaration, SchemaRegistry};
//!
//! # fn main() -> sqlx_sqlite_schema::Result<()> {
//! let core = SchemaDeclaration::from_json_str(r#"{
//!    "version": "1.0.0",
//!    "database_name": "core",
//!    "schemas": {
//!       "users": {
//!          "cols": [
//!             { "name": "id", "type": "integer", "constraints": "PRIMARY KEY AUTOINCREMENT" },
//!             { "name": "email", "type": "string", "constraints": "NOT NULL UNIQUE" }
//!          ]
//!       }
//!    }
//! }"#)?;
//!
//! let registry = SchemaRegistry::new();
//! registry.register("core", core)?;
//!
//! let schema = registry.get("core")?;
//! assert_eq!(schema.file_name(), "core.db");
//! # Ok(())
//! # }
//! ```
//!
//! ## Limitations
//!
//! Column constraints are read by a whitespace keyword scanner, not a DDL grammar.
//! `CHECK` constraints, multi-token defaults and table-level composite constraints
//! cannot be expressed.

mod constraints;
mod ddl;
mod declaration;
mod error;
mod identifier;
mod registry;
mod types;

pub use constraints::ColumnConstraints;
pub use ddl::{SchemaDdl, column_definition, create_index_sql, create_table_sql};
pub use declaration::{
   ColumnDeclaration, ForeignKeyDeclaration, IndexDeclaration, SchemaDeclaration,
   TableDeclaration,
};
pub use error::Error;
pub use identifier::{is_valid_identifier, validate_identifier};
pub use registry::SchemaRegistry;
pub use types::{FALLBACK_TYPE, builtin_type, resolve_type};

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
