//! DDL generation for schema declarations

use indexmap::IndexMap;

use crate::declaration::{ColumnDeclaration, IndexDeclaration, SchemaDeclaration, TableDeclaration};
use crate::types::resolve_type;

/// `name TYPE [constraints]` for one column
pub fn column_definition(
   column: &ColumnDeclaration,
   type_mapping: Option<&IndexMap<String, String>>,
) -> String {
   let sqlite_type = resolve_type(&column.column_type, type_mapping);
   let constraints = column.parsed_constraints().to_sql();

   if constraints.is_empty() {
      format!("{} {}", column.name, sqlite_type)
   } else {
      format!("{} {} {}", column.name, sqlite_type, constraints)
   }
}

/// `CREATE TABLE IF NOT EXISTS` with columns followed by inline foreign key clauses
pub fn create_table_sql(
   name: &str,
   table: &TableDeclaration,
   type_mapping: Option<&IndexMap<String, String>>,
) -> String {
   let mut definitions: Vec<String> = table
      .columns
      .iter()
      .map(|column| column_definition(column, type_mapping))
      .collect();

   for fk in &table.foreign_keys {
      let mut clause = format!(
         "FOREIGN KEY ({}) REFERENCES {}({})",
         fk.column, fk.references.table, fk.references.column
      );
      if let Some(action) = &fk.on_delete {
         clause.push_str(&format!(" ON DELETE {}", action.to_ascii_uppercase()));
      }
      if let Some(action) = &fk.on_update {
         clause.push_str(&format!(" ON UPDATE {}", action.to_ascii_uppercase()));
      }
      definitions.push(clause);
   }

   format!(
      "CREATE TABLE IF NOT EXISTS {} ({})",
      name,
      definitions.join(", ")
   )
}

/// `CREATE [UNIQUE] INDEX IF NOT EXISTS`
pub fn create_index_sql(table: &str, index: &IndexDeclaration) -> String {
   format!(
      "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
      if index.unique { "UNIQUE " } else { "" },
      index.resolved_name(table),
      table,
      index.columns.join(", ")
   )
}

/// Every statement needed to materialize a schema.
///
/// Indexes come after all tables since an index may be declared on a table
/// that appears later in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDdl {
   pub tables: Vec<String>,
   pub indexes: Vec<String>,
}

impl SchemaDdl {
   pub fn for_schema(schema: &SchemaDeclaration) -> Self {
      let mapping = schema.type_mapping.as_ref();

      let tables = schema
         .tables
         .iter()
         .map(|(name, table)| create_table_sql(name, table, mapping))
         .collect();

      let indexes = schema
         .tables
         .iter()
         .flat_map(|(name, table)| {
            table
               .indexes
               .iter()
               .map(move |index| create_index_sql(name, index))
         })
         .collect();

      Self { tables, indexes }
   }

   /// Tables first, then indexes
   pub fn statements(&self) -> impl Iterator<Item = &str> {
      self
         .tables
         .iter()
         .chain(self.indexes.iter())
         .map(String::as_str)
   }
}
