//! Flat key/value records and their conversion into table descriptors

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::query::{ColumnValue, Condition, TableQuery};

/// A row as a column-ordered map of JSON values
pub type Record = IndexMap<String, JsonValue>;

/// Split a flat record into a write descriptor for `table`.
///
/// Every field becomes a column (its value may be JSON `null`). The WHERE list
/// holds only the fields named in `id_fields` whose value is present and not
/// null, so the same descriptor serves both inserts (no WHERE needed) and
/// updates (WHERE on the primary key).
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use sqlx_sqlite_toolkit::{Record, convert_record_to_table};
///
/// let record: Record = [("id".to_string(), json!(7)), ("name".to_string(), json!("Ada"))]
///    .into_iter()
///    .collect();
///
/// let table = convert_record_to_table("users", &record, &["id"]);
/// assert_eq!(table.columns.len(), 2);
/// assert_eq!(table.where_clause.len(), 1);
/// assert_eq!(table.where_clause[0].column, "id");
/// ```
pub fn convert_record_to_table<S: AsRef<str>>(
   name: &str,
   record: &Record,
   id_fields: &[S],
) -> TableQuery {
   let columns = record
      .iter()
      .map(|(column, value)| ColumnValue {
         name: column.clone(),
         value: Some(value.clone()),
      })
      .collect();

   let where_clause = id_fields
      .iter()
      .filter_map(|field| {
         let field = field.as_ref();
         match record.get(field) {
            Some(value) if !value.is_null() => Some(Condition {
               column: field.to_string(),
               value: value.clone(),
            }),
            _ => None,
         }
      })
      .collect();

   TableQuery {
      name: name.to_string(),
      columns,
      where_clause,
      ..Default::default()
   }
}

/// Turn a JSON object into a [`Record`]; anything else yields `None`.
pub fn record_from_json(value: JsonValue) -> Option<Record> {
   match value {
      JsonValue::Object(map) => Some(map.into_iter().collect()),
      _ => None,
   }
}
