//! Declarative table descriptors and the SQL they build
//!
//! A [`TableQuery`] names a table plus optional columns, equality conditions
//! (joined with `AND`), ordering, and `LIMIT`/`OFFSET`. Building it yields SQL
//! text with `?` placeholders and the matching positional parameters. Values
//! (including limit and offset) are only ever bound, never formatted into the
//! SQL; identifiers are checked with [`validate_identifier`] before use.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx_sqlite_schema::validate_identifier;

use crate::{Error, Result};

/// Column of a table descriptor.
///
/// `value: None` means "not provided": the column is selected by name or
/// skipped by writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnValue {
   pub name: String,
   #[serde(default, skip_serializing_if = "Option::is_none")]
   pub value: Option<JsonValue>,
}

/// `column = ?` condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
   pub column: String,
   pub value: JsonValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
   #[default]
   Asc,
   Desc,
}

impl fmt::Display for SortDirection {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         SortDirection::Asc => f.write_str("ASC"),
         SortDirection::Desc => f.write_str("DESC"),
      }
   }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
   pub column: String,
   #[serde(default)]
   pub direction: SortDirection,
}

/// SQL text and positional parameters ready for binding
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
   pub sql: String,
   pub params: Vec<JsonValue>,
}

/// Declarative description of a single-table statement
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use sqlx_sqlite_toolkit::{SortDirection, TableQuery};
///
/// let built = TableQuery::new("users")
///    .select(["id", "email"])
///    .where_eq("active", json!(1))
///    .order_by("email", SortDirection::Asc)
///    .limit(10)
///    .build_select()
///    .unwrap();
///
/// assert_eq!(
///    built.sql,
///    "SELECT id, email FROM users WHERE active = ? ORDER BY email ASC LIMIT ?"
/// );
/// assert_eq!(built.params, vec![json!(1), json!(10)]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableQuery {
   pub name: String,
   pub columns: Vec<ColumnValue>,
   #[serde(rename = "where")]
   pub where_clause: Vec<Condition>,
   pub order_by: Vec<OrderBy>,
   pub limit: Option<u64>,
   pub offset: Option<u64>,
}

impl TableQuery {
   pub fn new(name: impl Into<String>) -> Self {
      Self {
         name: name.into(),
         ..Default::default()
      }
   }

   /// Restrict a SELECT to these columns (default `*`)
   pub fn select<I, S>(mut self, columns: I) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      self.columns.extend(columns.into_iter().map(|name| ColumnValue {
         name: name.into(),
         value: None,
      }));
      self
   }

   /// Add a column value for INSERT/UPDATE
   pub fn set(mut self, column: impl Into<String>, value: JsonValue) -> Self {
      self.columns.push(ColumnValue {
         name: column.into(),
         value: Some(value),
      });
      self
   }

   pub fn where_eq(mut self, column: impl Into<String>, value: JsonValue) -> Self {
      self.where_clause.push(Condition {
         column: column.into(),
         value,
      });
      self
   }

   pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
      self.order_by.push(OrderBy {
         column: column.into(),
         direction,
      });
      self
   }

   pub fn limit(mut self, limit: u64) -> Self {
      self.limit = Some(limit);
      self
   }

   pub fn offset(mut self, offset: u64) -> Self {
      self.offset = Some(offset);
      self
   }

   /// `SELECT <columns|*> FROM t [WHERE ..] [ORDER BY ..] [LIMIT ?] [OFFSET ?]`
   pub fn build_select(&self) -> Result<BuiltQuery> {
      validate_identifier(&self.name)?;

      let projection = if self.columns.is_empty() {
         "*".to_string()
      } else {
         self.column_list(self.columns.iter())?
      };

      self.build_projection(&projection)
   }

   /// `SELECT COUNT(*) AS count FROM t [WHERE ..]`
   ///
   /// Columns, ordering and paging are ignored.
   pub fn build_count(&self) -> Result<BuiltQuery> {
      validate_identifier(&self.name)?;

      let mut params = Vec::new();
      let mut sql = format!("SELECT COUNT(*) AS count FROM {}", self.name);
      sql.push_str(&self.where_sql(&mut params)?);
      Ok(BuiltQuery { sql, params })
   }

   /// `INSERT INTO t (a, b) VALUES (?, ?)`
   ///
   /// Columns without a value, or with a JSON `null`, are left out. Fails with
   /// [`Error::Validation`] if nothing remains.
   pub fn build_insert(&self) -> Result<BuiltQuery> {
      validate_identifier(&self.name)?;

      let columns: Vec<(&str, &JsonValue)> = self
         .columns
         .iter()
         .filter_map(|c| match &c.value {
            Some(value) if !value.is_null() => Some((c.name.as_str(), value)),
            _ => None,
         })
         .collect();

      if columns.is_empty() {
         return Err(Error::Validation(format!(
            "no column values to insert into '{}'",
            self.name
         )));
      }

      let mut names = Vec::with_capacity(columns.len());
      let mut params = Vec::with_capacity(columns.len());
      for (name, value) in columns {
         validate_identifier(name)?;
         names.push(name);
         params.push(bindable(value)?);
      }

      let placeholders = vec!["?"; names.len()].join(", ");
      let sql = format!(
         "INSERT INTO {} ({}) VALUES ({})",
         self.name,
         names.join(", "),
         placeholders
      );

      Ok(BuiltQuery { sql, params })
   }

   /// `UPDATE t SET a = ? WHERE k = ?`
   ///
   /// SET takes every column with a value that is not also a WHERE column.
   /// Fails if there is nothing to set or no WHERE clause.
   pub fn build_update(&self) -> Result<BuiltQuery> {
      validate_identifier(&self.name)?;

      if self.where_clause.is_empty() {
         return Err(Error::Validation(format!(
            "refusing to UPDATE '{}' without a WHERE clause",
            self.name
         )));
      }

      let assignments: Vec<(&str, &JsonValue)> = self
         .columns
         .iter()
         .filter(|c| !self.where_clause.iter().any(|w| w.column == c.name))
         .filter_map(|c| c.value.as_ref().map(|value| (c.name.as_str(), value)))
         .collect();

      if assignments.is_empty() {
         return Err(Error::Validation(format!(
            "no columns to update in '{}'",
            self.name
         )));
      }

      let mut params = Vec::with_capacity(assignments.len() + self.where_clause.len());
      let mut set = Vec::with_capacity(assignments.len());
      for (name, value) in assignments {
         validate_identifier(name)?;
         set.push(format!("{} = ?", name));
         params.push(bindable(value)?);
      }

      let mut sql = format!("UPDATE {} SET {}", self.name, set.join(", "));
      sql.push_str(&self.where_sql(&mut params)?);
      Ok(BuiltQuery { sql, params })
   }

   /// `DELETE FROM t WHERE k = ?`; fails without a WHERE clause
   pub fn build_delete(&self) -> Result<BuiltQuery> {
      validate_identifier(&self.name)?;

      if self.where_clause.is_empty() {
         return Err(Error::Validation(format!(
            "refusing to DELETE from '{}' without a WHERE clause",
            self.name
         )));
      }

      let mut params = Vec::with_capacity(self.where_clause.len());
      let mut sql = format!("DELETE FROM {}", self.name);
      sql.push_str(&self.where_sql(&mut params)?);
      Ok(BuiltQuery { sql, params })
   }

   fn build_projection(&self, projection: &str) -> Result<BuiltQuery> {
      let mut params = Vec::new();
      let mut sql = format!("SELECT {} FROM {}", projection, self.name);

      sql.push_str(&self.where_sql(&mut params)?);

      if !self.order_by.is_empty() {
         let mut terms = Vec::with_capacity(self.order_by.len());
         for order in &self.order_by {
            validate_identifier(&order.column)?;
            terms.push(format!("{} {}", order.column, order.direction));
         }
         sql.push_str(" ORDER BY ");
         sql.push_str(&terms.join(", "));
      }

      match (self.limit, self.offset) {
         (Some(limit), offset) => {
            sql.push_str(" LIMIT ?");
            params.push(JsonValue::from(limit));
            if let Some(offset) = offset {
               sql.push_str(" OFFSET ?");
               params.push(JsonValue::from(offset));
            }
         }
         // SQLite requires a LIMIT before OFFSET; -1 means unbounded
         (None, Some(offset)) => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            params.push(JsonValue::from(offset));
         }
         (None, None) => {}
      }

      Ok(BuiltQuery { sql, params })
   }

   fn column_list<'a>(&self, columns: impl Iterator<Item = &'a ColumnValue>) -> Result<String> {
      let mut names = Vec::new();
      for column in columns {
         validate_identifier(&column.name)?;
         names.push(column.name.as_str());
      }
      Ok(names.join(", "))
   }

   fn where_sql(&self, params: &mut Vec<JsonValue>) -> Result<String> {
      if self.where_clause.is_empty() {
         return Ok(String::new());
      }

      let mut terms = Vec::with_capacity(self.where_clause.len());
      for condition in &self.where_clause {
         validate_identifier(&condition.column)?;
         terms.push(format!("{} = ?", condition.column));
         params.push(bindable(&condition.value)?);
      }
      Ok(format!(" WHERE {}", terms.join(" AND ")))
   }
}

/// Objects and arrays are stored as JSON text
fn bindable(value: &JsonValue) -> Result<JsonValue> {
   match value {
      JsonValue::Object(_) | JsonValue::Array(_) => {
         Ok(JsonValue::String(serde_json::to_string(value)?))
      }
      other => Ok(other.clone()),
   }
}
