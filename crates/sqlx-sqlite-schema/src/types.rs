//! Generic column type → SQLite type resolution

use indexmap::IndexMap;
use tracing::warn;

/// SQLite type used when a generic type cannot be resolved
pub const FALLBACK_TYPE: &str = "TEXT";

/// Built-in mapping from generic type keywords to SQLite storage types
pub fn builtin_type(generic: &str) -> Option<&'static str> {
   let sqlite_type = match generic.to_ascii_lowercase().as_str() {
      "string" | "text" | "varchar" | "char" | "uuid" | "email" | "url" => "TEXT",
      "integer" | "int" | "bigint" | "smallint" | "tinyint" => "INTEGER",
      "boolean" | "bool" => "INTEGER",
      "float" | "double" | "decimal" | "number" | "real" | "numeric" => "REAL",
      "date" | "datetime" | "timestamp" | "time" => "TEXT",
      "json" | "object" | "array" => "TEXT",
      "blob" | "binary" | "bytes" => "BLOB",
      _ => return None,
   };
   Some(sqlite_type)
}

/// Resolve a generic column type.
///
/// A custom mapping is consulted first (case-insensitive on the generic keyword),
/// then the built-in table. Anything left unresolved is logged and stored as
/// [`FALLBACK_TYPE`].
pub fn resolve_type(generic: &str, mapping: Option<&IndexMap<String, String>>) -> String {
   if let Some(mapped) = mapping.and_then(|m| {
      m.iter()
         .find(|(keyword, _)| keyword.eq_ignore_ascii_case(generic))
         .map(|(_, sqlite_type)| sqlite_type.clone())
   }) {
      return mapped;
   }

   match builtin_type(generic) {
      Some(sqlite_type) => sqlite_type.to_string(),
      None => {
         warn!(
            "Unknown column type '{}', falling back to {}",
            generic, FALLBACK_TYPE
         );
         FALLBACK_TYPE.to_string()
      }
   }
}
