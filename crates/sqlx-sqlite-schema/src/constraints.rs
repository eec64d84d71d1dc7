//! Column constraint keyword scanner
//!
//! Raw constraint strings such as `"NOT NULL UNIQUE DEFAULT 0"` are split on
//! whitespace and matched keyword by keyword. Unrecognized tokens are skipped.
//! This is not a DDL grammar: `CHECK (...)`, quoted defaults containing spaces,
//! and table-level constraints cannot be expressed.

/// Flags recovered from a column's raw constraint string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnConstraints {
   pub primary_key: bool,
   /// Only ever set together with `primary_key`
   pub auto_increment: bool,
   pub not_null: bool,
   /// Not set when `primary_key` is, since primary keys are already unique
   pub unique: bool,
   pub default: Option<String>,
}

impl ColumnConstraints {
   /// Scan a raw constraint string.
   ///
   /// Keywords are matched case-insensitively. The token following `DEFAULT` is
   /// kept verbatim so text defaults keep their case: `DEFAULT 'pending'` stays
   /// lowercase instead of becoming `'PENDING'` as an uppercase-first scan would.
   pub fn parse(raw: &str) -> Self {
      let tokens: Vec<&str> = raw.split_whitespace().collect();
      let mut parsed = Self::default();
      let mut auto_increment = false;
      let mut unique = false;

      let mut i = 0;
      while i < tokens.len() {
         match tokens[i].to_ascii_uppercase().as_str() {
            "PRIMARY" => parsed.primary_key = true,
            "AUTO_INCREMENT" | "AUTOINCREMENT" => auto_increment = true,
            "NOT" => {
               if tokens
                  .get(i + 1)
                  .is_some_and(|next| next.eq_ignore_ascii_case("NULL"))
               {
                  parsed.not_null = true;
                  i += 1;
               }
            }
            "UNIQUE" => unique = true,
            "DEFAULT" => {
               if let Some(value) = tokens.get(i + 1) {
                  parsed.default = Some((*value).to_string());
                  i += 1;
               }
            }
            _ => {}
         }
         i += 1;
      }

      parsed.auto_increment = auto_increment && parsed.primary_key;
      parsed.unique = unique && !parsed.primary_key;
      parsed
   }

   /// Nullable unless `NOT NULL` or `PRIMARY KEY` was declared
   pub fn nullable(&self) -> bool {
      !(self.not_null || self.primary_key)
   }

   /// DDL fragment in a fixed order: `PRIMARY KEY AUTOINCREMENT NOT NULL UNIQUE DEFAULT x`
   pub fn to_sql(&self) -> String {
      let mut parts: Vec<String> = Vec::new();
      if self.primary_key {
         parts.push("PRIMARY KEY".to_string());
      }
      if self.auto_increment {
         parts.push("AUTOINCREMENT".to_string());
      }
      if self.not_null {
         parts.push("NOT NULL".to_string());
      }
      if self.unique {
         parts.push("UNIQUE".to_string());
      }
      if let Some(default) = &self.default {
         parts.push(format!("DEFAULT {}", default));
      }
      parts.join(" ")
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_not_null_unique_default() {
      let c = ColumnConstraints::parse("NOT NULL UNIQUE DEFAULT 0");
      assert!(c.not_null);
      assert!(c.unique);
      assert_eq!(c.default.as_deref(), Some("0"));
      assert_eq!(c.to_sql(), "NOT NULL UNIQUE DEFAULT 0");
   }

   #[test]
   fn test_primary_key_autoincrement() {
      let c = ColumnConstraints::parse("primary key autoincrement");
      assert!(c.primary_key);
      assert!(c.auto_increment);
      assert!(!c.nullable());
      assert_eq!(c.to_sql(), "PRIMARY KEY AUTOINCREMENT");
   }

   #[test]
   fn test_auto_increment_requires_primary_key() {
      let c = ColumnConstraints::parse("AUTO_INCREMENT NOT NULL");
      assert!(!c.auto_increment);
      assert_eq!(c.to_sql(), "NOT NULL");
   }

   #[test]
   fn test_auto_increment_before_primary() {
      let c = ColumnConstraints::parse("AUTO_INCREMENT PRIMARY KEY");
      assert_eq!(c.to_sql(), "PRIMARY KEY AUTOINCREMENT");
   }

   #[test]
   fn test_unique_dropped_for_primary_key() {
      let c = ColumnConstraints::parse("PRIMARY KEY UNIQUE");
      assert!(!c.unique);
      assert_eq!(c.to_sql(), "PRIMARY KEY");
   }

   #[test]
   fn test_unknown_tokens_ignored() {
      let c = ColumnConstraints::parse("CHECK (x > 0) COLLATE NOCASE");
      assert_eq!(c, ColumnConstraints::default());
      assert_eq!(c.to_sql(), "");
   }

   #[test]
   fn test_lone_not_and_trailing_default() {
      let c = ColumnConstraints::parse("NOT DEFAULT");
      assert!(!c.not_null);
      assert!(c.default.is_none());
   }

   #[test]
   fn test_default_keeps_case() {
      let c = ColumnConstraints::parse("default 'pending'");
      assert_eq!(c.default.as_deref(), Some("'pending'"));
   }
}
