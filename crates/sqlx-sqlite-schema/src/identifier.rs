//! SQL identifier checks
//!
//! Table, column and index names are interpolated into SQL text, so they are
//! restricted to plain identifiers. Values never go through here; they are bound.

use crate::Result;
use crate::error::Error;

/// Returns true if `name` is a plain SQL identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_valid_identifier(name: &str) -> bool {
   let mut chars = name.chars();
   match chars.next() {
      Some(first) if first.is_ascii_alphabetic() || first == '_' => {
         chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
      }
      _ => false,
   }
}

/// Fails with [`Error::InvalidIdentifier`] unless `name` is a plain identifier.
pub fn validate_identifier(name: &str) -> Result<()> {
   if is_valid_identifier(name) {
      Ok(())
   } else {
      Err(Error::InvalidIdentifier(name.to_string()))
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_valid_identifiers() {
      for name in ["users", "_private", "user_roles2", "A"] {
         assert!(is_valid_identifier(name), "{name} should be valid");
      }
   }

   #[test]
   fn test_invalid_identifiers() {
      for name in ["", "2fast", "users;", "first name", "name\"", "t.col", "DROP TABLE x"] {
         assert!(!is_valid_identifier(name), "{name} should be rejected");
      }
   }

   #[test]
   fn test_validate_identifier_error_names_input() {
      let err = validate_identifier("bad-name").unwrap_err();
      assert_eq!(err.error_code(), "INVALID_IDENTIFIER");
      assert!(err.to_string().contains("bad-name"));
   }
}
