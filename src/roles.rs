//! Role declarations

use serde::{Deserialize, Serialize};

/// Named bundle of logical databases granted to a user
///
/// Keys are not checked against the schema registry when the role is
/// registered; an unknown key only fails once something tries to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDeclaration {
   pub name: String,

   /// Databases that must open for the role to become active
   #[serde(default)]
   pub required: Vec<String>,

   /// Databases opened when possible; failures are only logged
   #[serde(default)]
   pub optional: Vec<String>,

   /// Informational only
   #[serde(default)]
   pub priority: i32,
}

impl RoleDeclaration {
   pub fn new(name: impl Into<String>) -> Self {
      Self {
         name: name.into(),
         required: Vec::new(),
         optional: Vec::new(),
         priority: 0,
      }
   }

   pub fn required<I, S>(mut self, keys: I) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      self.required.extend(keys.into_iter().map(Into::into));
      self
   }

   pub fn optional<I, S>(mut self, keys: I) -> Self
   where
      I: IntoIterator<Item = S>,
      S: Into<String>,
   {
      self.optional.extend(keys.into_iter().map(Into::into));
      self
   }

   pub fn priority(mut self, priority: i32) -> Self {
      self.priority = priority;
      self
   }

   /// Required keys followed by optional keys
   pub fn databases(&self) -> impl Iterator<Item = &str> {
      self
         .required
         .iter()
         .chain(self.optional.iter())
         .map(String::as_str)
   }
}
