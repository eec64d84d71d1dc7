//! Process-wide schema registry

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::Result;
use crate::declaration::SchemaDeclaration;
use crate::error::Error;

/// Map from logical database key to its schema.
///
/// Entries are immutable: a key can be registered once and never updated or
/// removed. Lookups hand out `Arc`s so callers never hold the lock.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
   schemas: RwLock<IndexMap<String, Arc<SchemaDeclaration>>>,
}

impl SchemaRegistry {
   pub fn new() -> Self {
      Self::default()
   }

   /// Validate and store a schema under `key`.
   ///
   /// Fails with [`Error::AlreadyRegistered`] if the key is taken.
   pub fn register(&self, key: impl Into<String>, schema: SchemaDeclaration) -> Result<()> {
      let key = key.into();
      schema.validate()?;

      let mut schemas = self.schemas.write();
      if schemas.contains_key(&key) {
         return Err(Error::AlreadyRegistered(key));
      }

      debug!(
         "Registered schema '{}' (version {}, {} table(s))",
         key,
         schema.version,
         schema.tables.len()
      );
      schemas.insert(key, Arc::new(schema));
      Ok(())
   }

   /// Parse a JSON schema document and register it under `key`
   pub fn register_json(&self, key: impl Into<String>, json: &str) -> Result<()> {
      self.register(key, SchemaDeclaration::from_json_str(json)?)
   }

   pub fn get(&self, key: &str) -> Result<Arc<SchemaDeclaration>> {
      self
         .schemas
         .read()
         .get(key)
         .cloned()
         .ok_or_else(|| Error::NotFound(key.to_string()))
   }

   pub fn contains(&self, key: &str) -> bool {
      self.schemas.read().contains_key(key)
   }

   /// Registered keys in registration order
   pub fn keys(&self) -> Vec<String> {
      self.schemas.read().keys().cloned().collect()
   }
}
