//! Table service event dispatch
//!
//! Each service owns an [`EventHub`]. Events reach three kinds of listener:
//! handlers registered per [`EventKind`], handlers registered per
//! [`ErrorKind`] (for error events only), and broadcast subscribers.
//! Handler failures and panics are logged and never reach the operation that
//! emitted the event.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx_sqlite_toolkit::Record;
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::{Error, ErrorKind};

/// Capacity of each service's broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Discriminant of a [`ServiceEvent`], used to register handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
   Initialized,
   DataCreated,
   DataUpdated,
   DataDeleted,
   DataFetched,
   DataBulkCreated,
   TransactionCompleted,
   Closed,
   Error,
}

/// Something that happened on a table service
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServiceEvent {
   Initialized {
      source: String,
   },
   DataCreated {
      source: String,
      record: Record,
   },
   DataUpdated {
      source: String,
      id: JsonValue,
      record: Record,
   },
   DataDeleted {
      source: String,
      id: JsonValue,
   },
   DataFetched {
      source: String,
      count: usize,
   },
   DataBulkCreated {
      source: String,
      count: usize,
   },
   TransactionCompleted {
      source: String,
   },
   Closed {
      source: String,
   },
   Error {
      source: String,
      operation: String,
      kind: ErrorKind,
      code: String,
      message: String,
   },
}

impl ServiceEvent {
   pub fn kind(&self) -> EventKind {
      match self {
         ServiceEvent::Initialized { .. } => EventKind::Initialized,
         ServiceEvent::DataCreated { .. } => EventKind::DataCreated,
         ServiceEvent::DataUpdated { .. } => EventKind::DataUpdated,
         ServiceEvent::DataDeleted { .. } => EventKind::DataDeleted,
         ServiceEvent::DataFetched { .. } => EventKind::DataFetched,
         ServiceEvent::DataBulkCreated { .. } => EventKind::DataBulkCreated,
         ServiceEvent::TransactionCompleted { .. } => EventKind::TransactionCompleted,
         ServiceEvent::Closed { .. } => EventKind::Closed,
         ServiceEvent::Error { .. } => EventKind::Error,
      }
   }

   /// `schema:table` of the emitting service
   pub fn source(&self) -> &str {
      match self {
         ServiceEvent::Initialized { source }
         | ServiceEvent::DataCreated { source, .. }
         | ServiceEvent::DataUpdated { source, .. }
         | ServiceEvent::DataDeleted { source, .. }
         | ServiceEvent::DataFetched { source, .. }
         | ServiceEvent::DataBulkCreated { source, .. }
         | ServiceEvent::TransactionCompleted { source }
         | ServiceEvent::Closed { source }
         | ServiceEvent::Error { source, .. } => source,
      }
   }
}

/// Error a handler may return; it is logged and otherwise ignored
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type EventHandler = Arc<dyn Fn(&ServiceEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Per-service listener registry and broadcaster
pub struct EventHub {
   source: String,
   handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
   error_handlers: RwLock<HashMap<ErrorKind, Vec<EventHandler>>>,
   tx: broadcast::Sender<ServiceEvent>,
}

impl EventHub {
   pub fn new(source: impl Into<String>) -> Self {
      let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
      Self {
         source: source.into(),
         handlers: RwLock::new(HashMap::new()),
         error_handlers: RwLock::new(HashMap::new()),
         tx,
      }
   }

   pub fn source(&self) -> &str {
      &self.source
   }

   pub fn on<F>(&self, kind: EventKind, handler: F)
   where
      F: Fn(&ServiceEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
   {
      self.handlers.write().entry(kind).or_default().push(Arc::new(handler));
   }

   /// Handle error events of one kind only
   pub fn on_error<F>(&self, kind: ErrorKind, handler: F)
   where
      F: Fn(&ServiceEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
   {
      self
         .error_handlers
         .write()
         .entry(kind)
         .or_default()
         .push(Arc::new(handler));
   }

   /// Receive every event emitted after this call.
   ///
   /// Slow receivers lag and miss events rather than blocking the service.
   pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
      self.tx.subscribe()
   }

   pub fn emit(&self, event: ServiceEvent) {
      let handlers = self
         .handlers
         .read()
         .get(&event.kind())
         .cloned()
         .unwrap_or_default();
      self.dispatch(&handlers, &event);

      // No subscribers is not an error
      let _ = self.tx.send(event);
   }

   /// Emit an [`EventKind::Error`] event for a failed `operation`
   pub fn emit_error(&self, operation: &str, error: &Error) {
      let kind = error.kind();
      let event = ServiceEvent::Error {
         source: self.source.clone(),
         operation: operation.to_string(),
         kind,
         code: error.error_code(),
         message: error.to_string(),
      };

      let handlers = self
         .error_handlers
         .read()
         .get(&kind)
         .cloned()
         .unwrap_or_default();
      self.dispatch(&handlers, &event);

      self.emit(event);
   }

   /// Drop every registered handler. Subscribers are unaffected.
   pub fn clear(&self) {
      self.handlers.write().clear();
      self.error_handlers.write().clear();
   }

   fn dispatch(&self, handlers: &[EventHandler], event: &ServiceEvent) {
      for handler in handlers {
         match catch_unwind(AssertUnwindSafe(|| handler(event))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("[{}] {:?} handler failed: {}", self.source, event.kind(), e),
            Err(_) => warn!("[{}] {:?} handler panicked", self.source, event.kind()),
         }
      }
      trace!("[{}] dispatched {:?} to {} handler(s)", self.source, event.kind(), handlers.len());
   }
}

impl std::fmt::Debug for EventHub {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("EventHub")
         .field("source", &self.source)
         .field("subscribers", &self.tx.receiver_count())
         .finish_non_exhaustive()
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use std::sync::atomic::{AtomicUsize, Ordering};

   #[test]
   fn test_handlers_receive_matching_events() {
      let hub = EventHub::new("core:users");
      let created = Arc::new(AtomicUsize::new(0));

      let counter = Arc::clone(&created);
      hub.on(EventKind::DataCreated, move |_| {
         counter.fetch_add(1, Ordering::SeqCst);
         Ok(())
      });

      hub.emit(ServiceEvent::DataCreated {
         source: "core:users".into(),
         record: Record::new(),
      });
      hub.emit(ServiceEvent::Closed {
         source: "core:users".into(),
      });

      assert_eq!(created.load(Ordering::SeqCst), 1);
   }

   #[test]
   fn test_failing_and_panicking_handlers_are_contained() {
      let hub = EventHub::new("core:users");
      let reached = Arc::new(AtomicUsize::new(0));

      hub.on(EventKind::Closed, |_| Err("boom".into()));
      hub.on(EventKind::Closed, |_| panic!("handler bug"));
      let counter = Arc::clone(&reached);
      hub.on(EventKind::Closed, move |_| {
         counter.fetch_add(1, Ordering::SeqCst);
         Ok(())
      });

      hub.emit(ServiceEvent::Closed {
         source: "core:users".into(),
      });
      assert_eq!(reached.load(Ordering::SeqCst), 1);
   }

   #[test]
   fn test_error_handlers_filter_by_kind() {
      let hub = EventHub::new("core:users");
      let validation = Arc::new(AtomicUsize::new(0));
      let any_error = Arc::new(AtomicUsize::new(0));

      let counter = Arc::clone(&validation);
      hub.on_error(ErrorKind::Validation, move |_| {
         counter.fetch_add(1, Ordering::SeqCst);
         Ok(())
      });
      let counter = Arc::clone(&any_error);
      hub.on(EventKind::Error, move |_| {
         counter.fetch_add(1, Ordering::SeqCst);
         Ok(())
      });

      hub.emit_error("create", &Error::Validation("missing email".into()));
      hub.emit_error("get", &Error::AccessDenied("analytics".into()));

      assert_eq!(validation.load(Ordering::SeqCst), 1);
      assert_eq!(any_error.load(Ordering::SeqCst), 2);
   }

   #[tokio::test]
   async fn test_subscribers_receive_events() {
      let hub = EventHub::new("core:users");
      let mut rx = hub.subscribe();

      hub.emit(ServiceEvent::DataFetched {
         source: "core:users".into(),
         count: 3,
      });

      let event = rx.recv().await.unwrap();
      assert_eq!(event.kind(), EventKind::DataFetched);
      assert_eq!(event.source(), "core:users");
   }

   #[test]
   fn test_clear_removes_handlers() {
      let hub = EventHub::new("core:users");
      let calls = Arc::new(AtomicUsize::new(0));
      let counter = Arc::clone(&calls);
      hub.on(EventKind::Closed, move |_| {
         counter.fetch_add(1, Ordering::SeqCst);
         Ok(())
      });

      hub.clear();
      hub.emit(ServiceEvent::Closed {
         source: "core:users".into(),
      });
      assert_eq!(calls.load(Ordering::SeqCst), 0);
   }
}
