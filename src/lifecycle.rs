//! Application lifecycle integration

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::ConnectionManager;

/// Foreground/background transitions reported by the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppLifecycleEvent {
   /// App moved to the background; every connection is closed
   Background,
   /// App returned to the foreground; connections are restored
   Active,
   /// Transitional state (e.g. app switcher); ignored
   Inactive,
}

/// Forward lifecycle events from `events` to `manager` until the sender side
/// is dropped.
///
/// Events are handled one at a time, in order. Failures are logged and do not
/// stop the listener.
///
/// # Example
///
/// ```no_run
/// # async fn example(manager: std::sync::Arc<sqlx_sqlite_roles::ConnectionManager>) {
/// use sqlx_sqlite_roles::{AppLifecycleEvent, spawn_lifecycle_listener};
///
/// let (tx, rx) = tokio::sync::mpsc::channel(8);
/// let listener = spawn_lifecycle_listener(manager, rx);
///
/// tx.send(AppLifecycleEvent::Background).await.ok();
/// drop(tx);
/// listener.await.ok();
/// # }
/// ```
pub fn spawn_lifecycle_listener(
   manager: Arc<ConnectionManager>,
   mut events: mpsc::Receiver<AppLifecycleEvent>,
) -> JoinHandle<()> {
   tokio::spawn(async move {
      while let Some(event) = events.recv().await {
         debug!("Lifecycle event: {:?}", event);
         if let Err(e) = manager.handle_lifecycle_event(event).await {
            error!("Failed to handle lifecycle event {:?}: {}", event, e);
         }
      }
      info!("Lifecycle listener stopped");
   })
}
