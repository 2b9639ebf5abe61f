//! Per-session client context.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_lock::{Mutex, MutexGuard};

/// State an extension registers on a client context.
///
/// The host calls [`ClientContextState::query_end`] on every registered state
/// once a query has finished.
pub trait ClientContextState: Any + Send + Sync {
    fn query_end(&self);

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Registered state shared by every file system call of one session.
#[derive(Default)]
pub struct ClientContext {
    registered_state: Mutex<HashMap<String, Arc<dyn ClientContextState>>>,
}

impl ClientContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the registry of named states.
    pub async fn registered_state(
        &self,
    ) -> MutexGuard<'_, HashMap<String, Arc<dyn ClientContextState>>> {
        self.registered_state.lock().await
    }

    /// Notify every registered state that the running query ended.
    pub async fn query_end(&self) {
        let states: Vec<_> = self.registered_state.lock().await.values().cloned().collect();
        for state in states {
            state.query_end();
        }
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext").finish_non_exhaustive()
    }
}
