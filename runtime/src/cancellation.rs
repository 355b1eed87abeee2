//! Registry of cancellable background tasks.
//!
//! Every [`Effect::Cancellable`](stagepass_core::effect::Effect::Cancellable)
//! runs on its own task. The registry keeps the task's abort handle under the
//! effect id so a later `Effect::Cancel`, a replacement task, or store
//! shutdown can stop it.

use stagepass_core::effect::EffectId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::task::AbortHandle;

/// Abort handles of running cancellable tasks, keyed by effect id
#[derive(Debug, Default)]
pub(crate) struct TaskRegistry {
    tasks: Mutex<HashMap<EffectId, Registration>>,
    next_token: AtomicU64,
}

#[derive(Debug)]
struct Registration {
    token: u64,
    abort: AbortHandle,
}

impl TaskRegistry {
    fn lock(&self) -> MutexGuard<'_, HashMap<EffectId, Registration>> {
        // Entries are plain handles; a poisoned map is still consistent.
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reserve a token identifying the next registration
    pub(crate) fn next_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a running task, aborting any task already registered under `id`
    pub(crate) fn register(&self, id: EffectId, token: u64, abort: AbortHandle) {
        let previous = self.lock().insert(id.clone(), Registration { token, abort });
        if let Some(previous) = previous {
            tracing::debug!(effect_id = %id, "Replacing running cancellable effect");
            previous.abort.abort();
        }
    }

    /// Remove the registration for `id` if it still belongs to `token`
    pub(crate) fn complete(&self, id: &EffectId, token: u64) {
        let mut tasks = self.lock();
        if tasks.get(id).is_some_and(|r| r.token == token) {
            tasks.remove(id);
        }
    }

    /// Abort the task registered under `id`
    ///
    /// Returns true if a task was registered.
    pub(crate) fn cancel(&self, id: &EffectId) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(registration) => {
                registration.abort.abort();
                true
            },
            None => false,
        }
    }

    /// Abort every registered task, returning how many were registered
    pub(crate) fn cancel_all(&self) -> usize {
        let drained: Vec<Registration> = self.lock().drain().map(|(_, r)| r).collect();
        for registration in &drained {
            registration.abort.abort();
        }
        drained.len()
    }

    /// Whether a task is registered under `id`
    pub(crate) fn is_active(&self, id: &EffectId) -> bool {
        self.lock().contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TICKER: EffectId = EffectId::from_static("ticker");

    fn sleeper() -> tokio::task::JoinHandle<()> {
        tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        })
    }

    #[tokio::test]
    async fn test_register_replaces_previous_task() {
        let registry = TaskRegistry::default();

        let first = sleeper();
        registry.register(TICKER, registry.next_token(), first.abort_handle());
        let second = sleeper();
        registry.register(TICKER, registry.next_token(), second.abort_handle());

        assert!(first.await.is_err_and(|e| e.is_cancelled()));
        assert!(registry.is_active(&TICKER));
        second.abort();
    }

    #[tokio::test]
    async fn test_complete_ignores_stale_token() {
        let registry = TaskRegistry::default();

        let stale = registry.next_token();
        let task = sleeper();
        let current = registry.next_token();
        registry.register(TICKER, current, task.abort_handle());

        registry.complete(&TICKER, stale);
        assert!(registry.is_active(&TICKER));

        registry.complete(&TICKER, current);
        assert!(!registry.is_active(&TICKER));
        task.abort();
    }

    #[tokio::test]
    async fn test_cancel_all_aborts_everything() {
        let registry = TaskRegistry::default();
        let a = sleeper();
        let b = sleeper();
        registry.register(EffectId::new("a"), registry.next_token(), a.abort_handle());
        registry.register(EffectId::new("b"), registry.next_token(), b.abort_handle());

        assert_eq!(registry.cancel_all(), 2);
        assert!(a.await.is_err_and(|e| e.is_cancelled()));
        assert!(b.await.is_err_and(|e| e.is_cancelled()));
        assert!(!registry.cancel(&EffectId::new("a")));
    }
}
