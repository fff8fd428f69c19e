// 🚦 Generation Coordinator - one read-modify-write per grocery list at a time
//
// The registry lock is held only long enough to fetch or create a key's
// lock. Long work runs under the per-key lock alone, so different weeks
// never wait on each other. A busy key is reported, never queued.

use crate::error::{GroceryError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use tracing::debug;

#[derive(Debug, Default)]
pub struct GenerationCoordinator {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GenerationCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or lazily create the lock for a key
    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        // The map stays consistent even if a holder panicked
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the registry entry for `key` once nobody else holds a handle
    fn release(&self, key: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Handles are only handed out under the registry lock
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    /// Run `work` as the only build or edit for `key`.
    ///
    /// Fails fast with `GenerationInProgress` if another caller holds it.
    pub fn try_run<T>(&self, key: &str, work: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.key_lock(key);

        let result = {
            let _guard = match lock.try_lock() {
                Ok(guard) => guard,
                // A previous build panicked; the lock guards no data
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => {
                    debug!(key, "generation already in progress");
                    return Err(GroceryError::GenerationInProgress {
                        key: key.to_string(),
                    });
                }
            };

            work()
        };

        drop(lock);
        self.release(key);
        result
    }

    /// Whether some caller currently holds the key
    pub fn is_in_progress(&self, key: &str) -> bool {
        let lock = {
            let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            match locks.get(key) {
                Some(lock) => Arc::clone(lock),
                None => return false,
            }
        };
        let busy = matches!(lock.try_lock(), Err(TryLockError::WouldBlock));
        busy
    }

    /// Keys with a live registry entry
    pub fn tracked_keys(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_runs_work_and_returns_result() {
        let coordinator = GenerationCoordinator::new();
        let value = coordinator.try_run("plan-1", || Ok(42)).unwrap();
        assert_eq!(value, 42);
        assert!(!coordinator.is_in_progress("plan-1"));
    }

    #[test]
    fn test_nested_call_on_same_plan_is_rejected() {
        let coordinator = GenerationCoordinator::new();

        let inner = coordinator.try_run("plan-1", || {
            assert!(coordinator.is_in_progress("plan-1"));
            Ok(coordinator.try_run("plan-1", || Ok(())))
        });

        let inner = inner.unwrap();
        assert!(matches!(
            inner,
            Err(GroceryError::GenerationInProgress { ref key }) if key == "plan-1"
        ));
    }

    #[test]
    fn test_other_plans_are_not_blocked() {
        let coordinator = GenerationCoordinator::new();

        let result = coordinator.try_run("plan-1", || coordinator.try_run("plan-2", || Ok("done")));
        assert_eq!(result.unwrap(), "done");
    }

    #[test]
    fn test_concurrent_caller_gets_in_progress() {
        let coordinator = Arc::new(GenerationCoordinator::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                coordinator.try_run("plan-1", || {
                    started_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(())
                })
            })
        };

        started_rx.recv().unwrap();
        let busy = coordinator.try_run("plan-1", || Ok(()));
        assert!(busy.unwrap_err().is_retryable());

        release_tx.send(()).unwrap();
        holder.join().unwrap().unwrap();

        // Free again once the holder finished
        assert!(coordinator.try_run("plan-1", || Ok(())).is_ok());
    }

    #[test]
    fn test_error_from_work_releases_lock() {
        let coordinator = GenerationCoordinator::new();
        let failed: Result<()> = coordinator.try_run("plan-1", || {
            Err(GroceryError::RecipeUnresolved {
                recipe: "Ghost".to_string(),
            })
        });
        assert!(failed.is_err());
        assert!(coordinator.try_run("plan-1", || Ok(())).is_ok());
    }

    #[test]
    fn test_registry_entries_released_after_run() {
        let coordinator = GenerationCoordinator::new();
        coordinator.try_run("plan-1", || Ok(())).unwrap();
        coordinator
            .try_run("plan-2", || {
                assert_eq!(coordinator.tracked_keys(), 1);
                Ok(())
            })
            .unwrap();
        assert_eq!(coordinator.tracked_keys(), 0);

        // A rejected caller leaves the holder's entry in place
        coordinator
            .try_run("plan-1", || {
                assert!(coordinator.try_run("plan-1", || Ok(())).is_err());
                assert!(coordinator.is_in_progress("plan-1"));
                assert_eq!(coordinator.tracked_keys(), 1);
                Ok(())
            })
            .unwrap();
        assert_eq!(coordinator.tracked_keys(), 0);
        assert!(!coordinator.is_in_progress("plan-1"));
    }
}
