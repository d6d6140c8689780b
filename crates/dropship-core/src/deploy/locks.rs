//! Per-target mutual exclusion for deployments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Serializes deployments that resolve to the same target directory.
/// Deployments to different targets never wait on each other.
#[derive(Debug, Default)]
pub struct DeployLocks {
    slots: Mutex<HashMap<PathBuf, Weak<AsyncMutex<()>>>>,
}

/// Held for the whole clear, populate and post-process sequence.
#[derive(Debug)]
pub struct TargetGuard {
    _guard: OwnedMutexGuard<()>,
}

impl DeployLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, target: &Path) -> TargetGuard {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.retain(|_, slot| slot.strong_count() > 0);
            match slots.get(target).and_then(Weak::upgrade) {
                Some(slot) => slot,
                None => {
                    let slot = Arc::new(AsyncMutex::new(()));
                    slots.insert(target.to_path_buf(), Arc::downgrade(&slot));
                    slot
                }
            }
        };

        TargetGuard {
            _guard: slot.lock_owned().await,
        }
    }

    /// Targets with a holder or waiter.
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.strong_count() > 0)
            .count()
    }
}
