use super::{Lock, LockCoordinator};
use crate::errors::{ErrorKind, MoveError, MoveResult};

/// Scoped ownership of the migration lock.
///
/// Call [`LockGuard::release`] to release the lock and observe the outcome;
/// a guard dropped without that, on an early return or a panic, still
/// releases the lock and logs a failure to do so.
pub struct LockGuard {
    coordinator: LockCoordinator,
    lock: Option<Lock>,
}

impl LockGuard {
    pub(crate) fn new(coordinator: LockCoordinator, lock: Lock) -> Self {
        LockGuard {
            coordinator,
            lock: Some(lock),
        }
    }

    pub fn lock(&self) -> Option<&Lock> {
        self.lock.as_ref()
    }

    /// Heartbeat for the guarded lock.
    pub fn refresh(&mut self) -> MoveResult<()> {
        match self.lock.as_mut() {
            Some(lock) => self.coordinator.refresh(lock),
            None => Err(released_error()),
        }
    }

    pub fn release(mut self) -> MoveResult<()> {
        match self.lock.take() {
            Some(lock) => self.coordinator.release(lock),
            None => Err(released_error()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            let owner = lock.owner().to_string();
            if let Err(e) = self.coordinator.release(lock) {
                log::error!("Failed to release migration lock held by {}: {}", owner, e);
            }
        }
    }
}

fn released_error() -> MoveError {
    MoveError::new("Migration lock already released", ErrorKind::LockNotOwned)
}
