use super::LockGuard;
use crate::bucket::{Bucket, StoredDocument};
use crate::common::{
    elapsed_since, now_utc, DEFAULT_LOCK_RETRY_INTERVAL, LOCK_DOCUMENT_KEY, MAX_LOCK_BACKOFF,
};
use crate::errors::{ErrorKind, MoveError, MoveResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

/// State of the migration lock document.
///
/// `cas` is the document version this process last saw; it is never persisted
/// and makes every later write of the lock conditional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lock {
    locked: bool,
    locked_at: DateTime<Utc>,
    owner: String,
    #[serde(skip)]
    cas: u64,
}

impl Lock {
    fn held_by(owner: &str) -> Self {
        Lock {
            locked: true,
            locked_at: now_utc(),
            owner: owner.to_string(),
            cas: 0,
        }
    }

    fn from_document(document: StoredDocument) -> MoveResult<Self> {
        let mut lock: Lock = serde_json::from_value(document.content).map_err(|e| {
            MoveError::new(
                &format!("Corrupted lock document: {}", e),
                ErrorKind::EncodingError,
            )
        })?;
        lock.cas = document.cas;
        Ok(lock)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Time of acquisition, or of the last heartbeat.
    pub fn locked_at(&self) -> &DateTime<Utc> {
        &self.locked_at
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

/// Acquires and releases the migration lock.
///
/// A held lock whose last heartbeat is older than the staleness threshold may
/// be reclaimed by another owner. Reclamation is off unless a threshold is
/// configured, since breaking a live lock lets two deployers run at once; every
/// reclamation is logged at `warn`.
#[derive(Clone)]
pub struct LockCoordinator {
    bucket: Bucket,
    stale_threshold: Option<Duration>,
    retry_interval: Duration,
}

impl LockCoordinator {
    pub fn new(bucket: Bucket) -> Self {
        LockCoordinator {
            bucket,
            stale_threshold: None,
            retry_interval: DEFAULT_LOCK_RETRY_INTERVAL,
        }
    }

    pub fn with_stale_threshold(mut self, threshold: Option<Duration>) -> Self {
        self.stale_threshold = threshold;
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Acquires the lock for `owner`, retrying with exponential backoff until
    /// `timeout` elapses. A zero timeout makes a single attempt; a timeout too
    /// large to represent as a deadline waits indefinitely.
    ///
    /// # Errors
    ///
    /// `LockTimeout` if the lock is still held by someone else at the deadline.
    pub fn acquire(&self, owner: &str, timeout: Duration) -> MoveResult<Lock> {
        let deadline = Instant::now().checked_add(timeout);
        let mut backoff = self
            .retry_interval
            .clamp(Duration::from_millis(1), MAX_LOCK_BACKOFF);
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);
            if let Some(lock) = self.try_acquire(owner)? {
                log::info!("Migration lock acquired by {} after {} attempt(s)", owner, attempts);
                return Ok(lock);
            }

            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if remaining.is_zero() {
                let holder = self
                    .current()?
                    .map(|lock| lock.owner)
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(MoveError::new(
                    &format!(
                        "Could not acquire migration lock for {} within {:?}, held by {}",
                        owner, timeout, holder
                    ),
                    ErrorKind::LockTimeout,
                ));
            }

            log::debug!("Migration lock busy, {} retrying in {:?}", owner, backoff);
            thread::sleep(backoff.min(remaining));
            backoff = backoff.saturating_mul(2).min(MAX_LOCK_BACKOFF);
        }
    }

    /// Acquires the lock and wraps it in a guard that releases it when dropped.
    pub fn acquire_guard(&self, owner: &str, timeout: Duration) -> MoveResult<LockGuard> {
        let lock = self.acquire(owner, timeout)?;
        Ok(LockGuard::new(self.clone(), lock))
    }

    /// Makes a single acquisition attempt, `Ok(None)` if the lock is held.
    pub fn try_acquire(&self, owner: &str) -> MoveResult<Option<Lock>> {
        let mut lock = Lock::held_by(owner);
        match self.bucket.insert(LOCK_DOCUMENT_KEY, serde_json::to_value(&lock)?) {
            Ok(cas) => {
                lock.cas = cas;
                return Ok(Some(lock));
            }
            Err(e) if e.kind() == &ErrorKind::DocumentExists => {}
            Err(e) => return Err(e),
        }

        let existing = match self.current()? {
            Some(existing) => existing,
            None => return Ok(None),
        };

        if existing.locked {
            match self.stale_threshold {
                Some(threshold) if self.is_stale(&existing, threshold) => {
                    log::warn!(
                        "Reclaiming stale migration lock held by {} since {} (threshold {:?})",
                        existing.owner,
                        existing.locked_at,
                        threshold
                    );
                }
                _ => return Ok(None),
            }
        }

        match self.bucket.replace(
            LOCK_DOCUMENT_KEY,
            serde_json::to_value(&lock)?,
            Some(existing.cas),
        ) {
            Ok(cas) => {
                lock.cas = cas;
                Ok(Some(lock))
            }
            Err(e) if is_lost_race(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `true` if `lock` is held and its last heartbeat is older than `threshold`.
    pub fn is_stale(&self, lock: &Lock, threshold: Duration) -> bool {
        lock.locked && elapsed_since(&lock.locked_at) > threshold
    }

    /// Heartbeat: moves `lockedAt` of a held lock to now.
    ///
    /// # Errors
    ///
    /// `LockNotOwned` if the lock was released or reclaimed by someone else.
    pub fn refresh(&self, lock: &mut Lock) -> MoveResult<()> {
        let mut refreshed = lock.clone();
        refreshed.locked_at = now_utc();

        match self.bucket.replace(
            LOCK_DOCUMENT_KEY,
            serde_json::to_value(&refreshed)?,
            Some(lock.cas),
        ) {
            Ok(cas) => {
                refreshed.cas = cas;
                *lock = refreshed;
                Ok(())
            }
            Err(e) if is_lost_race(&e) => Err(MoveError::new_with_cause(
                &format!("Migration lock is no longer owned by {}", lock.owner),
                ErrorKind::LockNotOwned,
                e,
            )),
            Err(e) => Err(e),
        }
    }

    /// Releases a lock acquired by this coordinator.
    ///
    /// # Errors
    ///
    /// `LockNotOwned` if the lock document changed since it was last seen.
    pub fn release(&self, lock: Lock) -> MoveResult<()> {
        let mut released = lock.clone();
        released.locked = false;

        match self.bucket.replace(
            LOCK_DOCUMENT_KEY,
            serde_json::to_value(&released)?,
            Some(lock.cas),
        ) {
            Ok(_) => {
                log::info!("Migration lock released by {}", lock.owner);
                Ok(())
            }
            Err(e) if is_lost_race(&e) => Err(MoveError::new_with_cause(
                &format!(
                    "Cannot release migration lock, it is no longer owned by {}",
                    lock.owner
                ),
                ErrorKind::LockNotOwned,
                e,
            )),
            Err(e) => Err(e),
        }
    }

    /// Administrative release of whatever lock is held, regardless of owner.
    ///
    /// Returns `true` if a held lock was broken.
    pub fn force_release(&self) -> MoveResult<bool> {
        match self.current()? {
            Some(existing) if existing.locked => {
                log::warn!(
                    "Forcibly releasing migration lock held by {} since {}",
                    existing.owner,
                    existing.locked_at
                );
                self.bucket.remove(LOCK_DOCUMENT_KEY, None)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Reads the lock document as currently stored.
    pub fn current(&self) -> MoveResult<Option<Lock>> {
        match self.bucket.get(LOCK_DOCUMENT_KEY)? {
            Some(document) => Ok(Some(Lock::from_document(document)?)),
            None => Ok(None),
        }
    }
}

fn is_lost_race(error: &MoveError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::CasMismatch | ErrorKind::DocumentNotFound
    )
}
