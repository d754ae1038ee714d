//! Configuration of a migration run.

use crate::common::{
    DEFAULT_LOCK_RETRY_INTERVAL, DEFAULT_LOCK_TIMEOUT, DEFAULT_OWNER_PREFIX,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Settings of a migration run, built with [`MigrationBuilder`](crate::migration_builder::MigrationBuilder).
///
/// Cloning is cheap; clones share the same settings.
#[derive(Clone, Debug)]
pub struct MigrationConfig {
    inner: Arc<MigrationConfigInner>,
}

impl MigrationConfig {
    pub(crate) fn new(inner: MigrationConfigInner) -> Self {
        MigrationConfig {
            inner: Arc::new(inner),
        }
    }

    /// Root directory the changesets are read from.
    pub fn changesets_path(&self) -> &Path {
        &self.inner.changesets_path
    }

    /// Identifier recorded as lock owner and ledger runner.
    pub fn owner(&self) -> &str {
        &self.inner.owner
    }

    /// Longest time to wait for the migration lock.
    pub fn lock_timeout(&self) -> Duration {
        self.inner.lock_timeout
    }

    /// Initial wait between two lock acquisition attempts.
    pub fn lock_retry_interval(&self) -> Duration {
        self.inner.lock_retry_interval
    }

    /// Age after which a held lock may be reclaimed; `None` never reclaims.
    pub fn stale_lock_threshold(&self) -> Option<Duration> {
        self.inner.stale_lock_threshold
    }

    /// Whether failed or interrupted changesets may be executed again.
    pub fn retry_failed(&self) -> bool {
        self.inner.retry_failed
    }

    /// Whether changesets older than the latest applied one are executed
    /// instead of being recorded as skipped.
    pub fn allow_out_of_order(&self) -> bool {
        self.inner.allow_out_of_order
    }

    /// Placeholder values substituted in query scripts.
    pub fn placeholders(&self) -> &BTreeMap<String, String> {
        &self.inner.placeholders
    }
}

#[derive(Debug, Clone)]
pub(crate) struct MigrationConfigInner {
    pub(crate) changesets_path: PathBuf,
    pub(crate) owner: String,
    pub(crate) lock_timeout: Duration,
    pub(crate) lock_retry_interval: Duration,
    pub(crate) stale_lock_threshold: Option<Duration>,
    pub(crate) retry_failed: bool,
    pub(crate) allow_out_of_order: bool,
    pub(crate) placeholders: BTreeMap<String, String>,
}

impl Default for MigrationConfigInner {
    fn default() -> Self {
        MigrationConfigInner {
            changesets_path: PathBuf::new(),
            owner: format!("{}-{}", DEFAULT_OWNER_PREFIX, uuid::Uuid::new_v4()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            lock_retry_interval: DEFAULT_LOCK_RETRY_INTERVAL,
            stale_lock_threshold: None,
            retry_failed: false,
            allow_out_of_order: false,
            placeholders: BTreeMap::new(),
        }
    }
}
