use crate::bucket::Bucket;
use crate::common::BUCKET_PLACEHOLDER;
use crate::errors::{ErrorKind, MoveError, MoveResult};
use crate::migration_config::{MigrationConfig, MigrationConfigInner};
use crate::orchestrator::MigrationOrchestrator;
use std::path::Path;
use std::time::Duration;

/// Builder for a [`MigrationOrchestrator`].
///
/// Setters never fail; the first invalid setting is kept and returned by
/// [`MigrationBuilder::build`].
///
/// # Examples
///
/// ```rust,no_run
/// use docmove::bucket::Bucket;
/// use docmove::bucket::memory::InMemoryBucket;
/// use docmove::migration_builder::MigrationBuilder;
/// use std::time::Duration;
///
/// # fn main() -> Result<(), docmove::errors::MoveError> {
/// let orchestrator = MigrationBuilder::new(Bucket::new(InMemoryBucket::new("default")))
///     .changesets_path("db/migration")
///     .lock_timeout(Duration::from_secs(60))
///     .placeholder("env", "staging")
///     .build()?;
///
/// let report = orchestrator.run();
/// println!("{}", report);
/// # Ok(())
/// # }
/// ```
pub struct MigrationBuilder {
    bucket: Bucket,
    error: Option<MoveError>,
    path_set: bool,
    inner: MigrationConfigInner,
}

impl MigrationBuilder {
    pub fn new(bucket: Bucket) -> Self {
        MigrationBuilder {
            bucket,
            error: None,
            path_set: false,
            inner: MigrationConfigInner::default(),
        }
    }

    /// Sets the directory the changesets are read from. Required.
    pub fn changesets_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.inner.changesets_path = path.as_ref().to_path_buf();
        self.path_set = true;
        self
    }

    /// Sets the identifier used as lock owner and ledger runner.
    ///
    /// Every concurrently running deployer needs its own owner; the default is
    /// a random `docmove-<uuid>`.
    pub fn owner(mut self, owner: &str) -> Self {
        if owner.trim().is_empty() {
            self.fail("Lock owner must not be empty");
        } else {
            self.inner.owner = owner.to_string();
        }
        self
    }

    /// Sets how long to wait for the migration lock. Zero fails fast and
    /// `Duration::MAX` waits until the lock is released.
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.inner.lock_timeout = timeout;
        self
    }

    /// Sets the initial wait between lock acquisition attempts.
    pub fn lock_retry_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            self.fail("Lock retry interval must be positive");
        } else {
            self.inner.lock_retry_interval = interval;
        }
        self
    }

    /// Allows reclaiming a lock whose heartbeat is older than `threshold`.
    ///
    /// A threshold shorter than the longest changeset lets a second deployer
    /// break a live lock and run concurrently.
    pub fn stale_lock_threshold(mut self, threshold: Duration) -> Self {
        if threshold.is_zero() {
            self.fail("Stale lock threshold must be positive");
        } else {
            self.inner.stale_lock_threshold = Some(threshold);
        }
        self
    }

    /// Acknowledges that failed or interrupted changesets may be executed again.
    pub fn retry_failed(mut self, retry: bool) -> Self {
        self.inner.retry_failed = retry;
        self
    }

    /// Executes changesets older than the latest applied one instead of
    /// recording them as skipped.
    pub fn allow_out_of_order(mut self, allow: bool) -> Self {
        self.inner.allow_out_of_order = allow;
        self
    }

    /// Binds `${name}` in query scripts to `value`.
    pub fn placeholder(mut self, name: &str, value: &str) -> Self {
        if name == BUCKET_PLACEHOLDER {
            self.fail("The bucket placeholder is bound to the bucket name");
        } else {
            self.inner
                .placeholders
                .insert(name.to_string(), value.to_string());
        }
        self
    }

    pub fn build(self) -> MoveResult<MigrationOrchestrator> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if !self.path_set {
            return Err(MoveError::new(
                "Changesets path is required",
                ErrorKind::InvalidPath,
            ));
        }

        Ok(MigrationOrchestrator::new(
            self.bucket,
            MigrationConfig::new(self.inner),
        ))
    }

    fn fail(&mut self, message: &str) {
        if self.error.is_none() {
            self.error = Some(MoveError::new(message, ErrorKind::ValidationError));
        }
    }
}
