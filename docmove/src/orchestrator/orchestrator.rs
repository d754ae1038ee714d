use super::{ChangesetOutcome, RunReport, RunState};
use crate::bucket::Bucket;
use crate::changeset::{Changeset, ChangesetLocator, ChangesetStatus, ChangesetType};
use crate::common::{duration_millis, Version};
use crate::errors::{ErrorKind, MoveError, MoveResult};
use crate::handler::{
    ChangesetHandler, DesignDocumentHandler, DocumentsHandler, QueryScriptHandler,
    SearchIndexHandler,
};
use crate::ledger::{Ledger, LedgerRecord};
use crate::lock::{LockCoordinator, LockGuard};
use crate::migration_config::MigrationConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Drives a migration run end to end.
///
/// A run reads the changeset catalogue from disk, takes the migration lock,
/// validates the catalogue against the ledger, executes pending changesets in
/// version order and releases the lock on every exit path. Execution stops at
/// the first failing changeset; later ones are left unrecorded.
///
/// # Examples
///
/// ```rust,no_run
/// use docmove::bucket::Bucket;
/// use docmove::bucket::memory::InMemoryBucket;
/// use docmove::migration_builder::MigrationBuilder;
///
/// # fn main() -> Result<(), docmove::errors::MoveError> {
/// let orchestrator = MigrationBuilder::new(Bucket::new(InMemoryBucket::new("default")))
///     .changesets_path("db/migration")
///     .build()?;
///
/// for changeset in orchestrator.pending()? {
///     println!("pending: {}", changeset);
/// }
/// orchestrator.migrate()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MigrationOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl MigrationOrchestrator {
    pub fn new(bucket: Bucket, config: MigrationConfig) -> Self {
        MigrationOrchestrator {
            inner: Arc::new(OrchestratorInner::new(bucket, config)),
        }
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.inner.config
    }

    pub fn bucket(&self) -> &Bucket {
        &self.inner.bucket
    }

    pub fn ledger(&self) -> &Ledger {
        &self.inner.ledger
    }

    pub fn lock_coordinator(&self) -> &LockCoordinator {
        &self.inner.coordinator
    }

    /// Runs the migration and reports every changeset it touched.
    ///
    /// The report is returned in both terminal states; see
    /// [`RunReport::into_result`] and [`MigrationOrchestrator::migrate`].
    pub fn run(&self) -> RunReport {
        self.inner.run()
    }

    /// Runs the migration, failing with the error that stopped it.
    pub fn migrate(&self) -> MoveResult<RunReport> {
        self.run().into_result()
    }

    /// Returns the changesets a run would execute, in order, without taking
    /// the lock or writing anything.
    ///
    /// # Errors
    ///
    /// The configuration, `DriftDetected` and `FailedChangeset` errors a run
    /// would fail with before executing.
    pub fn pending(&self) -> MoveResult<Vec<Changeset>> {
        let catalogue = self.inner.locator.locate()?;
        let applied = self.inner.ledger.load_applied()?;
        Ok(self.inner.plan(catalogue, &applied)?.execute)
    }
}

struct OrchestratorInner {
    bucket: Bucket,
    config: MigrationConfig,
    locator: ChangesetLocator,
    ledger: Ledger,
    coordinator: LockCoordinator,
    query_handler: QueryScriptHandler,
}

/// Pending work computed from the catalogue and the ledger.
struct Plan {
    execute: Vec<Changeset>,
    skip: Vec<Changeset>,
}

impl OrchestratorInner {
    fn new(bucket: Bucket, config: MigrationConfig) -> Self {
        let coordinator = LockCoordinator::new(bucket.clone())
            .with_stale_threshold(config.stale_lock_threshold())
            .with_retry_interval(config.lock_retry_interval());

        OrchestratorInner {
            locator: ChangesetLocator::new(config.changesets_path()),
            ledger: Ledger::new(bucket.clone(), config.owner()),
            query_handler: QueryScriptHandler::new(config.placeholders().clone()),
            coordinator,
            bucket,
            config,
        }
    }

    fn run(&self) -> RunReport {
        let mut state = RunState::Idle;
        let mut outcomes = Vec::new();
        log::info!(
            "Starting migration of bucket {} from {}",
            self.bucket.name(),
            self.config.changesets_path().display()
        );

        // a malformed catalogue fails before the lock is taken
        let catalogue = match self.locator.locate() {
            Ok(catalogue) => catalogue,
            Err(e) => return self.fail(&mut state, outcomes, e),
        };

        state.transition(RunState::Locking);
        let guard = match self
            .coordinator
            .acquire_guard(self.config.owner(), self.config.lock_timeout())
        {
            Ok(guard) => guard,
            Err(e) => return self.fail(&mut state, outcomes, e),
        };

        let result = self.migrate_locked(&mut state, catalogue, guard, &mut outcomes);
        match result {
            Ok(()) => {
                state.transition(RunState::Done);
                log::info!(
                    "Migration of bucket {} done, {} changeset(s) applied",
                    self.bucket.name(),
                    outcomes
                        .iter()
                        .filter(|o| o.status == ChangesetStatus::Success)
                        .count()
                );
                RunReport::new(state, outcomes, None)
            }
            Err(e) => self.fail(&mut state, outcomes, e),
        }
    }

    fn migrate_locked(
        &self,
        state: &mut RunState,
        catalogue: Vec<Changeset>,
        mut guard: LockGuard,
        outcomes: &mut Vec<ChangesetOutcome>,
    ) -> MoveResult<()> {
        let result = self.diff_and_execute(state, catalogue, &mut guard, outcomes);

        state.transition(RunState::Unlocking);
        let released = guard.release();
        match (result, released) {
            (Err(e), Err(release_error)) => {
                log::error!("Failed to release migration lock: {}", release_error);
                Err(e)
            }
            (result, released) => result.and(released),
        }
    }

    fn diff_and_execute(
        &self,
        state: &mut RunState,
        catalogue: Vec<Changeset>,
        guard: &mut LockGuard,
        outcomes: &mut Vec<ChangesetOutcome>,
    ) -> MoveResult<()> {
        state.transition(RunState::Diffing);
        let applied = self.ledger.load_applied()?;
        let plan = self.plan(catalogue, &applied)?;

        for changeset in &plan.skip {
            log::warn!(
                "Skipping {}: version {} is older than the latest applied changeset",
                changeset.script(),
                changeset.version()
            );
            self.ledger.record_skipped(changeset)?;
            outcomes.push(outcome(changeset, ChangesetStatus::Skipped, None, None));
        }

        if plan.execute.is_empty() {
            log::info!("Bucket {} is up to date", self.bucket.name());
            return Ok(());
        }

        state.transition(RunState::Executing);
        for changeset in &plan.execute {
            self.apply(state, changeset, outcomes)?;
            guard.refresh()?;
        }
        Ok(())
    }

    fn apply(
        &self,
        state: &mut RunState,
        changeset: &Changeset,
        outcomes: &mut Vec<ChangesetOutcome>,
    ) -> MoveResult<()> {
        log::info!("Applying {}", changeset);
        self.ledger.record_start(changeset)?;

        let started = Instant::now();
        let result = self.execute(changeset);
        let duration_ms = duration_millis(started.elapsed());

        state.transition(RunState::Recording);
        match result {
            Ok(()) => {
                if let Err(e) = self.ledger.record_success(changeset, duration_ms) {
                    log::error!("{} was applied but could not be recorded: {}", changeset.script(), e);
                    outcomes.push(outcome(
                        changeset,
                        ChangesetStatus::Failed,
                        Some(duration_ms),
                        Some(e.to_string()),
                    ));
                    return Err(e);
                }
                log::info!("Applied {} in {}ms", changeset.script(), duration_ms);
                outcomes.push(outcome(changeset, ChangesetStatus::Success, Some(duration_ms), None));
                state.transition(RunState::Executing);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to apply {}: {:?}", changeset.script(), e);
                if let Err(record_error) = self.ledger.record_failure(changeset, &e, duration_ms) {
                    log::error!(
                        "Could not record the failure of {}: {}",
                        changeset.script(),
                        record_error
                    );
                }
                outcomes.push(outcome(
                    changeset,
                    ChangesetStatus::Failed,
                    Some(duration_ms),
                    Some(e.to_string()),
                ));
                Err(e)
            }
        }
    }

    fn execute(&self, changeset: &Changeset) -> MoveResult<()> {
        let bucket = &self.bucket;
        match changeset.changeset_type() {
            ChangesetType::Documents => DocumentsHandler.execute(changeset, bucket),
            ChangesetType::QueryScript => self.query_handler.execute(changeset, bucket),
            ChangesetType::DesignDocument => DesignDocumentHandler.execute(changeset, bucket),
            ChangesetType::SearchIndex => SearchIndexHandler.execute(changeset, bucket),
        }
    }

    /// Validates the catalogue against the ledger and splits the changesets
    /// left to apply into those to execute and those to skip.
    ///
    /// Every check runs before anything is returned, so a drifted or failed
    /// changeset anywhere in the catalogue stops the run before the first write.
    fn plan(
        &self,
        catalogue: Vec<Changeset>,
        applied: &BTreeMap<String, LedgerRecord>,
    ) -> MoveResult<Plan> {
        check_drift(&catalogue, applied)?;
        if !self.config.retry_failed() {
            check_failed(&catalogue, applied)?;
        }

        for script in applied.keys() {
            if !catalogue.iter().any(|c| c.script() == script) {
                log::warn!("Ledger records {} which is no longer on disk", script);
            }
        }

        let latest: Option<&Version> = applied
            .values()
            .filter(|record| record.is_success())
            .map(|record| &record.version)
            .max();

        let mut plan = Plan {
            execute: Vec::new(),
            skip: Vec::new(),
        };
        for changeset in catalogue {
            let record = applied.get(changeset.script());
            match record {
                Some(record) if record.is_success() => continue,
                Some(record) if record.is_skipped() && !self.config.allow_out_of_order() => {
                    continue
                }
                _ => {}
            }

            let out_of_order = latest.is_some_and(|latest| changeset.version() < latest);
            if out_of_order && !self.config.allow_out_of_order() {
                plan.skip.push(changeset);
            } else {
                plan.execute.push(changeset);
            }
        }
        Ok(plan)
    }

    fn fail(&self, state: &mut RunState, outcomes: Vec<ChangesetOutcome>, error: MoveError) -> RunReport {
        log::error!("Migration of bucket {} failed in {}: {}", self.bucket.name(), state, error);
        state.transition(RunState::Failed);
        RunReport::new(*state, outcomes, Some(error))
    }
}

fn check_drift(catalogue: &[Changeset], applied: &BTreeMap<String, LedgerRecord>) -> MoveResult<()> {
    for changeset in catalogue {
        if let Some(record) = applied.get(changeset.script()) {
            if record.is_success() && record.checksum != changeset.checksum() {
                return Err(MoveError::new(
                    &format!(
                        "Changeset {} was modified after being applied (recorded checksum {}, found {})",
                        changeset.script(),
                        record.checksum,
                        changeset.checksum()
                    ),
                    ErrorKind::DriftDetected,
                ));
            }
        }
    }
    Ok(())
}

fn check_failed(catalogue: &[Changeset], applied: &BTreeMap<String, LedgerRecord>) -> MoveResult<()> {
    for changeset in catalogue {
        if let Some(record) = applied.get(changeset.script()) {
            let reason = if record.is_failed() {
                "failed"
            } else if record.is_interrupted() {
                "was interrupted"
            } else {
                continue;
            };
            return Err(MoveError::new(
                &format!(
                    "Changeset {} {} in a previous run{}; fix the cause and enable retry_failed to run it again",
                    changeset.script(),
                    reason,
                    record
                        .error
                        .as_ref()
                        .map(|e| format!(" ({})", e))
                        .unwrap_or_default()
                ),
                ErrorKind::FailedChangeset,
            ));
        }
    }
    Ok(())
}

fn outcome(
    changeset: &Changeset,
    status: ChangesetStatus,
    duration_ms: Option<u64>,
    error: Option<String>,
) -> ChangesetOutcome {
    ChangesetOutcome {
        script: changeset.script().to_string(),
        version: changeset.version().clone(),
        status,
        duration_ms,
        error,
    }
}
