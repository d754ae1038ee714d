use docmove::bucket::memory::InMemoryBucket;
use docmove::bucket::Bucket;
use docmove::errors::{ErrorKind, MoveError, MoveResult};
use docmove::migration_builder::MigrationBuilder;
use serde_json::{json, Value};
use std::backtrace::Backtrace;
use std::fs;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Runs `test` against the context created by `before`, then always runs
/// `after`, even when the test body fails or panics.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> MoveResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> MoveResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> MoveResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let start_time = Instant::now();
    let ctx = match before() {
        Ok(ctx) => ctx,
        Err(e) => panic!("Before run failed: {:?}", e),
    };

    let test_ctx = ctx.clone();
    let result = std::panic::catch_unwind(AssertUnwindSafe(move || {
        let backtrace = Backtrace::capture();
        test(test_ctx).map_err(|e| (format!("Test failed: {:?}", e), backtrace.to_string()))
    }));
    let after_result = after(ctx);
    let elapsed = start_time.elapsed();

    match result {
        Ok(Ok(())) => {
            if let Err(e) = after_result {
                panic!("After run failed: {:?}", e);
            }
        }
        Ok(Err((e, bt))) => {
            eprintln!("\n==================== TEST FAILED ====================");
            eprintln!("Failed after {:?}", elapsed);
            eprintln!("Error: {}", e);
            if !bt.is_empty() && !bt.contains("disabled") {
                eprintln!("\nBacktrace:\n{}", bt);
            }
            eprintln!("=====================================================\n");
            panic!("{}", e);
        }
        Err(panic_err) => std::panic::resume_unwind(panic_err),
    }
}

/// A bucket together with an empty changesets directory.
#[derive(Clone)]
pub struct TestContext {
    memory: InMemoryBucket,
    changesets: Arc<TempDir>,
}

impl TestContext {
    pub fn new(memory: InMemoryBucket, changesets: TempDir) -> Self {
        Self {
            memory,
            changesets: Arc::new(changesets),
        }
    }

    pub fn bucket(&self) -> Bucket {
        Bucket::new(self.memory.clone())
    }

    /// The in-memory bucket behind [`TestContext::bucket`], for inspection.
    pub fn memory(&self) -> &InMemoryBucket {
        &self.memory
    }

    pub fn changesets_path(&self) -> &Path {
        self.changesets.path()
    }

    /// A builder bound to this context's bucket and changesets, failing fast on a held lock.
    pub fn builder(&self) -> MigrationBuilder {
        MigrationBuilder::new(self.bucket())
            .changesets_path(self.changesets_path())
            .owner(&random_owner())
            .lock_timeout(Duration::ZERO)
    }

    pub fn write_query_script(&self, name: &str, script: &str) -> MoveResult<PathBuf> {
        let path = self.changesets_path().join(format!("{}.n1ql", name));
        fs::write(&path, script)?;
        Ok(path)
    }

    pub fn write_design_document(&self, name: &str, definition: &Value) -> MoveResult<PathBuf> {
        let path = self.changesets_path().join(format!("{}.json", name));
        fs::write(&path, serde_json::to_vec_pretty(definition)?)?;
        Ok(path)
    }

    pub fn write_search_index(&self, name: &str, definition: &Value) -> MoveResult<PathBuf> {
        let path = self.changesets_path().join(format!("{}.fts", name));
        fs::write(&path, serde_json::to_vec_pretty(definition)?)?;
        Ok(path)
    }

    pub fn write_documents(&self, name: &str, documents: &[(&str, Value)]) -> MoveResult<PathBuf> {
        let folder = self.changesets_path().join(name);
        fs::create_dir_all(&folder)?;
        for (key, content) in documents {
            fs::write(
                folder.join(format!("{}.json", key)),
                serde_json::to_vec_pretty(content)?,
            )?;
        }
        Ok(folder)
    }

    /// Writes a raw entry, whatever its name.
    pub fn write_file(&self, name: &str, content: &str) -> MoveResult<PathBuf> {
        let path = self.changesets_path().join(name);
        fs::write(&path, content)?;
        Ok(path)
    }

    /// Writes the four-changeset catalogue used by most scenarios:
    ///
    /// ```text
    /// V0__create_indexes.n1ql
    /// V0.1__insert_users/{titi,toto}.json
    /// V1__user_views.json
    /// V2__user_search.fts
    /// ```
    pub fn write_catalogue(&self) -> MoveResult<()> {
        self.write_query_script(
            "V0__create_indexes",
            "-- indexes used by the user views\n\
             CREATE PRIMARY INDEX ON `${bucket}`;\n\
             CREATE INDEX idx_user_name ON `${bucket}`(name, email);\n",
        )?;
        self.write_documents(
            "V0.1__insert_users",
            &[
                ("titi", json!({"type": "user", "name": "titi", "email": "titi@example.com"})),
                ("toto", json!({"type": "user", "name": "toto", "email": "toto@example.com"})),
            ],
        )?;
        self.write_design_document(
            "V1__user_views",
            &json!({
                "views": {
                    "by_name": {"map": "function (doc, meta) { emit(doc.name, null); }"}
                }
            }),
        )?;
        self.write_search_index(
            "V2__user_search",
            &json!({
                "type": "fulltext-index",
                "sourceType": "couchbase",
                "sourceName": "default",
                "params": {"mapping": {"default_analyzer": "standard"}}
            }),
        )?;
        Ok(())
    }
}

pub fn random_owner() -> String {
    format!("int-test-{}", uuid::Uuid::new_v4())
}

pub fn create_test_context() -> MoveResult<TestContext> {
    let changesets = tempfile::Builder::new()
        .prefix("docmove-changesets-")
        .tempdir()
        .map_err(|e| {
            MoveError::new(
                &format!("Failed to create changesets directory: {}", e),
                ErrorKind::IOError,
            )
        })?;
    Ok(TestContext::new(InMemoryBucket::new("default"), changesets))
}

pub fn cleanup(ctx: TestContext) -> MoveResult<()> {
    ctx.memory().flush();

    let path = ctx.changesets_path().to_path_buf();
    match fs::remove_dir_all(&path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            eprintln!(
                "Warning: Failed to remove changesets directory {}: {:?}",
                path.display(),
                e
            );
            Ok(())
        }
    }
}
