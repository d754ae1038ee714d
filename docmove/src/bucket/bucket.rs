use crate::errors::MoveResult;
use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;

/// A document read from a bucket together with its CAS token.
///
/// The CAS token changes on every write of the document, so passing it back to
/// [`BucketProvider::replace`] or [`BucketProvider::remove`] makes the write
/// conditional on nobody having touched the document in between.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub content: Value,
    pub cas: u64,
}

/// Capabilities the engine requires from the target database.
///
/// Every method is a single-document (or single-statement) operation: the
/// contract offers no transactions spanning several documents.
///
/// # Thread Safety
/// Implementers must be `Send + Sync`; the lock coordinator may be driven from
/// several threads of the same process.
pub trait BucketProvider: Send + Sync {
    /// Name of the bucket, bound to the `${bucket}` placeholder in query scripts.
    fn name(&self) -> String;

    /// Reads a document, `Ok(None)` if absent.
    fn get(&self, key: &str) -> MoveResult<Option<StoredDocument>>;

    /// Creates or overwrites a document and returns its new CAS.
    fn upsert(&self, key: &str, content: Value) -> MoveResult<u64>;

    /// Creates a document only if the key is free.
    ///
    /// # Errors
    /// `DocumentExists` if a document is already stored under `key`.
    fn insert(&self, key: &str, content: Value) -> MoveResult<u64>;

    /// Overwrites an existing document.
    ///
    /// When `cas` is given the write only happens if the stored CAS still equals it.
    ///
    /// # Errors
    /// `DocumentNotFound` if absent, `CasMismatch` if the CAS differs.
    fn replace(&self, key: &str, content: Value, cas: Option<u64>) -> MoveResult<u64>;

    /// Deletes a document, optionally conditional on its CAS.
    ///
    /// # Errors
    /// `DocumentNotFound` if absent, `CasMismatch` if the CAS differs.
    fn remove(&self, key: &str, cas: Option<u64>) -> MoveResult<()>;

    /// Returns every document whose key starts with `prefix`, ordered by key.
    fn scan_prefix(&self, prefix: &str) -> MoveResult<Vec<StoredDocument>>;

    /// Executes one statement of the store's query language and returns its rows.
    fn query(&self, statement: &str) -> MoveResult<Vec<Value>>;

    /// Creates or replaces a design document.
    fn upsert_design_document(&self, name: &str, definition: Value) -> MoveResult<()>;

    fn get_design_document(&self, name: &str) -> MoveResult<Option<Value>>;

    /// Creates or replaces a full-text search index definition.
    fn upsert_search_index(&self, name: &str, definition: Value) -> MoveResult<()>;

    fn get_search_index(&self, name: &str) -> MoveResult<Option<Value>>;
}

/// Cheap, cloneable handle to a [`BucketProvider`].
///
/// Clones share the same provider; method calls go straight through `Deref`.
///
/// ```rust
/// use docmove::bucket::Bucket;
/// use docmove::bucket::memory::InMemoryBucket;
/// use serde_json::json;
///
/// let bucket = Bucket::new(InMemoryBucket::new("default"));
/// bucket.upsert("user::1", json!({"name": "titi"})).unwrap();
/// assert!(bucket.get("user::1").unwrap().is_some());
/// ```
#[derive(Clone)]
pub struct Bucket {
    inner: Arc<dyn BucketProvider>,
}

impl Bucket {
    pub fn new<T: BucketProvider + 'static>(inner: T) -> Self {
        Bucket {
            inner: Arc::new(inner),
        }
    }
}

impl Deref for Bucket {
    type Target = Arc<dyn BucketProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
