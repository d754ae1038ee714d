use super::query::{parse_statement, Statement};
use crate::bucket::{BucketProvider, StoredDocument};
use crate::errors::{ErrorKind, MoveError, MoveResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// In-memory implementation of the bucket contract.
///
/// # Characteristics
/// - **Thread-Safe**: documents live in a `DashMap`; insert-if-absent and CAS
///   writes hold the entry's shard lock for the whole compare-and-set
/// - **Query Engine**: understands index DDL, keyed inserts/upserts/deletes and
///   `SELECT RAW META().id`; any other statement fails with `QueryError`
/// - **Statement Log**: every successfully executed statement is kept, in order
/// - **No Persistence**: all data is lost when the last clone is dropped
///
/// Clones share the same state, so a clone can stand in for a second process
/// connected to the same bucket.
#[derive(Clone)]
pub struct InMemoryBucket {
    inner: Arc<InMemoryBucketInner>,
}

impl InMemoryBucket {
    pub fn new(name: &str) -> Self {
        InMemoryBucket {
            inner: Arc::new(InMemoryBucketInner::new(name)),
        }
    }

    /// Statements executed successfully so far, oldest first.
    pub fn executed_statements(&self) -> Vec<String> {
        self.inner.statement_log.lock().clone()
    }

    /// Names of the indexes created through the query engine, sorted.
    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .indexes
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Fields of an index created through the query engine.
    pub fn index_fields(&self, name: &str) -> Option<Vec<String>> {
        self.inner.indexes.get(name).map(|entry| entry.value().clone())
    }

    pub fn document_count(&self) -> usize {
        self.inner.documents.len()
    }

    /// Removes every document, index, design document and search index.
    pub fn flush(&self) {
        self.inner.documents.clear();
        self.inner.indexes.clear();
        self.inner.design_documents.clear();
        self.inner.search_indexes.clear();
        self.inner.statement_log.lock().clear();
    }
}

impl BucketProvider for InMemoryBucket {
    fn name(&self) -> String {
        self.inner.name.clone()
    }

    fn get(&self, key: &str) -> MoveResult<Option<StoredDocument>> {
        Ok(self.inner.documents.get(key).map(|entry| StoredDocument {
            key: key.to_string(),
            content: entry.content.clone(),
            cas: entry.cas,
        }))
    }

    fn upsert(&self, key: &str, content: Value) -> MoveResult<u64> {
        Ok(self.inner.upsert(key, content))
    }

    fn insert(&self, key: &str, content: Value) -> MoveResult<u64> {
        self.inner.insert(key, content)
    }

    fn replace(&self, key: &str, content: Value, cas: Option<u64>) -> MoveResult<u64> {
        self.inner.replace(key, content, cas)
    }

    fn remove(&self, key: &str, cas: Option<u64>) -> MoveResult<()> {
        self.inner.remove(key, cas)
    }

    fn scan_prefix(&self, prefix: &str) -> MoveResult<Vec<StoredDocument>> {
        let sorted: BTreeMap<String, StoredDocument> = self
            .inner
            .documents
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| {
                (
                    entry.key().clone(),
                    StoredDocument {
                        key: entry.key().clone(),
                        content: entry.content.clone(),
                        cas: entry.cas,
                    },
                )
            })
            .collect();
        Ok(sorted.into_values().collect())
    }

    fn query(&self, statement: &str) -> MoveResult<Vec<Value>> {
        let rows = self.inner.execute(statement)?;
        self.inner.statement_log.lock().push(statement.trim().to_string());
        Ok(rows)
    }

    fn upsert_design_document(&self, name: &str, definition: Value) -> MoveResult<()> {
        if !definition.is_object() {
            return Err(MoveError::new(
                &format!("Design document '{}' must be a json object", name),
                ErrorKind::ValidationError,
            ));
        }
        self.inner
            .design_documents
            .insert(name.to_string(), definition);
        Ok(())
    }

    fn get_design_document(&self, name: &str) -> MoveResult<Option<Value>> {
        Ok(self
            .inner
            .design_documents
            .get(name)
            .map(|entry| entry.value().clone()))
    }

    fn upsert_search_index(&self, name: &str, definition: Value) -> MoveResult<()> {
        if !definition.is_object() {
            return Err(MoveError::new(
                &format!("Search index '{}' must be a json object", name),
                ErrorKind::ValidationError,
            ));
        }
        self.inner.search_indexes.insert(name.to_string(), definition);
        Ok(())
    }

    fn get_search_index(&self, name: &str) -> MoveResult<Option<Value>> {
        Ok(self
            .inner
            .search_indexes
            .get(name)
            .map(|entry| entry.value().clone()))
    }
}

struct DocumentEntry {
    content: Value,
    cas: u64,
}

struct InMemoryBucketInner {
    name: String,
    documents: DashMap<String, DocumentEntry>,
    indexes: DashMap<String, Vec<String>>,
    design_documents: DashMap<String, Value>,
    search_indexes: DashMap<String, Value>,
    statement_log: Mutex<Vec<String>>,
    cas_sequence: AtomicU64,
}

impl InMemoryBucketInner {
    fn new(name: &str) -> Self {
        InMemoryBucketInner {
            name: name.to_string(),
            documents: DashMap::new(),
            indexes: DashMap::new(),
            design_documents: DashMap::new(),
            search_indexes: DashMap::new(),
            statement_log: Mutex::new(Vec::new()),
            cas_sequence: AtomicU64::new(0),
        }
    }

    fn next_cas(&self) -> u64 {
        self.cas_sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn upsert(&self, key: &str, content: Value) -> u64 {
        let cas = self.next_cas();
        self.documents
            .insert(key.to_string(), DocumentEntry { content, cas });
        cas
    }

    fn insert(&self, key: &str, content: Value) -> MoveResult<u64> {
        match self.documents.entry(key.to_string()) {
            Entry::Occupied(_) => Err(MoveError::new(
                &format!("Document '{}' already exists", key),
                ErrorKind::DocumentExists,
            )),
            Entry::Vacant(vacant) => {
                let cas = self.next_cas();
                vacant.insert(DocumentEntry { content, cas });
                Ok(cas)
            }
        }
    }

    fn replace(&self, key: &str, content: Value, cas: Option<u64>) -> MoveResult<u64> {
        let mut entry = self.documents.get_mut(key).ok_or_else(|| not_found(key))?;
        check_cas(key, entry.cas, cas)?;

        let new_cas = self.next_cas();
        entry.content = content;
        entry.cas = new_cas;
        Ok(new_cas)
    }

    fn remove(&self, key: &str, cas: Option<u64>) -> MoveResult<()> {
        match self.documents.entry(key.to_string()) {
            Entry::Vacant(_) => Err(not_found(key)),
            Entry::Occupied(occupied) => {
                check_cas(key, occupied.get().cas, cas)?;
                occupied.remove();
                Ok(())
            }
        }
    }

    fn execute(&self, statement: &str) -> MoveResult<Vec<Value>> {
        let parsed = parse_statement(statement)?;
        if parsed.keyspace() != self.name {
            return Err(MoveError::new(
                &format!("Keyspace not found: {}", parsed.keyspace()),
                ErrorKind::QueryError,
            ));
        }

        match parsed {
            Statement::CreateIndex { name, fields, .. } => {
                self.create_index(&name, fields)?;
                Ok(Vec::new())
            }
            Statement::CreatePrimaryIndex { name, .. } => {
                self.create_index(&name, Vec::new())?;
                Ok(Vec::new())
            }
            Statement::DropIndex { name, .. } => {
                if self.indexes.remove(&name).is_none() {
                    return Err(MoveError::new(
                        &format!("Index not found: {}", name),
                        ErrorKind::QueryError,
                    ));
                }
                Ok(Vec::new())
            }
            Statement::Insert { key, value, .. } => {
                self.insert(&key, value).map_err(|e| {
                    MoveError::new_with_cause(
                        &format!("Duplicate key: {}", key),
                        ErrorKind::QueryError,
                        e,
                    )
                })?;
                Ok(Vec::new())
            }
            Statement::Upsert { key, value, .. } => {
                self.upsert(&key, value);
                Ok(Vec::new())
            }
            Statement::Delete { key: Some(key), .. } => {
                self.documents.remove(&key);
                Ok(Vec::new())
            }
            Statement::Delete { key: None, .. } => {
                self.documents.clear();
                Ok(Vec::new())
            }
            Statement::SelectIds { .. } => {
                let mut ids: Vec<String> = self
                    .documents
                    .iter()
                    .map(|entry| entry.key().clone())
                    .collect();
                ids.sort();
                Ok(ids.into_iter().map(Value::String).collect())
            }
        }
    }

    fn create_index(&self, name: &str, fields: Vec<String>) -> MoveResult<()> {
        match self.indexes.entry(name.to_string()) {
            Entry::Occupied(_) => Err(MoveError::new(
                &format!("Index {} already exists", name),
                ErrorKind::QueryError,
            )),
            Entry::Vacant(vacant) => {
                vacant.insert(fields);
                Ok(())
            }
        }
    }
}

fn not_found(key: &str) -> MoveError {
    MoveError::new(
        &format!("Document '{}' not found", key),
        ErrorKind::DocumentNotFound,
    )
}

fn check_cas(key: &str, stored: u64, expected: Option<u64>) -> MoveResult<()> {
    match expected {
        Some(expected) if expected != stored => Err(MoveError::new(
            &format!(
                "CAS mismatch on '{}': expected {}, found {}",
                key, expected, stored
            ),
            ErrorKind::CasMismatch,
        )),
        _ => Ok(()),
    }
}
