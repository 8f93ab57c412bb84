use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::AppError;
use crate::store::{
    Collection, Direction, Document, Fields, Query, RecordStore, Write, WriteBatch,
    compare_values, new_document_id,
};

/// Project id reported by permission errors raised in-process.
pub const LOCAL_PROJECT_ID: &str = "halaqat-local";

#[derive(Default)]
struct Inner {
    // Documents keep insertion order, like a freshly listed collection.
    collections: BTreeMap<Collection, Vec<Document>>,
    deny_all: bool,
    failing: BTreeSet<Collection>,
    missing_index: BTreeSet<Collection>,
    fail_next_commit: bool,
    committed: Vec<Vec<Write>>,
}

impl Inner {
    fn check(&self, collection: Collection) -> Result<(), AppError> {
        if self.deny_all {
            return Err(AppError::PermissionDenied {
                message: format!(
                    "Missing or insufficient permissions on {}",
                    collection.as_str()
                ),
                project_id: LOCAL_PROJECT_ID.to_string(),
            });
        }
        if self.failing.contains(&collection) {
            return Err(AppError::Unavailable(format!(
                "{} is unavailable",
                collection.as_str()
            )));
        }
        Ok(())
    }

    fn docs(&self, collection: Collection) -> &[Document] {
        self.collections
            .get(&collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn find(&self, collection: Collection, id: &str) -> Option<&Document> {
        self.docs(collection).iter().find(|d| d.id == id)
    }

    fn put(&mut self, collection: Collection, id: &str, fields: Fields) {
        let docs = self.collections.entry(collection).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.fields = fields,
            None => docs.push(Document::new(id, fields)),
        }
    }

    fn merge(&mut self, collection: Collection, id: &str, fields: Fields) -> Result<(), AppError> {
        let doc = self
            .collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or(AppError::NotFound)?;
        doc.fields.extend(fields);
        Ok(())
    }
}

/// In-process store with the same batch semantics as the hosted one.
/// Used by tests and local experiments; supports fault injection.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a document with a known id, bypassing fault injection.
    pub fn insert(&self, collection: Collection, id: &str, fields: Fields) {
        self.lock().put(collection, id, fields);
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.lock().docs(collection).len()
    }

    pub fn documents(&self, collection: Collection) -> Vec<Document> {
        self.lock().docs(collection).to_vec()
    }

    /// Every read and write is rejected as if the access rules forbid it.
    pub fn deny_permissions(&self, deny: bool) {
        self.lock().deny_all = deny;
    }

    pub fn fail_collection(&self, collection: Collection) {
        self.lock().failing.insert(collection);
    }

    /// Ordered queries on this collection fail until an index "exists".
    pub fn require_index(&self, collection: Collection) {
        self.lock().missing_index.insert(collection);
    }

    pub fn fail_next_commit(&self) {
        self.lock().fail_next_commit = true;
    }

    /// Writes of every successfully committed batch, oldest first.
    pub fn committed_batches(&self) -> Vec<Vec<Write>> {
        self.lock().committed.clone()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, AppError> {
        let inner = self.lock();
        inner.check(collection)?;
        Ok(inner.docs(collection).to_vec())
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, AppError> {
        let inner = self.lock();
        inner.check(collection)?;
        Ok(inner.find(collection, id).cloned())
    }

    async fn create(&self, collection: Collection, fields: Fields) -> Result<String, AppError> {
        let mut inner = self.lock();
        inner.check(collection)?;
        let id = new_document_id();
        inner.put(collection, &id, fields);
        Ok(id)
    }

    async fn set(&self, collection: Collection, id: &str, fields: Fields) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner.check(collection)?;
        inner.put(collection, id, fields);
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner.check(collection)?;
        inner.merge(collection, id, fields)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner.check(collection)?;
        if let Some(docs) = inner.collections.get_mut(&collection) {
            docs.retain(|d| d.id != id);
        }
        Ok(())
    }

    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Document>, AppError> {
        let inner = self.lock();
        inner.check(collection)?;
        if query.order_by.is_some() && inner.missing_index.contains(&collection) {
            return Err(AppError::FailedPrecondition {
                message: format!("The query on {} requires an index", collection.as_str()),
                remediation: Some(format!(
                    "https://console.firebase.google.com/firestore/indexes?collection={}",
                    collection.as_str()
                )),
            });
        }

        let mut docs: Vec<Document> = inner
            .docs(collection)
            .iter()
            .filter(|d| query.matches(d))
            .cloned()
            .collect();

        if let Some((field, direction)) = &query.order_by {
            docs.retain(|d| d.get(field).is_some());
            docs.sort_by(|a, b| {
                let ord = match (a.get(field), b.get(field)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(std::cmp::Ordering::Equal),
                    _ => std::cmp::Ordering::Equal,
                };
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError> {
        let mut inner = self.lock();
        if inner.fail_next_commit {
            inner.fail_next_commit = false;
            return Err(AppError::Unavailable("commit failed".to_string()));
        }

        // Validate everything before applying anything.
        for write in batch.writes() {
            inner.check(write.collection())?;
            match write {
                Write::Create { collection, id, .. } if inner.find(*collection, id).is_some() => {
                    return Err(AppError::Conflict(format!(
                        "{}/{} already exists",
                        collection.as_str(),
                        id
                    )));
                }
                Write::Update { collection, id, .. } if inner.find(*collection, id).is_none() => {
                    return Err(AppError::NotFound);
                }
                _ => {}
            }
        }

        let writes = batch.into_writes();
        for write in writes.iter().cloned() {
            match write {
                Write::Create { collection, id, fields } | Write::Set { collection, id, fields } => {
                    inner.put(collection, &id, fields)
                }
                Write::Update { collection, id, fields } => inner.merge(collection, &id, fields)?,
            }
        }
        inner.committed.push(writes);
        Ok(())
    }
}
