pub mod document;
pub mod firestore;
pub mod memory;

use std::cmp::Ordering;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;

pub use document::{Document, Fields, Timestamp, Value};
pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::InMemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Students,
    Teachers,
    Halaqat,
    Parents,
    DailyAttendance,
    MemorizationLogs,
    ActivityLogs,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Students => "students",
            Collection::Teachers => "teachers",
            Collection::Halaqat => "halaqat",
            Collection::Parents => "parents",
            Collection::DailyAttendance => "daily_attendance",
            Collection::MemorizationLogs => "memorization_logs",
            Collection::ActivityLogs => "activity_logs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Equal,
    GreaterOrEqual,
    LessOrEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality / range filters combined with AND, optional order and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn where_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Equal, value)
    }

    pub fn where_gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::GreaterOrEqual, value)
    }

    pub fn where_lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::LessOrEqual, value)
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| {
            let Some(actual) = doc.get(&f.field) else {
                return false;
            };
            match (f.op, compare_values(actual, &f.value)) {
                (FilterOp::Equal, Some(ord)) => ord == Ordering::Equal,
                (FilterOp::GreaterOrEqual, Some(ord)) => ord != Ordering::Less,
                (FilterOp::LessOrEqual, Some(ord)) => ord != Ordering::Greater,
                (_, None) => false,
            }
        })
    }
}

/// Ordering between values of the same kind; mixed kinds do not compare.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Timestamp(x), Value::Timestamp(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => None,
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Fails the batch if the document already exists.
    Create {
        collection: Collection,
        id: String,
        fields: Fields,
    },
    /// Full overwrite, creating the document when absent.
    Set {
        collection: Collection,
        id: String,
        fields: Fields,
    },
    /// Partial update; fails the batch if the document is missing.
    Update {
        collection: Collection,
        id: String,
        fields: Fields,
    },
}

impl Write {
    pub fn collection(&self) -> Collection {
        match self {
            Write::Create { collection, .. }
            | Write::Set { collection, .. }
            | Write::Update { collection, .. } => *collection,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Write::Create { id, .. } | Write::Set { id, .. } | Write::Update { id, .. } => id,
        }
    }
}

pub fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Writes submitted together; the store applies all of them or none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a new document under a fresh id and returns that id.
    pub fn create(&mut self, collection: Collection, fields: Fields) -> String {
        let id = new_document_id();
        self.writes.push(Write::Create {
            collection,
            id: id.clone(),
            fields,
        });
        id
    }

    pub fn set(&mut self, collection: Collection, id: &str, fields: Fields) {
        self.writes.push(Write::Set {
            collection,
            id: id.to_string(),
            fields,
        });
    }

    pub fn update(&mut self, collection: Collection, id: &str, fields: Fields) {
        self.writes.push(Write::Update {
            collection,
            id: id.to_string(),
            fields,
        });
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}

/// Document store contract. Every call may fail with
/// `AppError::PermissionDenied` or `AppError::Unavailable`.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, AppError>;
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, AppError>;
    async fn create(&self, collection: Collection, fields: Fields) -> Result<String, AppError>;
    async fn set(&self, collection: Collection, id: &str, fields: Fields) -> Result<(), AppError>;
    async fn update(&self, collection: Collection, id: &str, fields: Fields) -> Result<(), AppError>;
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), AppError>;
    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Document>, AppError>;
    async fn commit(&self, batch: WriteBatch) -> Result<(), AppError>;
}

/// A typed record stored in one collection.
pub trait Record: Sized {
    const COLLECTION: Collection;

    fn from_document(doc: &Document) -> Result<Self, AppError>;

    /// Persisted fields only; derived and transient fields are left out.
    fn to_fields(&self) -> Fields;
}

fn decode_all<R: Record>(docs: Vec<Document>) -> Vec<R> {
    let mut records = Vec::with_capacity(docs.len());
    for doc in docs {
        match R::from_document(&doc) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(
                    "Failed to parse {} document {}: {}",
                    R::COLLECTION.as_str(),
                    doc.id,
                    e
                );
            }
        }
    }
    records
}

pub async fn list_records<R: Record>(store: &dyn RecordStore) -> Result<Vec<R>, AppError> {
    let docs = store.list(R::COLLECTION).await?;
    Ok(decode_all(docs))
}

pub async fn query_records<R: Record>(
    store: &dyn RecordStore,
    query: &Query,
) -> Result<Vec<R>, AppError> {
    let docs = store.query(R::COLLECTION, query).await?;
    Ok(decode_all(docs))
}

pub async fn get_record<R: Record>(
    store: &dyn RecordStore,
    id: &str,
) -> Result<Option<R>, AppError> {
    match store.get(R::COLLECTION, id).await? {
        Some(doc) => R::from_document(&doc).map(Some),
        None => Ok(None),
    }
}
