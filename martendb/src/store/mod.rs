pub(crate) mod memory;

pub use memory::MemoryBackend;

use crate::common::{ID_INDEX_NAME, KEY_NAME_SEPARATOR};
use crate::document::{Document, Value};
use crate::errors::MartenResult;
use itertools::Itertools;

/// Options a collection is created with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollectionOptions {
    /// Fixed-size collection with insertion-order eviction.
    pub capped: bool,
    /// Maximum size in bytes; required when `capped` is set.
    pub size: Option<i64>,
    /// Maximum document count for a capped collection.
    pub max: Option<i64>,
}

/// An index definition: a name, an ordered key specification, and a
/// uniqueness flag.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexSpec {
    pub name: String,
    /// Ordered (field path, direction) pairs; direction is `1` or `-1`.
    pub keys: Vec<(String, i32)>,
    pub unique: bool,
}

impl IndexSpec {
    /// The default `_id` index every collection carries.
    pub fn id_index() -> Self {
        IndexSpec {
            name: ID_INDEX_NAME.to_string(),
            keys: vec![("_id".to_string(), 1)],
            unique: true,
        }
    }

    /// Derives the conventional name from the key specification,
    /// e.g. `v_-1` or `foo_1_bar_1`.
    pub fn name_from_keys(keys: &[(String, i32)]) -> String {
        keys.iter()
            .map(|(field, direction)| format!("{}{}{}", field, KEY_NAME_SEPARATOR, direction))
            .join(KEY_NAME_SEPARATOR)
    }

    /// Whether two specs index the same keys in the same order and
    /// directions.
    pub fn same_keys(&self, other: &IndexSpec) -> bool {
        self.keys == other.keys
    }

    /// The key specification as a reply document, e.g. `{ v: -1 }`.
    pub fn key_document(&self) -> Document {
        let mut doc = Document::new();
        for (field, direction) in &self.keys {
            doc.put(field, Value::Int32(*direction));
        }
        doc
    }

    /// Renders the key specification for error messages.
    pub fn render_keys(&self) -> String {
        Value::Document(self.key_document()).render_literal()
    }
}

/// Storage-reported numbers behind `collStats`/`dbStats`/`dataSize`.
#[derive(Clone, Debug, Default)]
pub struct CollectionStats {
    pub document_count: u64,
    pub size_bytes: u64,
    pub index_count: usize,
    pub capped: bool,
}

/// The abstract storage engine the core executes against.
///
/// The core treats the backend as a synchronous dependency with no internal
/// timeout; cancellation is the caller's concern and is checked between
/// document batches above this interface. Implementations must make
/// [StorageBackend::create_collection] an atomic check-and-create so racing
/// creators observe exactly one physical collection.
pub trait StorageBackend: Send + Sync {
    /// Creates the collection if absent. Returns `true` when this call
    /// performed the creation, `false` when the collection already existed.
    fn create_collection(&self, namespace: &str, options: &CollectionOptions)
        -> MartenResult<bool>;

    /// Drops the collection with its documents and indexes. Returns whether
    /// the collection existed.
    fn drop_collection(&self, namespace: &str) -> MartenResult<bool>;

    fn has_collection(&self, namespace: &str) -> bool;

    fn list_collections(&self) -> Vec<String>;

    /// Snapshot of the collection's documents in insertion order.
    fn scan(&self, namespace: &str) -> MartenResult<Vec<Document>>;

    /// Appends a document, enforcing `_id` and unique-index constraints and
    /// capped-collection eviction.
    fn insert(&self, namespace: &str, doc: Document) -> MartenResult<()>;

    /// Replaces the document whose `_id` equals `id`. Returns whether a
    /// document was replaced.
    fn replace(&self, namespace: &str, id: &Value, doc: Document) -> MartenResult<bool>;

    /// Deletes the documents whose `_id` is in `ids`, returning the count.
    fn delete(&self, namespace: &str, ids: &[Value]) -> MartenResult<u64>;

    fn create_index(&self, namespace: &str, spec: IndexSpec) -> MartenResult<()>;

    /// Removes the named index. Returns whether it existed.
    fn drop_index(&self, namespace: &str, name: &str) -> MartenResult<bool>;

    fn list_indexes(&self, namespace: &str) -> MartenResult<Vec<IndexSpec>>;

    fn stats(&self, namespace: &str) -> MartenResult<CollectionStats>;
}
