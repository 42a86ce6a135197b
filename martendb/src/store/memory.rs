use crate::common::DOC_ID;
use crate::document::{Document, Value};
use crate::errors::{self, ErrorKind, MartenError, MartenResult};
use crate::query::path::lookup_path;
use crate::store::{CollectionOptions, CollectionStats, IndexSpec, StorageBackend};
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// In-memory reference storage backend.
///
/// Collections live in a concurrent table; each collection keeps its
/// documents in a concurrent skip list keyed by a monotonic insertion
/// sequence, which gives scans insertion order and gives capped collections
/// their front-eviction order. Writes to one collection serialize through a
/// per-collection mutex so unique-constraint checks and capped eviction see
/// a stable view; reads never block.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    collections: Arc<DashMap<String, Arc<MemoryCollection>>>,
}

struct MemoryCollection {
    options: CollectionOptions,
    docs: SkipMap<i64, Document>,
    seq: AtomicI64,
    /// Name-addressable, in creation order.
    indexes: RwLock<IndexMap<String, IndexSpec>>,
    write_lock: Mutex<()>,
}

impl MemoryCollection {
    fn new(options: CollectionOptions) -> Self {
        let id_index = IndexSpec::id_index();
        let mut indexes = IndexMap::new();
        indexes.insert(id_index.name.clone(), id_index);
        MemoryCollection {
            options,
            docs: SkipMap::new(),
            seq: AtomicI64::new(0),
            indexes: RwLock::new(indexes),
            write_lock: Mutex::new(()),
        }
    }

    fn byte_size(&self) -> u64 {
        self.docs
            .iter()
            .map(|entry| entry.value().byte_size() as u64)
            .sum()
    }

    /// Evicts documents from the front until the capped bounds hold again.
    fn evict_capped(&self) {
        if !self.options.capped {
            return;
        }
        if let Some(max) = self.options.max {
            if max > 0 {
                while self.docs.len() as i64 > max {
                    self.docs.pop_front();
                }
            }
        }
        if let Some(size) = self.options.size {
            while self.byte_size() as i64 > size && self.docs.len() > 1 {
                self.docs.pop_front();
            }
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend {
            collections: Arc::new(DashMap::new()),
        }
    }

    fn collection(&self, namespace: &str) -> MartenResult<Arc<MemoryCollection>> {
        self.collections
            .get(namespace)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                log::error!("collection {} does not exist", namespace);
                MartenError::new(
                    &format!("namespace {} does not exist", namespace),
                    ErrorKind::NamespaceNotFound,
                )
            })
    }
}

/// The indexed value of a document under a key spec; missing paths index
/// as null, matching the equality semantics of unique constraints.
fn index_key(doc: &Document, spec: &IndexSpec) -> Vec<Value> {
    spec.keys
        .iter()
        .map(|(path, _)| {
            lookup_path(doc, path)
                .first()
                .map(|v| (*v).clone())
                .unwrap_or(Value::Null)
        })
        .collect()
}

fn render_dup_key(spec: &IndexSpec, key: &[Value]) -> String {
    let body = spec
        .keys
        .iter()
        .zip(key)
        .map(|((field, _), value)| format!("{}: {}", field, value.render_literal()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{ {} }}", body)
}

impl StorageBackend for MemoryBackend {
    fn create_collection(
        &self,
        namespace: &str,
        options: &CollectionOptions,
    ) -> MartenResult<bool> {
        // the entry API makes this an atomic check-and-create: exactly one
        // racing caller constructs the collection
        let mut created = false;
        self.collections
            .entry(namespace.to_string())
            .or_insert_with(|| {
                created = true;
                Arc::new(MemoryCollection::new(options.clone()))
            });
        Ok(created)
    }

    fn drop_collection(&self, namespace: &str) -> MartenResult<bool> {
        Ok(self.collections.remove(namespace).is_some())
    }

    fn has_collection(&self, namespace: &str) -> bool {
        self.collections.contains_key(namespace)
    }

    fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    fn scan(&self, namespace: &str) -> MartenResult<Vec<Document>> {
        let collection = self.collection(namespace)?;
        Ok(collection
            .docs
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn insert(&self, namespace: &str, doc: Document) -> MartenResult<()> {
        let collection = self.collection(namespace)?;
        let _guard = collection.write_lock.lock();

        let unique_specs: Vec<IndexSpec> = collection
            .indexes
            .read()
            .values()
            .filter(|spec| spec.unique)
            .cloned()
            .collect();
        for spec in &unique_specs {
            let key = index_key(&doc, spec);
            for entry in collection.docs.iter() {
                if index_key(entry.value(), spec) == key {
                    return Err(errors::duplicate_key(
                        namespace,
                        &spec.name,
                        &render_dup_key(spec, &key),
                    ));
                }
            }
        }

        let seq = collection.seq.fetch_add(1, Ordering::Relaxed);
        collection.docs.insert(seq, doc);
        collection.evict_capped();
        Ok(())
    }

    fn replace(&self, namespace: &str, id: &Value, doc: Document) -> MartenResult<bool> {
        let collection = self.collection(namespace)?;
        let _guard = collection.write_lock.lock();

        let Some(seq) = collection
            .docs
            .iter()
            .find(|entry| entry.value().get(DOC_ID) == Some(id))
            .map(|entry| *entry.key())
        else {
            return Ok(false);
        };

        let unique_specs: Vec<IndexSpec> = collection
            .indexes
            .read()
            .values()
            .filter(|spec| spec.unique)
            .cloned()
            .collect();
        for spec in &unique_specs {
            let key = index_key(&doc, spec);
            for entry in collection.docs.iter() {
                if *entry.key() != seq && index_key(entry.value(), spec) == key {
                    return Err(errors::duplicate_key(
                        namespace,
                        &spec.name,
                        &render_dup_key(spec, &key),
                    ));
                }
            }
        }

        collection.docs.insert(seq, doc);
        Ok(true)
    }

    fn delete(&self, namespace: &str, ids: &[Value]) -> MartenResult<u64> {
        let collection = self.collection(namespace)?;
        let _guard = collection.write_lock.lock();

        let doomed: Vec<i64> = collection
            .docs
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .get(DOC_ID)
                    .is_some_and(|id| ids.contains(id))
            })
            .map(|entry| *entry.key())
            .collect();
        for seq in &doomed {
            collection.docs.remove(seq);
        }
        Ok(doomed.len() as u64)
    }

    fn create_index(&self, namespace: &str, spec: IndexSpec) -> MartenResult<()> {
        let collection = self.collection(namespace)?;
        collection.indexes.write().insert(spec.name.clone(), spec);
        Ok(())
    }

    fn drop_index(&self, namespace: &str, name: &str) -> MartenResult<bool> {
        let collection = self.collection(namespace)?;
        let removed = collection.indexes.write().shift_remove(name).is_some();
        Ok(removed)
    }

    fn list_indexes(&self, namespace: &str) -> MartenResult<Vec<IndexSpec>> {
        let collection = self.collection(namespace)?;
        let indexes = collection.indexes.read().values().cloned().collect();
        Ok(indexes)
    }

    fn stats(&self, namespace: &str) -> MartenResult<CollectionStats> {
        let collection = self.collection(namespace)?;
        let index_count = collection.indexes.read().len();
        Ok(CollectionStats {
            document_count: collection.docs.len() as u64,
            size_bytes: collection.byte_size(),
            index_count,
            capped: collection.options.capped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use std::thread;

    fn backend_with(namespace: &str) -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .create_collection(namespace, &CollectionOptions::default())
            .unwrap();
        backend
    }

    #[test]
    fn test_create_collection_reports_first_creation_only() {
        let backend = MemoryBackend::new();
        assert!(backend
            .create_collection("db.users", &CollectionOptions::default())
            .unwrap());
        assert!(!backend
            .create_collection("db.users", &CollectionOptions::default())
            .unwrap());
        assert_eq!(backend.list_collections(), vec!["db.users".to_string()]);
    }

    #[test]
    fn test_concurrent_creates_produce_one_collection() {
        let backend = MemoryBackend::new();
        let mut handles = Vec::new();
        for _ in 0..8 {
            let backend = backend.clone();
            handles.push(thread::spawn(move || {
                backend
                    .create_collection("db.racing", &CollectionOptions::default())
                    .unwrap()
            }));
        }
        let created: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(created.iter().filter(|c| **c).count(), 1);
        assert_eq!(backend.list_collections().len(), 1);
    }

    #[test]
    fn test_scan_preserves_insertion_order() {
        let backend = backend_with("db.seq");
        for i in 0..5 {
            backend.insert("db.seq", doc! { "_id": (i), n: (i) }).unwrap();
        }
        let docs = backend.scan("db.seq").unwrap();
        let ns: Vec<Value> = docs.iter().map(|d| d.get("n").unwrap().clone()).collect();
        let expected: Vec<Value> = (0..5).map(Value::Int32).collect();
        assert_eq!(ns, expected);
    }

    #[test]
    fn test_duplicate_id_is_rejected_with_e11000() {
        let backend = backend_with("db.users");
        backend.insert("db.users", doc! { "_id": "a" }).unwrap();
        let err = backend.insert("db.users", doc! { "_id": "a" }).unwrap_err();
        assert_eq!(err.code(), 11000);
        assert_eq!(
            err.message(),
            "E11000 duplicate key error collection: db.users index: _id_ \
             dup key: { _id: \"a\" }"
        );
    }

    #[test]
    fn test_unique_secondary_index_is_enforced() {
        let backend = backend_with("db.users");
        backend
            .create_index(
                "db.users",
                IndexSpec {
                    name: "email_1".to_string(),
                    keys: vec![("email".to_string(), 1)],
                    unique: true,
                },
            )
            .unwrap();
        backend
            .insert("db.users", doc! { "_id": 1, email: "a@x" })
            .unwrap();
        let err = backend
            .insert("db.users", doc! { "_id": 2, email: "a@x" })
            .unwrap_err();
        assert!(err.message().contains("index: email_1"));
    }

    #[test]
    fn test_replace_swaps_document_in_place() {
        let backend = backend_with("db.users");
        backend
            .insert("db.users", doc! { "_id": 1, v: "old" })
            .unwrap();
        let replaced = backend
            .replace("db.users", &Value::Int32(1), doc! { "_id": 1, v: "new" })
            .unwrap();
        assert!(replaced);
        let docs = backend.scan("db.users").unwrap();
        assert_eq!(docs[0].get("v"), Some(&Value::String("new".to_string())));
    }

    #[test]
    fn test_delete_by_ids() {
        let backend = backend_with("db.users");
        for i in 0..4 {
            backend.insert("db.users", doc! { "_id": (i) }).unwrap();
        }
        let deleted = backend
            .delete("db.users", &[Value::Int32(1), Value::Int32(3)])
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(backend.scan("db.users").unwrap().len(), 2);
    }

    #[test]
    fn test_capped_collection_evicts_in_insertion_order() {
        let backend = MemoryBackend::new();
        let options = CollectionOptions {
            capped: true,
            size: Some(1 << 20),
            max: Some(3),
        };
        backend.create_collection("db.capped", &options).unwrap();
        for i in 0..5 {
            backend.insert("db.capped", doc! { "_id": (i) }).unwrap();
        }
        let docs = backend.scan("db.capped").unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].get("_id"), Some(&Value::Int32(2)));
    }

    #[test]
    fn test_drop_collection_removes_documents_and_indexes() {
        let backend = backend_with("db.gone");
        backend.insert("db.gone", doc! { "_id": 1 }).unwrap();
        assert!(backend.drop_collection("db.gone").unwrap());
        assert!(!backend.has_collection("db.gone"));
        assert!(backend.scan("db.gone").is_err());
    }

    #[test]
    fn test_stats_reports_counts() {
        let backend = backend_with("db.stats");
        backend.insert("db.stats", doc! { "_id": 1, v: "x" }).unwrap();
        let stats = backend.stats("db.stats").unwrap();
        assert_eq!(stats.document_count, 1);
        assert_eq!(stats.index_count, 1);
        assert!(stats.size_bytes > 0);
    }
}
