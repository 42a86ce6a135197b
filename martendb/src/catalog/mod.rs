use crate::common::{LockRegistry, DEFAULT_SCALE, ID_INDEX_NAME, WILDCARD_INDEX};
use crate::document::{Document, Value};
use crate::errors::{self, ErrorKind, MartenError, MartenResult};
use crate::store::{CollectionOptions, CollectionStats, IndexSpec, StorageBackend};
use std::ops::Deref;
use std::sync::Arc;

/// Duplicate-create semantics for explicit `create` commands.
///
/// The protocol mixes two eras here. The targeted behavior is
/// [CreateMode::Idempotent]: every racing creator succeeds and exactly one
/// physical collection results. [CreateMode::Legacy] restores the older
/// `NamespaceExists` error for the non-first caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CreateMode {
    #[default]
    Idempotent,
    Legacy,
}

/// Outcome of a `createIndexes` call.
#[derive(Debug)]
pub struct CreateIndexesOutcome {
    /// True iff the target collection did not exist before this call.
    pub created_collection_automatically: bool,
    pub num_indexes_before: usize,
    pub num_indexes_after: usize,
    /// Set when every requested index already existed with an identical spec.
    pub note: Option<&'static str>,
}

/// Outcome of a `dropIndexes` call.
#[derive(Debug)]
pub struct DropIndexesOutcome {
    pub n_indexes_was: usize,
    /// True for the `"*"` wildcard form.
    pub dropped_all: bool,
}

/// The namespace table: collection and index lifecycle over the storage
/// backend.
///
/// All lifecycle mutations of a given namespace serialize through a named
/// lock so that N concurrent creations of the same name produce exactly one
/// physical collection while every caller returns success. Operations on
/// different namespaces proceed fully in parallel. The catalog owns no
/// document state; documents live behind the backend.
///
/// Cloning shares the underlying state.
#[derive(Clone)]
pub struct NamespaceCatalog {
    inner: Arc<NamespaceCatalogInner>,
}

impl NamespaceCatalog {
    pub fn new(backend: Arc<dyn StorageBackend>, create_mode: CreateMode) -> Self {
        NamespaceCatalog {
            inner: Arc::new(NamespaceCatalogInner {
                backend,
                lock_registry: LockRegistry::new(),
                create_mode,
            }),
        }
    }
}

impl Deref for NamespaceCatalog {
    type Target = Arc<NamespaceCatalogInner>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct NamespaceCatalogInner {
    backend: Arc<dyn StorageBackend>,
    lock_registry: LockRegistry,
    create_mode: CreateMode,
}

impl NamespaceCatalogInner {
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// The shared per-namespace lock. Write handlers hold its write side for
    /// the duration of a read-filter-apply-write cycle so matched documents
    /// cannot be lost to a concurrent writer; reads never take it.
    pub fn namespace_lock(&self, namespace: &str) -> crate::common::LockHandle {
        self.lock_registry.get_lock(namespace)
    }

    /// Makes sure the namespace exists, creating it with default options if
    /// absent. Returns whether this call performed the creation.
    ///
    /// This is the implicit-creation path taken by first writes and by
    /// `createIndexes`; it never fails on an existing collection.
    pub fn ensure_collection(&self, namespace: &str) -> MartenResult<bool> {
        let lock = self.lock_registry.get_lock(namespace);
        let _guard = lock.write();
        self.backend
            .create_collection(namespace, &CollectionOptions::default())
    }

    /// Explicit collection creation with validated options.
    ///
    /// Under [CreateMode::Idempotent] an existing collection is success; the
    /// operation is "ensure collection exists". Under [CreateMode::Legacy]
    /// the non-first caller receives `NamespaceExists`.
    pub fn create_collection(
        &self,
        namespace: &str,
        options_doc: &Document,
    ) -> MartenResult<()> {
        let options = parse_create_options(options_doc)?;

        let lock = self.lock_registry.get_lock(namespace);
        let _guard = lock.write();
        let created = self.backend.create_collection(namespace, &options)?;
        if !created && self.create_mode == CreateMode::Legacy {
            log::error!("collection {} already exists", namespace);
            return Err(MartenError::new(
                &format!("Collection already exists. NS: {}", namespace),
                ErrorKind::NamespaceExists,
            ));
        }
        Ok(())
    }

    /// Drops a collection atomically: documents and indexes go together.
    pub fn drop_collection(&self, namespace: &str) -> MartenResult<()> {
        let lock = self.lock_registry.get_lock(namespace);
        let _guard = lock.write();
        if !self.backend.drop_collection(namespace)? {
            log::error!("drop of missing collection {}", namespace);
            return Err(MartenError::new("ns not found", ErrorKind::NamespaceNotFound));
        }
        Ok(())
    }

    pub fn list_collections(&self) -> Vec<String> {
        self.backend.list_collections()
    }

    pub fn has_collection(&self, namespace: &str) -> bool {
        self.backend.has_collection(namespace)
    }

    /// Creates the requested indexes.
    ///
    /// A request whose name and key spec both match an existing index is a
    /// no-op; when every request is such a no-op the outcome carries
    /// `note: "all indexes already exist"`. A name collision with a
    /// different key spec, or a key-spec collision under a different name,
    /// is an error. Serializes against concurrent index mutations of the
    /// same collection.
    pub fn create_indexes(
        &self,
        namespace: &str,
        requested: Vec<IndexSpec>,
    ) -> MartenResult<CreateIndexesOutcome> {
        if requested.is_empty() {
            return Err(MartenError::new(
                "Must specify at least one index to create",
                ErrorKind::BadValue,
            ));
        }

        let lock = self.lock_registry.get_lock(namespace);
        let _guard = lock.write();

        let created_collection_automatically = self
            .backend
            .create_collection(namespace, &CollectionOptions::default())?;

        let mut existing = self.backend.list_indexes(namespace)?;
        let num_indexes_before = existing.len();

        for spec in requested {
            validate_index_spec(&spec)?;

            if let Some(found) = existing.iter().find(|e| e.name == spec.name) {
                if found.same_keys(&spec) {
                    // identical spec: concurrent and repeated creation is
                    // idempotent
                    continue;
                }
                log::error!(
                    "index name {} exists with different keys on {}",
                    spec.name,
                    namespace
                );
                return Err(MartenError::new(
                    &format!(
                        "An existing index has the same name as the requested index. \
                         When index names are not specified, they are generated by \
                         appending a unique suffix to the name generated by the key \
                         pattern. Explicitly specify a name to avoid this conflict. \
                         Requested index: {{ v: 2, key: {}, name: \"{}\" }}, \
                         existing index: {{ v: 2, key: {}, name: \"{}\" }}",
                        spec.render_keys(),
                        spec.name,
                        found.render_keys(),
                        found.name
                    ),
                    ErrorKind::IndexKeySpecsConflict,
                ));
            }

            if let Some(found) = existing.iter().find(|e| e.same_keys(&spec)) {
                return Err(MartenError::new(
                    &format!("Index already exists with a different name: {}", found.name),
                    ErrorKind::IndexOptionsConflict,
                ));
            }

            self.backend.create_index(namespace, spec.clone())?;
            existing.push(spec);
        }

        let num_indexes_after = existing.len();
        Ok(CreateIndexesOutcome {
            created_collection_automatically,
            num_indexes_before,
            num_indexes_after,
            note: if num_indexes_after == num_indexes_before {
                Some("all indexes already exist")
            } else {
                None
            },
        })
    }

    /// Drops indexes by selector: a single name, a key-spec document, an
    /// array of either, or the `"*"` wildcard (all non-`_id` indexes). The
    /// default `_id` index can never be dropped: the wildcard silently
    /// excludes it and an explicit attempt errors.
    pub fn drop_indexes(
        &self,
        namespace: &str,
        selector: &Value,
    ) -> MartenResult<DropIndexesOutcome> {
        if !self.backend.has_collection(namespace) {
            log::error!("dropIndexes on missing collection {}", namespace);
            return Err(MartenError::new(
                &format!("ns not found {}", namespace),
                ErrorKind::NamespaceNotFound,
            ));
        }

        let lock = self.lock_registry.get_lock(namespace);
        let _guard = lock.write();

        let existing = self.backend.list_indexes(namespace)?;
        let n_indexes_was = existing.len();

        match selector {
            Value::String(name) if name == WILDCARD_INDEX => {
                for spec in &existing {
                    if spec.name != ID_INDEX_NAME {
                        self.backend.drop_index(namespace, &spec.name)?;
                    }
                }
                Ok(DropIndexesOutcome { n_indexes_was, dropped_all: true })
            }
            Value::String(name) => {
                self.drop_one_by_name(namespace, name)?;
                Ok(DropIndexesOutcome { n_indexes_was, dropped_all: false })
            }
            Value::Document(key_spec) => {
                self.drop_one_by_keys(namespace, &existing, key_spec)?;
                Ok(DropIndexesOutcome { n_indexes_was, dropped_all: false })
            }
            Value::Array(selectors) => {
                for element in selectors {
                    match element {
                        Value::String(name) if name == WILDCARD_INDEX => {
                            return Err(MartenError::new(
                                "Cannot drop by '*' inside an array of index names",
                                ErrorKind::BadValue,
                            ));
                        }
                        Value::String(name) => self.drop_one_by_name(namespace, name)?,
                        Value::Document(key_spec) => {
                            let existing = self.backend.list_indexes(namespace)?;
                            self.drop_one_by_keys(namespace, &existing, key_spec)?
                        }
                        other => {
                            return Err(errors::field_type_mismatch(
                                "dropIndexes.index",
                                other.type_name(),
                                "[string, object]",
                            ));
                        }
                    }
                }
                Ok(DropIndexesOutcome { n_indexes_was, dropped_all: false })
            }
            other => Err(errors::field_type_mismatch(
                "dropIndexes.index",
                other.type_name(),
                "[string, object]",
            )),
        }
    }

    fn drop_one_by_name(&self, namespace: &str, name: &str) -> MartenResult<()> {
        if name == ID_INDEX_NAME {
            return Err(MartenError::new(
                "cannot drop _id index",
                ErrorKind::InvalidOptions,
            ));
        }
        if name.contains('*') {
            // "*" alone is the wildcard; any other string containing it is
            // not a valid index name expression
            return Err(MartenError::new(
                &format!("invalid index name spec: \"{}\"", name),
                ErrorKind::BadValue,
            ));
        }
        if !self.backend.drop_index(namespace, name)? {
            return Err(MartenError::new(
                &format!("index not found with name [{}]", name),
                ErrorKind::IndexNotFound,
            ));
        }
        Ok(())
    }

    fn drop_one_by_keys(
        &self,
        namespace: &str,
        existing: &[IndexSpec],
        key_spec: &Document,
    ) -> MartenResult<()> {
        let keys = parse_key_document(key_spec)?;
        let Some(found) = existing.iter().find(|e| e.keys == keys) else {
            return Err(MartenError::new(
                &format!(
                    "can't find index with key: {}",
                    Value::Document(key_spec.clone()).render_literal()
                ),
                ErrorKind::IndexNotFound,
            ));
        };
        if found.name == ID_INDEX_NAME {
            return Err(MartenError::new(
                "cannot drop _id index",
                ErrorKind::InvalidOptions,
            ));
        }
        self.backend.drop_index(namespace, &found.name)?;
        Ok(())
    }

    pub fn list_indexes(&self, namespace: &str) -> MartenResult<Vec<IndexSpec>> {
        if !self.backend.has_collection(namespace) {
            return Err(MartenError::new(
                &format!("ns does not exist: {}", namespace),
                ErrorKind::NamespaceNotFound,
            ));
        }
        self.backend.list_indexes(namespace)
    }

    pub fn stats(&self, namespace: &str) -> MartenResult<CollectionStats> {
        self.backend.stats(namespace)
    }
}

/// Parses and validates a `create` command's capped-collection options.
pub(crate) fn parse_create_options(options_doc: &Document) -> MartenResult<CollectionOptions> {
    let capped = match options_doc.get("capped") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(v) if v.is_number() => v.to_int_lossy().unwrap_or(0) != 0,
        Some(other) => {
            return Err(errors::field_type_mismatch(
                "create.capped",
                other.type_name(),
                "[bool, long, int, decimal, double]",
            ));
        }
    };

    let size = parse_bound_field(options_doc, "size", "create.size")?;
    let max = parse_bound_field(options_doc, "max", "create.max")?;

    if capped && size.is_none() {
        log::error!("capped collection requested without size");
        return Err(MartenError::new(
            "the 'size' field is required when 'capped' is true",
            ErrorKind::InvalidOptions,
        ));
    }
    if max.is_some() && size.is_none() {
        return Err(MartenError::new(
            "the 'size' field is required when 'max' is set",
            ErrorKind::InvalidOptions,
        ));
    }

    Ok(CollectionOptions { capped, size, max })
}

fn parse_bound_field(
    options_doc: &Document,
    key: &str,
    qualified: &str,
) -> MartenResult<Option<i64>> {
    match options_doc.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) if v.is_number() => {
            let bound = v.to_int_lossy().unwrap_or(0);
            if bound <= 0 {
                return Err(errors::field_below_minimum(qualified, &v.render_literal()));
            }
            Ok(Some(bound))
        }
        Some(other) => Err(errors::field_type_mismatch(
            qualified,
            other.type_name(),
            "[long, int, decimal, double]",
        )),
    }
}

fn validate_index_spec(spec: &IndexSpec) -> MartenResult<()> {
    if spec.name.is_empty() {
        return Err(MartenError::new(
            "The index name cannot be empty",
            ErrorKind::BadValue,
        ));
    }
    if spec.keys.is_empty() {
        return Err(MartenError::new(
            "The field 'key' for an index specification must be a non-empty object",
            ErrorKind::BadValue,
        ));
    }
    Ok(())
}

/// Converts a `{field: direction}` document into an ordered key spec.
pub fn parse_key_document(key_spec: &Document) -> MartenResult<Vec<(String, i32)>> {
    let mut keys = Vec::with_capacity(key_spec.len());
    for (field, direction) in key_spec.iter() {
        let direction = match direction.to_int_lossy() {
            Some(1) => 1,
            Some(-1) => -1,
            _ => {
                return Err(MartenError::new(
                    &format!(
                        "Index key value for '{}' must be 1 or -1, got: {}",
                        field,
                        direction.render_literal()
                    ),
                    ErrorKind::BadValue,
                ));
            }
        };
        keys.push((field.to_string(), direction));
    }
    Ok(keys)
}

/// Validates a stats `scale` argument: absent, null and NaN fall back to the
/// default scale, non-positive numbers are out of bound, and non-numeric
/// kinds are a type mismatch.
pub fn validate_scale(scale: Option<&Value>, qualified: &str) -> MartenResult<i64> {
    match scale {
        None | Some(Value::Null) => Ok(DEFAULT_SCALE),
        Some(v) if v.is_nan() => Ok(DEFAULT_SCALE),
        Some(v) if v.is_number() => {
            let scale = v.to_int_lossy().unwrap_or(0);
            if scale <= 0 {
                return Err(errors::field_below_minimum(qualified, &v.render_literal()));
            }
            Ok(scale)
        }
        Some(other) => Err(errors::field_type_mismatch(
            qualified,
            other.type_name(),
            "[int, long, double, decimal]",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::store::MemoryBackend;
    use std::thread;

    fn catalog() -> NamespaceCatalog {
        NamespaceCatalog::new(Arc::new(MemoryBackend::new()), CreateMode::Idempotent)
    }

    fn spec(name: &str, keys: &[(&str, i32)], unique: bool) -> IndexSpec {
        IndexSpec {
            name: name.to_string(),
            keys: keys
                .iter()
                .map(|(f, d)| (f.to_string(), *d))
                .collect(),
            unique,
        }
    }

    #[test]
    fn test_create_collection_is_idempotent_by_default() {
        let catalog = catalog();
        catalog.create_collection("db.users", &doc! {}).unwrap();
        catalog.create_collection("db.users", &doc! {}).unwrap();
        assert_eq!(catalog.list_collections(), vec!["db.users".to_string()]);
    }

    #[test]
    fn test_legacy_mode_surfaces_namespace_exists() {
        let catalog =
            NamespaceCatalog::new(Arc::new(MemoryBackend::new()), CreateMode::Legacy);
        catalog.create_collection("db.users", &doc! {}).unwrap();
        let err = catalog.create_collection("db.users", &doc! {}).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NamespaceExists);
        assert_eq!(err.code(), 48);
        assert_eq!(err.message(), "Collection already exists. NS: db.users");
    }

    #[test]
    fn test_concurrent_creates_all_succeed_with_one_collection() {
        let catalog = catalog();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let catalog = catalog.clone();
            handles.push(thread::spawn(move || {
                catalog.create_collection("db.racing", &doc! {})
            }));
        }
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(catalog.list_collections().len(), 1);
    }

    #[test]
    fn test_capped_requires_size() {
        let catalog = catalog();
        let err = catalog
            .create_collection("db.capped", &doc! { capped: true })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOptions);
        assert_eq!(err.code(), 72);
        assert_eq!(
            err.message(),
            "the 'size' field is required when 'capped' is true"
        );
    }

    #[test]
    fn test_capped_size_must_be_positive() {
        let catalog = catalog();
        let err = catalog
            .create_collection("db.capped", &doc! { capped: true, size: 0 })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::Location51024);
        assert_eq!(
            err.message(),
            "BSON field 'create.size' value must be >= 1, actual value '0'"
        );

        let err = catalog
            .create_collection("db.capped", &doc! { capped: true, size: (-1.5) })
            .unwrap_err();
        assert_eq!(err.code(), 51024);
    }

    #[test]
    fn test_capped_wrong_field_type_is_type_mismatch() {
        let catalog = catalog();
        let err = catalog
            .create_collection("db.capped", &doc! { capped: "yes" })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TypeMismatch);
        assert!(err.message().contains("'create.capped'"));

        let err = catalog
            .create_collection("db.capped", &doc! { capped: true, size: "big" })
            .unwrap_err();
        assert!(err.message().contains("'create.size'"));
    }

    #[test]
    fn test_max_requires_size() {
        let catalog = catalog();
        let err = catalog
            .create_collection("db.capped", &doc! { max: 10 })
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOptions);
        assert_eq!(err.message(), "the 'size' field is required when 'max' is set");
    }

    #[test]
    fn test_drop_missing_collection_is_namespace_not_found() {
        let catalog = catalog();
        let err = catalog.drop_collection("db.ghost").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NamespaceNotFound);
        assert_eq!(err.code(), 26);
        assert_eq!(err.message(), "ns not found");
    }

    #[test]
    fn test_create_indexes_reports_counts_and_auto_creation() {
        let catalog = catalog();
        let outcome = catalog
            .create_indexes("db.users", vec![spec("v_-1", &[("v", -1)], false)])
            .unwrap();
        assert!(outcome.created_collection_automatically);
        assert_eq!(outcome.num_indexes_before, 1);
        assert_eq!(outcome.num_indexes_after, 2);
        assert!(outcome.note.is_none());

        let outcome = catalog
            .create_indexes("db.users", vec![spec("foo_1", &[("foo", 1)], false)])
            .unwrap();
        assert!(!outcome.created_collection_automatically);
        assert_eq!(outcome.num_indexes_before, 2);
        assert_eq!(outcome.num_indexes_after, 3);
    }

    #[test]
    fn test_create_indexes_identical_spec_is_idempotent_with_note() {
        let catalog = catalog();
        let index = spec("v_-1", &[("v", -1)], false);
        catalog.create_indexes("db.users", vec![index.clone()]).unwrap();
        let outcome = catalog.create_indexes("db.users", vec![index]).unwrap();
        assert_eq!(outcome.num_indexes_before, outcome.num_indexes_after);
        assert_eq!(outcome.note, Some("all indexes already exist"));
    }

    #[test]
    fn test_create_indexes_same_name_different_keys_fails() {
        let catalog = catalog();
        catalog
            .create_indexes("db.users", vec![spec("myindex", &[("v", -1)], false)])
            .unwrap();
        let err = catalog
            .create_indexes("db.users", vec![spec("myindex", &[("w", 1)], false)])
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexKeySpecsConflict);
        assert!(err
            .message()
            .starts_with("An existing index has the same name as the requested index"));
    }

    #[test]
    fn test_create_indexes_same_keys_different_name_fails() {
        let catalog = catalog();
        catalog
            .create_indexes("db.users", vec![spec("first", &[("v", -1)], false)])
            .unwrap();
        let err = catalog
            .create_indexes("db.users", vec![spec("second", &[("v", -1)], false)])
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexOptionsConflict);
        assert_eq!(
            err.message(),
            "Index already exists with a different name: first"
        );
    }

    #[test]
    fn test_create_indexes_rejects_empty_name_and_keys() {
        let catalog = catalog();
        let err = catalog
            .create_indexes("db.users", vec![spec("", &[("v", 1)], false)])
            .unwrap_err();
        assert_eq!(err.message(), "The index name cannot be empty");

        let err = catalog
            .create_indexes("db.users", vec![spec("x", &[], false)])
            .unwrap_err();
        assert!(err.message().contains("non-empty object"));

        let err = catalog.create_indexes("db.users", vec![]).unwrap_err();
        assert_eq!(err.message(), "Must specify at least one index to create");
    }

    #[test]
    fn test_drop_indexes_wildcard_keeps_id_index() {
        let catalog = catalog();
        catalog
            .create_indexes(
                "db.users",
                vec![spec("v_-1", &[("v", -1)], false), spec("foo_1", &[("foo", 1)], false)],
            )
            .unwrap();
        let outcome = catalog
            .drop_indexes("db.users", &Value::String("*".to_string()))
            .unwrap();
        assert_eq!(outcome.n_indexes_was, 3);
        assert!(outcome.dropped_all);

        let left = catalog.list_indexes("db.users").unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].name, "_id_");
    }

    #[test]
    fn test_drop_indexes_by_name_and_key_spec() {
        let catalog = catalog();
        catalog
            .create_indexes("db.users", vec![spec("v_-1", &[("v", -1)], false)])
            .unwrap();
        catalog
            .drop_indexes("db.users", &Value::String("v_-1".to_string()))
            .unwrap();
        assert_eq!(catalog.list_indexes("db.users").unwrap().len(), 1);

        catalog
            .create_indexes("db.users", vec![spec("v_-1", &[("v", -1)], false)])
            .unwrap();
        let key_spec = Value::Document(doc! { v: (-1) });
        catalog.drop_indexes("db.users", &key_spec).unwrap();
        assert_eq!(catalog.list_indexes("db.users").unwrap().len(), 1);
    }

    #[test]
    fn test_drop_indexes_array_selector() {
        let catalog = catalog();
        catalog
            .create_indexes(
                "db.users",
                vec![spec("a_1", &[("a", 1)], false), spec("b_1", &[("b", 1)], false)],
            )
            .unwrap();
        let selector = Value::Array(vec![
            Value::String("a_1".to_string()),
            Value::Document(doc! { b: 1 }),
        ]);
        catalog.drop_indexes("db.users", &selector).unwrap();
        assert_eq!(catalog.list_indexes("db.users").unwrap().len(), 1);
    }

    #[test]
    fn test_drop_id_index_is_rejected() {
        let catalog = catalog();
        catalog.ensure_collection("db.users").unwrap();
        let err = catalog
            .drop_indexes("db.users", &Value::String("_id_".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOptions);
        assert_eq!(err.message(), "cannot drop _id index");
    }

    #[test]
    fn test_drop_indexes_invalid_wildcard_string() {
        let catalog = catalog();
        catalog.ensure_collection("db.users").unwrap();
        let err = catalog
            .drop_indexes("db.users", &Value::String("***".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::BadValue);
        assert_eq!(err.message(), "invalid index name spec: \"***\"");
    }

    #[test]
    fn test_drop_indexes_unknown_name() {
        let catalog = catalog();
        catalog.ensure_collection("db.users").unwrap();
        let err = catalog
            .drop_indexes("db.users", &Value::String("ghost".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::IndexNotFound);
        assert_eq!(err.message(), "index not found with name [ghost]");
    }

    #[test]
    fn test_drop_indexes_on_missing_collection() {
        let catalog = catalog();
        let err = catalog
            .drop_indexes("db.ghost", &Value::String("*".to_string()))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::NamespaceNotFound);
        assert_eq!(err.message(), "ns not found db.ghost");
    }

    #[test]
    fn test_validate_scale() {
        assert_eq!(validate_scale(None, "collStats.scale").unwrap(), 1);
        assert_eq!(validate_scale(Some(&Value::Null), "collStats.scale").unwrap(), 1);
        assert_eq!(
            validate_scale(Some(&Value::Double(f64::NAN)), "collStats.scale").unwrap(),
            1
        );
        assert_eq!(
            validate_scale(Some(&Value::Double(2.9)), "collStats.scale").unwrap(),
            2
        );
        let err = validate_scale(Some(&Value::Int32(0)), "collStats.scale").unwrap_err();
        assert_eq!(err.code(), 51024);
        let err =
            validate_scale(Some(&Value::Double(-0.5)), "collStats.scale").unwrap_err();
        assert_eq!(err.code(), 51024);
        let err = validate_scale(
            Some(&Value::String("x".to_string())),
            "collStats.scale",
        )
        .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TypeMismatch);
    }
}
