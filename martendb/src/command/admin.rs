use crate::catalog::{self, NamespaceCatalog};
use crate::command::{collection_namespace, ok_reply};
use crate::common::NAMESPACE_SEPARATOR;
use crate::document::{Document, Value};
use crate::errors::{self, ErrorKind, MartenError, MartenResult};
use crate::store::IndexSpec;

/// `create {<collection>, capped, size, max}` — see the catalog for the
/// option validation and duplicate-create semantics.
pub(crate) fn create(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
) -> MartenResult<Document> {
    let namespace = collection_namespace(db, command, "create")?;
    catalog.create_collection(&namespace, command)?;
    Ok(ok_reply(Document::new()))
}

/// `drop {<collection>}`.
pub(crate) fn drop(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
) -> MartenResult<Document> {
    let namespace = collection_namespace(db, command, "drop")?;
    let n_indexes_was = catalog
        .list_indexes(&namespace)
        .map(|indexes| indexes.len())
        .unwrap_or(0);
    catalog.drop_collection(&namespace)?;

    let mut reply = Document::new();
    reply.put("nIndexesWas", Value::Int32(n_indexes_was as i32));
    reply.put("ns", Value::String(namespace));
    Ok(ok_reply(reply))
}

/// `listCollections` — collections of the addressed database only.
pub(crate) fn list_collections(
    catalog: &NamespaceCatalog,
    db: &str,
) -> MartenResult<Document> {
    let prefix = format!("{}.", db);
    let mut batch = Vec::new();
    for namespace in catalog.list_collections() {
        let Some(name) = namespace.strip_prefix(&prefix) else {
            continue;
        };
        let mut entry = Document::new();
        entry.put("name", Value::String(name.to_string()));
        entry.put("type", Value::String("collection".to_string()));
        batch.push(Value::Document(entry));
    }

    let mut cursor = Document::new();
    cursor.put("firstBatch", Value::Array(batch));
    cursor.put("id", Value::Int64(0));
    cursor.put("ns", Value::String(format!("{}.$cmd.listCollections", db)));

    let mut reply = Document::new();
    reply.put("cursor", Value::Document(cursor));
    Ok(ok_reply(reply))
}

/// `createIndexes {<collection>, indexes: [{key, name, unique}]}`.
pub(crate) fn create_indexes(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
) -> MartenResult<Document> {
    let namespace = collection_namespace(db, command, "createIndexes")?;
    let specs = parse_index_documents(command)?;
    let outcome = catalog.create_indexes(&namespace, specs)?;

    let mut reply = Document::new();
    reply.put("numIndexesBefore", Value::Int32(outcome.num_indexes_before as i32));
    reply.put("numIndexesAfter", Value::Int32(outcome.num_indexes_after as i32));
    reply.put(
        "createdCollectionAutomatically",
        Value::Bool(outcome.created_collection_automatically),
    );
    if let Some(note) = outcome.note {
        reply.put("note", Value::String(note.to_string()));
    }
    Ok(ok_reply(reply))
}

/// `dropIndexes {<collection>, index: <name|spec|[...]|"*">}`.
pub(crate) fn drop_indexes(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
) -> MartenResult<Document> {
    let namespace = collection_namespace(db, command, "dropIndexes")?;
    let selector = command.get("index").ok_or_else(|| {
        MartenError::new(
            "BSON field 'dropIndexes.index' is missing but a required field",
            ErrorKind::BadValue,
        )
    })?;
    let outcome = catalog.drop_indexes(&namespace, selector)?;

    let mut reply = Document::new();
    reply.put("nIndexesWas", Value::Int32(outcome.n_indexes_was as i32));
    if outcome.dropped_all {
        reply.put(
            "msg",
            Value::String("non-_id indexes dropped for collection".to_string()),
        );
    }
    Ok(ok_reply(reply))
}

/// `listIndexes {<collection>}`.
pub(crate) fn list_indexes(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
) -> MartenResult<Document> {
    let namespace = collection_namespace(db, command, "listIndexes")?;
    let mut batch = Vec::new();
    for spec in catalog.list_indexes(&namespace)? {
        let mut entry = Document::new();
        entry.put("v", Value::Int32(2));
        entry.put("key", Value::Document(spec.key_document()));
        entry.put("name", Value::String(spec.name.clone()));
        if spec.unique && spec.name != crate::common::ID_INDEX_NAME {
            entry.put("unique", Value::Bool(true));
        }
        batch.push(Value::Document(entry));
    }

    let mut cursor = Document::new();
    cursor.put("firstBatch", Value::Array(batch));
    cursor.put("id", Value::Int64(0));
    cursor.put("ns", Value::String(namespace));

    let mut reply = Document::new();
    reply.put("cursor", Value::Document(cursor));
    Ok(ok_reply(reply))
}

/// `collStats {<collection>, scale}`.
pub(crate) fn coll_stats(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
) -> MartenResult<Document> {
    let namespace = collection_namespace(db, command, "collStats")?;
    let scale = catalog::validate_scale(command.get("scale"), "collStats.scale")?;
    let stats = catalog.stats(&namespace)?;

    let mut reply = Document::new();
    reply.put("ns", Value::String(namespace));
    reply.put("count", Value::Int64(stats.document_count as i64));
    reply.put("size", Value::Int64(stats.size_bytes as i64 / scale));
    reply.put("storageSize", Value::Int64(stats.size_bytes as i64 / scale));
    reply.put("nindexes", Value::Int32(stats.index_count as i32));
    reply.put("capped", Value::Bool(stats.capped));
    reply.put("scaleFactor", Value::Int64(scale));
    Ok(ok_reply(reply))
}

/// `dbStats {1, scale, freeStorage}` — aggregated over the database's
/// collections.
pub(crate) fn db_stats(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
) -> MartenResult<Document> {
    let scale = catalog::validate_scale(command.get("scale"), "dbStats.scale")?;

    let prefix = format!("{}.", db);
    let mut collections = 0i64;
    let mut objects = 0i64;
    let mut data_size = 0i64;
    let mut indexes = 0i64;
    for namespace in catalog.list_collections() {
        if !namespace.starts_with(&prefix) {
            continue;
        }
        let stats = catalog.stats(&namespace)?;
        collections += 1;
        objects += stats.document_count as i64;
        data_size += stats.size_bytes as i64;
        indexes += stats.index_count as i64;
    }

    let mut reply = Document::new();
    reply.put("db", Value::String(db.to_string()));
    reply.put("collections", Value::Int64(collections));
    reply.put("objects", Value::Int64(objects));
    reply.put("dataSize", Value::Double(data_size as f64 / scale as f64));
    reply.put("indexes", Value::Int64(indexes));
    reply.put("scaleFactor", Value::Int64(scale));
    Ok(ok_reply(reply))
}

/// Parses the `indexes` array of a `createIndexes` command into index
/// specifications, validating the per-index field types.
pub(crate) fn parse_index_documents(command: &Document) -> MartenResult<Vec<IndexSpec>> {
    let indexes = match command.get("indexes") {
        Some(Value::Array(indexes)) => indexes,
        Some(other) => {
            return Err(errors::field_type_mismatch(
                "createIndexes.indexes",
                other.type_name(),
                "[array]",
            ));
        }
        None => {
            return Err(MartenError::new(
                "required parameter \"indexes\" is missing",
                ErrorKind::BadValue,
            ));
        }
    };

    let mut specs = Vec::with_capacity(indexes.len());
    for element in indexes {
        let index = element.as_document().ok_or_else(|| {
            errors::field_type_mismatch(
                "createIndexes.indexes",
                element.type_name(),
                "[object]",
            )
        })?;

        let keys = match index.get("key") {
            Some(Value::Document(key_spec)) => catalog::parse_key_document(key_spec)?,
            Some(other) => {
                return Err(errors::field_type_mismatch(
                    "createIndexes.indexes.key",
                    other.type_name(),
                    "[object]",
                ));
            }
            None => {
                return Err(MartenError::new(
                    "The 'key' field is a required property of an index specification",
                    ErrorKind::BadValue,
                ));
            }
        };

        let name = match index.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(errors::field_type_mismatch(
                    "createIndexes.indexes.name",
                    other.type_name(),
                    "[string]",
                ));
            }
            None => {
                return Err(MartenError::new(
                    "The 'name' field is a required property of an index specification",
                    ErrorKind::BadValue,
                ));
            }
        };

        let unique = match index.get("unique") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(unique)) => *unique,
            Some(other) => {
                return Err(errors::field_type_mismatch(
                    "createIndexes.indexes.unique",
                    other.type_name(),
                    "[bool]",
                ));
            }
        };

        specs.push(IndexSpec { name, keys, unique });
    }
    Ok(specs)
}

/// Splits a full namespace back into database and collection parts.
fn split_namespace(namespace: &str) -> Option<(&str, &str)> {
    namespace.split_once(NAMESPACE_SEPARATOR)
}

/// `dataSize {<ns>}` — the namespace argument is the full `db.collection`
/// string.
pub(crate) fn data_size(
    catalog: &NamespaceCatalog,
    command: &Document,
) -> MartenResult<Document> {
    let namespace = match command.get("dataSize") {
        Some(Value::String(namespace)) => namespace.clone(),
        Some(other) => {
            return Err(MartenError::new(
                &format!("collection name has invalid type {}", other.type_name()),
                ErrorKind::BadValue,
            ));
        }
        None => {
            return Err(MartenError::new(
                "required parameter \"dataSize\" is missing",
                ErrorKind::BadValue,
            ));
        }
    };
    if split_namespace(&namespace).is_none() {
        return Err(MartenError::new(
            &format!("Invalid namespace specified '{}'", namespace),
            ErrorKind::InvalidNamespace,
        ));
    }
    let scale = catalog::validate_scale(command.get("scale"), "dataSize.scale")?;

    let mut reply = Document::new();
    if catalog.has_collection(&namespace) {
        let stats = catalog.stats(&namespace)?;
        reply.put("size", Value::Int64(stats.size_bytes as i64 / scale));
        reply.put("numObjects", Value::Int64(stats.document_count as i64));
    } else {
        reply.put("size", Value::Int64(0));
        reply.put("numObjects", Value::Int64(0));
    }
    Ok(ok_reply(reply))
}
