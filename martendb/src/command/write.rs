use crate::catalog::NamespaceCatalog;
use crate::command::{collection_namespace, ok_reply};
use crate::common::{CancellationToken, DOC_ID};
use crate::document::{validate_document, Document, ObjectId, Value};
use crate::errors::{self, ErrorKind, MartenError, MartenResult};
use crate::query::matches;
use crate::update::apply_update;

/// Per-document failure inside a write batch.
struct WriteError {
    index: usize,
    error: MartenError,
}

fn write_errors_value(write_errors: Vec<WriteError>) -> Value {
    Value::Array(
        write_errors
            .into_iter()
            .map(|we| {
                let mut doc = Document::new();
                doc.put("index", Value::Int32(we.index as i32));
                doc.put("code", Value::Int32(we.error.code()));
                doc.put("errmsg", Value::String(we.error.message().to_string()));
                Value::Document(doc)
            })
            .collect(),
    )
}

/// `insert {documents: [Document], ordered: bool}`.
///
/// Validates each document and appends it through the storage backend,
/// implicitly creating the collection. With `ordered: true` (the default)
/// processing stops at the first failing document and prior successes are
/// retained; with `ordered: false` every document is attempted and all
/// per-document errors are collected.
pub(crate) fn insert(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
    cancel: &CancellationToken,
) -> MartenResult<Document> {
    let namespace = collection_namespace(db, command, "insert")?;
    let documents = match command.get("documents") {
        Some(Value::Array(documents)) => documents,
        Some(other) => {
            return Err(errors::field_type_mismatch(
                "insert.documents",
                other.type_name(),
                "[array]",
            ));
        }
        None => {
            return Err(MartenError::new(
                "required parameter \"documents\" is missing",
                ErrorKind::BadValue,
            ));
        }
    };
    let ordered = ordered_flag(command)?;

    catalog.ensure_collection(&namespace)?;

    let mut inserted = 0i32;
    let mut write_errors = Vec::new();

    for (index, element) in documents.iter().enumerate() {
        cancel.checkpoint()?;

        let result = insert_one(catalog, &namespace, element);
        match result {
            Ok(()) => inserted += 1,
            Err(error) => {
                write_errors.push(WriteError { index, error });
                if ordered {
                    break;
                }
            }
        }
    }

    let mut reply = Document::new();
    reply.put("n", Value::Int32(inserted));
    if !write_errors.is_empty() {
        reply.put("writeErrors", write_errors_value(write_errors));
    }
    Ok(ok_reply(reply))
}

fn insert_one(
    catalog: &NamespaceCatalog,
    namespace: &str,
    element: &Value,
) -> MartenResult<()> {
    let doc = element.as_document().ok_or_else(|| {
        MartenError::new(
            &format!("document has invalid type {}", element.type_name()),
            ErrorKind::BadValue,
        )
    })?;
    validate_document(doc)?;

    let mut doc = doc.clone();
    if !doc.contains_key(DOC_ID) {
        // generated ids lead the document, matching the reference layout
        let mut with_id = Document::with_capacity(doc.len() + 1);
        with_id.put(DOC_ID, Value::ObjectId(ObjectId::new()));
        for (key, value) in doc.into_iter() {
            with_id.push(&key, value);
        }
        doc = with_id;
    }

    catalog.backend().insert(namespace, doc)
}

fn ordered_flag(command: &Document) -> MartenResult<bool> {
    match command.get("ordered") {
        None | Some(Value::Null) => Ok(true),
        Some(Value::Bool(ordered)) => Ok(*ordered),
        Some(other) => Err(errors::field_type_mismatch(
            "insert.ordered",
            other.type_name(),
            "[bool]",
        )),
    }
}

/// `update {updates: [{q, u, upsert, multi}]}`.
///
/// Each statement matches documents with the query matcher and transforms
/// them with the update executor; the read-filter-apply-write cycle of one
/// document happens against the backend's per-collection write ordering so
/// matched documents are replaced by `_id`, never blindly rewritten.
pub(crate) fn update(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
    cancel: &CancellationToken,
) -> MartenResult<Document> {
    let namespace = collection_namespace(db, command, "update")?;
    let updates = match command.get("updates") {
        Some(Value::Array(updates)) => updates,
        _ => {
            return Err(MartenError::new(
                "required parameter \"updates\" is missing",
                ErrorKind::BadValue,
            ));
        }
    };

    catalog.ensure_collection(&namespace)?;

    // one logical read-filter-apply-write unit per statement
    let lock = catalog.namespace_lock(&namespace);
    let _guard = lock.write();

    let mut matched = 0i32;
    let mut modified = 0i32;
    let mut upserted = Vec::new();
    let mut write_errors = Vec::new();

    for (index, statement) in updates.iter().enumerate() {
        cancel.checkpoint()?;
        let result = update_one_statement(
            catalog,
            &namespace,
            statement,
            cancel,
            &mut matched,
            &mut modified,
            &mut upserted,
            index,
        );
        if let Err(error) = result {
            write_errors.push(WriteError { index, error });
            break;
        }
    }

    let mut reply = Document::new();
    reply.put("n", Value::Int32(matched));
    reply.put("nModified", Value::Int32(modified));
    if !upserted.is_empty() {
        reply.put("upserted", Value::Array(upserted));
    }
    if !write_errors.is_empty() {
        reply.put("writeErrors", write_errors_value(write_errors));
    }
    Ok(ok_reply(reply))
}

#[allow(clippy::too_many_arguments)]
fn update_one_statement(
    catalog: &NamespaceCatalog,
    namespace: &str,
    statement: &Value,
    cancel: &CancellationToken,
    matched: &mut i32,
    modified: &mut i32,
    upserted: &mut Vec<Value>,
    statement_index: usize,
) -> MartenResult<()> {
    let statement = statement.as_document().ok_or_else(|| {
        MartenError::new("update statement must be a document", ErrorKind::BadValue)
    })?;
    let filter = match statement.get("q") {
        Some(Value::Document(filter)) => filter.clone(),
        _ => Document::new(),
    };
    let spec = match statement.get("u") {
        Some(Value::Document(spec)) => spec.clone(),
        Some(other) => {
            return Err(MartenError::new(
                &format!(
                    "Update argument must be a document, but is of type: {}",
                    other.type_name()
                ),
                ErrorKind::FailedToParse,
            ));
        }
        None => {
            return Err(MartenError::new(
                "required parameter \"u\" is missing",
                ErrorKind::BadValue,
            ));
        }
    };
    let multi = statement.get("multi").and_then(|v| v.as_bool()).unwrap_or(false);
    let upsert = statement.get("upsert").and_then(|v| v.as_bool()).unwrap_or(false);

    let backend = catalog.backend();
    let mut statement_matched = 0;

    for doc in backend.scan(namespace)? {
        cancel.checkpoint()?;
        if !matches(&doc, &filter)? {
            continue;
        }
        statement_matched += 1;
        *matched += 1;

        let (updated, was_modified) = apply_update(&doc, &spec, false)?;
        if was_modified {
            let id = doc.id().cloned().unwrap_or(Value::Null);
            backend.replace(namespace, &id, updated)?;
            *modified += 1;
        }
        if !multi {
            break;
        }
    }

    if statement_matched == 0 && upsert {
        let base = upsert_base(&filter);
        let (mut created, _) = apply_update(&base, &spec, true)?;
        if !created.contains_key(DOC_ID) {
            let mut with_id = Document::with_capacity(created.len() + 1);
            with_id.put(DOC_ID, Value::ObjectId(ObjectId::new()));
            for (key, value) in created.into_iter() {
                with_id.push(&key, value);
            }
            created = with_id;
        }
        let id = created.id().cloned().unwrap_or(Value::Null);
        backend.insert(namespace, created)?;
        *matched += 1;

        let mut entry = Document::new();
        entry.put("index", Value::Int32(statement_index as i32));
        entry.put(DOC_ID, id);
        upserted.push(Value::Document(entry));
    }

    Ok(())
}

/// Seeds an upsert-created document with the filter's literal top-level
/// equality terms; operator terms contribute nothing.
fn upsert_base(filter: &Document) -> Document {
    let mut base = Document::new();
    for (key, value) in filter.iter() {
        if key.starts_with('$') || key.contains('.') {
            continue;
        }
        match value {
            Value::Document(spec) if spec.first_key().is_some_and(|k| k.starts_with('$')) => {}
            other => base.put(key, other.clone()),
        }
    }
    base
}

/// `delete {deletes: [{q, limit}]}` — `limit: 1` removes the first match,
/// `limit: 0` removes every match.
pub(crate) fn delete(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
    cancel: &CancellationToken,
) -> MartenResult<Document> {
    let namespace = collection_namespace(db, command, "delete")?;
    let deletes = match command.get("deletes") {
        Some(Value::Array(deletes)) => deletes,
        _ => {
            return Err(MartenError::new(
                "required parameter \"deletes\" is missing",
                ErrorKind::BadValue,
            ));
        }
    };

    let mut removed = 0i64;
    if catalog.has_collection(&namespace) {
        let lock = catalog.namespace_lock(&namespace);
        let _guard = lock.write();
        let backend = catalog.backend();
        for statement in deletes {
            cancel.checkpoint()?;
            let statement = statement.as_document().ok_or_else(|| {
                MartenError::new("delete statement must be a document", ErrorKind::BadValue)
            })?;
            let filter = match statement.get("q") {
                Some(Value::Document(filter)) => filter.clone(),
                _ => Document::new(),
            };
            let just_one = statement
                .get("limit")
                .and_then(|v| v.to_int_lossy())
                .unwrap_or(0)
                == 1;

            let mut ids = Vec::new();
            for doc in backend.scan(&namespace)? {
                cancel.checkpoint()?;
                if matches(&doc, &filter)? {
                    ids.push(doc.id().cloned().unwrap_or(Value::Null));
                    if just_one {
                        break;
                    }
                }
            }
            removed += backend.delete(&namespace, &ids)? as i64;
        }
    }

    let mut reply = Document::new();
    reply.put("n", Value::Int64(removed));
    Ok(ok_reply(reply))
}
