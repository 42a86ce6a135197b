use crate::catalog::{self, NamespaceCatalog};
use crate::command::admin::parse_index_documents;
use crate::command::{collection_namespace, ok_reply};
use crate::common::CancellationToken;
use crate::document::{Document, Value};
use crate::errors::{self, ErrorKind, MartenError, MartenResult};
use crate::query::{matches, project};

/// `find {filter, projection, sort, limit}`.
///
/// Scans the collection snapshot, filters with the query matcher, sorts,
/// limits, and projects. Matching and projection are pure; the cancellation
/// token is checked between documents so long scans abort cooperatively. A
/// find against a missing collection returns an empty batch.
pub(crate) fn find(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
    cancel: &CancellationToken,
) -> MartenResult<Document> {
    let namespace = collection_namespace(db, command, "find")?;
    let filter = argument_document(command, "filter")?;
    let projection = argument_document(command, "projection")?;
    let sort = argument_document(command, "sort")?;
    let limit = match command.get("limit") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let Some(limit) = v.to_int_lossy() else {
                return Err(errors::field_type_mismatch(
                    "find.limit",
                    v.type_name(),
                    "[int, long, double, decimal]",
                ));
            };
            if limit < 0 {
                return Err(errors::field_below_minimum(
                    "find.limit",
                    &v.render_literal(),
                ));
            }
            (limit > 0).then_some(limit as usize)
        }
    };

    cancel.checkpoint()?;

    let mut matched = Vec::new();
    if catalog.has_collection(&namespace) {
        for doc in catalog.backend().scan(&namespace)? {
            cancel.checkpoint()?;
            if matches(&doc, &filter)? {
                matched.push(doc);
            }
        }
    }

    if !sort.is_empty() {
        sort_documents(&mut matched, &sort)?;
    }
    if let Some(limit) = limit {
        matched.truncate(limit);
    }

    let mut batch = Vec::with_capacity(matched.len());
    for doc in &matched {
        let projected = if projection.is_empty() {
            doc.clone()
        } else {
            project(doc, &projection)?
        };
        batch.push(Value::Document(projected));
    }

    let mut cursor = Document::new();
    cursor.put("firstBatch", Value::Array(batch));
    cursor.put("id", Value::Int64(0));
    cursor.put("ns", Value::String(namespace));

    let mut reply = Document::new();
    reply.put("cursor", Value::Document(cursor));
    Ok(ok_reply(reply))
}

fn argument_document(command: &Document, key: &str) -> MartenResult<Document> {
    match command.get(key) {
        None | Some(Value::Null) => Ok(Document::new()),
        Some(Value::Document(doc)) => Ok(doc.clone()),
        Some(other) => Err(errors::field_type_mismatch(
            &format!("find.{}", key),
            other.type_name(),
            "[object]",
        )),
    }
}

/// Stable sort by the sort specification's fields in order; missing fields
/// sort as null per the value model's total order.
fn sort_documents(docs: &mut [Document], sort: &Document) -> MartenResult<()> {
    let mut keys = Vec::with_capacity(sort.len());
    for (field, direction) in sort.iter() {
        let direction = match direction.to_int_lossy() {
            Some(1) => 1,
            Some(-1) => -1,
            _ => {
                return Err(MartenError::new(
                    &format!(
                        "Illegal key in $sort specification: {}: {}",
                        field,
                        direction.render_literal()
                    ),
                    ErrorKind::BadValue,
                ));
            }
        };
        keys.push((field.to_string(), direction));
    }

    docs.sort_by(|a, b| {
        for (field, direction) in &keys {
            let left = sort_value(a, field);
            let right = sort_value(b, field);
            let ordering = if *direction >= 0 {
                left.cmp(&right)
            } else {
                right.cmp(&left)
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
    Ok(())
}

fn sort_value(doc: &Document, field: &str) -> Value {
    crate::query::path::lookup_path(doc, field)
        .first()
        .map(|v| (*v).clone())
        .unwrap_or(Value::Null)
}

/// `explain {<wrapped command>}` — re-validates the wrapped command's
/// argument types without executing it for effect.
pub(crate) fn explain(
    catalog: &NamespaceCatalog,
    db: &str,
    command: &Document,
) -> MartenResult<Document> {
    let wrapped = match command.get("explain") {
        Some(Value::Document(wrapped)) => wrapped,
        Some(other) => {
            return Err(errors::field_type_mismatch(
                "explain",
                other.type_name(),
                "[object]",
            ));
        }
        None => {
            return Err(MartenError::new(
                "required parameter \"explain\" is missing",
                ErrorKind::BadValue,
            ));
        }
    };

    let verb = wrapped.first_key().ok_or_else(|| {
        MartenError::new("no command specified in explain", ErrorKind::BadValue)
    })?;
    let namespace = collection_namespace(db, wrapped, verb)?;

    // dry-run the argument validation of the wrapped verb
    match verb {
        "find" => {
            let filter = argument_document(wrapped, "filter")?;
            let projection = argument_document(wrapped, "projection")?;
            let probe = Document::new();
            matches(&probe, &filter)?;
            if !projection.is_empty() {
                project(&probe, &projection)?;
            }
        }
        "collStats" | "dbStats" | "dataSize" => {
            catalog::validate_scale(
                wrapped.get("scale"),
                &format!("{}.scale", verb),
            )?;
        }
        "createIndexes" => {
            parse_index_documents(wrapped)?;
        }
        "create" => {
            catalog::parse_create_options(wrapped)?;
        }
        _ => {}
    }

    let mut query_planner = Document::new();
    query_planner.put("namespace", Value::String(namespace));
    query_planner.put(
        "parsedQuery",
        wrapped
            .get("filter")
            .cloned()
            .unwrap_or(Value::Document(Document::new())),
    );

    let mut reply = Document::new();
    reply.put("queryPlanner", Value::Document(query_planner));
    Ok(ok_reply(reply))
}
