use crate::common::DOC_ID;
use crate::document::{validate_update_value, Document, Value};
use crate::errors::{self, ErrorKind, MartenError, MartenResult};
use smallvec::SmallVec;

type Segments<'a> = SmallVec<[&'a str; 8]>;

/// Applies an update specification to a document.
///
/// `spec` is either an operator document — top-level keys are update
/// operators (`$set`, `$setOnInsert`, `$unset`, `$inc`), each mapping to a
/// document of field-path/value pairs — or a plain replacement document
/// (no `$`-prefixed top-level keys), which replaces the matched document
/// wholesale while preserving `_id`.
///
/// `is_upsert_insert` is true only when the document being updated was just
/// created by an upsert; `$setOnInsert` fields apply exactly then.
///
/// Returns the new document and whether it differs from the input. An
/// operator whose argument document is empty is legal and changes nothing:
/// the document "matched" but `modified` stays false.
pub fn apply_update(
    doc: &Document,
    spec: &Document,
    is_upsert_insert: bool,
) -> MartenResult<(Document, bool)> {
    let operator_mode = spec.first_key().is_some_and(|k| k.starts_with('$'));

    let updated = if operator_mode {
        apply_operators(doc, spec, is_upsert_insert)?
    } else {
        replace_document(doc, spec)?
    };

    let modified = updated != *doc;
    Ok((updated, modified))
}

fn replace_document(doc: &Document, replacement: &Document) -> MartenResult<Document> {
    validate_update_value(&Value::Document(replacement.clone()))?;
    let mut out = Document::new();
    if let Some(id) = doc.id() {
        out.put(DOC_ID, id.clone());
    }
    for (key, value) in replacement.iter() {
        if key == DOC_ID {
            continue;
        }
        out.put(key, value.clone());
    }
    Ok(out)
}

fn apply_operators(
    doc: &Document,
    spec: &Document,
    is_upsert_insert: bool,
) -> MartenResult<Document> {
    let mut updated = doc.clone();
    // field paths already claimed by an earlier operator in this command
    let mut claimed: Vec<&str> = Vec::new();

    for (op, arg) in spec.iter() {
        if !matches!(op, "$set" | "$setOnInsert" | "$unset" | "$inc") {
            return Err(errors::unknown_modifier(op));
        }

        let fields = match arg {
            Value::Document(fields) => fields,
            other => {
                return Err(errors::modifier_not_document(
                    op,
                    other.type_name(),
                    &other.render_literal(),
                ));
            }
        };

        for (path, value) in fields.iter() {
            if claimed.iter().any(|p| *p == path) {
                return Err(errors::update_path_conflict(path));
            }
            claimed.push(path);

            match op {
                "$set" => {
                    validate_update_value(value)?;
                    set_path(&mut updated, path, value.clone())?;
                }
                "$setOnInsert" => {
                    validate_update_value(value)?;
                    if is_upsert_insert {
                        set_path(&mut updated, path, value.clone())?;
                    }
                }
                "$unset" => {
                    remove_path(&mut updated, path);
                }
                "$inc" => {
                    apply_inc(&mut updated, path, value)?;
                }
                _ => unreachable!(),
            }
        }
    }

    Ok(updated)
}

fn apply_inc(doc: &mut Document, path: &str, increment: &Value) -> MartenResult<()> {
    if !increment.is_number() {
        return Err(MartenError::new(
            &format!(
                "Cannot increment with non-numeric argument: {{{}: {}}}",
                path,
                increment.render_literal()
            ),
            ErrorKind::TypeMismatch,
        ));
    }

    let current = get_path(doc, path);
    let next = match current {
        None => increment.clone(),
        Some(existing) if existing.is_number() => add_numbers(existing, increment),
        Some(existing) => {
            let id = doc
                .id()
                .map(|v| v.render_literal())
                .unwrap_or_else(|| "?".to_string());
            return Err(MartenError::new(
                &format!(
                    "Cannot apply $inc to a value of non-numeric type. \
                     {{_id: {}}} has the field '{}' of non-numeric type {}",
                    id,
                    path,
                    existing.type_name()
                ),
                ErrorKind::TypeMismatch,
            ));
        }
    };
    set_path(doc, path, next)
}

/// Numeric addition with kind promotion: int pairs stay integral (widening
/// to long on 32-bit overflow), any double or decimal operand promotes the
/// result to double.
fn add_numbers(a: &Value, b: &Value) -> Value {
    match (a, b) {
        (Value::Int32(x), Value::Int32(y)) => match x.checked_add(*y) {
            Some(sum) => Value::Int32(sum),
            None => Value::Int64(*x as i64 + *y as i64),
        },
        (Value::Int32(x), Value::Int64(y)) => Value::Int64(*x as i64 + y),
        (Value::Int64(x), Value::Int32(y)) => Value::Int64(x + *y as i64),
        (Value::Int64(x), Value::Int64(y)) => Value::Int64(x.wrapping_add(*y)),
        _ => Value::Double(to_f64(a) + to_f64(b)),
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Int32(i) => *i as f64,
        Value::Int64(i) => *i as f64,
        Value::Double(d) => *d,
        Value::Decimal128(d) => d.to_f64(),
        _ => f64::NAN,
    }
}

/// Strict dotted-path read used by operators: documents descend by key,
/// arrays only by numeric index.
fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let segments: Segments = path.split('.').collect();
    let (first, rest) = segments.split_first()?;
    let mut current = doc.get(first)?;
    for segment in rest {
        current = match current {
            Value::Document(inner) => inner.get(segment)?,
            Value::Array(array) => array.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sets a dotted path, creating intermediate documents for missing
/// segments. Descending through an existing non-document value is an error.
pub(crate) fn set_path(doc: &mut Document, path: &str, value: Value) -> MartenResult<()> {
    let segments: Segments = path.split('.').collect();
    set_segments(doc, &segments, value)
}

fn set_segments(doc: &mut Document, segments: &[&str], value: Value) -> MartenResult<()> {
    let (first, rest) = segments
        .split_first()
        .expect("path segments are never empty");
    if rest.is_empty() {
        doc.put(first, value);
        return Ok(());
    }

    let mut inner = match doc.get(first) {
        None => Document::new(),
        Some(Value::Document(inner)) => inner.clone(),
        Some(Value::Array(array)) => {
            let mut array = array.clone();
            return set_array_segment(&mut array, rest, value).map(|()| {
                doc.put(first, Value::Array(array));
            });
        }
        Some(other) => {
            log::error!("cannot descend into {} at '{}'", other.type_name(), first);
            return Err(MartenError::new(
                &format!(
                    "Cannot create field '{}' in element {{{}: {}}}",
                    rest[0],
                    first,
                    other.render_literal()
                ),
                ErrorKind::BadValue,
            ));
        }
    };
    set_segments(&mut inner, rest, value)?;
    doc.put(first, Value::Document(inner));
    Ok(())
}

fn set_array_segment(array: &mut Vec<Value>, segments: &[&str], value: Value) -> MartenResult<()> {
    let (first, rest) = segments
        .split_first()
        .expect("path segments are never empty");
    let index: usize = first.parse().map_err(|_| {
        MartenError::new(
            &format!("Cannot create field '{}' in element of type array", first),
            ErrorKind::BadValue,
        )
    })?;
    // pad with nulls when assigning past the end
    while array.len() <= index {
        array.push(Value::Null);
    }
    if rest.is_empty() {
        array[index] = value;
        return Ok(());
    }
    match &mut array[index] {
        Value::Document(inner) => set_segments(inner, rest, value),
        other => Err(MartenError::new(
            &format!(
                "Cannot create field '{}' in element {}",
                rest[0],
                other.render_literal()
            ),
            ErrorKind::BadValue,
        )),
    }
}

/// Removes a dotted path; missing segments are a no-op.
pub(crate) fn remove_path(doc: &mut Document, path: &str) {
    let segments: Segments = path.split('.').collect();
    remove_segments(doc, &segments);
}

fn remove_segments(doc: &mut Document, segments: &[&str]) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        doc.remove(first);
        return;
    }
    if let Some(Value::Document(inner)) = doc.get(first) {
        let mut inner = inner.clone();
        remove_segments(&mut inner, rest);
        doc.put(first, Value::Document(inner));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn sample() -> Document {
        doc! { "_id": "a", name: "Alice", count: 1, nested: { inner: 2 } }
    }

    #[test]
    fn test_set_changes_field_and_reports_modified() {
        let (updated, modified) =
            apply_update(&sample(), &doc! { "$set": { name: "Bob" } }, false).unwrap();
        assert!(modified);
        assert_eq!(updated.get("name"), Some(&Value::String("Bob".to_string())));
    }

    #[test]
    fn test_set_to_equal_value_is_not_modified() {
        let (updated, modified) =
            apply_update(&sample(), &doc! { "$set": { name: "Alice" } }, false).unwrap();
        assert!(!modified);
        assert_eq!(updated, sample());
    }

    #[test]
    fn test_empty_set_is_a_no_op_for_any_document() {
        let (updated, modified) = apply_update(&sample(), &doc! { "$set": {} }, false).unwrap();
        assert!(!modified);
        assert_eq!(updated, sample());
    }

    #[test]
    fn test_set_with_string_argument_has_exact_error() {
        let err = apply_update(&sample(), &doc! { "$set": "x" }, false).unwrap_err();
        assert_eq!(err.code(), 9);
        assert_eq!(
            err.message(),
            "Modifiers operate on fields but we found type string instead. \
             For example: {$mod: {<field>: ...}} not {$set: \"x\"}"
        );
    }

    #[test]
    fn test_set_with_array_argument_renders_array_literal() {
        let err = apply_update(&sample(), &doc! { "$set": [1, 2] }, false).unwrap_err();
        assert_eq!(
            err.message(),
            "Modifiers operate on fields but we found type array instead. \
             For example: {$mod: {<field>: ...}} not {$set: [ 1, 2 ]}"
        );
    }

    #[test]
    fn test_set_with_double_argument_renders_source_formatting() {
        let err = apply_update(&sample(), &doc! { "$set": (f64::NAN) }, false).unwrap_err();
        assert!(err.message().contains("not {$set: nan.0}"));
        let err = apply_update(&sample(), &doc! { "$set": 42.13 }, false).unwrap_err();
        assert!(err.message().contains("not {$set: 42.13}"));
        let err = apply_update(&sample(), &doc! { "$set": (Value::Null) }, false).unwrap_err();
        assert!(err.message().contains("found type null instead"));
        assert!(err.message().contains("not {$set: null}"));
    }

    #[test]
    fn test_unknown_modifier_has_exact_error() {
        let err = apply_update(&sample(), &doc! { "$rename": { a: "b" } }, false).unwrap_err();
        assert_eq!(err.code(), 9);
        assert_eq!(
            err.message(),
            "Unknown modifier: $rename. Expected a valid update modifier or \
             pipeline-style update specified as an array"
        );
    }

    #[test]
    fn test_conflicting_operators_on_same_path() {
        let spec = doc! { "$set": { v: 1 }, "$inc": { v: 2 } };
        let err = apply_update(&sample(), &spec, false).unwrap_err();
        assert_eq!(err.code(), 9);
        assert_eq!(
            err.message(),
            "Updating the path 'v' would create a conflict at 'v'"
        );
    }

    #[test]
    fn test_set_on_insert_applies_only_on_upsert_insert() {
        let spec = doc! { "$setOnInsert": { created: true } };
        let (updated, modified) = apply_update(&sample(), &spec, false).unwrap();
        assert!(!modified);
        assert!(!updated.contains_key("created"));

        let (updated, modified) = apply_update(&sample(), &spec, true).unwrap();
        assert!(modified);
        assert_eq!(updated.get("created"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_set_on_insert_round_trips_nan() {
        let spec = doc! { "$setOnInsert": { v: (f64::NAN) } };
        let (updated, _) = apply_update(&doc! { "_id": 1 }, &spec, true).unwrap();
        assert!(updated.get("v").unwrap().is_nan());
    }

    #[test]
    fn test_set_value_with_dotted_key_inside_document_fails_validation() {
        let spec = doc! { "$set": { v: { "a.b": 1 } } };
        let err = apply_update(&sample(), &spec, false).unwrap_err();
        assert!(err.message().contains("key must not contain '.' sign"));
    }

    #[test]
    fn test_set_nested_array_value_fails_validation() {
        let spec = doc! { "$set": { v: [[1]] } };
        let err = apply_update(&sample(), &spec, false).unwrap_err();
        assert!(err.message().contains("nested arrays are not supported"));
    }

    #[test]
    fn test_set_dotted_path_creates_intermediates() {
        let spec = doc! { "$set": { "a.b.c": 5 } };
        let (updated, modified) = apply_update(&sample(), &spec, false).unwrap();
        assert!(modified);
        let a = updated.get("a").and_then(|v| v.as_document()).unwrap();
        let b = a.get("b").and_then(|v| v.as_document()).unwrap();
        assert_eq!(b.get("c"), Some(&Value::Int32(5)));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let spec = doc! { "$set": { "name.first": "A" } };
        let err = apply_update(&sample(), &spec, false).unwrap_err();
        assert!(err.message().contains("Cannot create field"));
    }

    #[test]
    fn test_set_array_element_by_index() {
        let doc = doc! { tags: ["a", "b"] };
        let (updated, _) =
            apply_update(&doc, &doc! { "$set": { "tags.1": "z" } }, false).unwrap();
        let tags = updated.get("tags").and_then(|v| v.as_array()).unwrap();
        assert_eq!(tags[1], Value::from("z"));
    }

    #[test]
    fn test_unset_removes_field() {
        let spec = doc! { "$unset": { name: "" } };
        let (updated, modified) = apply_update(&sample(), &spec, false).unwrap();
        assert!(modified);
        assert!(!updated.contains_key("name"));
    }

    #[test]
    fn test_unset_missing_field_is_not_modified() {
        let spec = doc! { "$unset": { ghost: "" } };
        let (_, modified) = apply_update(&sample(), &spec, false).unwrap();
        assert!(!modified);
    }

    #[test]
    fn test_inc_adds_and_creates() {
        let spec = doc! { "$inc": { count: 5, fresh: 2 } };
        let (updated, modified) = apply_update(&sample(), &spec, false).unwrap();
        assert!(modified);
        assert_eq!(updated.get("count"), Some(&Value::Int32(6)));
        assert_eq!(updated.get("fresh"), Some(&Value::Int32(2)));
    }

    #[test]
    fn test_inc_promotes_to_double() {
        let spec = doc! { "$inc": { count: 0.5 } };
        let (updated, _) = apply_update(&sample(), &spec, false).unwrap();
        assert_eq!(updated.get("count"), Some(&Value::Double(1.5)));
    }

    #[test]
    fn test_inc_int32_overflow_widens_to_long() {
        let doc = doc! { count: (i32::MAX) };
        let (updated, _) = apply_update(&doc, &doc! { "$inc": { count: 1 } }, false).unwrap();
        assert_eq!(updated.get("count"), Some(&Value::Int64(i32::MAX as i64 + 1)));
    }

    #[test]
    fn test_inc_non_numeric_argument_is_type_mismatch() {
        let err =
            apply_update(&sample(), &doc! { "$inc": { count: "1" } }, false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TypeMismatch);
        assert_eq!(
            err.message(),
            "Cannot increment with non-numeric argument: {count: \"1\"}"
        );
    }

    #[test]
    fn test_inc_non_numeric_target_is_type_mismatch() {
        let err =
            apply_update(&sample(), &doc! { "$inc": { name: 1 } }, false).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::TypeMismatch);
        assert!(err.message().contains("non-numeric type string"));
        assert!(err.message().contains("'name'"));
    }

    #[test]
    fn test_replacement_document_preserves_id() {
        let (updated, modified) =
            apply_update(&sample(), &doc! { whole: "new" }, false).unwrap();
        assert!(modified);
        assert_eq!(updated.id(), Some(&Value::String("a".to_string())));
        assert!(updated.contains_key("whole"));
        assert!(!updated.contains_key("name"));
    }

    #[test]
    fn test_replacement_with_dotted_key_fails_validation() {
        let err = apply_update(&sample(), &doc! { "a.b": 1 }, false).unwrap_err();
        assert!(err.message().contains("key must not contain '.' sign"));
    }

    #[test]
    fn test_mixed_operator_and_plain_key_is_unknown_modifier() {
        let mut spec = Document::new();
        spec.push("$set", Value::Document(doc! { a: 1 }));
        spec.push("plain", Value::Int32(1));
        let err = apply_update(&sample(), &spec, false).unwrap_err();
        assert_eq!(
            err.message(),
            "Unknown modifier: plain. Expected a valid update modifier or \
             pipeline-style update specified as an array"
        );
    }
}
