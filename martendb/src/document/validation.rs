use crate::document::{Document, Value};
use crate::errors::{self, MartenResult};

/// How strict a validation walk is.
///
/// Insert validation applies every rule. Update-value validation relaxes the
/// NaN/Infinity rule: query filters and `$set`/`$setOnInsert` arguments may
/// legally carry NaN, so only stored content rejects it on direct insert.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Insert,
    UpdateValue,
}

/// Validates a document for insertion.
///
/// Walks the document tree and returns the *first* violation encountered,
/// iterating entries in key order with key checks before value checks:
///
/// - key must not be empty, contain interior NUL, start with `$`, or
///   contain `.`
/// - no two keys in the same document may be identical
/// - `double` values that are NaN or ±Infinity are rejected
/// - arrays may not directly contain arrays
///
/// Keys arrive as Rust strings, so UTF-8 well-formedness is already
/// guaranteed by the wire decoder; the NUL check covers the remainder of the
/// wire encoding's valid key range.
pub fn validate_document(doc: &Document) -> MartenResult<()> {
    validate_inner(doc, Mode::Insert)
}

/// Validates a value being assigned by an update operator.
///
/// Applies the same key and nesting rules as insert validation but permits
/// NaN/Infinity scalars.
pub fn validate_update_value(value: &Value) -> MartenResult<()> {
    validate_value(None, value, Mode::UpdateValue)
}

fn validate_inner(doc: &Document, mode: Mode) -> MartenResult<()> {
    for (index, (key, value)) in doc.iter().enumerate() {
        validate_key(doc, index, key)?;
        validate_value(Some(key), value, mode)?;
    }
    Ok(())
}

fn validate_key(doc: &Document, index: usize, key: &str) -> MartenResult<()> {
    if key.is_empty() {
        return Err(errors::invalid_key(key, errors::KEY_EMPTY));
    }
    if key.contains('\0') {
        return Err(errors::invalid_key(key, errors::KEY_NUL));
    }
    if key.starts_with('$') {
        return Err(errors::invalid_key(key, errors::KEY_DOLLAR));
    }
    if key.contains('.') {
        return Err(errors::invalid_key(key, errors::KEY_DOT));
    }
    // duplicate keys are flagged at the second occurrence
    if doc.keys().take(index).any(|earlier| earlier == key) {
        return Err(errors::invalid_key(key, errors::KEY_DUPLICATE));
    }
    Ok(())
}

fn validate_value(key: Option<&str>, value: &Value, mode: Mode) -> MartenResult<()> {
    match value {
        Value::Double(d) if mode == Mode::Insert && !d.is_finite() => {
            Err(errors::invalid_value(
                key.unwrap_or_default(),
                &value.render_literal(),
                errors::VALUE_NAN_INF,
            ))
        }
        Value::Document(doc) => validate_inner(doc, mode),
        Value::Array(array) => {
            for element in array {
                match element {
                    Value::Array(_) => {
                        return Err(errors::invalid_value(
                            key.unwrap_or_default(),
                            &element.render_literal(),
                            errors::VALUE_NESTED_ARRAY,
                        ));
                    }
                    other => validate_value(key, other, mode)?,
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
