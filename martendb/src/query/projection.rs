use crate::document::{Document, Value};
use crate::errors::{self, MartenError, MartenResult};
use crate::errors::ErrorKind;
use crate::common::DOC_ID;

/// How a single projection entry treats its field.
enum Entry {
    Include,
    Exclude,
    Slice(SliceSpec),
}

/// Parsed `$slice` argument.
enum SliceSpec {
    /// Single-number form: positive takes from the front, negative from the
    /// back, NaN yields an empty array, +Infinity the whole array.
    Single(f64),
    /// `[skip, limit]` form; `limit == None` means "no limit".
    Pair { skip: i64, limit: Option<i64> },
}

/// Applies a projection specification to a document.
///
/// Entries are inclusion flags, exclusion flags, or `$slice` operator
/// documents. Inclusion and exclusion cannot be mixed (`_id` is exempt);
/// `$slice` composes with either mode and on its own keeps every other
/// field.
pub fn project(doc: &Document, spec: &Document) -> MartenResult<Document> {
    let mut includes: Vec<&str> = Vec::new();
    let mut excludes: Vec<&str> = Vec::new();
    let mut slices: Vec<(&str, SliceSpec)> = Vec::new();

    for (path, value) in spec.iter() {
        match classify(value)? {
            Entry::Include => includes.push(path),
            Entry::Exclude => excludes.push(path),
            Entry::Slice(slice) => slices.push((path, slice)),
        }
    }

    let inclusion_mode = !includes.is_empty();
    if inclusion_mode {
        if let Some(excluded) = excludes.iter().find(|p| **p != DOC_ID) {
            log::error!("projection mixes inclusion and exclusion at {}", excluded);
            return Err(MartenError::new(
                &format!(
                    "Cannot do exclusion on field {} in inclusion projection",
                    excluded
                ),
                ErrorKind::BadValue,
            ));
        }
    }

    let mut result = if inclusion_mode {
        let mut out = Document::new();
        if doc.contains_key(DOC_ID) && !excludes.contains(&DOC_ID) {
            if let Some(id) = doc.get(DOC_ID) {
                out.put(DOC_ID, id.clone());
            }
        }
        for path in includes.iter().chain(slices.iter().map(|(p, _)| p)) {
            if *path == DOC_ID {
                continue;
            }
            include_path(doc, path, &mut out);
        }
        out
    } else {
        let mut out = doc.clone();
        for path in &excludes {
            exclude_path(&mut out, path);
        }
        out
    };

    for (path, slice) in &slices {
        apply_slice(&mut result, path, slice);
    }

    Ok(result)
}

fn classify(value: &Value) -> MartenResult<Entry> {
    if let Value::Document(spec) = value {
        if spec.first_key() == Some("$slice") {
            let arg = spec.get("$slice").unwrap_or(&Value::Null);
            return Ok(Entry::Slice(parse_slice(arg)?));
        }
    }
    let include = match value {
        Value::Bool(b) => *b,
        Value::Int32(i) => *i != 0,
        Value::Int64(i) => *i != 0,
        Value::Double(d) => *d != 0.0,
        _ => true,
    };
    Ok(if include { Entry::Include } else { Entry::Exclude })
}

fn parse_slice(arg: &Value) -> MartenResult<SliceSpec> {
    match arg {
        Value::Int32(_) | Value::Int64(_) | Value::Double(_) | Value::Decimal128(_) => {
            let n = match arg {
                Value::Int32(i) => *i as f64,
                Value::Int64(i) => *i as f64,
                Value::Double(d) => *d,
                Value::Decimal128(d) => d.to_f64(),
                _ => unreachable!(),
            };
            Ok(SliceSpec::Single(n))
        }
        Value::Array(args) => {
            if args.len() != 2 {
                return Err(errors::slice_arity(args.len()));
            }
            let skip = match &args[0] {
                v if v.is_number() => v.to_int_lossy().unwrap_or(0),
                other => return Err(errors::slice_first_arg_type(other.type_name())),
            };
            let limit = match &args[1] {
                Value::Null => None,
                v if v.is_number() => {
                    let limit = v.to_int_lossy().unwrap_or(0);
                    if limit < 0 {
                        return Err(errors::slice_negative_limit());
                    }
                    Some(limit)
                }
                _ => return Err(errors::slice_negative_limit()),
            };
            Ok(SliceSpec::Pair { skip, limit })
        }
        _ => Err(errors::slice_arity(1)),
    }
}

/// Copies the value at a (possibly dotted) path into the output document,
/// recreating the intermediate documents.
fn include_path(source: &Document, path: &str, out: &mut Document) {
    match path.split_once('.') {
        None => {
            if let Some(value) = source.get(path) {
                out.put(path, value.clone());
            }
        }
        Some((head, rest)) => {
            if let Some(Value::Document(inner)) = source.get(head) {
                let mut nested = match out.get(head) {
                    Some(Value::Document(existing)) => existing.clone(),
                    _ => Document::new(),
                };
                include_path(inner, rest, &mut nested);
                if !nested.is_empty() {
                    out.put(head, Value::Document(nested));
                }
            }
        }
    }
}

fn exclude_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Document(inner)) = doc.get(head) {
                let mut inner = inner.clone();
                exclude_path(&mut inner, rest);
                doc.put(head, Value::Document(inner));
            }
        }
    }
}

/// Replaces the array at `path` with its sliced form. Missing fields and
/// non-array values are left untouched.
fn apply_slice(doc: &mut Document, path: &str, slice: &SliceSpec) {
    match path.split_once('.') {
        None => {
            if let Some(Value::Array(elements)) = doc.get(path) {
                let sliced = slice_elements(elements, slice);
                doc.put(path, Value::Array(sliced));
            }
        }
        Some((head, rest)) => {
            if let Some(Value::Document(inner)) = doc.get(head) {
                let mut inner = inner.clone();
                apply_slice(&mut inner, rest, slice);
                doc.put(head, Value::Document(inner));
            }
        }
    }
}

fn slice_elements(elements: &[Value], slice: &SliceSpec) -> Vec<Value> {
    let len = elements.len();
    let (start, end) = match slice {
        SliceSpec::Single(n) => {
            if n.is_nan() {
                (0, 0)
            } else if *n >= 0.0 {
                // +Infinity and large counts saturate to the whole array
                let take = if *n >= len as f64 { len } else { n.trunc() as usize };
                (0, take)
            } else {
                let take = if -*n >= len as f64 { len } else { (-n.trunc()) as usize };
                (len - take, len)
            }
        }
        SliceSpec::Pair { skip, limit } => {
            let start = if *skip < 0 {
                let from_end = (-*skip) as usize;
                len.saturating_sub(from_end)
            } else {
                (*skip as usize).min(len)
            };
            let end = match limit {
                None => len,
                Some(l) => (start + *l as usize).min(len),
            };
            (start, end)
        }
    };
    elements[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn sample() -> Document {
        doc! {
            "_id": 1,
            name: "Alice",
            age: 30,
            address: { city: "New York", zip: 10001 },
            tags: ["a", "b", "c", "d", "e"],
        }
    }

    #[test]
    fn test_inclusion_keeps_only_listed_fields_and_id() {
        let out = project(&sample(), &doc! { name: 1 }).unwrap();
        let keys: Vec<&str> = out.keys().collect();
        assert_eq!(keys, vec!["_id", "name"]);
    }

    #[test]
    fn test_exclusion_drops_listed_fields() {
        let out = project(&sample(), &doc! { age: 0 }).unwrap();
        assert!(!out.contains_key("age"));
        assert!(out.contains_key("name"));
        assert!(out.contains_key("_id"));
    }

    #[test]
    fn test_id_may_be_excluded_in_inclusion_mode() {
        let out = project(&sample(), &doc! { name: 1, "_id": 0 }).unwrap();
        let keys: Vec<&str> = out.keys().collect();
        assert_eq!(keys, vec!["name"]);
    }

    #[test]
    fn test_mixed_modes_are_rejected() {
        let err = project(&sample(), &doc! { name: 1, age: 0 }).unwrap_err();
        assert_eq!(
            err.message(),
            "Cannot do exclusion on field age in inclusion projection"
        );
    }

    #[test]
    fn test_dotted_inclusion() {
        let out = project(&sample(), &doc! { "address.zip": 1 }).unwrap();
        let address = out.get("address").and_then(|v| v.as_document()).unwrap();
        assert_eq!(address.get("zip"), Some(&Value::Int32(10001)));
        assert!(!address.contains_key("city"));
    }

    #[test]
    fn test_dotted_exclusion() {
        let out = project(&sample(), &doc! { "address.zip": 0 }).unwrap();
        let address = out.get("address").and_then(|v| v.as_document()).unwrap();
        assert!(address.contains_key("city"));
        assert!(!address.contains_key("zip"));
    }

    fn tags_after(spec: Document) -> Vec<Value> {
        let out = project(&sample(), &spec).unwrap();
        out.get("tags").and_then(|v| v.as_array()).unwrap().clone()
    }

    #[test]
    fn test_slice_positive_takes_front() {
        let tags = tags_after(doc! { tags: { "$slice": 2 } });
        assert_eq!(tags, vec![Value::from("a"), Value::from("b")]);
    }

    #[test]
    fn test_slice_negative_takes_back() {
        let tags = tags_after(doc! { tags: { "$slice": -2 } });
        assert_eq!(tags, vec![Value::from("d"), Value::from("e")]);
    }

    #[test]
    fn test_slice_count_at_least_length_returns_whole_array() {
        assert_eq!(tags_after(doc! { tags: { "$slice": 5 } }).len(), 5);
        assert_eq!(tags_after(doc! { tags: { "$slice": 99 } }).len(), 5);
        assert_eq!(tags_after(doc! { tags: { "$slice": -99 } }).len(), 5);
    }

    #[test]
    fn test_slice_zero_returns_empty_array() {
        assert!(tags_after(doc! { tags: { "$slice": 0 } }).is_empty());
    }

    #[test]
    fn test_slice_nan_returns_empty_array() {
        assert!(tags_after(doc! { tags: { "$slice": (f64::NAN) } }).is_empty());
    }

    #[test]
    fn test_slice_positive_infinity_returns_whole_array() {
        assert_eq!(tags_after(doc! { tags: { "$slice": (f64::INFINITY) } }).len(), 5);
    }

    #[test]
    fn test_slice_non_integer_truncates() {
        let tags = tags_after(doc! { tags: { "$slice": 2.9 } });
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_slice_pair_skip_and_limit() {
        let tags = tags_after(doc! { tags: { "$slice": [1, 2] } });
        assert_eq!(tags, vec![Value::from("b"), Value::from("c")]);
    }

    #[test]
    fn test_slice_pair_negative_skip_counts_from_end() {
        let tags = tags_after(doc! { tags: { "$slice": [-2, 1] } });
        assert_eq!(tags, vec![Value::from("d")]);
        // skip further back than the array is long starts at the front
        let tags = tags_after(doc! { tags: { "$slice": [-99, 1] } });
        assert_eq!(tags, vec![Value::from("a")]);
    }

    #[test]
    fn test_slice_pair_null_limit_means_no_limit() {
        let tags = tags_after(doc! { tags: { "$slice": [2, (Value::Null)] } });
        assert_eq!(tags.len(), 3);
    }

    #[test]
    fn test_slice_pair_non_numeric_skip_is_type_error() {
        let err = project(&sample(), &doc! { tags: { "$slice": ["x", 2] } }).unwrap_err();
        assert_eq!(
            err.message(),
            "First argument to $slice must be an array, but is of type: string"
        );
    }

    #[test]
    fn test_slice_arity_errors() {
        let err = project(&sample(), &doc! { tags: { "$slice": [1] } }).unwrap_err();
        assert_eq!(
            err.message(),
            "Expression $slice takes at least 2 arguments, and at most 3, \
             but 1 were passed in"
        );
        let err = project(&sample(), &doc! { tags: { "$slice": [1, 2, 3] } }).unwrap_err();
        assert!(err.message().contains("but 3 were passed in"));
        let err = project(&sample(), &doc! { tags: { "$slice": (Value::Null) } }).unwrap_err();
        assert!(err.message().contains("but 1 were passed in"));
    }

    #[test]
    fn test_slice_negative_limit_is_rejected() {
        let err = project(&sample(), &doc! { tags: { "$slice": [1, -2] } }).unwrap_err();
        assert_eq!(
            err.message(),
            "Second argument to $slice must be a positive number"
        );
    }

    #[test]
    fn test_slice_alone_keeps_other_fields() {
        let out = project(&sample(), &doc! { tags: { "$slice": 1 } }).unwrap();
        assert!(out.contains_key("name"));
        assert!(out.contains_key("age"));
        assert_eq!(out.get("tags").and_then(|v| v.as_array()).unwrap().len(), 1);
    }

    #[test]
    fn test_slice_on_non_array_leaves_value_untouched() {
        let out = project(&sample(), &doc! { name: { "$slice": 2 } }).unwrap();
        assert_eq!(out.get("name"), Some(&Value::String("Alice".to_string())));
    }
}
