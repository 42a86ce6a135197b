use crate::document::{Document, Value};
use smallvec::SmallVec;

/// Candidate values produced by a dotted-path lookup. Array fan-out can
/// yield several candidates for one path.
pub(crate) type Candidates<'a> = SmallVec<[&'a Value; 4]>;

/// Resolves a dotted field path against a document.
///
/// Path segments traverse embedded documents by key. At an array, a numeric
/// segment indexes into the array; a non-numeric segment fans out over the
/// array's document elements, so `"players.score"` reaches the `score`
/// field of every document in the `players` array.
///
/// An empty result means the path resolves to nothing (field missing).
pub(crate) fn lookup_path<'a>(doc: &'a Document, path: &str) -> Candidates<'a> {
    let segments: SmallVec<[&str; 8]> = path.split('.').collect();
    let mut candidates = Candidates::new();
    if let Some((first, rest)) = segments.split_first() {
        if let Some(value) = doc.get(first) {
            descend(value, rest, &mut candidates);
        }
    }
    candidates
}

fn descend<'a>(value: &'a Value, segments: &[&str], out: &mut Candidates<'a>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Value::Document(doc) => {
            if let Some(next) = doc.get(segment) {
                descend(next, rest, out);
            }
        }
        Value::Array(array) => {
            if let Ok(index) = segment.parse::<usize>() {
                if let Some(next) = array.get(index) {
                    descend(next, rest, out);
                }
            } else {
                for element in array {
                    if let Value::Document(doc) = element {
                        if let Some(next) = doc.get(segment) {
                            descend(next, rest, out);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_top_level_lookup() {
        let doc = doc! { a: 1 };
        let found = lookup_path(&doc, "a");
        assert_eq!(found.as_slice(), &[&Value::Int32(1)]);
        assert!(lookup_path(&doc, "missing").is_empty());
    }

    #[test]
    fn test_nested_document_lookup() {
        let doc = doc! { location: { address: { zip: 10001 } } };
        let found = lookup_path(&doc, "location.address.zip");
        assert_eq!(found.as_slice(), &[&Value::Int32(10001)]);
    }

    #[test]
    fn test_numeric_segment_indexes_into_array() {
        let doc = doc! { items: [10, 20, 30] };
        assert_eq!(lookup_path(&doc, "items.1").as_slice(), &[&Value::Int32(20)]);
        assert!(lookup_path(&doc, "items.9").is_empty());
    }

    #[test]
    fn test_non_numeric_segment_fans_out_over_array() {
        let doc = doc! { players: [{ score: 1 }, { score: 2 }, { name: "x" }] };
        let found = lookup_path(&doc, "players.score");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], &Value::Int32(1));
        assert_eq!(found[1], &Value::Int32(2));
    }

    #[test]
    fn test_scalar_mid_path_resolves_to_nothing() {
        let doc = doc! { a: 1 };
        assert!(lookup_path(&doc, "a.b").is_empty());
    }
}
