pub(crate) mod validation;
pub(crate) mod value;

pub use validation::{validate_document, validate_update_value};
pub use value::{Binary, Decimal128, ObjectId, Timestamp, Value};

use crate::common::DOC_ID;
use std::fmt::{Debug, Display, Formatter};

/// An ordered sequence of `(key, Value)` pairs: the unit of storage, query,
/// and command exchange.
///
/// A document preserves the order in which keys were decoded and — unlike a
/// map — can hold the same key twice. The wire decoder may legally produce
/// duplicates; it is [validate_document](crate::document::validate_document)
/// that rejects them, with a message naming the offending key. Lookup always
/// returns the first occurrence.
///
/// Construct documents with [Document::new] and [Document::put], or with the
/// [doc!](crate::doc) macro:
///
/// ```ignore
/// let doc = doc! {
///     name: "Alice",
///     address: { city: "New York", zip: 10001 },
///     tags: ["admin", "user"],
/// };
/// assert_eq!(doc.get("name"), Some(&Value::String("Alice".to_string())));
/// ```
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, serde::Deserialize, serde::Serialize)]
pub struct Document {
    entries: Vec<(String, Value)>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document { entries: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Document {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Builds a document from decoded pairs, preserving order and duplicates.
    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        Document { entries: pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of top-level entries, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the value of the first occurrence of `key`, if present.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Whether a top-level entry with this key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Associates `value` with `key`, replacing the first occurrence or
    /// appending a new entry. Never produces duplicates.
    pub fn put<T: Into<Value>>(&mut self, key: &str, value: T) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Appends an entry without checking for an existing key.
    ///
    /// This is the wire decoder's entry point; it is also how tests build
    /// documents with duplicate keys for the validator to reject.
    pub fn push<T: Into<Value>>(&mut self, key: &str, value: T) {
        self.entries.push((key.to_string(), value.into()));
    }

    /// Removes every occurrence of `key`, returning the first removed value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let mut removed = None;
        self.entries.retain_mut(|(k, v)| {
            if k == key {
                if removed.is_none() {
                    removed = Some(std::mem::take(v));
                }
                false
            } else {
                true
            }
        });
        removed
    }

    /// The first key of the document, if any. Command documents carry their
    /// verb as the first key.
    pub fn first_key(&self) -> Option<&str> {
        self.entries.first().map(|(k, _)| k.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The `_id` value of this document, if present.
    pub fn id(&self) -> Option<&Value> {
        self.get(DOC_ID)
    }

    /// Approximate in-memory size in bytes, used for capped-collection
    /// accounting and the stats commands.
    pub fn byte_size(&self) -> usize {
        5 + self
            .entries
            .iter()
            .map(|(k, v)| k.len() + 2 + v.byte_size())
            .sum::<usize>()
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Document(self.clone()).render_literal())
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Document(self.clone()).render_literal())
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Strips the quotes `stringify!` adds around string-literal keys in the
/// [doc!](crate::doc) macro.
pub fn normalize(key: &str) -> String {
    key.trim_matches('"').to_string()
}

/// Builds a [Document] from field-value pairs.
///
/// Nested braces become embedded documents, brackets become arrays, and any
/// other token is converted through `Into<Value>`:
///
/// ```ignore
/// let doc = doc! {
///     score: 1034,
///     location: { city: "New York", zip: 10001 },
///     category: ["food", "produce"],
/// };
/// ```
#[macro_export]
macro_rules! doc {
    () => {
        $crate::document::Document::new()
    };

    ({ $($rest:tt)* }) => {
        $crate::doc!($($rest)*)
    };

    // Internal token muncher: consumes one `key : value` entry at a time so a
    // negative numeric literal (two tokens, `-` then the number) is kept whole
    // rather than being split by a single `:tt` matcher.
    (@munch $doc:ident,) => {};
    (@munch $doc:ident, $key:tt : - $val:literal) => {
        $doc.put(&$crate::document::normalize(stringify!($key)), $crate::document::Value::from(- $val));
    };
    (@munch $doc:ident, $key:tt : - $val:literal , $($rest:tt)*) => {
        $doc.put(&$crate::document::normalize(stringify!($key)), $crate::document::Value::from(- $val));
        $crate::doc!(@munch $doc, $($rest)*);
    };
    (@munch $doc:ident, $key:tt : $val:tt) => {
        $doc.put(&$crate::document::normalize(stringify!($key)), $crate::doc_value!($val));
    };
    (@munch $doc:ident, $key:tt : $val:tt , $($rest:tt)*) => {
        $doc.put(&$crate::document::normalize(stringify!($key)), $crate::doc_value!($val));
        $crate::doc!(@munch $doc, $($rest)*);
    };

    ($($rest:tt)*) => {
        {
            let mut doc = $crate::document::Document::new();
            $crate::doc!(@munch doc, $($rest)*);
            doc
        }
    };
}

/// Helper macro converting values for [doc!](crate::doc): nested documents,
/// arrays, and plain expressions.
#[macro_export]
macro_rules! doc_value {
    ({ $($rest:tt)* }) => {
        $crate::document::Value::Document($crate::doc!{ $($rest)* })
    };

    ([ $($rest:tt)* ]) => {
        {
            let mut arr: ::std::vec::Vec<$crate::document::Value> = ::std::vec::Vec::new();
            $crate::doc_value!(@arr arr, $($rest)*);
            $crate::document::Value::Array(arr)
        }
    };

    // Internal array muncher, mirroring `doc!`'s entry muncher so negative
    // numeric literals survive as whole values.
    (@arr $arr:ident,) => {};
    (@arr $arr:ident, - $val:literal) => {
        $arr.push($crate::document::Value::from(- $val));
    };
    (@arr $arr:ident, - $val:literal , $($rest:tt)*) => {
        $arr.push($crate::document::Value::from(- $val));
        $crate::doc_value!(@arr $arr, $($rest)*);
    };
    (@arr $arr:ident, $val:tt) => {
        $arr.push($crate::doc_value!($val));
    };
    (@arr $arr:ident, $val:tt , $($rest:tt)*) => {
        $arr.push($crate::doc_value!($val));
        $crate::doc_value!(@arr $arr, $($rest)*);
    };

    ($value:expr) => {
        $crate::document::Value::from($value)
    };
}
