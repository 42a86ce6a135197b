use crate::document::Document;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rand::{Rng, RngCore};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

/// Compare two finite-or-NaN floats with NaN ordered below every other number.
///
/// NaN equals only NaN. This is the matching-time rule; the validator rejects
/// NaN on direct insert before comparison ever sees it in stored content.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// A 12-byte object identifier in the wire protocol's layout:
/// 4-byte big-endian seconds, 5-byte per-process random, 3-byte counter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Deserialize, serde::Serialize)]
pub struct ObjectId([u8; 12]);

static PROCESS_RANDOM: Lazy<[u8; 5]> = Lazy::new(|| {
    let mut bytes = [0u8; 5];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
});

static OID_COUNTER: Lazy<AtomicU32> =
    Lazy::new(|| AtomicU32::new(rand::thread_rng().gen::<u32>() & 0x00FF_FFFF));

impl ObjectId {
    /// Generates a new object id from the current time and process state.
    pub fn new() -> Self {
        let mut bytes = [0u8; 12];
        let secs = Utc::now().timestamp() as u32;
        bytes[0..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(&*PROCESS_RANDOM);
        let count = OID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed) & 0x00FF_FFFF;
        bytes[9..12].copy_from_slice(&count.to_be_bytes()[1..4]);
        ObjectId(bytes)
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        ObjectId(bytes)
    }

    pub fn bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Lowercase hex rendering of the 12 bytes.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        ObjectId::new()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ObjectId('{}')", self.to_hex())
    }
}

/// Binary value with a wire subtype tag.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, serde::Deserialize, serde::Serialize)]
pub struct Binary {
    pub subtype: u8,
    pub bytes: Vec<u8>,
}

/// Internal replication timestamp: seconds plus an ordinal within the second.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default,
    serde::Deserialize, serde::Serialize,
)]
pub struct Timestamp {
    pub t: u32,
    pub i: u32,
}

/// 128-bit decimal carried as raw IEEE 754-2008 BID bits.
///
/// No operation in this core performs decimal arithmetic; the bits are kept
/// intact for storage round-trips and bridged to `f64` for cross-kind
/// numeric comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, serde::Deserialize, serde::Serialize)]
pub struct Decimal128 {
    bits: u128,
}

impl Decimal128 {
    pub fn from_bits(bits: u128) -> Self {
        Decimal128 { bits }
    }

    pub fn bits(&self) -> u128 {
        self.bits
    }

    /// Whether the bits encode NaN (combination field all-ones prefix).
    pub fn is_nan(&self) -> bool {
        (self.bits >> 122) & 0x3E == 0x3E
    }

    /// Approximate numeric value of a finite decimal, used for ordering.
    ///
    /// BID layout: sign(1) | combination(17) | coefficient continuation(110).
    pub fn to_f64(&self) -> f64 {
        if self.is_nan() {
            return f64::NAN;
        }
        // infinity: combination starts 11110
        if (self.bits >> 122) & 0x3E == 0x3C {
            return if self.bits >> 127 == 1 {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
        }
        let sign = if self.bits >> 127 == 1 { -1.0 } else { 1.0 };
        let (exponent, coefficient) = if (self.bits >> 125) & 0x3 == 0x3 {
            // large coefficient form: 2-bit marker, exponent, implicit 100 prefix
            let exp = ((self.bits >> 111) & 0x3FFF) as i32;
            let coeff = (self.bits & ((1u128 << 111) - 1)) | (0b100 << 111);
            (exp, coeff)
        } else {
            let exp = ((self.bits >> 113) & 0x3FFF) as i32;
            let coeff = self.bits & ((1u128 << 113) - 1);
            (exp, coeff)
        };
        sign * coefficient as f64 * 10f64.powi(exponent - 6176)
    }
}

/// Represents a [Document] value: a closed tagged union over every scalar
/// kind of the wire protocol plus the two composite kinds.
///
/// # Variants
/// - Scalars: Double, String, Binary, ObjectId, Bool, DateTime, Null, Regex,
///   Int32, Timestamp, Int64, Decimal128
/// - Composites: Document (ordered key-value pairs), Array (ordered values)
///
/// # Characteristics
/// - **Closed**: every consumer (validator, matcher, update executor,
///   projection engine) matches exhaustively; adding a kind is a compile
///   error until every consumer handles it.
/// - **Immutable kind**: a value never changes kind after construction.
/// - **Totally ordered**: [Ord] ranks kinds first (Null < numbers < String <
///   Document < Array < Binary < ObjectId < Bool < DateTime < Timestamp <
///   Regex), then compares within the kind. Int32/Int64/Double/Decimal128
///   compare by numeric value; NaN sorts below all other numbers and equals
///   only NaN.
/// - **Coercing equality**: `Value::Int32(42) == Value::Double(42.0)`.
#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize)]
pub enum Value {
    /// 64-bit floating point value.
    Double(f64),
    /// UTF-8 string value.
    String(String),
    /// Binary data with a subtype tag.
    Binary(Binary),
    /// 12-byte object identifier.
    ObjectId(ObjectId),
    /// Boolean value.
    Bool(bool),
    /// UTC date-time with millisecond precision.
    DateTime(DateTime<Utc>),
    /// Null value.
    #[default]
    Null,
    /// Regular expression with its option letters.
    Regex { pattern: String, options: String },
    /// 32-bit integer value.
    Int32(i32),
    /// Internal timestamp value.
    Timestamp(Timestamp),
    /// 64-bit integer value.
    Int64(i64),
    /// 128-bit decimal value.
    Decimal128(Decimal128),
    /// Embedded document.
    Document(Document),
    /// Array of values. Arrays may not directly contain arrays; the document
    /// validator enforces this, not the constructor.
    Array(Vec<Value>),
}

/// Numeric bridge used for cross-kind comparison.
enum Num {
    Int(i64),
    Float(f64),
}

impl Value {
    /// The wire protocol's type alias for this kind, as rendered inside
    /// error messages (`string`, `int`, `long`, `object`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Binary(_) => "binData",
            Value::ObjectId(_) => "objectId",
            Value::Bool(_) => "bool",
            Value::DateTime(_) => "date",
            Value::Null => "null",
            Value::Regex { .. } => "regex",
            Value::Int32(_) => "int",
            Value::Timestamp(_) => "timestamp",
            Value::Int64(_) => "long",
            Value::Decimal128(_) => "decimal",
            Value::Document(_) => "object",
            Value::Array(_) => "array",
        }
    }

    /// Rank of the kind in the cross-kind total order. Numeric kinds share
    /// one rank so they compare by value.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 10,
            Value::Double(_) | Value::Int32(_) | Value::Int64(_) | Value::Decimal128(_) => 20,
            Value::String(_) => 30,
            Value::Document(_) => 40,
            Value::Array(_) => 50,
            Value::Binary(_) => 60,
            Value::ObjectId(_) => 70,
            Value::Bool(_) => 80,
            Value::DateTime(_) => 90,
            Value::Timestamp(_) => 100,
            Value::Regex { .. } => 110,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Double(_) | Value::Int32(_) | Value::Int64(_) | Value::Decimal128(_)
        )
    }

    /// Whether this value is a NaN double or NaN decimal.
    pub fn is_nan(&self) -> bool {
        match self {
            Value::Double(d) => d.is_nan(),
            Value::Decimal128(d) => d.is_nan(),
            _ => false,
        }
    }

    fn as_num(&self) -> Option<Num> {
        match self {
            Value::Int32(i) => Some(Num::Int(*i as i64)),
            Value::Int64(i) => Some(Num::Int(*i)),
            Value::Double(d) => Some(Num::Float(*d)),
            Value::Decimal128(d) => Some(Num::Float(d.to_f64())),
            _ => None,
        }
    }

    /// Integer view with truncation for doubles, used by command arguments
    /// (`limit`, `scale`, `size`, `$slice` operands). NaN has no integer
    /// view; infinities saturate.
    pub fn to_int_lossy(&self) -> Option<i64> {
        match self {
            Value::Int32(i) => Some(*i as i64),
            Value::Int64(i) => Some(*i),
            Value::Double(d) if d.is_nan() => None,
            Value::Double(d) if *d == f64::INFINITY => Some(i64::MAX),
            Value::Double(d) if *d == f64::NEG_INFINITY => Some(i64::MIN),
            Value::Double(d) => Some(d.trunc() as i64),
            Value::Decimal128(d) => {
                let f = d.to_f64();
                if f.is_nan() {
                    None
                } else {
                    Some(f.trunc() as i64)
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    /// Approximate in-memory size in bytes, used for capped-collection
    /// accounting and the stats commands.
    pub fn byte_size(&self) -> usize {
        match self {
            Value::Double(_) => 8,
            Value::String(s) => s.len() + 5,
            Value::Binary(b) => b.bytes.len() + 5,
            Value::ObjectId(_) => 12,
            Value::Bool(_) => 1,
            Value::DateTime(_) => 8,
            Value::Null => 1,
            Value::Regex { pattern, options } => pattern.len() + options.len() + 2,
            Value::Int32(_) => 4,
            Value::Timestamp(_) => 8,
            Value::Int64(_) => 8,
            Value::Decimal128(_) => 16,
            Value::Document(doc) => doc.byte_size(),
            Value::Array(array) => {
                5 + array.iter().map(|v| v.byte_size() + 2).sum::<usize>()
            }
        }
    }

    /// Renders this value the way contract error messages quote literals:
    /// strings quoted, arrays with literal elements, doubles with source
    /// formatting and `nan.0`/`inf.0`/`-inf.0` specials, `null` as-is.
    pub fn render_literal(&self) -> String {
        match self {
            Value::Double(d) => render_double(*d),
            Value::String(s) => format!("\"{}\"", s),
            Value::Binary(b) => format!(
                "BinData({}, {})",
                b.subtype,
                b.bytes.iter().map(|x| format!("{:02X}", x)).collect::<String>()
            ),
            Value::ObjectId(id) => format!("ObjectId('{}')", id.to_hex()),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => format!("new Date({})", dt.timestamp_millis()),
            Value::Null => "null".to_string(),
            Value::Regex { pattern, options } => format!("/{}/{}", pattern, options),
            Value::Int32(i) => i.to_string(),
            Value::Timestamp(ts) => format!("Timestamp({}, {})", ts.t, ts.i),
            Value::Int64(i) => i.to_string(),
            Value::Decimal128(d) => render_double(d.to_f64()),
            Value::Document(doc) => {
                let body = doc
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.render_literal()))
                    .collect::<Vec<_>>()
                    .join(", ");
                if body.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{ {} }}", body)
                }
            }
            Value::Array(array) => {
                let body = array
                    .iter()
                    .map(|v| v.render_literal())
                    .collect::<Vec<_>>()
                    .join(", ");
                if body.is_empty() {
                    "[]".to_string()
                } else {
                    format!("[ {} ]", body)
                }
            }
        }
    }
}

/// Source-style rendering of doubles for error operands.
fn render_double(d: f64) -> String {
    if d.is_nan() {
        "nan.0".to_string()
    } else if d == f64::INFINITY {
        "inf.0".to_string()
    } else if d == f64::NEG_INFINITY {
        "-inf.0".to_string()
    } else if d == d.trunc() && d.abs() < 1e15 {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        if self.is_number() && other.is_number() {
            return numeric_cmp(self, other) == Ordering::Equal;
        }

        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (
                Value::Regex { pattern: p1, options: o1 },
                Value::Regex { pattern: p2, options: o2 },
            ) => p1 == p2 && o1 == o2,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.is_number() && other.is_number() {
            return numeric_cmp(self, other);
        }

        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (
                Value::Regex { pattern: p1, options: o1 },
                Value::Regex { pattern: p2, options: o2 },
            ) => p1.cmp(p2).then_with(|| o1.cmp(o2)),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            // unreachable: equal ranks always pair identical kind classes
            _ => Ordering::Equal,
        }
    }
}

/// Cross-kind numeric comparison. Integer pairs compare exactly; any float
/// or decimal operand promotes the comparison to `f64`.
fn numeric_cmp(a: &Value, b: &Value) -> Ordering {
    match (a.as_num(), b.as_num()) {
        (Some(Num::Int(x)), Some(Num::Int(y))) => x.cmp(&y),
        (Some(x), Some(y)) => {
            let xf = match x {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            let yf = match y {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            num_cmp_float(xf, yf)
        }
        // callers check is_number() first
        _ => Ordering::Equal,
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render_literal())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<ObjectId> for Value {
    fn from(v: ObjectId) -> Self {
        Value::ObjectId(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Decimal128> for Value {
    fn from(v: Decimal128) -> Self {
        Value::Decimal128(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Value::Document(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}
