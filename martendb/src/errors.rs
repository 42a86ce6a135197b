use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::{atomic, Atomic};

/// Error kinds for martendb operations.
///
/// Each kind corresponds to one entry of the wire protocol's error taxonomy
/// and carries a stable numeric code and code name that are part of the
/// external contract. Reply assembly uses [ErrorKind::code] and
/// [ErrorKind::code_name] verbatim; the message text travels in `errmsg`.
///
/// # Examples
///
/// ```rust,ignore
/// use martendb::errors::{MartenError, ErrorKind, MartenResult};
///
/// fn example() -> MartenResult<()> {
///     Err(MartenError::new("ns not found", ErrorKind::NamespaceNotFound))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// Internal error, including storage backend failures surfaced to a client.
    InternalError,
    /// Invalid document content, invalid key, malformed `$slice` syntax.
    BadValue,
    /// Update modifier faults: non-document operator argument, unknown
    /// modifier, multi-operator path conflict.
    FailedToParse,
    /// Wrong argument type for a command field.
    TypeMismatch,
    /// Drop/stat on a non-existent collection.
    NamespaceNotFound,
    /// Drop of an index that does not exist.
    IndexNotFound,
    /// Explicit duplicate create under the legacy compatibility mode.
    NamespaceExists,
    /// Unknown command verb.
    CommandNotFound,
    /// Missing required capped-collection field combination.
    InvalidOptions,
    /// Malformed collection name.
    InvalidNamespace,
    /// Index creation matching an existing key spec under another name.
    IndexOptionsConflict,
    /// Index creation reusing an existing name for a different key spec.
    IndexKeySpecsConflict,
    /// Unique index or `_id` collision.
    DuplicateKey,
    /// Cooperative cancellation observed between document batches.
    Interrupted,
    /// Numeric command argument out of bound (size/limit/scale).
    Location51024,
}

impl ErrorKind {
    /// The numeric wire code for this kind.
    pub fn code(&self) -> i32 {
        match self {
            ErrorKind::InternalError => 1,
            ErrorKind::BadValue => 2,
            ErrorKind::FailedToParse => 9,
            ErrorKind::TypeMismatch => 14,
            ErrorKind::NamespaceNotFound => 26,
            ErrorKind::IndexNotFound => 27,
            ErrorKind::NamespaceExists => 48,
            ErrorKind::CommandNotFound => 59,
            ErrorKind::InvalidOptions => 72,
            ErrorKind::InvalidNamespace => 73,
            ErrorKind::IndexOptionsConflict => 85,
            ErrorKind::IndexKeySpecsConflict => 86,
            ErrorKind::DuplicateKey => 11000,
            ErrorKind::Interrupted => 11601,
            ErrorKind::Location51024 => 51024,
        }
    }

    /// The wire code name for this kind.
    pub fn code_name(&self) -> &'static str {
        match self {
            ErrorKind::InternalError => "InternalError",
            ErrorKind::BadValue => "BadValue",
            ErrorKind::FailedToParse => "FailedToParse",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::NamespaceNotFound => "NamespaceNotFound",
            ErrorKind::IndexNotFound => "IndexNotFound",
            ErrorKind::NamespaceExists => "NamespaceExists",
            ErrorKind::CommandNotFound => "CommandNotFound",
            ErrorKind::InvalidOptions => "InvalidOptions",
            ErrorKind::InvalidNamespace => "InvalidNamespace",
            ErrorKind::IndexOptionsConflict => "IndexOptionsConflict",
            ErrorKind::IndexKeySpecsConflict => "IndexKeySpecsConflict",
            ErrorKind::DuplicateKey => "DuplicateKey",
            ErrorKind::Interrupted => "Interrupted",
            ErrorKind::Location51024 => "Location51024",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_name())
    }
}

/// Custom martendb error type.
///
/// `MartenError` encapsulates the error message, kind, and optional cause.
/// It supports error chaining and backtraces for debugging. The message text
/// of contract errors is part of the external protocol; the constructors in
/// this module are the single place those texts are formatted.
#[derive(Clone)]
pub struct MartenError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<MartenError>>,
    backtrace: Atomic<Backtrace>,
}

impl MartenError {
    /// Creates a new `MartenError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        MartenError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new()),
        }
    }

    /// Creates a new `MartenError` with a cause error.
    ///
    /// This creates an error chain where the cause error is preserved for
    /// debugging. The cause never reaches the wire reply; only the top-level
    /// message, code and code name do.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: MartenError) -> Self {
        MartenError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn code(&self) -> i32 {
        self.error_kind.code()
    }

    pub fn code_name(&self) -> &'static str {
        self.error_kind.code_name()
    }

    pub fn cause(&self) -> Option<&Box<MartenError>> {
        self.cause.as_ref()
    }
}

impl Display for MartenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for MartenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // print error message with stack trace followed by cause
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace.read()),
        }
    }
}

impl Error for MartenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// A result type alias for martendb operations.
pub type MartenResult<T> = Result<T, MartenError>;

impl From<std::string::FromUtf8Error> for MartenError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        MartenError::new(
            &format!("UTF-8 encoding error: {}", err),
            ErrorKind::BadValue,
        )
    }
}

impl From<std::fmt::Error> for MartenError {
    fn from(err: std::fmt::Error) -> Self {
        MartenError::new(
            &format!("Formatting error: {}", err),
            ErrorKind::InternalError,
        )
    }
}

impl From<String> for MartenError {
    fn from(msg: String) -> Self {
        MartenError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for MartenError {
    fn from(msg: &str) -> Self {
        MartenError::new(msg, ErrorKind::InternalError)
    }
}

// ---------------------------------------------------------------------------
// Contract message constructors.
//
// The message texts below are compared literally by protocol test suites.
// Every formatted operand (`type_name`, rendered literal) is produced by the
// value model so rendering cannot drift between call sites.
// ---------------------------------------------------------------------------

/// `invalid key: "<key>" (<reason>)` validation error.
pub(crate) fn invalid_key(key: &str, reason: &str) -> MartenError {
    log::error!("document validation failed for key {:?}: {}", key, reason);
    MartenError::new(
        &format!("invalid key: \"{}\" ({})", key, reason),
        ErrorKind::BadValue,
    )
}

pub(crate) const KEY_EMPTY: &str = "key must not be empty";
pub(crate) const KEY_NUL: &str = "key must not contain interior NUL";
pub(crate) const KEY_DOLLAR: &str = "key must not start with '$' sign";
pub(crate) const KEY_DOT: &str = "key must not contain '.' sign";
pub(crate) const KEY_DUPLICATE: &str = "duplicate keys are not allowed";

/// `invalid value: { "<key>": <literal> } (<reason>)` validation error.
pub(crate) fn invalid_value(key: &str, literal: &str, reason: &str) -> MartenError {
    log::error!("document validation failed for value of {:?}: {}", key, reason);
    MartenError::new(
        &format!("invalid value: {{ \"{}\": {} }} ({})", key, literal, reason),
        ErrorKind::BadValue,
    )
}

pub(crate) const VALUE_NAN_INF: &str = "infinity/NaN values are not allowed";
pub(crate) const VALUE_NESTED_ARRAY: &str = "nested arrays are not supported";

/// Update operator supplied with a non-document argument.
pub(crate) fn modifier_not_document(op: &str, type_name: &str, literal: &str) -> MartenError {
    MartenError::new(
        &format!(
            "Modifiers operate on fields but we found type {} instead. \
             For example: {{$mod: {{<field>: ...}}}} not {{{}: {}}}",
            type_name, op, literal
        ),
        ErrorKind::FailedToParse,
    )
}

/// Unrecognized top-level key in an update specification.
pub(crate) fn unknown_modifier(op: &str) -> MartenError {
    MartenError::new(
        &format!(
            "Unknown modifier: {}. Expected a valid update modifier or \
             pipeline-style update specified as an array",
            op
        ),
        ErrorKind::FailedToParse,
    )
}

/// Two update operators writing the same field path.
pub(crate) fn update_path_conflict(field: &str) -> MartenError {
    MartenError::new(
        &format!(
            "Updating the path '{}' would create a conflict at '{}'",
            field, field
        ),
        ErrorKind::FailedToParse,
    )
}

/// Unrecognized `$`-operator at the filter root.
pub(crate) fn unknown_top_level_operator(op: &str) -> MartenError {
    MartenError::new(
        &format!("unknown top level operator: {}", op),
        ErrorKind::BadValue,
    )
}

/// Unrecognized `$`-operator inside a field operator document.
pub(crate) fn unknown_operator(op: &str) -> MartenError {
    MartenError::new(&format!("unknown operator: {}", op), ErrorKind::BadValue)
}

/// Bad skip argument in the two-element `$slice` form.
pub(crate) fn slice_first_arg_type(type_name: &str) -> MartenError {
    MartenError::new(
        &format!(
            "First argument to $slice must be an array, but is of type: {}",
            type_name
        ),
        ErrorKind::BadValue,
    )
}

/// `$slice` argument arity fault.
pub(crate) fn slice_arity(passed: usize) -> MartenError {
    MartenError::new(
        &format!(
            "Expression $slice takes at least 2 arguments, and at most 3, \
             but {} were passed in",
            passed
        ),
        ErrorKind::BadValue,
    )
}

/// Negative limit in the two-element `$slice` form.
pub(crate) fn slice_negative_limit() -> MartenError {
    MartenError::new(
        "Second argument to $slice must be a positive number",
        ErrorKind::BadValue,
    )
}

/// Unique index or `_id` collision.
pub(crate) fn duplicate_key(namespace: &str, index_name: &str, dup_key: &str) -> MartenError {
    MartenError::new(
        &format!(
            "E11000 duplicate key error collection: {} index: {} dup key: {}",
            namespace, index_name, dup_key
        ),
        ErrorKind::DuplicateKey,
    )
}

/// Wrong type for a typed command field, e.g. `create.capped`.
pub(crate) fn field_type_mismatch(field: &str, type_name: &str, expected: &str) -> MartenError {
    MartenError::new(
        &format!(
            "BSON field '{}' is the wrong type '{}', expected types '{}'",
            field, type_name, expected
        ),
        ErrorKind::TypeMismatch,
    )
}

/// Numeric command field below its lower bound, e.g. `create.size`.
pub(crate) fn field_below_minimum(field: &str, actual: &str) -> MartenError {
    MartenError::new(
        &format!(
            "BSON field '{}' value must be >= 1, actual value '{}'",
            field, actual
        ),
        ErrorKind::Location51024,
    )
}
