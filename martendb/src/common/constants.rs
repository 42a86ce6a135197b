// doc constants
pub const DOC_ID: &str = "_id";

// index constants
pub const ID_INDEX_NAME: &str = "_id_";
pub const WILDCARD_INDEX: &str = "*";
pub const KEY_NAME_SEPARATOR: &str = "_";

// namespace constants
pub const NAMESPACE_SEPARATOR: &str = ".";

// command reply field constants
pub const REPLY_OK: &str = "ok";
pub const REPLY_ERRMSG: &str = "errmsg";
pub const REPLY_CODE: &str = "code";
pub const REPLY_CODE_NAME: &str = "codeName";

// stats constants
pub const DEFAULT_SCALE: i64 = 1;
