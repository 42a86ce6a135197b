pub(crate) mod admin;
pub(crate) mod read;
pub(crate) mod write;

use crate::catalog::NamespaceCatalog;
use crate::common::{CancellationToken, NAMESPACE_SEPARATOR, REPLY_CODE, REPLY_CODE_NAME, REPLY_ERRMSG, REPLY_OK};
use crate::document::{Document, Value};
use crate::errors::{ErrorKind, MartenError, MartenResult};

/// Routes decoded command documents to their handlers and assembles reply
/// documents.
///
/// The dispatcher is the transport layer's single entry point into the core:
/// it consumes a decoded command document, routes on the verb (the
/// document's first key), and always returns a reply document — success
/// replies carry `ok: 1.0`, failures carry `ok: 0.0` plus `errmsg`, `code`
/// and `codeName` from the error taxonomy. It never panics on malformed
/// input.
///
/// The catalog is constructed by the hosting service and passed in; the
/// dispatcher holds no ambient state of its own.
#[derive(Clone)]
pub struct CommandDispatcher {
    catalog: NamespaceCatalog,
}

impl CommandDispatcher {
    pub fn new(catalog: NamespaceCatalog) -> Self {
        CommandDispatcher { catalog }
    }

    pub fn catalog(&self) -> &NamespaceCatalog {
        &self.catalog
    }

    /// Executes a command against a database and returns the reply document.
    pub fn dispatch(
        &self,
        db: &str,
        command: &Document,
        cancel: &CancellationToken,
    ) -> Document {
        match self.execute(db, command, cancel) {
            Ok(reply) => reply,
            Err(err) => error_reply(&err),
        }
    }

    fn execute(
        &self,
        db: &str,
        command: &Document,
        cancel: &CancellationToken,
    ) -> MartenResult<Document> {
        let verb = command.first_key().ok_or_else(|| {
            MartenError::new("no command specified", ErrorKind::BadValue)
        })?;

        match verb {
            "insert" => write::insert(&self.catalog, db, command, cancel),
            "update" => write::update(&self.catalog, db, command, cancel),
            "delete" => write::delete(&self.catalog, db, command, cancel),
            "find" => read::find(&self.catalog, db, command, cancel),
            "explain" => read::explain(&self.catalog, db, command),
            "create" => admin::create(&self.catalog, db, command),
            "drop" => admin::drop(&self.catalog, db, command),
            "listCollections" => admin::list_collections(&self.catalog, db),
            "createIndexes" => admin::create_indexes(&self.catalog, db, command),
            "dropIndexes" => admin::drop_indexes(&self.catalog, db, command),
            "listIndexes" => admin::list_indexes(&self.catalog, db, command),
            "collStats" => admin::coll_stats(&self.catalog, db, command),
            "dbStats" => admin::db_stats(&self.catalog, db, command),
            "dataSize" => admin::data_size(&self.catalog, command),
            other => {
                log::error!("unknown command verb: {}", other);
                Err(MartenError::new(
                    &format!("no such command: '{}'", other),
                    ErrorKind::CommandNotFound,
                ))
            }
        }
    }
}

/// A success reply skeleton; handlers append their fields before the final
/// `ok`.
pub(crate) fn ok_reply(mut reply: Document) -> Document {
    reply.put(REPLY_OK, Value::Double(1.0));
    reply
}

/// The error reply shape of the wire contract.
pub(crate) fn error_reply(err: &MartenError) -> Document {
    let mut reply = Document::new();
    reply.put(REPLY_OK, Value::Double(0.0));
    reply.put(REPLY_ERRMSG, Value::String(err.message().to_string()));
    reply.put(REPLY_CODE, Value::Int32(err.code()));
    reply.put(REPLY_CODE_NAME, Value::String(err.code_name().to_string()));
    reply
}

/// Extracts and validates the collection name a command addresses (the
/// value of its verb field) and returns the full namespace.
pub(crate) fn collection_namespace(
    db: &str,
    command: &Document,
    verb: &str,
) -> MartenResult<String> {
    let name = match command.get(verb) {
        Some(Value::String(name)) => name.as_str(),
        Some(other) => {
            log::error!("collection name for {} has type {}", verb, other.type_name());
            return Err(MartenError::new(
                &format!("collection name has invalid type {}", other.type_name()),
                ErrorKind::BadValue,
            ));
        }
        None => {
            return Err(MartenError::new(
                &format!("required parameter \"{}\" is missing", verb),
                ErrorKind::BadValue,
            ));
        }
    };

    if name.is_empty() || name.contains('$') || name.contains('\0') {
        return Err(MartenError::new(
            &format!("Invalid namespace specified '{}{}{}'", db, NAMESPACE_SEPARATOR, name),
            ErrorKind::InvalidNamespace,
        ));
    }

    Ok(format!("{}{}{}", db, NAMESPACE_SEPARATOR, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CreateMode;
    use crate::doc;
    use crate::store::MemoryBackend;
    use std::sync::Arc;

    // Setup only one time throughout the project.
    // It will take effect during test, project wide
    #[ctor::ctor]
    fn init() {
        colog::init();
    }

    fn dispatcher() -> CommandDispatcher {
        let catalog = NamespaceCatalog::new(
            Arc::new(MemoryBackend::new()),
            CreateMode::Idempotent,
        );
        CommandDispatcher::new(catalog)
    }

    #[test]
    fn test_unknown_command_reply() {
        let dispatcher = dispatcher();
        let reply = dispatcher.dispatch(
            "test",
            &doc! { frobnicate: "users" },
            &CancellationToken::new(),
        );
        assert_eq!(reply.get("ok"), Some(&Value::Double(0.0)));
        assert_eq!(reply.get("code"), Some(&Value::Int32(59)));
        assert_eq!(
            reply.get("codeName"),
            Some(&Value::String("CommandNotFound".to_string()))
        );
        assert_eq!(
            reply.get("errmsg"),
            Some(&Value::String("no such command: 'frobnicate'".to_string()))
        );
    }

    #[test]
    fn test_empty_command_reply() {
        let dispatcher = dispatcher();
        let reply = dispatcher.dispatch("test", &doc! {}, &CancellationToken::new());
        assert_eq!(reply.get("ok"), Some(&Value::Double(0.0)));
        assert_eq!(reply.get("code"), Some(&Value::Int32(2)));
    }

    #[test]
    fn test_collection_namespace_validation() {
        assert_eq!(
            collection_namespace("test", &doc! { find: "users" }, "find").unwrap(),
            "test.users"
        );

        let err =
            collection_namespace("test", &doc! { find: 1 }, "find").unwrap_err();
        assert_eq!(err.message(), "collection name has invalid type int");

        let err =
            collection_namespace("test", &doc! { find: "" }, "find").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidNamespace);
        assert_eq!(err.code(), 73);
        assert_eq!(err.message(), "Invalid namespace specified 'test.'");

        let err =
            collection_namespace("test", &doc! { find: "a$b" }, "find").unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidNamespace);
    }

    #[test]
    fn test_cancelled_token_interrupts_scans() {
        let dispatcher = dispatcher();
        let token = CancellationToken::new();
        dispatcher.dispatch(
            "test",
            &doc! {
                insert: "users",
                documents: [{ "_id": 1 }],
            },
            &token,
        );
        token.cancel();
        let reply = dispatcher.dispatch("test", &doc! { find: "users" }, &token);
        assert_eq!(reply.get("ok"), Some(&Value::Double(0.0)));
        assert_eq!(reply.get("code"), Some(&Value::Int32(11601)));
    }
}
