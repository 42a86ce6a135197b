#![allow(
    dead_code,
    unused_imports,
)]
//! # martendb — wire-compatible document database core
//!
//! martendb implements the document model, validation engine, and
//! command/query/update execution layer of a widely-used binary
//! document-query wire protocol: it decides whether a document is legal, how
//! a query filter matches documents, how update operators mutate them, how
//! indexes and collections are created, dropped and listed, and which exact
//! error code and message text an illegal input produces.
//!
//! Wire framing, transport, authentication and the physical storage engine
//! are external collaborators: the core consumes a [store::StorageBackend]
//! and exposes [command::CommandDispatcher] to the transport layer. An
//! in-memory reference backend ships for embedding and tests.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use martendb::catalog::{CreateMode, NamespaceCatalog};
//! use martendb::command::CommandDispatcher;
//! use martendb::common::CancellationToken;
//! use martendb::store::MemoryBackend;
//! use martendb::doc;
//! use std::sync::Arc;
//!
//! let catalog = NamespaceCatalog::new(Arc::new(MemoryBackend::new()), CreateMode::Idempotent);
//! let dispatcher = CommandDispatcher::new(catalog);
//!
//! let reply = dispatcher.dispatch(
//!     "test",
//!     &doc! { insert: "users", documents: [{ name: "Alice" }] },
//!     &CancellationToken::new(),
//! );
//! assert_eq!(reply.get("ok"), Some(&martendb::document::Value::Double(1.0)));
//! ```
//!
//! ## Module Organization
//!
//! - [`document`] - The typed, ordered value model plus insert validation
//! - [`query`] - Filter matching and projection over documents
//! - [`update`] - Update operator execution
//! - [`catalog`] - Collection and index lifecycle over the storage backend
//! - [`command`] - Command routing and reply assembly
//! - [`store`] - The abstract storage interface and the in-memory backend
//! - [`common`] - Shared constants, locks, and the cancellation token
//! - [`errors`] - The error taxonomy with wire codes and contract messages
//!
//! ## Concurrency
//!
//! Document matching, projection, and update computation are pure functions
//! with no shared state and run with unbounded parallelism. The namespace
//! table serializes lifecycle operations per name, so racing creations of
//! one collection all succeed against exactly one physical namespace, and
//! operations on different namespaces never contend.

pub mod catalog;
pub mod command;
pub mod common;
pub mod document;
pub mod errors;
pub mod query;
pub mod store;
pub mod update;

pub(crate) use common::{atomic, Atomic};
