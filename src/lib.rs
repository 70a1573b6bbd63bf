//! Bulk write batching and result reconciliation for MongoDB.
//!
//! This crate turns a caller-supplied sequence of insert, update and delete operations into
//! size- and count-bounded write commands, dispatches them through a [`CommandExecutor`], and
//! folds every server reply back into a single result whose indexes always refer to the
//! caller's original operation order.
//!
//! Two APIs are provided:
//!
//! - The per-collection bulk API, started with
//!   [`Collection::initialize_ordered_bulk_op`] or
//!   [`Collection::initialize_unordered_bulk_op`], which groups operations into same-type
//!   `insert`/`update`/`delete` commands and reports a [`BulkWriteResult`](bulk::BulkWriteResult).
//! - The unified [`Client::bulk_write`] API, which sends operations across any number of
//!   namespaces in one `bulkWrite` command per batch (MongoDB 8.0+).
//!
//! ## Sending commands
//!
//! Networking is provided by the caller through the [`CommandExecutor`] trait: given a
//! [`Command`](cmap::Command) it returns the raw reply document. The crate never opens a
//! connection itself.
//!
//! ```no_run
//! # use mongodb_bulk::{bson::doc, error::Result, Client, CommandExecutor};
//! # async fn run(executor: impl CommandExecutor + 'static) -> Result<()> {
//! let client = Client::new(executor);
//! let coll = client.database("test").collection("people");
//!
//! let mut bulk = coll.initialize_unordered_bulk_op(None);
//! bulk.insert(doc! { "name": "Ada" })?;
//! bulk.find(doc! { "name": "Grace" })?.upsert().update_one(doc! { "$set": { "age": 85 } })?;
//! bulk.find(doc! { "retired": true })?.delete()?;
//!
//! let result = bulk.execute().await?;
//! println!("inserted {}", result.inserted_count());
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Command and batching events are emitted with [`tracing`] under the `mongodb_bulk::command`
//! and `mongodb_bulk::bulk` targets.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub use ::bson;

pub mod action;
mod bson_util;
pub mod bulk;
mod checked;
mod client;
mod cmap;
mod coll;
mod concern;
mod db;
pub mod error;
mod operation;
pub mod options;
pub mod results;
mod serde_util;
mod trace;

pub use crate::{
    bulk::BulkOperation,
    client::{executor::CommandExecutor, session::ClientSession, Client},
    cmap::{Command, ServerType, StreamDescription},
    coll::{Collection, Namespace},
    db::Database,
};

pub use client::bulk_write::models::WriteModel;

/// A boxed future, as returned by [`CommandExecutor::execute`].
pub use futures_core::future::BoxFuture;
