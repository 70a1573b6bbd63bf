//! Contains the types of results returned by [`Client::bulk_write`](crate::Client::bulk_write).

mod bulk_write;

use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::bson::Bson;

pub use bulk_write::{SummaryBulkWriteResult, VerboseBulkWriteResult};
pub(crate) use bulk_write::ClientBulkWriteResult;

/// The result of a single successful insert.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct InsertOneResult {
    /// The `_id` field of the document inserted.
    pub inserted_id: Bson,
}

/// The result of a single successful update or replace.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct UpdateResult {
    /// The number of documents that matched the filter. Zero when the write was an upsert.
    pub matched_count: u64,

    /// The number of documents that were modified by the operation.
    pub modified_count: u64,

    /// The `_id` field of the upserted document.
    pub upserted_id: Option<Bson>,
}

/// The result of a single successful delete.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct DeleteResult {
    /// The number of documents deleted by the operation.
    pub deleted_count: u64,
}
