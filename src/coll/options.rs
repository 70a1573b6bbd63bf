use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use typed_builder::TypedBuilder;

use crate::{
    bson::{Bson, Document},
    concern::WriteConcern,
};

/// Options for a bulk started with
/// [`Collection::initialize_ordered_bulk_op`](crate::Collection::initialize_ordered_bulk_op) or
/// [`Collection::initialize_unordered_bulk_op`](crate::Collection::initialize_unordered_bulk_op).
///
/// Every set field except `force_server_object_id` and `retry_writes` is copied into each
/// `insert`, `update` and `delete` command of the bulk.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct BulkOptions {
    /// Skip schema validation on the server. Only sent when `true`.
    pub bypass_document_validation: Option<bool>,

    /// The write concern of every batch. [`Execute::write_concern`](crate::bulk::Execute::write_concern)
    /// takes precedence, and the client's write concern applies when neither is set.
    #[serde(skip_serializing_if = "crate::serde_util::write_concern_is_empty")]
    pub write_concern: Option<WriteConcern>,

    /// Leave `_id` generation to the server for inserted documents. Defaults to the client's
    /// setting.
    #[serde(skip_serializing)]
    pub force_server_object_id: Option<bool>,

    /// Whether retry-eligible batches may be resent once after a retryable error. Defaults to the
    /// client's setting.
    #[serde(skip_serializing)]
    pub retry_writes: Option<bool>,

    /// An arbitrary value attached to every command, visible in server logs and the profiler.
    pub comment: Option<Bson>,

    /// Variables available as `$$name` in update and delete filters and pipelines. Not sent
    /// with `insert` commands.
    #[serde(rename = "let")]
    pub let_vars: Option<Document>,
}

/// The `u` field of an update statement: operator expressions or an aggregation pipeline.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
#[non_exhaustive]
pub enum UpdateModifications {
    /// Operator expressions such as `{ "$set": { "a": 1 } }`. The first key must start with `$`.
    Document(Document),

    /// An update pipeline of aggregation stages.
    Pipeline(Vec<Document>),
}

impl UpdateModifications {
    pub(crate) fn to_bson(&self) -> Bson {
        match self {
            Self::Document(document) => Bson::Document(document.clone()),
            Self::Pipeline(stages) => {
                Bson::Array(stages.iter().cloned().map(Bson::Document).collect())
            }
        }
    }
}

impl From<Document> for UpdateModifications {
    fn from(document: Document) -> Self {
        Self::Document(document)
    }
}

impl From<Vec<Document>> for UpdateModifications {
    fn from(stages: Vec<Document>) -> Self {
        Self::Pipeline(stages)
    }
}
