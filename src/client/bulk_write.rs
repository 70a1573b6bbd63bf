pub(crate) mod models;

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use typed_builder::TypedBuilder;

use crate::{
    bson::{Bson, Document},
    concern::WriteConcern,
    serde_util::{serialize_bool_or_true, serialize_opposite_bool, write_concern_is_empty},
};

/// Specifies the options of [`Client::bulk_write`](crate::Client::bulk_write).
#[skip_serializing_none]
#[derive(Clone, Debug, Default, Deserialize, Serialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct ClientBulkWriteOptions {
    /// Whether the operations should be performed in the order they were given. When `true`,
    /// the first write error stops the bulk write. Defaults to `true`.
    #[serialize_always]
    #[serde(serialize_with = "serialize_bool_or_true")]
    pub ordered: Option<bool>,

    /// Opt out of document-level validation.
    pub bypass_document_validation: Option<bool>,

    /// Tags the command with an arbitrary BSON value to help trace it in the database profiler,
    /// currentOp and logs.
    pub comment: Option<Bson>,

    /// Map of parameter names and values that can be accessed as variables in update and delete
    /// filters and pipelines (e.g. "$$var").
    #[serde(rename = "let")]
    pub let_vars: Option<Document>,

    /// Whether the result of every successful write should be reported. Sent to the server as its
    /// inverse, `errorsOnly`.
    #[serialize_always]
    #[serde(
        rename(serialize = "errorsOnly"),
        serialize_with = "serialize_opposite_bool"
    )]
    pub verbose_results: Option<bool>,

    /// The write concern for the bulk write. Defaults to the write concern of the client.
    #[serde(skip_serializing_if = "write_concern_is_empty")]
    pub write_concern: Option<WriteConcern>,
}
