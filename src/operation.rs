pub(crate) mod bulk_write;
mod get_more;
mod write_batch;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{
    bson::{Bson, Document},
    cmap::{Command, StreamDescription},
    concern::WriteConcern,
    error::{IndexedWriteError, Result, WriteConcernError},
    Namespace,
};

pub(crate) use bulk_write::BulkWrite;
pub(crate) use get_more::GetMore;
pub(crate) use write_batch::WriteBatch;

/// A trait modeling the behavior of a server side operation.
pub(crate) trait Operation: Send {
    /// The output type of this operation.
    type O: Send;

    /// The name of the server side command associated with this operation.
    fn name(&self) -> &str;

    /// Returns the command that should be sent to the server as part of this operation.
    fn build(&mut self, description: &StreamDescription) -> Result<Command>;

    /// Interprets the server response to the command.
    fn handle_response(
        &mut self,
        response: Document,
        description: &StreamDescription,
    ) -> Result<Self::O>;

    /// The write concern to use for this operation, if any.
    fn write_concern(&self) -> Option<&WriteConcern>;

    /// Whether or not this operation will request acknowledgment from the server.
    fn is_acknowledged(&self) -> bool {
        self.write_concern()
            .map(WriteConcern::is_acknowledged)
            .unwrap_or(true)
    }

    /// The level of retryability the operation supports.
    fn retryability(&self) -> Retryability;

    /// Overrides the client's `retry_writes` setting for this operation.
    fn retry_writes(&self) -> Option<bool> {
        None
    }

    /// Updates this operation as needed for a retry.
    fn update_for_retry(&mut self) {}
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub(crate) enum Retryability {
    Write,
    None,
}

/// Appends a serializable struct to the input document. The serializable struct MUST serialize to
/// a Document; otherwise, an error will be thrown.
pub(crate) fn append_options<T: Serialize>(doc: &mut Document, options: Option<&T>) -> Result<()> {
    if let Some(options) = options {
        let options_doc = bson::to_document(options)?;
        doc.extend(options_doc);
    }
    Ok(())
}

/// Body of a reply to an `insert`, `update` or `delete` command.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WriteResponseBody {
    pub(crate) n: Option<u64>,

    pub(crate) n_modified: Option<u64>,

    /// An array of `{ index, _id }` entries, or a single upserted id from older servers.
    pub(crate) upserted: Option<Bson>,

    pub(crate) write_errors: Option<Vec<IndexedWriteError>>,

    pub(crate) write_concern_error: Option<WriteConcernError>,

    pub(crate) op_time: Option<Bson>,

    pub(crate) last_op: Option<Bson>,
}

impl WriteResponseBody {
    /// The optime of the write, preferring `lastOp` over `opTime`.
    pub(crate) fn op_time(&self) -> Option<&Bson> {
        self.last_op.as_ref().or(self.op_time.as_ref())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CursorInfo {
    pub(crate) id: i64,

    pub(crate) ns: Namespace,

    pub(crate) first_batch: VecDeque<Document>,
}
