use std::collections::VecDeque;

use serde::Deserialize;

use crate::{
    bson::{doc, Document},
    cmap::{Command, CommandResponse, StreamDescription},
    concern::WriteConcern,
    error::Result,
    operation::{Operation, Retryability},
    Namespace,
};

/// Fetches the next batch of the `bulkWrite` results cursor.
#[derive(Debug)]
pub(crate) struct GetMore<'a> {
    ns: &'a Namespace,
    cursor_id: i64,
}

impl<'a> GetMore<'a> {
    pub(crate) fn new(ns: &'a Namespace, cursor_id: i64) -> Self {
        Self { ns, cursor_id }
    }

    /// The command that releases the cursor on the server when it will not be drained.
    pub(crate) fn kill_cursors(ns: &Namespace, cursor_id: i64) -> Command {
        Command::new(
            "killCursors",
            &ns.db,
            doc! { "killCursors": ns.coll.clone(), "cursors": [cursor_id] },
        )
    }
}

/// The next batch of a cursor. An `id` of 0 means the server closed the cursor.
#[derive(Debug)]
pub(crate) struct GetMoreResult {
    pub(crate) batch: VecDeque<Document>,
    pub(crate) id: i64,
}

#[derive(Debug, Deserialize)]
struct Reply {
    cursor: NextBatch,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextBatch {
    id: i64,
    next_batch: VecDeque<Document>,
}

impl Operation for GetMore<'_> {
    type O = GetMoreResult;

    fn name(&self) -> &str {
        "getMore"
    }

    fn build(&mut self, _description: &StreamDescription) -> Result<Command> {
        let body = doc! {
            "getMore": self.cursor_id,
            "collection": self.ns.coll.clone(),
        };
        Ok(Command::new(self.name(), &self.ns.db, body))
    }

    fn handle_response(
        &mut self,
        response: Document,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        let Reply { cursor } = CommandResponse::new(response).body()?;
        Ok(GetMoreResult {
            batch: cursor.next_batch,
            id: cursor.id,
        })
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        None
    }

    fn retryability(&self) -> Retryability {
        Retryability::None
    }
}
