use serde::Deserialize;

use crate::{
    bson::Bson,
    error::{WriteConcernError, WriteError},
    operation::CursorInfo,
};

/// The top-level reply to a `bulkWrite` command.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Response {
    /// Absent when the write was unacknowledged.
    pub(super) cursor: Option<CursorInfo>,

    #[serde(flatten)]
    pub(super) summary: SummaryInfo,

    pub(super) write_concern_error: Option<WriteConcernError>,
}

/// The counts reported at the top level of a `bulkWrite` reply.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(super) struct SummaryInfo {
    pub(super) n_errors: i64,
    pub(super) n_inserted: i64,
    pub(super) n_matched: i64,
    pub(super) n_modified: i64,
    pub(super) n_upserted: i64,
    pub(super) n_deleted: i64,
}

/// One document of the results cursor.
#[derive(Debug, Deserialize)]
pub(super) struct SingleOperationResponse {
    /// The index of the model within the batch.
    #[serde(rename = "idx")]
    pub(super) index: usize,

    #[serde(flatten)]
    pub(super) result: SingleOperationResult,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum SingleOperationResult {
    // Must come first: a success never carries a code, an error always does.
    Error(WriteError),
    #[serde(rename_all = "camelCase")]
    Success {
        n: u64,
        n_modified: Option<u64>,
        upserted: Option<UpsertedId>,
    },
}

#[derive(Debug, Deserialize)]
pub(super) struct UpsertedId {
    #[serde(rename = "_id")]
    pub(super) id: Bson,
}

#[cfg(test)]
mod test {
    use crate::{
        bson::{doc, Bson},
        operation::bulk_write::server_responses::{
            Response,
            SingleOperationResponse,
            SingleOperationResult,
        },
    };

    #[test]
    fn parse_reply() {
        let response: Response = bson::from_document(doc! {
            "ok": 1,
            "cursor": { "id": 0_i64, "ns": "admin.$cmd.bulkWrite", "firstBatch": [] },
            "nErrors": 1,
            "nInserted": 2,
            "nMatched": 0,
            "nModified": 0,
            "nUpserted": 1,
            "nDeleted": 0,
            "writeConcernError": { "code": 64, "errmsg": "waiting for replication timed out" },
        })
        .unwrap();
        assert_eq!(response.summary.n_inserted, 2);
        assert_eq!(response.summary.n_upserted, 1);
        assert_eq!(response.write_concern_error.unwrap().code, 64);
        assert_eq!(response.cursor.unwrap().id, 0);

        let unacknowledged: Response = bson::from_document(doc! { "ok": 1 }).unwrap();
        assert!(unacknowledged.cursor.is_none());
        assert_eq!(unacknowledged.summary.n_errors, 0);
    }

    #[test]
    fn parse_individual_results() {
        let error: SingleOperationResponse = bson::from_document(doc! {
            "ok": 0, "idx": 3, "code": 11000, "errmsg": "duplicate key"
        })
        .unwrap();
        assert_eq!(error.index, 3);
        assert!(matches!(error.result, SingleOperationResult::Error(ref e) if e.code == 11000));

        let upsert: SingleOperationResponse = bson::from_document(doc! {
            "ok": 1, "idx": 0, "n": 1, "nModified": 0, "upserted": { "_id": "a" }
        })
        .unwrap();
        match upsert.result {
            SingleOperationResult::Success {
                n,
                n_modified,
                upserted,
            } => {
                assert_eq!(n, 1);
                assert_eq!(n_modified, Some(0));
                assert_eq!(upserted.unwrap().id, Bson::String("a".into()));
            }
            SingleOperationResult::Error(e) => panic!("expected success, got {e:?}"),
        }
    }
}
