use std::{cmp::Ordering, collections::HashMap, fmt};

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::{
    bson::{Bson, Document, Timestamp},
    bson_util::get_int,
    error::{IndexedWriteError, WriteConcernError, WRITE_CONCERN_ERROR},
};

/// An id attributed to the operation at `index` in the order the operations were added to a bulk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct BulkId {
    /// The index of the operation.
    pub index: usize,

    /// The `_id` of the inserted or upserted document.
    #[serde(rename = "_id")]
    pub id: Bson,
}

impl BulkId {
    pub(crate) fn new(index: usize, id: Bson) -> Self {
        Self { index, id }
    }
}

/// A position in the replication log: a timestamp plus the election term that produced it.
///
/// Optimes are ordered by timestamp and then by term. Servers that do not report a term produce
/// optimes with `t` set to `None`, which orders before any term.
#[skip_serializing_none]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct OpTime {
    /// The timestamp of the write.
    pub ts: Timestamp,

    /// The election term of the write.
    pub t: Option<i64>,
}

impl OpTime {
    /// Reads the optime from the shapes servers report it in: `{ ts, t }` documents, bare
    /// timestamps, and 64-bit integers holding the seconds in the high word and the increment in
    /// the low word.
    pub(crate) fn from_bson(value: &Bson) -> Option<Self> {
        match value {
            Bson::Document(document) => Some(Self {
                ts: timestamp_from_bson(document.get("ts")?)?,
                t: document.get("t").and_then(get_int),
            }),
            other => Some(Self {
                ts: timestamp_from_bson(other)?,
                t: None,
            }),
        }
    }

    fn sort_key(&self) -> (u32, u32, Option<i64>) {
        (self.ts.time, self.ts.increment, self.t)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn timestamp_from_bson(value: &Bson) -> Option<Timestamp> {
    match value {
        Bson::Timestamp(ts) => Some(*ts),
        other => {
            let packed = get_int(other)? as u64;
            Some(Timestamp {
                time: (packed >> 32) as u32,
                increment: packed as u32,
            })
        }
    }
}

impl PartialOrd for OpTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// The accumulator every batch reply of a bulk is merged into.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkResult {
    pub(crate) ok: i32,
    #[serde(default)]
    pub(crate) n_inserted: u64,
    #[serde(default)]
    pub(crate) n_upserted: u64,
    #[serde(default)]
    pub(crate) n_matched: u64,
    pub(crate) n_modified: Option<u64>,
    #[serde(default)]
    pub(crate) n_removed: u64,
    #[serde(default)]
    pub(crate) inserted_ids: Vec<BulkId>,
    #[serde(default)]
    pub(crate) upserted: Vec<BulkId>,
    #[serde(default)]
    pub(crate) write_errors: Vec<IndexedWriteError>,
    #[serde(default)]
    pub(crate) write_concern_errors: Vec<WriteConcernError>,
    pub(crate) last_op: Option<OpTime>,
}

impl Default for BulkResult {
    fn default() -> Self {
        Self {
            ok: 1,
            n_inserted: 0,
            n_upserted: 0,
            n_matched: 0,
            n_modified: Some(0),
            n_removed: 0,
            inserted_ids: Vec::new(),
            upserted: Vec::new(),
            write_errors: Vec::new(),
            write_concern_errors: Vec::new(),
            last_op: None,
        }
    }
}

/// The result of executing a bulk operation built with
/// [`initialize_ordered_bulk_op`](crate::Collection::initialize_ordered_bulk_op) or
/// [`initialize_unordered_bulk_op`](crate::Collection::initialize_unordered_bulk_op).
///
/// Every index reported by this result refers to the order in which operations were added to
/// the bulk, regardless of how the operations were split into batches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BulkWriteResult {
    inner: BulkResult,
}

impl BulkWriteResult {
    pub(crate) fn new(inner: BulkResult) -> Self {
        Self { inner }
    }

    /// 1 when every batch reply was received, 0 once a batch failed as a whole.
    pub fn ok(&self) -> i32 {
        self.inner.ok
    }

    /// Whether no batch failed as a whole.
    pub fn is_ok(&self) -> bool {
        self.inner.ok == 1
    }

    /// The number of documents inserted.
    pub fn n_inserted(&self) -> u64 {
        self.inner.n_inserted
    }

    /// The number of documents inserted by upserts.
    pub fn n_upserted(&self) -> u64 {
        self.inner.n_upserted
    }

    /// The number of documents matched by updates, excluding upserts.
    pub fn n_matched(&self) -> u64 {
        self.inner.n_matched
    }

    /// The number of documents modified by updates. `None` when a server did not report it for
    /// one of the batches.
    pub fn n_modified(&self) -> Option<u64> {
        self.inner.n_modified
    }

    /// The number of documents deleted.
    pub fn n_removed(&self) -> u64 {
        self.inner.n_removed
    }

    /// Same as [`n_inserted`](Self::n_inserted).
    pub fn n(&self) -> u64 {
        self.inner.n_inserted
    }

    /// Same as [`n_inserted`](Self::n_inserted).
    pub fn inserted_count(&self) -> u64 {
        self.inner.n_inserted
    }

    /// Same as [`n_matched`](Self::n_matched).
    pub fn matched_count(&self) -> u64 {
        self.inner.n_matched
    }

    /// The number of documents modified, or 0 when it is unknown.
    pub fn modified_count(&self) -> u64 {
        self.inner.n_modified.unwrap_or(0)
    }

    /// Same as [`n_removed`](Self::n_removed).
    pub fn deleted_count(&self) -> u64 {
        self.inner.n_removed
    }

    /// The number of upserted ids reported.
    pub fn upserted_count(&self) -> u64 {
        self.inner.upserted.len() as u64
    }

    /// The ids of the inserted documents keyed by operation index.
    pub fn inserted_ids(&self) -> HashMap<usize, Bson> {
        self.inner
            .inserted_ids
            .iter()
            .map(|id| (id.index, id.id.clone()))
            .collect()
    }

    /// The ids of the upserted documents keyed by operation index.
    pub fn upserted_ids(&self) -> HashMap<usize, Bson> {
        self.inner
            .upserted
            .iter()
            .map(|id| (id.index, id.id.clone()))
            .collect()
    }

    /// The ids of the inserted documents, in the order their batches were merged.
    pub fn get_inserted_ids(&self) -> &[BulkId] {
        &self.inner.inserted_ids
    }

    /// The ids of the upserted documents, in the order their batches were merged.
    pub fn get_upserted_ids(&self) -> &[BulkId] {
        &self.inner.upserted
    }

    /// The `i`th upserted id.
    pub fn get_upserted_id_at(&self, i: usize) -> Option<&BulkId> {
        self.inner.upserted.get(i)
    }

    /// Whether any operation failed.
    pub fn has_write_errors(&self) -> bool {
        !self.inner.write_errors.is_empty()
    }

    /// The number of operations that failed.
    pub fn get_write_error_count(&self) -> usize {
        self.inner.write_errors.len()
    }

    /// The `i`th write error.
    pub fn get_write_error_at(&self, i: usize) -> Option<&IndexedWriteError> {
        self.inner.write_errors.get(i)
    }

    /// Every write error, in the order their batches were merged.
    pub fn get_write_errors(&self) -> &[IndexedWriteError] {
        &self.inner.write_errors
    }

    /// Same as [`get_write_errors`](Self::get_write_errors).
    pub fn write_errors(&self) -> &[IndexedWriteError] {
        &self.inner.write_errors
    }

    /// The write concern error of the bulk. When several batches reported one, they are combined
    /// into a single error with code [`WRITE_CONCERN_ERROR`].
    pub fn get_write_concern_error(&self) -> Option<WriteConcernError> {
        match self.inner.write_concern_errors.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            several => {
                let message = several
                    .iter()
                    .map(|error| error.message.as_str())
                    .collect::<Vec<_>>()
                    .join(" and ");
                Some(WriteConcernError::new(WRITE_CONCERN_ERROR, message))
            }
        }
    }

    /// The latest optime reported by the server.
    pub fn get_last_op(&self) -> Option<&OpTime> {
        self.inner.last_op.as_ref()
    }

    /// The result as a document in the shape it is serialized to.
    pub fn to_document(&self) -> crate::error::Result<Document> {
        Ok(bson::to_document(self)?)
    }
}

impl fmt::Display for BulkWriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let document = self.to_document().map_err(|_| fmt::Error)?;
        write!(
            f,
            "BulkWriteResult({})",
            Bson::Document(document).into_relaxed_extjson()
        )
    }
}
