use std::collections::HashSet;

use crate::{
    bson::Bson,
    bson_util::get_int,
    bulk::{
        result::{BulkId, BulkResult, OpTime},
        Batch,
        BatchType,
    },
    error::{Error, IndexedWriteError, UNKNOWN_ERROR},
    operation::WriteResponseBody,
};

impl BulkResult {
    /// Folds the reply to `batch` into this result. Every index reported by the server against a
    /// position in the batch is translated to the index of the operation in the bulk.
    ///
    /// Inserted ids are only recorded for documents that were written: in an ordered bulk the
    /// server stops at the first write error, so no id at or after it is recorded; in an
    /// unordered bulk only the failed documents are skipped.
    pub(crate) fn merge_reply(&mut self, batch: &Batch, reply: WriteResponseBody, ordered: bool) {
        if let Some(op_time) = reply.op_time().and_then(OpTime::from_bson) {
            if self.last_op.map_or(true, |last_op| op_time > last_op) {
                self.last_op = Some(op_time);
            }
        }

        let original_index =
            |local: usize| batch.original_index(local).unwrap_or(batch.original_zero_index + local);

        let write_errors = reply.write_errors.unwrap_or_default();
        match batch.batch_type {
            BatchType::Insert => {
                if let Some(n) = reply.n {
                    self.n_inserted += n;
                }

                let failed: HashSet<usize> = write_errors.iter().map(|error| error.index).collect();
                let first_failure = failed.iter().min().copied();
                for (local, id) in batch.inserted_ids.iter().enumerate() {
                    if ordered && first_failure.is_some_and(|first| local >= first) {
                        break;
                    }
                    if failed.contains(&local) {
                        continue;
                    }
                    if let Some(id) = id {
                        self.inserted_ids
                            .push(BulkId::new(original_index(local), id.clone()));
                    }
                }
            }
            BatchType::Update => {
                let upserted = match reply.upserted {
                    Some(Bson::Array(entries)) => entries
                        .into_iter()
                        .filter_map(|entry| match entry {
                            Bson::Document(entry) => {
                                let local = entry.get("index").and_then(get_int)?;
                                let id = entry.get("_id")?.clone();
                                Some(BulkId::new(original_index(usize::try_from(local).ok()?), id))
                            }
                            _ => None,
                        })
                        .collect(),
                    Some(Bson::Document(entry)) if entry.contains_key("_id") => {
                        // a lone entry without an index belongs to the first operation
                        let local = entry
                            .get("index")
                            .and_then(get_int)
                            .and_then(|local| usize::try_from(local).ok())
                            .unwrap_or(0);
                        let id = entry.get("_id").cloned().unwrap_or(Bson::Null);
                        vec![BulkId::new(original_index(local), id)]
                    }
                    Some(id) => vec![BulkId::new(batch.original_zero_index, id)],
                    None => Vec::new(),
                };
                let n_upserted = upserted.len() as u64;
                self.n_upserted += n_upserted;
                if let Some(n) = reply.n {
                    self.n_matched += n.saturating_sub(n_upserted);
                }
                self.n_modified = match (self.n_modified, reply.n_modified) {
                    (Some(total), Some(n_modified)) => Some(total + n_modified),
                    _ => None,
                };
                self.upserted.extend(upserted);
            }
            BatchType::Remove => {
                if let Some(n) = reply.n {
                    self.n_removed += n;
                }
            }
        }

        for mut write_error in write_errors {
            let local = write_error.index;
            write_error.index = original_index(local);
            write_error.op = batch.operations.get(local).cloned();
            self.write_errors.push(write_error);
        }

        if let Some(write_concern_error) = reply.write_concern_error {
            self.write_concern_errors.push(write_concern_error);
        }
    }

    /// Records a batch that failed as a whole as a single write error against its first
    /// operation. Only the first such failure of a bulk is recorded.
    pub(crate) fn merge_error(&mut self, batch: &Batch, error: &Error) {
        if self.ok == 0 {
            return;
        }
        self.ok = 0;
        self.write_errors.push(IndexedWriteError {
            index: batch.original_zero_index,
            code: error.code().unwrap_or(UNKNOWN_ERROR),
            code_name: None,
            message: error
                .server_message()
                .map(String::from)
                .unwrap_or_else(|| error.kind.to_string()),
            details: None,
            op: batch.operations.first().cloned(),
        });
    }
}
