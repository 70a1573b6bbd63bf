use std::{collections::HashMap, fmt};

use crate::{
    bulk::BulkWriteResult,
    error::{IndexedWriteError, WriteConcernError, WriteError, MULTIPLE_ERROR},
    results::{ClientBulkWriteResult, SummaryBulkWriteResult, VerboseBulkWriteResult},
};

/// The failure reported by a bulk operation built with
/// [`initialize_ordered_bulk_op`](crate::Collection::initialize_ordered_bulk_op) or
/// [`initialize_unordered_bulk_op`](crate::Collection::initialize_unordered_bulk_op).
///
/// The error always carries the merged [`BulkWriteResult`] so the caller can inspect what was
/// written before or alongside the failure.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct BulkWriteError {
    /// The message of the single write error, `"write operation failed"` when several write
    /// errors occurred, or the message of the write concern error when there were no write
    /// errors.
    pub message: String,

    /// The code matching `message`. [`MULTIPLE_ERROR`] is used when several write errors
    /// occurred.
    pub code: i32,

    /// Every write error recorded, in the order the replies were merged.
    pub write_errors: Vec<IndexedWriteError>,

    /// The write concern error reported for the bulk, if any. Several write concern errors are
    /// combined into one.
    pub write_concern_error: Option<WriteConcernError>,

    /// The merged result of every batch that was executed.
    pub result: BulkWriteResult,
}

impl BulkWriteError {
    /// Returns the result unchanged when it holds neither write errors nor write concern
    /// errors, and the error describing them otherwise.
    pub(crate) fn check(result: BulkWriteResult) -> std::result::Result<BulkWriteResult, Self> {
        let write_errors = result.write_errors().to_vec();
        let write_concern_error = result.get_write_concern_error();

        let (code, message) = match write_errors.as_slice() {
            [] => match write_concern_error {
                Some(ref wc_error) => (wc_error.code, wc_error.message.clone()),
                None => return Ok(result),
            },
            [single] => (single.code, single.message.clone()),
            _ => (MULTIPLE_ERROR, "write operation failed".to_string()),
        };

        Err(Self {
            message,
            code,
            write_errors,
            write_concern_error,
            result,
        })
    }

    /// The first write error that was recorded. For an ordered bulk this is the error that
    /// stopped execution.
    pub fn first_write_error(&self) -> Option<&IndexedWriteError> {
        self.write_errors.first()
    }
}

impl fmt::Display for BulkWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (code {}, {} write error(s), write concern error: {})",
            self.message,
            self.code,
            self.write_errors.len(),
            self.write_concern_error.is_some()
        )
    }
}

/// The failure reported by [`Client::bulk_write`](crate::Client::bulk_write).
///
/// Top-level errors that interrupted execution are available through
/// [`Error::source_error`](crate::error::Error::source_error).
#[derive(Clone, Debug, Default)]
#[non_exhaustive]
pub struct ClientBulkWriteError {
    /// The write concern errors that occurred, one per affected batch.
    pub write_concern_errors: Vec<WriteConcernError>,

    /// The write errors that occurred, keyed by the index of the failed model.
    pub write_errors: HashMap<usize, WriteError>,

    /// The results of the writes that succeeded before or alongside the failures.
    pub partial_result: Option<PartialBulkWriteResult>,
}

impl ClientBulkWriteError {
    pub(crate) fn merge(&mut self, other: ClientBulkWriteError) {
        self.write_concern_errors.extend(other.write_concern_errors);
        self.write_errors.extend(other.write_errors);
        if let Some(other_partial_result) = other.partial_result {
            self.merge_partial_results(other_partial_result);
        }
    }

    pub(crate) fn merge_partial_results(&mut self, other_partial_result: PartialBulkWriteResult) {
        if let Some(ref mut partial_result) = self.partial_result {
            partial_result.merge(other_partial_result);
        } else {
            self.partial_result = Some(other_partial_result);
        }
    }
}

/// The results of a partially executed [`Client::bulk_write`](crate::Client::bulk_write).
#[derive(Clone, Debug)]
pub enum PartialBulkWriteResult {
    /// Summary counts only, when verbose results were not requested.
    Summary(SummaryBulkWriteResult),

    /// Counts plus the result of every successful write.
    Verbose(VerboseBulkWriteResult),
}

impl PartialBulkWriteResult {
    pub(crate) fn merge(&mut self, other: Self) {
        match (self, other) {
            (Self::Verbose(this), Self::Verbose(other)) => this.merge(other),
            (Self::Verbose(this), Self::Summary(other)) => this.summary.merge(other),
            (Self::Summary(this), other) => this.merge(other.summary().clone()),
        }
    }

    /// The summary counts of this result.
    pub fn summary(&self) -> &SummaryBulkWriteResult {
        match self {
            Self::Summary(summary) => summary,
            Self::Verbose(verbose) => &verbose.summary,
        }
    }
}
