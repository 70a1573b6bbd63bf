use std::collections::HashMap;

use serde::Serialize;

use crate::{
    error::PartialBulkWriteResult,
    results::{DeleteResult, InsertOneResult, UpdateResult},
    serde_util::serialize_indexed_map,
};

/// The summary counts of a [`Client::bulk_write`](crate::Client::bulk_write).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct SummaryBulkWriteResult {
    /// The total number of documents inserted.
    pub inserted_count: i64,

    /// The total number of documents upserted.
    pub upserted_count: i64,

    /// The total number of documents matched by updates.
    pub matched_count: i64,

    /// The total number of documents modified by updates.
    pub modified_count: i64,

    /// The total number of documents deleted.
    pub deleted_count: i64,
}

/// The summary counts of a [`Client::bulk_write`](crate::Client::bulk_write) together with the
/// result of every successful write, keyed by the index of its model.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct VerboseBulkWriteResult {
    /// The summary counts.
    #[serde(flatten)]
    pub summary: SummaryBulkWriteResult,

    /// The results of the successful inserts.
    #[serde(serialize_with = "serialize_indexed_map")]
    pub insert_results: HashMap<usize, InsertOneResult>,

    /// The results of the successful updates and replacements.
    #[serde(serialize_with = "serialize_indexed_map")]
    pub update_results: HashMap<usize, UpdateResult>,

    /// The results of the successful deletes.
    #[serde(serialize_with = "serialize_indexed_map")]
    pub delete_results: HashMap<usize, DeleteResult>,
}

mod result_trait {
    use crate::{
        error::PartialBulkWriteResult,
        results::{DeleteResult, InsertOneResult, UpdateResult},
    };

    pub trait ClientBulkWriteResult: Default + Send + Sync {
        fn errors_only() -> bool;

        fn merge(&mut self, other: Self);

        fn into_partial_result(self) -> PartialBulkWriteResult;

        fn populate_summary_info(
            &mut self,
            n_inserted: i64,
            n_matched: i64,
            n_modified: i64,
            n_upserted: i64,
            n_deleted: i64,
        );

        fn add_insert_result(&mut self, _index: usize, _insert_result: InsertOneResult) {}

        fn add_update_result(&mut self, _index: usize, _update_result: UpdateResult) {}

        fn add_delete_result(&mut self, _index: usize, _delete_result: DeleteResult) {}
    }
}

pub(crate) use result_trait::ClientBulkWriteResult;

impl ClientBulkWriteResult for SummaryBulkWriteResult {
    fn errors_only() -> bool {
        true
    }

    fn merge(&mut self, other: Self) {
        let SummaryBulkWriteResult {
            inserted_count,
            upserted_count,
            matched_count,
            modified_count,
            deleted_count,
        } = other;

        self.inserted_count += inserted_count;
        self.upserted_count += upserted_count;
        self.matched_count += matched_count;
        self.modified_count += modified_count;
        self.deleted_count += deleted_count;
    }

    fn into_partial_result(self) -> PartialBulkWriteResult {
        PartialBulkWriteResult::Summary(self)
    }

    fn populate_summary_info(
        &mut self,
        n_inserted: i64,
        n_matched: i64,
        n_modified: i64,
        n_upserted: i64,
        n_deleted: i64,
    ) {
        self.inserted_count += n_inserted;
        self.matched_count += n_matched;
        self.modified_count += n_modified;
        self.upserted_count += n_upserted;
        self.deleted_count += n_deleted;
    }
}

impl ClientBulkWriteResult for VerboseBulkWriteResult {
    fn errors_only() -> bool {
        false
    }

    fn merge(&mut self, other: Self) {
        self.summary.merge(other.summary);
        self.insert_results.extend(other.insert_results);
        self.update_results.extend(other.update_results);
        self.delete_results.extend(other.delete_results);
    }

    fn into_partial_result(self) -> PartialBulkWriteResult {
        PartialBulkWriteResult::Verbose(self)
    }

    fn populate_summary_info(
        &mut self,
        n_inserted: i64,
        n_matched: i64,
        n_modified: i64,
        n_upserted: i64,
        n_deleted: i64,
    ) {
        self.summary.populate_summary_info(
            n_inserted, n_matched, n_modified, n_upserted, n_deleted,
        );
    }

    fn add_insert_result(&mut self, index: usize, insert_result: InsertOneResult) {
        self.insert_results.insert(index, insert_result);
    }

    fn add_update_result(&mut self, index: usize, update_result: UpdateResult) {
        self.update_results.insert(index, update_result);
    }

    fn add_delete_result(&mut self, index: usize, delete_result: DeleteResult) {
        self.delete_results.insert(index, delete_result);
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::{
        bson::Bson,
        error::PartialBulkWriteResult,
        results::{
            ClientBulkWriteResult,
            InsertOneResult,
            SummaryBulkWriteResult,
            VerboseBulkWriteResult,
        },
    };

    #[test]
    fn verbose_serialization_orders_indexes() {
        let mut result = VerboseBulkWriteResult::default();
        result.populate_summary_info(2, 0, 0, 0, 0);
        for index in [10, 2] {
            result.add_insert_result(
                index,
                InsertOneResult {
                    inserted_id: Bson::Int32(index as i32),
                },
            );
        }

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["insertedCount"], 2);
        let keys: Vec<_> = json["insertResults"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        // serde_json sorts object keys, so check membership rather than order
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"2".to_string()) && keys.contains(&"10".to_string()));
    }

    #[test]
    fn partial_results_merge() {
        let mut summary = SummaryBulkWriteResult::default();
        summary.populate_summary_info(1, 2, 3, 4, 5);

        let mut partial = PartialBulkWriteResult::Summary(summary.clone());
        partial.merge(PartialBulkWriteResult::Summary(summary.clone()));
        assert_eq!(partial.summary().inserted_count, 2);
        assert_eq!(partial.summary().deleted_count, 10);

        let mut verbose = VerboseBulkWriteResult::default();
        verbose.add_insert_result(
            0,
            InsertOneResult {
                inserted_id: Bson::Int32(1),
            },
        );
        let mut partial = PartialBulkWriteResult::Verbose(verbose);
        partial.merge(PartialBulkWriteResult::Summary(summary));
        assert_eq!(partial.summary().matched_count, 2);
        match partial {
            PartialBulkWriteResult::Verbose(verbose) => assert_eq!(verbose.insert_results.len(), 1),
            PartialBulkWriteResult::Summary(_) => panic!("expected verbose results"),
        }
    }
}
