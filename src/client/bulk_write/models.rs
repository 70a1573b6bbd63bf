use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{
    bson::{doc, Bson, Document},
    bson_util::{get_or_prepend_id_field, replacement_document_check, update_document_check},
    coll::options::UpdateModifications,
    error::Result,
    Namespace,
};

/// A single write to be performed as part of a [`Client::bulk_write`](crate::Client::bulk_write).
/// Each model carries the namespace it targets, so one bulk write may touch any number of
/// collections.
#[skip_serializing_none]
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum WriteModel {
    /// Inserts a single document. An `_id` is generated for the document if it does not have one.
    InsertOne {
        /// The namespace to insert into.
        #[serde(skip)]
        namespace: Namespace,

        /// The document to insert.
        document: Document,
    },

    /// Updates the first document matching `filter`.
    #[serde(rename_all = "camelCase")]
    UpdateOne {
        /// The namespace to update.
        #[serde(skip)]
        namespace: Namespace,

        /// The filter selecting the document to update.
        filter: Document,

        /// The update document or pipeline.
        #[serde(rename = "updateMods")]
        update: UpdateModifications,

        /// Filters determining which array elements an update applies to.
        array_filters: Option<Vec<Document>>,

        /// The collation to use for the filter.
        collation: Option<Document>,

        /// The index to use for the filter.
        hint: Option<Bson>,

        /// Whether a document should be inserted when none match the filter.
        upsert: Option<bool>,
    },

    /// Updates every document matching `filter`.
    #[serde(rename_all = "camelCase")]
    UpdateMany {
        /// The namespace to update.
        #[serde(skip)]
        namespace: Namespace,

        /// The filter selecting the documents to update.
        filter: Document,

        /// The update document or pipeline.
        #[serde(rename = "updateMods")]
        update: UpdateModifications,

        /// Filters determining which array elements an update applies to.
        array_filters: Option<Vec<Document>>,

        /// The collation to use for the filter.
        collation: Option<Document>,

        /// The index to use for the filter.
        hint: Option<Bson>,

        /// Whether a document should be inserted when none match the filter.
        upsert: Option<bool>,
    },

    /// Replaces the first document matching `filter`.
    #[serde(rename_all = "camelCase")]
    ReplaceOne {
        /// The namespace to update.
        #[serde(skip)]
        namespace: Namespace,

        /// The filter selecting the document to replace.
        filter: Document,

        /// The replacement document. It must not contain update operators.
        #[serde(rename = "updateMods")]
        replacement: Document,

        /// The collation to use for the filter.
        collation: Option<Document>,

        /// The index to use for the filter.
        hint: Option<Bson>,

        /// Whether the replacement should be inserted when no document matches the filter.
        upsert: Option<bool>,
    },

    /// Deletes the first document matching `filter`.
    DeleteOne {
        /// The namespace to delete from.
        #[serde(skip)]
        namespace: Namespace,

        /// The filter selecting the document to delete.
        filter: Document,

        /// The collation to use for the filter.
        collation: Option<Document>,

        /// The index to use for the filter.
        hint: Option<Bson>,
    },

    /// Deletes every document matching `filter`.
    DeleteMany {
        /// The namespace to delete from.
        #[serde(skip)]
        namespace: Namespace,

        /// The filter selecting the documents to delete.
        filter: Document,

        /// The collation to use for the filter.
        collation: Option<Document>,

        /// The index to use for the filter.
        hint: Option<Bson>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum OperationType {
    Insert,
    Update,
    Delete,
}

impl WriteModel {
    pub(crate) fn namespace(&self) -> &Namespace {
        match self {
            Self::InsertOne { namespace, .. }
            | Self::UpdateOne { namespace, .. }
            | Self::UpdateMany { namespace, .. }
            | Self::ReplaceOne { namespace, .. }
            | Self::DeleteOne { namespace, .. }
            | Self::DeleteMany { namespace, .. } => namespace,
        }
    }

    pub(crate) fn operation_type(&self) -> OperationType {
        match self {
            Self::InsertOne { .. } => OperationType::Insert,
            Self::UpdateOne { .. } | Self::UpdateMany { .. } | Self::ReplaceOne { .. } => {
                OperationType::Update
            }
            Self::DeleteOne { .. } | Self::DeleteMany { .. } => OperationType::Delete,
        }
    }

    /// Whether this operation applies to every document matching its filter. Returns `None` for
    /// inserts, which have no filter.
    pub(crate) fn multi(&self) -> Option<bool> {
        match self {
            Self::UpdateMany { .. } | Self::DeleteMany { .. } => Some(true),
            Self::UpdateOne { .. } | Self::ReplaceOne { .. } | Self::DeleteOne { .. } => {
                Some(false)
            }
            Self::InsertOne { .. } => None,
        }
    }

    pub(crate) fn operation_name(&self) -> &'static str {
        match self.operation_type() {
            OperationType::Insert => "insert",
            OperationType::Update => "update",
            OperationType::Delete => "delete",
        }
    }

    /// Builds this model's entry in the `ops` array of a `bulkWrite` command, targeting the
    /// namespace at `ns_index` in `nsInfo`.
    ///
    /// Inserted documents without an `_id` are given one with `generate_id`. The id is written
    /// back into the model so that a retried batch resends the same document, and is returned
    /// alongside the entry.
    pub(crate) fn to_ops_document(
        &mut self,
        ns_index: usize,
        generate_id: impl FnOnce() -> Bson,
    ) -> Result<(Document, Option<Bson>)> {
        match self {
            Self::UpdateOne {
                update: UpdateModifications::Document(update_document),
                ..
            }
            | Self::UpdateMany {
                update: UpdateModifications::Document(update_document),
                ..
            } => update_document_check(update_document)?,
            Self::ReplaceOne { replacement, .. } => replacement_document_check(replacement)?,
            _ => {}
        }

        let name = self.operation_name();
        let mut ops_document = doc! { name: ns_index as i32 };
        let inserted_id = match self {
            Self::InsertOne { document, .. } => {
                let id = get_or_prepend_id_field(document, generate_id);
                ops_document.insert("document", document.clone());
                Some(id)
            }
            _ => {
                ops_document.extend(bson::to_document(&*self)?);
                None
            }
        };

        if let Some(multi) = self.multi() {
            ops_document.insert("multi", multi);
        }

        Ok((ops_document, inserted_id))
    }
}
