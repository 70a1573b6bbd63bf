use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{
    bson::{Bson, Document},
    bson_util::{replacement_document_check, update_document_check},
    error::Result,
    options::UpdateModifications,
};

/// The new contents of the documents matched by an update statement.
#[derive(Clone, Debug)]
pub(crate) enum UpdateOrReplace {
    UpdateModifications(UpdateModifications),
    Replacement(Document),
}

impl UpdateOrReplace {
    /// Checks that updates only use update operators and that replacements use none.
    fn to_bson(&self) -> Result<Bson> {
        match self {
            Self::UpdateModifications(update) => {
                if let UpdateModifications::Document(document) = update {
                    update_document_check(document)?;
                }
                Ok(update.to_bson())
            }
            Self::Replacement(replacement) => {
                replacement_document_check(replacement)?;
                Ok(Bson::Document(replacement.clone()))
            }
        }
    }
}

/// One entry of the `updates` array of an `update` command.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateStatement {
    pub(crate) q: Document,
    pub(crate) u: Bson,
    pub(crate) multi: bool,
    pub(crate) upsert: bool,
    pub(crate) array_filters: Option<Vec<Document>>,
    pub(crate) collation: Option<Document>,
    pub(crate) hint: Option<Bson>,
}

impl UpdateStatement {
    pub(crate) fn new(
        q: Document,
        update: UpdateOrReplace,
        multi: bool,
        upsert: bool,
    ) -> Result<Self> {
        Ok(Self {
            q,
            u: update.to_bson()?,
            multi,
            upsert,
            array_filters: None,
            collation: None,
            hint: None,
        })
    }

    pub(crate) fn to_document(&self) -> Result<Document> {
        Ok(bson::to_document(self)?)
    }
}

/// One entry of the `deletes` array of a `delete` command. A `limit` of 0 deletes every matching
/// document, a `limit` of 1 only the first.
#[skip_serializing_none]
#[derive(Clone, Debug, Serialize)]
pub(crate) struct DeleteStatement {
    pub(crate) q: Document,
    pub(crate) limit: i32,
    pub(crate) collation: Option<Document>,
    pub(crate) hint: Option<Bson>,
}

impl DeleteStatement {
    pub(crate) fn new(q: Document, limit: i32) -> Self {
        Self {
            q,
            limit,
            collation: None,
            hint: None,
        }
    }

    pub(crate) fn to_document(&self) -> Result<Document> {
        Ok(bson::to_document(self)?)
    }
}
