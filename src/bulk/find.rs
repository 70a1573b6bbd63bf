use crate::{
    bson::{Bson, Document},
    bulk::{
        models::{DeleteStatement, UpdateOrReplace, UpdateStatement},
        BulkOperation,
    },
    error::Result,
    options::UpdateModifications,
};

/// The operations that can be applied to the documents matched by the selector given to
/// [`BulkOperation::find`].
///
/// Modifiers such as [`upsert`](Self::upsert) and [`collation`](Self::collation) apply to the
/// operation that finishes the chain. Every finishing method adds exactly one operation to the
/// bulk and returns the bulk so further operations can be chained.
#[must_use]
#[derive(Debug)]
pub struct FindOperators<'a> {
    bulk: &'a mut BulkOperation,
    selector: Document,
    upsert: bool,
    collation: Option<Document>,
    array_filters: Option<Vec<Document>>,
    hint: Option<Bson>,
}

impl<'a> FindOperators<'a> {
    pub(crate) fn new(bulk: &'a mut BulkOperation, selector: Document) -> Self {
        Self {
            bulk,
            selector,
            upsert: false,
            collation: None,
            array_filters: None,
            hint: None,
        }
    }

    /// Inserts a document built from the selector and the update when no document matches.
    pub fn upsert(mut self) -> Self {
        self.upsert = true;
        self
    }

    /// The collation to match documents with.
    pub fn collation(mut self, collation: Document) -> Self {
        self.collation = Some(collation);
        self
    }

    /// Filters determining which array elements an update applies to.
    pub fn array_filters(mut self, array_filters: impl IntoIterator<Item = Document>) -> Self {
        self.array_filters = Some(array_filters.into_iter().collect());
        self
    }

    /// The index to use, given as an index name or a key pattern.
    pub fn hint(mut self, hint: impl Into<Bson>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Updates every matching document. `update` must only contain update operators or be an
    /// aggregation pipeline.
    pub fn update(self, update: impl Into<UpdateModifications>) -> Result<&'a mut BulkOperation> {
        self.add_update(UpdateOrReplace::UpdateModifications(update.into()), true)
    }

    /// Updates the first matching document. `update` must only contain update operators or be an
    /// aggregation pipeline.
    pub fn update_one(
        self,
        update: impl Into<UpdateModifications>,
    ) -> Result<&'a mut BulkOperation> {
        self.add_update(UpdateOrReplace::UpdateModifications(update.into()), false)
    }

    /// Replaces the first matching document. `replacement` must not contain update operators.
    pub fn replace_one(self, replacement: Document) -> Result<&'a mut BulkOperation> {
        self.add_update(UpdateOrReplace::Replacement(replacement), false)
    }

    /// Deletes the first matching document.
    pub fn delete_one(self) -> Result<&'a mut BulkOperation> {
        self.add_delete(1)
    }

    /// Deletes every matching document.
    pub fn delete(self) -> Result<&'a mut BulkOperation> {
        self.add_delete(0)
    }

    /// Same as [`delete_one`](Self::delete_one).
    pub fn remove_one(self) -> Result<&'a mut BulkOperation> {
        self.delete_one()
    }

    /// Same as [`delete`](Self::delete).
    pub fn remove(self) -> Result<&'a mut BulkOperation> {
        self.delete()
    }

    fn add_update(self, update: UpdateOrReplace, multi: bool) -> Result<&'a mut BulkOperation> {
        let mut statement = UpdateStatement::new(self.selector, update, multi, self.upsert)?;
        statement.array_filters = self.array_filters;
        statement.collation = self.collation;
        statement.hint = self.hint;
        self.bulk.add_update(statement)
    }

    fn add_delete(self, limit: i32) -> Result<&'a mut BulkOperation> {
        let mut statement = DeleteStatement::new(self.selector, limit);
        statement.collation = self.collation;
        statement.hint = self.hint;
        self.bulk.add_delete(statement)
    }
}
