//! The per-collection bulk API.
//!
//! A [`BulkOperation`] collects insert, update and delete operations and sends them as
//! `insert`, `update` and `delete` commands once [`BulkOperation::execute`] is awaited. An ordered
//! bulk sends its batches one at a time in the order the operations were added and stops at the
//! first write error; an unordered bulk groups operations by type and sends every batch
//! concurrently.

mod batch;
mod execute;
mod find;
mod merge;
mod models;
mod operation;
pub(crate) mod policy;
mod result;

use crate::{
    bson::{Bson, Document},
    bson_util::get_or_prepend_id_field,
    coll::options::BulkOptions,
    error::{Error, ErrorKind, Result},
    Collection,
};

use self::{
    models::{DeleteStatement, UpdateStatement},
    policy::{BatchBuilder, BatchLimits},
};

pub use self::{
    batch::{Batch, BatchType},
    execute::Execute,
    find::FindOperators,
    result::{BulkId, BulkWriteResult, OpTime},
};
pub(crate) use result::BulkResult;

/// The lowest wire version that supports `arrayFilters` on update statements.
const ARRAY_FILTERS_MIN_WIRE_VERSION: i32 = 6;

#[derive(Clone, Copy, Debug, PartialEq)]
enum BulkState {
    Building,
    Executing,
    Executed,
}

/// A set of write operations sent to one collection. Construct with
/// [`Collection::initialize_ordered_bulk_op`] or [`Collection::initialize_unordered_bulk_op`].
///
/// Operations are split into batches as they are added, using the limits reported by the
/// collection's [`CommandExecutor`](crate::CommandExecutor). A bulk can only be executed once.
#[derive(Debug)]
pub struct BulkOperation {
    collection: Collection,
    ordered: bool,
    options: BulkOptions,
    builder: Option<BatchBuilder>,
    max_wire_version: i32,
    state: BulkState,
    batches: Vec<Batch>,
}

impl BulkOperation {
    pub(crate) fn new(collection: Collection, ordered: bool, options: Option<BulkOptions>) -> Self {
        Self {
            collection,
            ordered,
            options: options.unwrap_or_default(),
            builder: None,
            max_wire_version: 0,
            state: BulkState::Building,
            batches: Vec::new(),
        }
    }

    /// Adds a document to insert. An `_id` is generated for the document if it has none, unless
    /// the server was asked to generate it with `force_server_object_id`.
    pub fn insert(&mut self, document: Document) -> Result<&mut Self> {
        let mut document = document;
        let inserted_id = self.prepare_insert(&mut document);
        self.add_operation(BatchType::Insert, document, inserted_id)
    }

    /// Starts an update, replacement or delete of the documents matching `selector`.
    ///
    /// Returns [`ErrorKind::MissingSelector`] when no selector is given.
    pub fn find(&mut self, selector: impl Into<Option<Document>>) -> Result<FindOperators<'_>> {
        self.check_building()?;
        let selector = selector.into().ok_or(ErrorKind::MissingSelector)?;
        Ok(FindOperators::new(self, selector))
    }

    /// The number of operations added so far.
    pub fn len(&self) -> usize {
        match self.builder {
            Some(ref builder) => builder.len(),
            None => self.batches.iter().map(Batch::len).sum(),
        }
    }

    /// Whether no operation was added.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this bulk stops at the first write error.
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// The batches the operations were split into. Empty until the bulk is executed.
    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    fn check_building(&self) -> Result<()> {
        match self.state {
            BulkState::Building => Ok(()),
            BulkState::Executing | BulkState::Executed => Err(ErrorKind::AlreadyExecuted.into()),
        }
    }

    /// The batch builder of this bulk, created from the server limits on first use.
    fn builder(&mut self) -> Result<&mut BatchBuilder> {
        if self.builder.is_none() {
            let description = self.collection.client().stream_description()?;
            self.max_wire_version = description.max_wire_version.unwrap_or(0);
            self.builder = Some(BatchBuilder::new(
                self.ordered,
                BatchLimits::new(&description),
            ));
        }
        self.builder
            .as_mut()
            .ok_or_else(|| Error::internal("batch builder was not initialized"))
    }

    fn force_server_object_id(&self) -> bool {
        self.options
            .force_server_object_id
            .or(self.collection.client().options().force_server_object_id)
            .unwrap_or(false)
    }

    /// Returns the `_id` of a document to insert, generating one when needed.
    fn prepare_insert(&self, document: &mut Document) -> Option<Bson> {
        if self.force_server_object_id() {
            return document.get("_id").cloned();
        }
        let client = self.collection.client();
        Some(get_or_prepend_id_field(document, || {
            client.options().generate_id()
        }))
    }

    pub(crate) fn add_operation(
        &mut self,
        batch_type: BatchType,
        operation: Document,
        inserted_id: Option<Bson>,
    ) -> Result<&mut Self> {
        self.check_building()?;
        self.builder()?.add(batch_type, operation, inserted_id)?;
        Ok(self)
    }

    fn check_array_filters(&mut self, has_array_filters: bool) -> Result<()> {
        if has_array_filters {
            self.builder()?;
            if self.max_wire_version < ARRAY_FILTERS_MIN_WIRE_VERSION {
                return Err(ErrorKind::InvalidArgument {
                    message: "the server does not support arrayFilters".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    pub(crate) fn add_update(&mut self, statement: UpdateStatement) -> Result<&mut Self> {
        self.check_building()?;
        self.check_array_filters(statement.array_filters.is_some())?;
        let operation = statement.to_document()?;
        self.add_operation(BatchType::Update, operation, None)
    }

    pub(crate) fn add_delete(&mut self, statement: DeleteStatement) -> Result<&mut Self> {
        let operation = statement.to_document()?;
        self.add_operation(BatchType::Remove, operation, None)
    }
}
