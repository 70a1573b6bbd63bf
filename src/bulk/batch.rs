use crate::{
    bson::{Bson, Document},
    bson_util,
    checked::Checked,
};

/// The type of the operations held by a [`Batch`]. A batch never mixes types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BatchType {
    /// A batch of documents sent with the `insert` command.
    Insert = 1,
    /// A batch of update statements sent with the `update` command.
    Update = 2,
    /// A batch of delete statements sent with the `delete` command.
    Remove = 3,
}

impl BatchType {
    /// The name of the command that sends a batch of this type.
    pub(crate) fn command_name(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Remove => "delete",
        }
    }

    /// The command field holding the operations of a batch of this type.
    pub(crate) fn payload_field(self) -> &'static str {
        match self {
            Self::Insert => "documents",
            Self::Update => "updates",
            Self::Remove => "deletes",
        }
    }
}

/// A group of same-type operations sent to the server as one command.
///
/// Every operation keeps the index it was added to the bulk with, so that results reported by
/// the server against positions in this batch can be attributed to the caller's operations.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub(crate) batch_type: BatchType,
    pub(crate) original_zero_index: usize,
    pub(crate) operations: Vec<Document>,
    pub(crate) original_indexes: Vec<usize>,
    /// The `_id` of each inserted document, `None` when the server generates it.
    pub(crate) inserted_ids: Vec<Option<Bson>>,
    pub(crate) size_bytes: usize,
}

impl Batch {
    pub(crate) fn new(batch_type: BatchType, original_zero_index: usize) -> Self {
        Self {
            batch_type,
            original_zero_index,
            operations: Vec::new(),
            original_indexes: Vec::new(),
            inserted_ids: Vec::new(),
            size_bytes: 0,
        }
    }

    pub(crate) fn push(
        &mut self,
        operation: Document,
        original_index: usize,
        inserted_id: Option<Bson>,
        operation_bytes: usize,
    ) {
        self.operations.push(operation);
        self.original_indexes.push(original_index);
        if self.batch_type == BatchType::Insert {
            self.inserted_ids.push(inserted_id);
        }
        self.size_bytes = (Checked::new(self.size_bytes) + operation_bytes)
            .get()
            .unwrap_or(usize::MAX);
    }

    /// The type of the operations in this batch.
    pub fn batch_type(&self) -> BatchType {
        self.batch_type
    }

    /// The index of the first operation of this batch in the bulk.
    pub fn original_zero_index(&self) -> usize {
        self.original_zero_index
    }

    /// The index in the bulk of each operation of this batch, in batch order.
    pub fn original_indexes(&self) -> &[usize] {
        &self.original_indexes
    }

    /// The wire-level operation documents of this batch.
    pub fn operations(&self) -> &[Document] {
        &self.operations
    }

    /// The number of operations in this batch.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether this batch holds no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The accounted size of the operations of this batch in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// Maps a position in this batch to the index of the operation in the bulk.
    pub(crate) fn original_index(&self, local_index: usize) -> Option<usize> {
        self.original_indexes.get(local_index).copied()
    }

    /// Whether resending this batch cannot apply any operation twice. Updates of many documents
    /// and deletes of every matching document are not.
    pub(crate) fn is_retryable(&self) -> bool {
        match self.batch_type {
            BatchType::Insert => true,
            BatchType::Update => self
                .operations
                .iter()
                .all(|op| !matches!(op.get_bool("multi"), Ok(true))),
            BatchType::Remove => self
                .operations
                .iter()
                .all(|op| op.get("limit").and_then(bson_util::get_int) == Some(1)),
        }
    }
}
