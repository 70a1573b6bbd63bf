use crate::{
    bson::{Bson, Document},
    bson_util::{doc_size_bytes, num_decimal_digits},
    checked::Checked,
    bulk::{Batch, BatchType},
    cmap::StreamDescription,
    error::{ErrorKind, Result},
};

/// The server limits that bound the size of a batch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct BatchLimits {
    pub(crate) max_bson_object_size: usize,
    pub(crate) max_batch_size_bytes: usize,
    pub(crate) max_write_batch_size: usize,
    /// The largest key of an operation in the command's array: a type byte, the digits of the
    /// highest index and a null terminator.
    pub(crate) max_key_size: usize,
}

impl BatchLimits {
    pub(crate) fn new(description: &StreamDescription) -> Self {
        let max_bson_object_size = usize::try_from(description.max_bson_object_size)
            .unwrap_or(usize::MAX)
            .max(1);
        let max_write_batch_size = usize::try_from(description.max_write_batch_size)
            .unwrap_or(usize::MAX)
            .max(1);
        Self {
            max_bson_object_size,
            max_batch_size_bytes: max_bson_object_size,
            max_write_batch_size,
            max_key_size: num_decimal_digits(max_write_batch_size - 1) + 2,
        }
    }
}

/// Decides which batch every operation added to a bulk belongs to.
///
/// An ordered builder keeps a single open batch and seals it whenever the operation type changes,
/// so the batches preserve the order of the operations. An unordered builder keeps one open batch
/// per type so that interleaving types does not split batches early.
///
/// Each batch accounts for its own operation count and bytes: an operation is counted once, in
/// the batch it is added to.
#[derive(Debug)]
pub(crate) struct BatchBuilder {
    ordered: bool,
    limits: BatchLimits,
    open: Vec<Batch>,
    sealed: Vec<Batch>,
    next_index: usize,
}

impl BatchBuilder {
    pub(crate) fn new(ordered: bool, limits: BatchLimits) -> Self {
        Self {
            ordered,
            limits,
            open: Vec::new(),
            sealed: Vec::new(),
            next_index: 0,
        }
    }

    /// The number of operations added so far.
    pub(crate) fn len(&self) -> usize {
        self.next_index
    }

    /// Adds a wire-level operation, starting a new batch when it does not fit the open one.
    pub(crate) fn add(
        &mut self,
        batch_type: BatchType,
        operation: Document,
        inserted_id: Option<Bson>,
    ) -> Result<()> {
        let size = doc_size_bytes(&operation)?;
        if size >= self.limits.max_bson_object_size {
            return Err(ErrorKind::DocumentTooLarge {
                size,
                max_size: self.limits.max_bson_object_size,
            }
            .into());
        }
        let operation_bytes = size + self.limits.max_key_size;

        if self.ordered {
            let (same_type, other_types): (Vec<_>, Vec<_>) = std::mem::take(&mut self.open)
                .into_iter()
                .partition(|batch| batch.batch_type == batch_type);
            self.sealed.extend(other_types);
            self.open = same_type;
        }

        let original_index = self.next_index;
        let position = self
            .open
            .iter()
            .position(|batch| batch.batch_type == batch_type);

        let position = match position {
            Some(position) if self.fits(&self.open[position], operation_bytes) => position,
            Some(position) => {
                let full = self.open.remove(position);
                self.sealed.push(full);
                self.open_batch(batch_type, original_index)
            }
            None => self.open_batch(batch_type, original_index),
        };

        self.open[position].push(operation, original_index, inserted_id, operation_bytes);
        self.next_index += 1;
        Ok(())
    }

    fn fits(&self, batch: &Batch, operation_bytes: usize) -> bool {
        if batch.len() >= self.limits.max_write_batch_size {
            return false;
        }
        batch.is_empty()
            || (Checked::new(batch.size_bytes) + operation_bytes)
                .get()
                .is_ok_and(|size| size < self.limits.max_batch_size_bytes)
    }

    fn open_batch(&mut self, batch_type: BatchType, original_zero_index: usize) -> usize {
        self.open.push(Batch::new(batch_type, original_zero_index));
        self.open.len() - 1
    }

    /// Seals the open batches and returns every batch in the order it will be sent. Open
    /// unordered batches are sealed inserts first, then updates, then removes.
    pub(crate) fn finish(mut self) -> Vec<Batch> {
        let mut open = std::mem::take(&mut self.open);
        open.sort_by_key(|batch| batch.batch_type as u8);
        self.sealed.extend(open);
        self.sealed
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::{
        bson::{doc, Bson},
        bulk::{
            policy::{BatchBuilder, BatchLimits},
            BatchType,
        },
        cmap::StreamDescription,
        error::ErrorKind,
    };

    fn limits(max_write_batch_size: i64, max_bson_object_size: i64) -> BatchLimits {
        BatchLimits::new(
            &StreamDescription::builder()
                .max_write_batch_size(max_write_batch_size)
                .max_bson_object_size(max_bson_object_size)
                .build(),
        )
    }

    fn shape(batches: &[crate::bulk::Batch]) -> Vec<(BatchType, usize, Vec<usize>)> {
        batches
            .iter()
            .map(|b| (b.batch_type(), b.original_zero_index(), b.original_indexes().to_vec()))
            .collect()
    }

    #[test]
    fn key_size() {
        assert_eq!(limits(1000, 1024).max_key_size, 5);
        assert_eq!(limits(100_000, 1024).max_key_size, 7);
        assert_eq!(limits(1, 1024).max_key_size, 3);
    }

    #[test]
    fn splits_on_count() {
        let mut builder = BatchBuilder::new(true, limits(2, 16 * 1024 * 1024));
        for i in 0..5 {
            builder
                .add(BatchType::Insert, doc! { "_id": i }, Some(Bson::Int32(i)))
                .unwrap();
        }
        assert_eq!(builder.len(), 5);

        let batches = builder.finish();
        let sizes: Vec<_> = batches.iter().map(|b| b.len()).collect();
        let zero_indexes: Vec<_> = batches.iter().map(|b| b.original_zero_index()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(zero_indexes, vec![0, 2, 4]);
    }

    #[test]
    fn overflowing_size_does_not_fit() {
        let builder = BatchBuilder::new(true, limits(1000, 16 * 1024 * 1024));
        let mut batch = crate::bulk::Batch::new(BatchType::Insert, 0);
        batch.push(doc! { "_id": 0 }, 0, Some(Bson::Int32(0)), usize::MAX - 1);
        assert!(!builder.fits(&batch, 2));

        batch.push(doc! { "_id": 1 }, 1, Some(Bson::Int32(1)), 10);
        assert_eq!(batch.size_bytes(), usize::MAX);
    }

    #[test]
    fn splits_on_bytes() {
        // {_id: i32} is 14 bytes, accounted with a 5 byte key: 19 bytes per operation.
        let mut builder = BatchBuilder::new(true, limits(1000, 40));
        for i in 0..3 {
            builder
                .add(BatchType::Insert, doc! { "_id": i }, Some(Bson::Int32(i)))
                .unwrap();
        }
        let batches = builder.finish();
        assert_eq!(
            shape(&batches),
            vec![
                (BatchType::Insert, 0, vec![0, 1]),
                (BatchType::Insert, 2, vec![2]),
            ]
        );
        assert_eq!(batches[0].size_bytes(), 2 * (14 + 5));
    }

    #[test]
    fn ordered_splits_on_type_change() {
        let mut builder = BatchBuilder::new(true, limits(1000, 16 * 1024 * 1024));
        builder.add(BatchType::Insert, doc! { "_id": 1 }, None).unwrap();
        builder.add(BatchType::Update, doc! { "q": {}, "u": {} }, None).unwrap();
        builder.add(BatchType::Insert, doc! { "_id": 2 }, None).unwrap();
        builder.add(BatchType::Insert, doc! { "_id": 3 }, None).unwrap();
        builder.add(BatchType::Remove, doc! { "q": {}, "limit": 1 }, None).unwrap();

        assert_eq!(
            shape(&builder.finish()),
            vec![
                (BatchType::Insert, 0, vec![0]),
                (BatchType::Update, 1, vec![1]),
                (BatchType::Insert, 2, vec![2, 3]),
                (BatchType::Remove, 4, vec![4]),
            ]
        );
    }

    #[test]
    fn unordered_pools_types() {
        let mut builder = BatchBuilder::new(false, limits(1000, 16 * 1024 * 1024));
        builder.add(BatchType::Remove, doc! { "q": {}, "limit": 1 }, None).unwrap();
        builder.add(BatchType::Insert, doc! { "_id": 1 }, None).unwrap();
        builder.add(BatchType::Update, doc! { "q": {}, "u": {} }, None).unwrap();
        builder.add(BatchType::Insert, doc! { "_id": 2 }, None).unwrap();
        builder.add(BatchType::Remove, doc! { "q": {}, "limit": 0 }, None).unwrap();

        assert_eq!(
            shape(&builder.finish()),
            vec![
                (BatchType::Insert, 1, vec![1, 3]),
                (BatchType::Update, 2, vec![2]),
                (BatchType::Remove, 0, vec![0, 4]),
            ]
        );
    }

    #[test]
    fn unordered_count_split_keeps_indexes() {
        let mut builder = BatchBuilder::new(false, limits(2, 16 * 1024 * 1024));
        for i in 0..3 {
            builder.add(BatchType::Insert, doc! { "_id": i }, None).unwrap();
            builder.add(BatchType::Update, doc! { "q": { "i": i }, "u": {} }, None).unwrap();
        }
        assert_eq!(
            shape(&builder.finish()),
            vec![
                (BatchType::Insert, 0, vec![0, 2]),
                (BatchType::Update, 1, vec![1, 3]),
                (BatchType::Insert, 4, vec![4]),
                (BatchType::Update, 5, vec![5]),
            ]
        );
    }

    #[test]
    fn document_too_large() {
        let mut builder = BatchBuilder::new(true, limits(1000, 14));
        let error = builder
            .add(BatchType::Insert, doc! { "_id": 1 }, None)
            .unwrap_err();
        assert!(matches!(
            *error.kind,
            ErrorKind::DocumentTooLarge { size: 14, max_size: 14 }
        ));
        assert_eq!(error.code(), Some(crate::error::INVALID_BSON_ERROR));
        assert_eq!(builder.len(), 0);
    }
}
