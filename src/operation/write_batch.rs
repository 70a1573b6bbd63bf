use crate::{
    bson::{doc, Bson, Document},
    bulk::{Batch, BatchType},
    cmap::{Command, CommandResponse, StreamDescription},
    coll::options::BulkOptions,
    concern::WriteConcern,
    error::Result,
    operation::{append_options, Operation, Retryability, WriteResponseBody},
    Namespace,
};

/// Sends one sealed batch of a legacy bulk as an `insert`, `update` or `delete` command.
#[derive(Debug)]
pub(crate) struct WriteBatch<'a> {
    ns: &'a Namespace,
    batch: &'a Batch,
    ordered: bool,
    options: BulkOptions,
}

impl<'a> WriteBatch<'a> {
    /// `options` must already carry the resolved write concern of the bulk.
    pub(crate) fn new(
        ns: &'a Namespace,
        batch: &'a Batch,
        ordered: bool,
        options: &BulkOptions,
    ) -> Self {
        let mut options = options.clone();
        options.bypass_document_validation = options.bypass_document_validation.filter(|b| *b);
        if batch.batch_type == BatchType::Insert {
            options.let_vars = None;
        }
        Self {
            ns,
            batch,
            ordered,
            options,
        }
    }
}

impl Operation for WriteBatch<'_> {
    type O = WriteResponseBody;

    fn name(&self) -> &str {
        self.batch.batch_type.command_name()
    }

    fn build(&mut self, _description: &StreamDescription) -> Result<Command> {
        let operations: Vec<Bson> = self
            .batch
            .operations()
            .iter()
            .cloned()
            .map(Bson::Document)
            .collect();

        let mut body = doc! {
            self.name(): self.ns.coll.clone(),
            self.batch.batch_type.payload_field(): operations,
            "ordered": self.ordered,
        };
        append_options(&mut body, Some(&self.options))?;

        Ok(Command::new(self.name(), &self.ns.db, body))
    }

    fn handle_response(
        &mut self,
        response: Document,
        _description: &StreamDescription,
    ) -> Result<Self::O> {
        CommandResponse::new(response).body()
    }

    fn write_concern(&self) -> Option<&WriteConcern> {
        self.options.write_concern.as_ref()
    }

    fn retryability(&self) -> Retryability {
        if self.batch.is_retryable() {
            Retryability::Write
        } else {
            Retryability::None
        }
    }

    fn retry_writes(&self) -> Option<bool> {
        self.options.retry_writes
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::{
        bson::{doc, Bson},
        bulk::{Batch, BatchType},
        cmap::StreamDescription,
        coll::options::BulkOptions,
        concern::WriteConcern,
        operation::{Operation, Retryability, WriteBatch},
        Namespace,
    };

    fn batch(batch_type: BatchType, operations: Vec<crate::bson::Document>) -> Batch {
        let mut batch = Batch::new(batch_type, 3);
        for (i, operation) in operations.into_iter().enumerate() {
            batch.push(operation, 3 + i, None, 10);
        }
        batch
    }

    #[test]
    fn build_insert() {
        let ns = Namespace::new("db", "coll");
        let batch = batch(BatchType::Insert, vec![doc! { "_id": 1 }]);
        let options = BulkOptions::builder()
            .write_concern(WriteConcern::majority())
            .bypass_document_validation(true)
            .let_vars(doc! { "x": 1 })
            .comment(Bson::from("hi"))
            .build();

        let mut op = WriteBatch::new(&ns, &batch, true, &options);
        let command = op.build(&StreamDescription::new_testing()).unwrap();
        assert_eq!(command.name(), "insert");
        assert_eq!(command.target_db(), "db");
        assert_eq!(
            command.body(),
            &doc! {
                "insert": "coll",
                "documents": [{ "_id": 1 }],
                "ordered": true,
                "bypassDocumentValidation": true,
                "writeConcern": { "w": "majority" },
                "comment": "hi",
            }
        );
        assert_eq!(op.retryability(), Retryability::Write);
    }

    #[test]
    fn build_delete() {
        let ns = Namespace::new("db", "coll");
        let batch = batch(
            BatchType::Remove,
            vec![doc! { "q": {}, "limit": 1 }, doc! { "q": { "a": 1 }, "limit": 0 }],
        );
        let options = BulkOptions::builder()
            .bypass_document_validation(false)
            .let_vars(doc! { "x": 1 })
            .build();

        let mut op = WriteBatch::new(&ns, &batch, false, &options);
        let command = op.build(&StreamDescription::new_testing()).unwrap();
        assert_eq!(
            command.body(),
            &doc! {
                "delete": "coll",
                "deletes": [{ "q": {}, "limit": 1 }, { "q": { "a": 1 }, "limit": 0 }],
                "ordered": false,
                "let": { "x": 1 },
            }
        );
        assert_eq!(op.retryability(), Retryability::None);
    }

    #[test]
    fn unacknowledged() {
        let ns = Namespace::new("db", "coll");
        let batch = batch(BatchType::Insert, vec![doc! { "_id": 1 }]);
        let options = BulkOptions::builder()
            .write_concern(WriteConcern::nodes(0))
            .build();
        let op = WriteBatch::new(&ns, &batch, true, &options);
        assert!(!op.is_acknowledged());
    }
}
