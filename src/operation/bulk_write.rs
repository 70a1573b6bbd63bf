mod results_merger;
mod server_responses;

use std::{collections::HashMap, marker::PhantomData};

use crate::{
    bson::{doc, Bson, Document},
    bson_util::{array_entry_size_bytes, doc_size_bytes},
    checked::Checked,
    client::bulk_write::{models::WriteModel, ClientBulkWriteOptions},
    cmap::{Command, CommandResponse, StreamDescription},
    concern::WriteConcern,
    error::{Error, Result},
    operation::{append_options, Operation, Retryability},
    results::ClientBulkWriteResult,
    Client,
    Namespace,
};

pub(crate) use server_responses::Response;

/// Space reserved in the message for everything other than the `ops` and `nsInfo` entries.
const COMMAND_OVERHEAD_BYTES: usize = 1000;

/// One batch of a [`Client::bulk_write`](crate::Client::bulk_write), sent as a single
/// `bulkWrite` command against the `admin` database.
///
/// The batch is assembled when the operation is created: models are taken from the front of the
/// remaining slice until the next one would exceed the server's message size or operation count.
pub(crate) struct BulkWrite<'a, R> {
    client: Client,
    models: &'a [WriteModel],
    /// The index of `models[0]` in the caller's full list of models.
    offset: usize,
    options: &'a ClientBulkWriteOptions,
    ops: Vec<Document>,
    namespace_info: NamespaceInfo,
    /// Ids of the inserts in this batch, keyed by their index in the full list of models.
    inserted_ids: HashMap<usize, Bson>,
    retryable: bool,
    _phantom: PhantomData<R>,
}

/// Tracks the `nsInfo` list of a batch.
#[derive(Debug, Default)]
struct NamespaceInfo {
    namespaces: Vec<Document>,
    // Avoids scanning the list every time a namespace is looked up.
    cache: HashMap<String, usize>,
}

impl NamespaceInfo {
    /// Returns the index of `namespace` in the list, along with the entry that must be pushed when
    /// it is not present yet.
    fn lookup(&self, namespace: &Namespace) -> (usize, Option<Document>) {
        let name = namespace.to_string();
        match self.cache.get(&name) {
            Some(index) => (*index, None),
            None => (self.namespaces.len(), Some(doc! { "ns": name })),
        }
    }

    fn push(&mut self, namespace: &Namespace, entry: Document) {
        self.cache
            .insert(namespace.to_string(), self.namespaces.len());
        self.namespaces.push(entry);
    }
}

impl<'a, R> BulkWrite<'a, R>
where
    R: ClientBulkWriteResult,
{
    pub(crate) fn new(
        client: Client,
        models: &'a mut [WriteModel],
        offset: usize,
        options: &'a ClientBulkWriteOptions,
        description: &StreamDescription,
    ) -> Result<Self> {
        let max_bson_object_size =
            usize::try_from(description.max_bson_object_size).unwrap_or(usize::MAX);
        let max_message_size = usize::try_from(description.max_message_size_bytes)
            .unwrap_or(usize::MAX)
            .saturating_sub(COMMAND_OVERHEAD_BYTES);
        let max_operations = usize::try_from(description.max_write_batch_size)
            .unwrap_or(usize::MAX)
            .max(1);

        let mut namespace_info = NamespaceInfo::default();
        let mut ops = Vec::new();
        let mut inserted_ids = HashMap::new();
        let mut total_size = 0;

        for (index, model) in models.iter_mut().take(max_operations).enumerate() {
            let (ns_index, ns_entry) = namespace_info.lookup(model.namespace());
            let ns_size = match ns_entry {
                Some(ref entry) => {
                    let size = doc_size_bytes(entry)?;
                    if size > max_bson_object_size {
                        return Err(Error::invalid_argument(format!(
                            "namespace {} of model {} is {size} bytes, larger than the \
                             maxBsonObjectSize of {max_bson_object_size} bytes",
                            model.namespace(),
                            offset + index,
                        )));
                    }
                    array_entry_size_bytes(ns_index, size)?
                }
                None => 0,
            };

            let (op, inserted_id) =
                model.to_ops_document(ns_index, || client.options().generate_id())?;
            let op_size = doc_size_bytes(&op)?;
            if op_size > max_bson_object_size {
                return Err(Error::invalid_argument(format!(
                    "model {} is {op_size} bytes, larger than the maxBsonObjectSize of \
                     {max_bson_object_size} bytes",
                    offset + index,
                )));
            }

            let new_size =
                (Checked::new(total_size) + array_entry_size_bytes(index, op_size)? + ns_size)
                    .get()?;
            if !ops.is_empty() && new_size > max_message_size {
                break;
            }
            total_size = new_size;

            if let Some(entry) = ns_entry {
                namespace_info.push(model.namespace(), entry);
            }
            if let Some(inserted_id) = inserted_id {
                inserted_ids.insert(offset + index, inserted_id);
            }
            ops.push(op);
        }

        let models: &'a [WriteModel] = models;
        let retryable = models[..ops.len()]
            .iter()
            .all(|model| model.multi() != Some(true));

        Ok(Self {
            client,
            models,
            offset,
            options,
            ops,
            namespace_info,
            inserted_ids,
            retryable,
            _phantom: PhantomData,
        })
    }

    /// The number of models sent by this batch.
    pub(crate) fn n_attempted(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn is_retryable(&self) -> bool {
        self.retryable
    }

    fn is_ordered(&self) -> bool {
        self.options.ordered.unwrap_or(true)
    }
}

impl<R> Operation for BulkWrite<'_, R>
where
    R: ClientBulkWriteResult,
{
    type O = Response;

    fn name(&self) -> &str {
        "bulkWrite"
    }

    fn build(&mut self, _description: &StreamDescription) -> Result<Command> {
        let ops: Vec<Bson> = self.ops.iter().cloned().map(Bson::Document).collect();
        let ns_info: Vec<Bson> = self
            .namespace_info
            .namespaces
            .iter()
            .cloned()
            .map(Bson::Document)
            .collect();

        let mut body = doc! {
            self.name(): 1,
            "ops": ops,
            "nsInfo": ns_info,
        };
        append_options(&mut body, Some(self.options))?;

        Ok(Command::new(self.name(), "admin", body))
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
        if self.retryable {
            Retryability::Write
        } else {
            Retryability::None
        }
    }
}
