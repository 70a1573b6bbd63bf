use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::{
    action::action_impl,
    bulk::{Batch, BulkOperation, BulkResult, BulkState, BulkWriteResult},
    client::executor::ExecutionContext,
    cmap::StreamDescription,
    coll::options::BulkOptions,
    concern::WriteConcern,
    error::{BulkWriteError, Error, ErrorKind, Result},
    operation::{Retryability, WriteBatch},
    trace::BULK_TRACING_EVENT_TARGET,
    Client,
    ClientSession,
    Namespace,
};

impl BulkOperation {
    /// Sends every operation added to this bulk. `await` will return
    /// d[`Result<BulkWriteResult>`].
    ///
    /// When any operation fails, or the write concern could not be satisfied, the error is an
    /// [`ErrorKind::BulkWrite`] that carries the merged result of every batch that was sent.
    ///
    /// Executing a bulk with no operations is an [`ErrorKind::EmptyBulk`] error, and a bulk can
    /// only be executed once.
    pub fn execute(&mut self) -> Execute<'_> {
        Execute {
            bulk: self,
            write_concern: None,
            session: None,
        }
    }
}

/// Sends the operations of a bulk. Construct with [`BulkOperation::execute`].
#[must_use]
pub struct Execute<'a> {
    bulk: &'a mut BulkOperation,
    write_concern: Option<WriteConcern>,
    session: Option<&'a mut ClientSession>,
}

impl<'a> Execute<'a> {
    /// The write concern for the bulk, overriding the bulk's and the client's.
    pub fn write_concern(mut self, write_concern: WriteConcern) -> Self {
        self.write_concern = Some(write_concern);
        self
    }

    /// Use the provided session when sending the batches.
    pub fn session(mut self, session: impl Into<&'a mut ClientSession>) -> Self {
        self.session = Some(session.into());
        self
    }

    async fn execute_inner(self) -> Result<BulkWriteResult> {
        let Execute {
            bulk,
            write_concern,
            session,
        } = self;

        bulk.check_building()?;
        if bulk.is_empty() {
            return Err(ErrorKind::EmptyBulk.into());
        }

        let client = bulk.collection.client().clone();
        let description = client.stream_description()?;

        let mut options = bulk.options.clone();
        let write_concern = write_concern
            .or_else(|| options.write_concern.take())
            .or_else(|| client.write_concern().cloned());
        if let Some(ref write_concern) = write_concern {
            write_concern.validate()?;
        }
        let acknowledged = write_concern
            .as_ref()
            .map_or(true, WriteConcern::is_acknowledged);
        options.write_concern = write_concern;

        let mut implicit_session = None;
        let session = match session {
            Some(_) if !acknowledged => {
                return Err(Error::invalid_argument(
                    "cannot use an explicit session with an unacknowledged write concern",
                ))
            }
            Some(session) => Some(session),
            None if acknowledged && description.supports_sessions() => {
                Some(implicit_session.insert(ClientSession::new(true)))
            }
            None => None,
        };

        bulk.state = BulkState::Executing;
        bulk.batches = bulk
            .builder
            .take()
            .map(|builder| builder.finish())
            .unwrap_or_default();

        let ns = bulk.collection.namespace();
        tracing::debug!(
            target: BULK_TRACING_EVENT_TARGET,
            namespace = %ns,
            serverType = %description.server_type,
            ordered = bulk.ordered,
            batches = bulk.batches.len(),
            operations = bulk.len(),
            implicitSession = session.as_deref().is_some_and(ClientSession::is_implicit),
            "Executing bulk"
        );

        let (result, top_level_error) = if bulk.ordered {
            execute_ordered(&client, &ns, &bulk.batches, &options, &description, session).await
        } else {
            execute_unordered(&client, &ns, &bulk.batches, &options, &description, session)
                .await
        };
        bulk.state = BulkState::Executed;

        BulkWriteError::check(BulkWriteResult::new(result)).map_err(|error| {
            Error::from(ErrorKind::BulkWrite(error)).with_source(top_level_error)
        })
    }
}

action_impl! {
    impl<'a> IntoFuture for Execute<'a> => BulkWriteResult
}

fn trace_dispatch(batch: &Batch, retryability: Retryability) {
    tracing::debug!(
        target: BULK_TRACING_EVENT_TARGET,
        batchType = batch.batch_type().command_name(),
        size = batch.len(),
        originalZeroIndex = batch.original_zero_index(),
        retryable = retryability == Retryability::Write,
        "Dispatching batch"
    );
}

fn trace_merge(batch: &Batch, result: &BulkResult) {
    tracing::debug!(
        target: BULK_TRACING_EVENT_TARGET,
        batchType = batch.batch_type().command_name(),
        originalZeroIndex = batch.original_zero_index(),
        nInserted = result.n_inserted,
        nUpserted = result.n_upserted,
        nMatched = result.n_matched,
        nRemoved = result.n_removed,
        writeErrors = result.write_errors.len(),
        writeConcernErrors = result.write_concern_errors.len(),
        "Merged batch"
    );
}

/// Sends the batches one at a time, stopping after the first batch that reports a write error.
async fn execute_ordered(
    client: &Client,
    ns: &Namespace,
    batches: &[Batch],
    options: &BulkOptions,
    description: &StreamDescription,
    mut session: Option<&mut ClientSession>,
) -> (BulkResult, Option<Error>) {
    let mut result = BulkResult::default();
    let mut top_level_error = None;

    for (i, batch) in batches.iter().enumerate() {
        let mut op = WriteBatch::new(ns, batch, true, options);
        trace_dispatch(
            batch,
            client.get_retryability(&op, session.as_deref(), description),
        );

        match client
            .execute_operation(&mut op, description, session.as_deref_mut())
            .await
        {
            Ok(reply) => result.merge_reply(batch, reply, true),
            Err(error) => {
                result.merge_error(batch, &error);
                if top_level_error.is_none() {
                    top_level_error = Some(error);
                }
            }
        }
        trace_merge(batch, &result);

        if !result.write_errors.is_empty() {
            tracing::debug!(
                target: BULK_TRACING_EVENT_TARGET,
                unsent = batches.len() - i - 1,
                "Stopping ordered bulk after write error"
            );
            break;
        }
    }

    (result, top_level_error)
}

/// Sends every batch concurrently and merges the replies as they arrive.
async fn execute_unordered(
    client: &Client,
    ns: &Namespace,
    batches: &[Batch],
    options: &BulkOptions,
    description: &StreamDescription,
    mut session: Option<&mut ClientSession>,
) -> (BulkResult, Option<Error>) {
    // Transaction numbers are assigned up front so that the batches can be in flight together.
    let mut attempts = Vec::with_capacity(batches.len());
    for batch in batches {
        let op = WriteBatch::new(ns, batch, false, options);
        let retryability = client.get_retryability(&op, session.as_deref(), description);
        let txn_number = match session {
            Some(ref mut session) if retryability == Retryability::Write => {
                Some(session.get_and_increment_txn_number())
            }
            _ => None,
        };
        attempts.push((batch, op, retryability, txn_number));
    }

    let session_id = session.as_deref().map(ClientSession::id);
    let mut in_flight: FuturesUnordered<_> = attempts
        .into_iter()
        .map(|(batch, mut op, retryability, txn_number)| {
            trace_dispatch(batch, retryability);
            let context = ExecutionContext {
                session_id,
                txn_number,
                retryability,
            };
            async move {
                let outcome = client
                    .execute_operation_with_retry(&mut op, description, context)
                    .await;
                (batch, outcome)
            }
        })
        .collect();

    let mut result = BulkResult::default();
    let mut top_level_error = None;
    while let Some((batch, outcome)) = in_flight.next().await {
        match outcome {
            Ok(reply) => result.merge_reply(batch, reply, false),
            Err(error) => {
                result.merge_error(batch, &error);
                if top_level_error.is_none() {
                    top_level_error = Some(error);
                }
            }
        }
        trace_merge(batch, &result);
    }

    (result, top_level_error)
}
