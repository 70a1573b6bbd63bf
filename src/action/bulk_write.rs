use std::marker::PhantomData;

use crate::{
    action::{action_impl, option_setters},
    bson::{Bson, Document},
    client::bulk_write::{models::WriteModel, ClientBulkWriteOptions},
    concern::WriteConcern,
    error::{ClientBulkWriteError, Error, ErrorKind, Result},
    operation::BulkWrite as BulkWriteOperation,
    results::{ClientBulkWriteResult, SummaryBulkWriteResult, VerboseBulkWriteResult},
    trace::BULK_TRACING_EVENT_TARGET,
    Client,
    ClientSession,
};

/// The oldest wire version (MongoDB 8.0) that understands the `bulkWrite` command.
const BULK_WRITE_MIN_WIRE_VERSION: i32 = 25;

impl Client {
    /// Executes the provided list of write operations, which may target any number of
    /// namespaces.
    ///
    /// Batches that contain no multi-document writes are retried once upon failure if the
    /// encountered error supports retryability. See the documentation
    /// [here](https://www.mongodb.com/docs/manual/core/retryable-writes/) for more information on
    /// retryable writes.
    ///
    /// `await` will return d[`Result<SummaryBulkWriteResult>`] or
    /// d[`Result<VerboseBulkWriteResult>`] if
    /// [`verbose_results`](ClientBulkWrite::verbose_results) is configured.
    ///
    /// Bulk write is only available on MongoDB 8.0+.
    pub fn bulk_write(
        &self,
        models: impl IntoIterator<Item = impl Into<WriteModel>>,
    ) -> ClientBulkWrite<'_, SummaryBulkWriteResult> {
        ClientBulkWrite::new(self, models.into_iter().map(Into::into).collect())
    }
}

/// Performs multiple write operations. Construct with [`Client::bulk_write`].
#[must_use]
pub struct ClientBulkWrite<'a, R> {
    client: &'a Client,
    models: Vec<WriteModel>,
    options: Option<ClientBulkWriteOptions>,
    session: Option<&'a mut ClientSession>,
    _phantom: PhantomData<R>,
}

impl<'a> ClientBulkWrite<'a, SummaryBulkWriteResult> {
    /// Return a [`VerboseBulkWriteResult`] with individual results for each successfully performed
    /// write.
    pub fn verbose_results(self) -> ClientBulkWrite<'a, VerboseBulkWriteResult> {
        ClientBulkWrite {
            client: self.client,
            models: self.models,
            options: self.options,
            session: self.session,
            _phantom: PhantomData,
        }
    }
}

impl<'a, R> ClientBulkWrite<'a, R>
where
    R: ClientBulkWriteResult,
{
    option_setters!(options: ClientBulkWriteOptions;
        ordered: bool,
        bypass_document_validation: bool,
        comment: Bson,
        let_vars: Document,
        write_concern: WriteConcern,
    );

    /// Use the provided session when running the operation.
    pub fn session(mut self, session: impl Into<&'a mut ClientSession>) -> Self {
        self.session = Some(session.into());
        self
    }

    fn new(client: &'a Client, models: Vec<WriteModel>) -> Self {
        Self {
            client,
            models,
            options: None,
            session: None,
            _phantom: PhantomData,
        }
    }

    async fn execute_inner(mut self) -> Result<R> {
        if self.models.is_empty() {
            return Err(Error::invalid_argument(
                "bulk_write must be provided at least one write operation",
            ));
        }

        let description = self.client.stream_description()?;
        if description.max_wire_version.unwrap_or(0) < BULK_WRITE_MIN_WIRE_VERSION {
            return Err(ErrorKind::IncompatibleServer {
                message: "the bulk_write operation requires MongoDB 8.0 or newer".to_string(),
            }
            .into());
        }

        let mut options = self.options.take().unwrap_or_default();
        options.verbose_results = Some(!R::errors_only());

        let in_transaction = self
            .session
            .as_deref()
            .is_some_and(ClientSession::in_transaction);
        if in_transaction {
            if options.write_concern.is_some() {
                return Err(Error::invalid_argument(
                    "cannot set write concern after starting a transaction",
                ));
            }
        } else if options.write_concern.is_none() {
            options.write_concern = self.client.write_concern().cloned();
        }
        if let Some(ref write_concern) = options.write_concern {
            write_concern.validate()?;
        }
        let acknowledged = options
            .write_concern
            .as_ref()
            .map_or(true, WriteConcern::is_acknowledged);
        let ordered = options.ordered.unwrap_or(true);

        if !acknowledged {
            if self.session.is_some() {
                return Err(Error::invalid_argument(
                    "cannot use an explicit session with an unacknowledged write concern",
                ));
            }
            if !R::errors_only() {
                return Err(Error::invalid_argument(
                    "cannot request verbose results with an unacknowledged write concern",
                ));
            }
        }

        let mut implicit_session = None;
        let mut session = match self.session.take() {
            Some(session) => Some(session),
            None if acknowledged && description.supports_sessions() => {
                Some(implicit_session.insert(ClientSession::new(true)))
            }
            None => None,
        };

        let mut total_attempted = 0;
        let mut execution_status = ExecutionStatus::None;

        while total_attempted < self.models.len() && execution_status.should_continue(ordered) {
            let mut operation = match BulkWriteOperation::<R>::new(
                self.client.clone(),
                &mut self.models[total_attempted..],
                total_attempted,
                &options,
                &description,
            ) {
                Ok(operation) => operation,
                Err(error) => {
                    execution_status = execution_status.with_failure(error);
                    break;
                }
            };

            tracing::debug!(
                target: BULK_TRACING_EVENT_TARGET,
                offset = total_attempted,
                models = operation.n_attempted(),
                retryable = operation.is_retryable(),
                "Sending bulkWrite batch"
            );

            let result = match self
                .client
                .execute_operation(&mut operation, &description, session.as_deref_mut())
                .await
            {
                Ok(response) => {
                    let session_id = session.as_deref().map(ClientSession::id);
                    operation
                        .merge_response(response, &description, session_id)
                        .await
                }
                Err(error) => Err(error),
            };
            total_attempted += operation.n_attempted();

            execution_status = match result {
                Ok(result) => execution_status.with_success(result),
                Err(error) => execution_status.with_failure(error),
            };
        }

        match execution_status {
            ExecutionStatus::Success(bulk_write_result) => Ok(bulk_write_result),
            ExecutionStatus::Error(error) => Err(error),
            ExecutionStatus::None => Err(Error::internal("no bulkWrite batches were executed")),
        }
    }
}

action_impl! {
    impl<'a> IntoFuture for ClientBulkWrite<'a, SummaryBulkWriteResult> => SummaryBulkWriteResult
}

action_impl! {
    impl<'a> IntoFuture for ClientBulkWrite<'a, VerboseBulkWriteResult> => VerboseBulkWriteResult
}

/// The execution status of a bulk write. The status starts at `None`, indicating that no writes
/// have been attempted yet, and transitions to either `Success` or `Error` as batches are
/// executed. The contents of `Error` determine whether further batches are sent.
enum ExecutionStatus<R>
where
    R: ClientBulkWriteResult,
{
    Success(R),
    Error(Error),
    None,
}

impl<R> ExecutionStatus<R>
where
    R: ClientBulkWriteResult,
{
    fn with_success(mut self, result: R) -> Self {
        match self {
            Self::Success(ref mut current_result) => {
                current_result.merge(result);
                self
            }
            Self::Error(ref mut current_error) => {
                if let Some(bulk_write_error) = Self::get_current_bulk_write_error(current_error) {
                    bulk_write_error.merge_partial_results(result.into_partial_result());
                }
                self
            }
            Self::None => Self::Success(result),
        }
    }

    fn with_failure(self, mut error: Error) -> Self {
        match self {
            // A new bulk write error absorbs the results so far. Any other error becomes the
            // source of a bulk write error carrying those results.
            Self::Success(current_result) => match *error.kind {
                ErrorKind::ClientBulkWrite(ref mut bulk_write_error) => {
                    bulk_write_error.merge_partial_results(current_result.into_partial_result());
                    Self::Error(error)
                }
                _ => {
                    let bulk_write_error: Error =
                        ErrorKind::ClientBulkWrite(ClientBulkWriteError {
                            write_errors: Default::default(),
                            write_concern_errors: Vec::new(),
                            partial_result: Some(current_result.into_partial_result()),
                        })
                        .into();
                    Self::Error(bulk_write_error.with_source(error))
                }
            },
            Self::Error(mut current_error) => match *error.kind {
                ErrorKind::ClientBulkWrite(bulk_write_error) => {
                    // keep the source of the newer error, which is what stopped execution
                    let source = error.source.take();
                    if let Some(current) = Self::get_current_bulk_write_error(&mut current_error)
                    {
                        current.merge(bulk_write_error);
                    }
                    match source {
                        Some(source) => Self::Error(current_error.with_source(*source)),
                        None => Self::Error(current_error),
                    }
                }
                _ => Self::Error(current_error.with_source(error)),
            },
            Self::None => Self::Error(error),
        }
    }

    fn get_current_bulk_write_error(error: &mut Error) -> Option<&mut ClientBulkWriteError> {
        match *error.kind {
            ErrorKind::ClientBulkWrite(ref mut bulk_write_error) => Some(bulk_write_error),
            _ => None,
        }
    }

    /// Whether further batches should be executed.
    fn should_continue(&self, ordered: bool) -> bool {
        match self {
            Self::Error(ref error) => match *error.kind {
                ErrorKind::ClientBulkWrite(ref bulk_write_error) => {
                    // a top-level error is always fatal
                    let top_level_error_occurred = error.source.is_some();
                    let terminal_write_error_occurred =
                        ordered && !bulk_write_error.write_errors.is_empty();

                    !top_level_error_occurred && !terminal_write_error_occurred
                }
                _ => false,
            },
            _ => true,
        }
    }
}
