use std::time::Instant;

use crate::{
    bson::Document,
    cmap::{Command, CommandResponse, StreamDescription},
    error::{Result, RETRYABLE_WRITE_ERROR},
    operation::{Operation, Retryability},
    trace::{
        serialize_command_or_reply,
        trace_or_log_enabled,
        TracingOrLogLevel,
        TracingRepresentation,
        BULK_TRACING_EVENT_TARGET,
        COMMAND_TRACING_EVENT_TARGET,
        DEFAULT_MAX_DOCUMENT_LENGTH_BYTES,
    },
    BoxFuture,
    Client,
    ClientSession,
};

/// The networking collaborator of a [`Client`].
///
/// Implementations send a [`Command`] to a server and return the raw reply document. Replies with
/// `ok: 0` should be returned as `Ok`; the crate turns them into
/// [`ErrorKind::Command`](crate::error::ErrorKind::Command) errors itself. Transport failures
/// should be returned as [`ErrorKind::Io`](crate::error::ErrorKind::Io) errors so that retryable
/// writes can recognize them.
pub trait CommandExecutor: Send + Sync {
    /// The limits of the server that the next command will be sent to.
    fn stream_description(&self) -> Result<StreamDescription>;

    /// Sends `command` and returns the server's reply.
    fn execute<'a>(&'a self, command: Command) -> BoxFuture<'a, Result<Document>>;
}

/// The session state attached to every attempt of an operation.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ExecutionContext<'a> {
    pub(crate) session_id: Option<&'a Document>,
    pub(crate) txn_number: Option<i64>,
    pub(crate) retryability: Retryability,
}

impl Client {
    /// Executes an operation with the given session, assigning it the session's next transaction
    /// number when it is sent as a retryable write.
    pub(crate) async fn execute_operation<T: Operation>(
        &self,
        op: &mut T,
        description: &StreamDescription,
        session: Option<&mut ClientSession>,
    ) -> Result<T::O> {
        let mut session = session;
        let retryability = self.get_retryability(op, session.as_deref(), description);
        let txn_number = match session {
            Some(ref mut session) if retryability == Retryability::Write => {
                Some(session.get_and_increment_txn_number())
            }
            _ => None,
        };
        let context = ExecutionContext {
            session_id: session.as_deref().map(ClientSession::id),
            txn_number,
            retryability,
        };
        self.execute_operation_with_retry(op, description, context)
            .await
    }

    /// Executes an operation, resending it once when it is a retryable write that failed with a
    /// retryable error.
    pub(crate) async fn execute_operation_with_retry<T: Operation>(
        &self,
        op: &mut T,
        description: &StreamDescription,
        context: ExecutionContext<'_>,
    ) -> Result<T::O> {
        let mut retried = false;
        loop {
            let mut command = op.build(description)?;
            if let Some(session_id) = context.session_id {
                command.set_session(session_id);
            }
            if let Some(txn_number) = context.txn_number {
                command.set_txn_number(txn_number);
            }

            let result = match self
                .execute_command(command, description, context.retryability)
                .await
            {
                Ok(reply) => op.handle_response(reply, description),
                Err(error) => Err(error),
            };

            match result {
                Err(error)
                    if !retried
                        && context.retryability == Retryability::Write
                        && error.is_write_retryable() =>
                {
                    tracing::debug!(
                        target: BULK_TRACING_EVENT_TARGET,
                        commandName = op.name(),
                        txnNumber = context.txn_number,
                        failure = error.tracing_representation(),
                        "Retrying write"
                    );
                    op.update_for_retry();
                    retried = true;
                }
                result => return result,
            }
        }
    }

    /// Returns the retryability level for the execution of this operation.
    pub(crate) fn get_retryability<T: Operation>(
        &self,
        op: &T,
        session: Option<&ClientSession>,
        description: &StreamDescription,
    ) -> Retryability {
        let in_transaction = session.is_some_and(ClientSession::in_transaction);
        if op.retryability() == Retryability::Write
            && op.is_acknowledged()
            && op.retry_writes().unwrap_or_else(|| self.retry_writes())
            && session.is_some()
            && !in_transaction
            && description.supports_retryable_writes()
        {
            Retryability::Write
        } else {
            Retryability::None
        }
    }

    /// Sends a command through the executor, validating the reply and emitting command tracing
    /// events. Errors from write commands are labeled as retryable when the server would consider
    /// them so.
    pub(crate) async fn execute_command(
        &self,
        command: Command,
        description: &StreamDescription,
        retryability: Retryability,
    ) -> Result<Document> {
        let max_document_length_bytes = self
            .options()
            .tracing_max_document_length_bytes
            .unwrap_or(DEFAULT_MAX_DOCUMENT_LENGTH_BYTES);
        let tracing_enabled =
            trace_or_log_enabled!(target: COMMAND_TRACING_EVENT_TARGET, TracingOrLogLevel::Debug);

        let command_name = command.name.clone();
        if tracing_enabled {
            tracing::debug!(
                target: COMMAND_TRACING_EVENT_TARGET,
                command = serialize_command_or_reply(&command.body, max_document_length_bytes),
                databaseName = command.target_db.as_str(),
                commandName = command_name.as_str(),
                "Command started"
            );
        }

        let start = Instant::now();
        let result = self
            .executor()
            .execute(command)
            .await
            .and_then(|reply| {
                let response = CommandResponse::new(reply);
                response.validate()?;
                Ok(response.raw_response)
            });

        match result {
            Ok(reply) => {
                if tracing_enabled {
                    tracing::debug!(
                        target: COMMAND_TRACING_EVENT_TARGET,
                        reply = serialize_command_or_reply(&reply, max_document_length_bytes),
                        commandName = command_name.as_str(),
                        durationMS = start.elapsed().as_millis(),
                        "Command succeeded"
                    );
                }
                Ok(reply)
            }
            Err(mut error) => {
                if retryability == Retryability::Write
                    && error.should_add_retryable_write_label(
                        description.max_wire_version.unwrap_or(0),
                    )
                {
                    error.add_label(RETRYABLE_WRITE_ERROR);
                }
                if tracing_enabled {
                    tracing::debug!(
                        target: COMMAND_TRACING_EVENT_TARGET,
                        failure = error.tracing_representation(),
                        commandName = command_name.as_str(),
                        durationMS = start.elapsed().as_millis(),
                        "Command failed"
                    );
                }
                Err(error)
            }
        }
    }
}
