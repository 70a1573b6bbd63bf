use crate::{
    bson::Document,
    client::{bulk_write::models::OperationType, executor::ExecutionContext},
    cmap::StreamDescription,
    error::{ClientBulkWriteError, Error, ErrorKind, Result},
    operation::{GetMore, Retryability},
    results::{ClientBulkWriteResult, DeleteResult, InsertOneResult, UpdateResult},
    trace::{TracingRepresentation, BULK_TRACING_EVENT_TARGET},
    Namespace,
};

use super::{
    server_responses::{Response, SingleOperationResponse, SingleOperationResult},
    BulkWrite,
};

impl<R> BulkWrite<'_, R>
where
    R: ClientBulkWriteResult,
{
    /// Folds a `bulkWrite` reply into a result, draining the results cursor with `getMore` on the
    /// session that sent the command.
    ///
    /// Write errors and write concern errors are returned as a
    /// [`ClientBulkWriteError`] carrying the results that did succeed.
    pub(crate) async fn merge_response(
        &self,
        response: Response,
        description: &StreamDescription,
        session_id: Option<&Document>,
    ) -> Result<R> {
        let mut result = R::default();
        let mut error = ClientBulkWriteError::default();

        let summary = &response.summary;
        result.populate_summary_info(
            summary.n_inserted,
            summary.n_matched,
            summary.n_modified,
            summary.n_upserted,
            summary.n_deleted,
        );
        if let Some(write_concern_error) = response.write_concern_error {
            error.write_concern_errors.push(write_concern_error);
        }

        if let Some(cursor) = response.cursor {
            let ns = cursor.ns;
            let mut cursor_id = cursor.id;
            let mut batch = cursor.first_batch;

            'drain: loop {
                while let Some(document) = batch.pop_front() {
                    let response: SingleOperationResponse = bson::from_document(document)?;
                    let failed =
                        self.handle_individual_response(response, &mut result, &mut error)?;
                    if failed && self.is_ordered() {
                        break 'drain;
                    }
                }
                if cursor_id == 0 {
                    break;
                }

                let mut get_more = GetMore::new(&ns, cursor_id);
                let context = ExecutionContext {
                    session_id,
                    txn_number: None,
                    retryability: Retryability::None,
                };
                match self
                    .client
                    .execute_operation_with_retry(&mut get_more, description, context)
                    .await
                {
                    Ok(next) => {
                        cursor_id = next.id;
                        batch = next.batch;
                    }
                    Err(get_more_error) => {
                        if !get_more_error.is_network_error() {
                            self.kill_cursor(&ns, cursor_id, description, session_id)
                                .await;
                        }
                        error.partial_result = Some(result.into_partial_result());
                        let error = Error::from(ErrorKind::ClientBulkWrite(error));
                        return Err(error.with_source(get_more_error));
                    }
                }
            }

            // an ordered batch stopped at its first error with results still on the server
            if cursor_id != 0 {
                self.kill_cursor(&ns, cursor_id, description, session_id)
                    .await;
            }
        }

        if error.write_errors.is_empty() && error.write_concern_errors.is_empty() {
            Ok(result)
        } else {
            error.partial_result = Some(result.into_partial_result());
            Err(ErrorKind::ClientBulkWrite(error).into())
        }
    }

    /// Records a single entry of the results cursor. Returns whether the entry was a write error.
    fn handle_individual_response(
        &self,
        response: SingleOperationResponse,
        result: &mut R,
        error: &mut ClientBulkWriteError,
    ) -> Result<bool> {
        let index = response.index + self.offset;
        match response.result {
            SingleOperationResult::Success {
                n,
                n_modified,
                upserted,
            } => {
                let model = self.models.get(response.index).ok_or_else(|| {
                    Error::invalid_response(format!(
                        "bulkWrite reply references unknown model index {index}"
                    ))
                })?;
                match model.operation_type() {
                    OperationType::Insert => {
                        let inserted_id = self.inserted_ids.get(&index).cloned().ok_or_else(|| {
                            Error::internal(format!("no inserted id recorded for model {index}"))
                        })?;
                        result.add_insert_result(index, InsertOneResult { inserted_id });
                    }
                    OperationType::Update => {
                        let modified_count = n_modified.ok_or_else(|| {
                            Error::invalid_response(
                                "nModified missing from bulkWrite update result",
                            )
                        })?;
                        let update_result = match upserted {
                            Some(upserted) => UpdateResult {
                                matched_count: 0,
                                modified_count,
                                upserted_id: Some(upserted.id),
                            },
                            None => UpdateResult {
                                matched_count: n,
                                modified_count,
                                upserted_id: None,
                            },
                        };
                        result.add_update_result(index, update_result);
                    }
                    OperationType::Delete => {
                        result.add_delete_result(index, DeleteResult { deleted_count: n });
                    }
                }
                Ok(false)
            }
            SingleOperationResult::Error(write_error) => {
                error.write_errors.insert(index, write_error);
                Ok(true)
            }
        }
    }

    async fn kill_cursor(
        &self,
        ns: &Namespace,
        cursor_id: i64,
        description: &StreamDescription,
        session_id: Option<&Document>,
    ) {
        let mut command = GetMore::kill_cursors(ns, cursor_id);
        if let Some(session_id) = session_id {
            command.set_session(session_id);
        }
        if let Err(error) = self
            .client
            .execute_command(command, description, Retryability::None)
            .await
        {
            tracing::debug!(
                target: BULK_TRACING_EVENT_TARGET,
                cursorId = cursor_id,
                failure = error.tracing_representation(),
                "Failed to kill bulkWrite results cursor"
            );
        }
    }
}
