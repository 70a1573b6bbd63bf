use serde::{de::DeserializeOwned, Deserialize};

use crate::{
    bson::{Bson, Document},
    bson_util,
    error::{CommandError, Error, ErrorKind, Result},
};

/// `Command` is a driver side abstraction of a server command containing all the information
/// a [`CommandExecutor`](crate::CommandExecutor) needs to send it.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub(crate) name: String,
    pub(crate) target_db: String,
    pub(crate) body: Document,
}

impl Command {
    /// Constructs a new command.
    pub(crate) fn new(name: impl ToString, target_db: impl ToString, body: Document) -> Self {
        Self {
            name: name.to_string(),
            target_db: target_db.to_string(),
            body,
        }
    }

    pub(crate) fn set_session(&mut self, session_id: &Document) {
        self.body.insert("lsid", session_id.clone());
    }

    pub(crate) fn set_txn_number(&mut self, txn_number: i64) {
        self.body.insert("txnNumber", txn_number);
    }

    /// The name of the command, e.g. `insert` or `bulkWrite`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database the command must be run against.
    pub fn target_db(&self) -> &str {
        &self.target_db
    }

    /// The full command document, including the session id and transaction number when set.
    pub fn body(&self) -> &Document {
        &self.body
    }

    /// The transaction number attached to this command, if it is sent as a retryable write.
    pub fn txn_number(&self) -> Option<i64> {
        self.body.get_i64("txnNumber").ok()
    }
}

/// A response body useful for deserializing command errors.
#[derive(Deserialize, Debug)]
struct CommandErrorBody {
    #[serde(rename = "errorLabels")]
    error_labels: Option<Vec<String>>,

    #[serde(flatten)]
    command_error: CommandError,
}

impl From<CommandErrorBody> for Error {
    fn from(command_error_response: CommandErrorBody) -> Error {
        Error::new(
            ErrorKind::Command(command_error_response.command_error),
            command_error_response.error_labels,
        )
    }
}

/// The raw reply to a [`Command`].
#[derive(Debug, Clone)]
pub(crate) struct CommandResponse {
    pub(crate) raw_response: Document,
}

impl CommandResponse {
    pub(crate) fn new(raw_response: Document) -> Self {
        Self { raw_response }
    }

    /// Returns whether this response indicates a success or not (i.e. if "ok: 1")
    pub(crate) fn is_success(&self) -> bool {
        match self.raw_response.get("ok") {
            Some(b) => bson_util::get_int(b) == Some(1),
            _ => false,
        }
    }

    /// Returns a result indicating whether this response corresponds to a command failure.
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.is_success() {
            let error_body: CommandErrorBody = bson::from_bson(Bson::Document(
                self.raw_response.clone(),
            ))
            .map_err(|_| Error::invalid_response("invalid server response"))?;
            Err(error_body.into())
        } else {
            Ok(())
        }
    }

    /// Deserialize the body of the response.
    pub(crate) fn body<T: DeserializeOwned>(&self) -> Result<T> {
        bson::from_bson(Bson::Document(self.raw_response.clone()))
            .map_err(|e| Error::invalid_response(e.to_string()))
    }
}
