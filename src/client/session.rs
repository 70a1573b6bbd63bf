use uuid::Uuid;

use crate::bson::{doc, spec::BinarySubtype, Binary, Bson, Document};

/// A logical session used to send retryable writes. To create a `ClientSession`, call
/// [`start_session`](crate::Client::start_session) on a `Client`.
///
/// Every retryable batch sent with a session is assigned the session's next transaction number,
/// and a retry of that batch reuses it so that the server can recognize the write it already
/// applied.
///
/// `ClientSession` instances are not thread safe. They can only be used by one task at a time.
#[derive(Clone, Debug)]
pub struct ClientSession {
    id: Document,
    txn_number: i64,
    is_implicit: bool,
    transaction: TransactionState,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum TransactionState {
    None,
    InProgress,
}

impl ClientSession {
    /// Creates a new session, generating the id client side.
    pub(crate) fn new(is_implicit: bool) -> Self {
        let binary = Bson::Binary(Binary {
            subtype: BinarySubtype::Uuid,
            bytes: Uuid::new_v4().as_bytes().to_vec(),
        });

        Self {
            id: doc! { "id": binary },
            txn_number: 0,
            is_implicit,
            transaction: TransactionState::None,
        }
    }

    /// The id of this session.
    pub fn id(&self) -> &Document {
        &self.id
    }

    /// The transaction number most recently assigned to a write sent with this session.
    pub fn txn_number(&self) -> i64 {
        self.txn_number
    }

    /// Whether this session was created implicitly by the driver or explicitly by the user.
    pub(crate) fn is_implicit(&self) -> bool {
        self.is_implicit
    }

    /// Marks this session as running a multi-statement transaction. Writes sent with the session
    /// are not retried individually until [`end_transaction`](Self::end_transaction) is called.
    pub fn start_transaction(&mut self) {
        self.transaction = TransactionState::InProgress;
    }

    /// Marks the multi-statement transaction started with
    /// [`start_transaction`](Self::start_transaction) as finished.
    pub fn end_transaction(&mut self) {
        self.transaction = TransactionState::None;
    }

    /// Whether this session is currently in a transaction.
    pub fn in_transaction(&self) -> bool {
        self.transaction == TransactionState::InProgress
    }

    /// Increments the txn_number and returns the new value.
    pub(crate) fn get_and_increment_txn_number(&mut self) -> i64 {
        self.txn_number += 1;
        self.txn_number
    }
}
