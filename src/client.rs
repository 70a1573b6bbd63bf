pub(crate) mod bulk_write;
pub(crate) mod executor;
pub(crate) mod options;
pub(crate) mod session;

use std::sync::Arc;

use derive_where::derive_where;

use crate::{
    client::{executor::CommandExecutor, options::ClientOptions, session::ClientSession},
    cmap::StreamDescription,
    concern::WriteConcern,
    error::Result,
    Database,
};

/// This is the main entry point for the API. A `Client` sends the write commands built by the
/// bulk APIs through the [`CommandExecutor`] it was created with.
///
/// `Client` uses [`std::sync::Arc`](https://doc.rust-lang.org/std/sync/struct.Arc.html) internally,
/// so it can safely be shared across threads or async tasks. For example:
///
/// ```rust
/// # use mongodb_bulk::{bson::doc, error::Result, Client, CommandExecutor};
/// # async fn start_workers(executor: impl CommandExecutor + 'static) -> Result<()> {
/// let client = Client::new(executor);
///
/// for i in 0..5 {
///     let client_ref = client.clone();
///
///     tokio::task::spawn(async move {
///         let collection = client_ref.database("items").collection(&format!("coll{}", i));
///
///         let mut bulk = collection.initialize_unordered_bulk_op(None);
///         bulk.insert(doc! { "worker": i })?;
///         bulk.execute().await
///     });
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive_where(Debug)]
struct ClientInner {
    #[derive_where(skip)]
    executor: Box<dyn CommandExecutor>,
    options: ClientOptions,
}

impl Client {
    /// Creates a new `Client` that sends its commands through `executor`, using the default
    /// [`ClientOptions`].
    pub fn new(executor: impl CommandExecutor + 'static) -> Self {
        Self::with_options(executor, ClientOptions::default())
    }

    /// Creates a new `Client` that sends its commands through `executor`, configured with the
    /// provided options.
    pub fn with_options(executor: impl CommandExecutor + 'static, options: ClientOptions) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                executor: Box::new(executor),
                options,
            }),
        }
    }

    /// Gets the write concern of the `Client`.
    pub fn write_concern(&self) -> Option<&WriteConcern> {
        self.inner.options.write_concern.as_ref()
    }

    /// Gets a handle to a database specified by `name`.
    ///
    /// This method does not send or receive anything across the wire to the database, so it can be
    /// used repeatedly without incurring any costs from I/O.
    pub fn database(&self, name: &str) -> Database {
        Database::new(self.clone(), name)
    }

    /// Starts a new [`ClientSession`]. Writes executed with the session share its transaction
    /// number sequence.
    pub fn start_session(&self) -> ClientSession {
        ClientSession::new(false)
    }

    pub(crate) fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    pub(crate) fn executor(&self) -> &dyn CommandExecutor {
        self.inner.executor.as_ref()
    }

    /// The limits of the server that commands are currently sent to.
    pub(crate) fn stream_description(&self) -> Result<StreamDescription> {
        self.inner.executor.stream_description()
    }

    /// Whether retryable writes are enabled for this client. They are unless explicitly turned off.
    pub(crate) fn retry_writes(&self) -> bool {
        self.inner.options.retry_writes != Some(false)
    }
}
