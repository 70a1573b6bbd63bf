use crate::{Client, Collection};

/// `Database` is the client-side abstraction of a MongoDB database. It can be used to obtain
/// handles to the collections within the database.
///
/// `Database` uses [`std::sync::Arc`](https://doc.rust-lang.org/std/sync/struct.Arc.html) internally,
/// so it can safely be shared across threads or async tasks.
#[derive(Clone, Debug)]
pub struct Database {
    client: Client,
    name: String,
}

impl Database {
    pub(crate) fn new(client: Client, name: &str) -> Self {
        Self {
            client,
            name: name.to_string(),
        }
    }

    /// Get the `Client` that this collection descended from.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Gets the name of the `Database`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets a handle to a collection in this database with the provided name.
    ///
    /// This method does not send or receive anything across the wire to the database, so it can be
    /// used repeatedly without incurring any costs from I/O.
    pub fn collection(&self, name: &str) -> Collection {
        Collection::new(self.clone(), name)
    }
}
