use std::{fmt::Debug, sync::Arc};

use typed_builder::TypedBuilder;

use crate::{
    bson::{oid::ObjectId, Bson},
    concern::WriteConcern,
};

/// Contains the options that can be used to create a new [`Client`](crate::Client).
#[derive(Clone, Debug, Default, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct ClientOptions {
    /// Whether or not the client should retry a write operation if the operation fails.
    ///
    /// The default value is true.
    pub retry_writes: Option<bool>,

    /// The default write concern for operations performed on the Client. See the
    /// WriteConcern type documentation for more details.
    pub write_concern: Option<WriteConcern>,

    /// Leave `_id` generation to the server for documents inserted through the per-collection
    /// bulk API instead of generating it client side.
    pub force_server_object_id: Option<bool>,

    /// Generates the `_id` of inserted documents that lack one. Defaults to [`ObjectIdFactory`].
    pub id_factory: Option<Arc<dyn IdFactory>>,

    /// The maximum number of bytes of a command or reply rendered into a tracing event. Longer
    /// documents are truncated.
    ///
    /// The default value is 1000.
    pub tracing_max_document_length_bytes: Option<usize>,
}

/// Generates identifiers for inserted documents that do not carry an `_id`.
pub trait IdFactory: Send + Sync + Debug {
    /// Creates a new, unique identifier.
    fn generate(&self) -> Bson;
}

/// The default [`IdFactory`], which generates a new [`ObjectId`] for every document.
#[derive(Clone, Copy, Debug, Default)]
#[non_exhaustive]
pub struct ObjectIdFactory;

impl IdFactory for ObjectIdFactory {
    fn generate(&self) -> Bson {
        Bson::ObjectId(ObjectId::new())
    }
}

impl ClientOptions {
    pub(crate) fn generate_id(&self) -> Bson {
        match self.id_factory {
            Some(ref factory) => factory.generate(),
            None => ObjectIdFactory.generate(),
        }
    }
}
