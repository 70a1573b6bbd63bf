//! Contains all of the types needed to specify options to the bulk APIs.
//!
//! Most of the options structs in this module use the
//! [`typed-builder`](https://crates.io/crates/typed-builder) crate to derive a type-safe builder
//! API on them. For example, to create an instance of [`BulkOptions`] with only
//! `bypass_document_validation` and `write_concern` specified, the following code can be used:
//!
//! ```rust
//! # use mongodb_bulk::options::{BulkOptions, WriteConcern};
//! let options = BulkOptions::builder()
//!     .bypass_document_validation(true)
//!     .write_concern(WriteConcern::majority())
//!     .build();
//! ```

pub use crate::{
    client::{
        bulk_write::{models::WriteModel, ClientBulkWriteOptions},
        options::{ClientOptions, IdFactory, ObjectIdFactory},
    },
    coll::options::{BulkOptions, UpdateModifications},
    concern::{Acknowledgment, WriteConcern},
};
