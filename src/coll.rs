pub(crate) mod options;

use std::{fmt, str::FromStr};

use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    bulk::BulkOperation,
    error::{Error, Result},
    options::BulkOptions,
    Client,
    Database,
};

/// `Collection` is the client-side abstraction of a MongoDB Collection. It is the entry point of
/// the per-collection bulk API.
///
/// `Collection` uses [`std::sync::Arc`](https://doc.rust-lang.org/std/sync/struct.Arc.html) internally,
/// so it can safely be shared across threads or async tasks.
#[derive(Clone, Debug)]
pub struct Collection {
    db: Database,
    name: String,
}

impl Collection {
    pub(crate) fn new(db: Database, name: &str) -> Self {
        Self {
            db,
            name: name.to_string(),
        }
    }

    /// Get the `Client` that this collection descended from.
    pub fn client(&self) -> &Client {
        self.db.client()
    }

    /// Gets the name of the `Collection`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the namespace of the `Collection`.
    ///
    /// The namespace of a MongoDB collection is the concatenation of the name of the database
    /// containing it, the '.' character, and the name of the collection itself. For example, if a
    /// collection named "bar" is created in a database named "foo", the namespace of the collection
    /// is "foo.bar".
    pub fn namespace(&self) -> Namespace {
        Namespace {
            db: self.db.name().into(),
            coll: self.name().into(),
        }
    }

    /// Starts an ordered bulk operation on this collection.
    ///
    /// Operations are sent in the order they were added, grouped into consecutive batches of the
    /// same type. Execution stops at the first batch that reports a write error.
    pub fn initialize_ordered_bulk_op(
        &self,
        options: impl Into<Option<BulkOptions>>,
    ) -> BulkOperation {
        BulkOperation::new(self.clone(), true, options.into())
    }

    /// Starts an unordered bulk operation on this collection.
    ///
    /// Operations are grouped by type regardless of the order they were added in, and every batch
    /// is sent even if others fail.
    pub fn initialize_unordered_bulk_op(
        &self,
        options: impl Into<Option<BulkOptions>>,
    ) -> BulkOperation {
        BulkOperation::new(self.clone(), false, options.into())
    }
}

/// A struct modeling the canonical name for a collection in MongoDB.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// The name of the database associated with this namespace.
    pub db: String,

    /// The name of the collection this namespace corresponds to.
    pub coll: String,
}

impl Namespace {
    /// Constructs a `Namespace` from the given database and collection names.
    pub fn new(db: impl Into<String>, coll: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            coll: coll.into(),
        }
    }

    fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('.');

        let db = parts.next();
        let coll = parts.collect::<Vec<_>>().join(".");

        match (db, coll) {
            (Some(db), coll) if !db.is_empty() && !coll.is_empty() => Some(Self {
                db: db.to_string(),
                coll,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}.{}", self.db, self.coll)
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
            .ok_or_else(|| Error::invalid_argument(format!("invalid namespace: {:?}", s)))
    }
}

impl<'de> Deserialize<'de> for Namespace {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| D::Error::custom("Missing one or more fields in namespace"))
    }
}

impl Serialize for Namespace {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&(self.db.clone() + "." + &self.coll))
    }
}
