use std::time::Duration;

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::{bson::Document, error::Result};

const DEFAULT_MAX_BSON_OBJECT_SIZE: i64 = 16 * 1024 * 1024;
const DEFAULT_MAX_WRITE_BATCH_SIZE: i64 = 1000;
const DEFAULT_MAX_MESSAGE_SIZE_BYTES: i32 = 48_000_000;

/// The type of the server that a [`StreamDescription`] describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, derive_more::Display)]
#[non_exhaustive]
pub enum ServerType {
    /// A single, non-replicated mongod.
    Standalone,
    /// A router to a sharded cluster.
    Mongos,
    /// The primary of a replica set.
    RsPrimary,
    /// A secondary of a replica set.
    RsSecondary,
    /// An arbiter of a replica set.
    RsArbiter,
    /// A hidden, starting up or recovering replica set member.
    RsOther,
    /// A replica set member that has not yet been configured.
    RsGhost,
    /// The server type could not be determined.
    #[default]
    Unknown,
}

/// The limits and capabilities of the server that commands are sent to. The batching of every
/// bulk write is driven by these values.
#[derive(Debug, Clone, PartialEq, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
#[non_exhaustive]
pub struct StreamDescription {
    /// The type of the server.
    #[builder(default)]
    pub server_type: ServerType,

    /// The maximum wire version that the server understands.
    #[builder(default)]
    pub max_wire_version: Option<i32>,

    /// How long sessions started on this server will stay alive without
    /// executing an operation before the server kills them.
    #[builder(default)]
    pub logical_session_timeout: Option<Duration>,

    /// The maximum size of a single document that the server accepts.
    #[builder(default = DEFAULT_MAX_BSON_OBJECT_SIZE)]
    pub max_bson_object_size: i64,

    /// The maximum number of inserts, updates, or deletes that can be included in a write batch.
    #[builder(default = DEFAULT_MAX_WRITE_BATCH_SIZE)]
    pub max_write_batch_size: i64,

    /// The maximum permitted size of a BSON wire protocol message.
    #[builder(default = DEFAULT_MAX_MESSAGE_SIZE_BYTES)]
    pub max_message_size_bytes: i32,
}

impl Default for StreamDescription {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// The subset of a `hello` reply that describes a server's write limits.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HelloCommandResponse {
    is_writable_primary: Option<bool>,

    #[serde(rename = "ismaster")]
    is_master: Option<bool>,

    msg: Option<String>,

    set_name: Option<String>,

    hidden: Option<bool>,

    secondary: Option<bool>,

    arbiter_only: Option<bool>,

    #[serde(rename = "isreplicaset")]
    is_replica_set: Option<bool>,

    logical_session_timeout_minutes: Option<i64>,

    max_wire_version: Option<i32>,

    max_bson_object_size: Option<i64>,

    max_write_batch_size: Option<i64>,

    max_message_size_bytes: Option<i32>,
}

impl HelloCommandResponse {
    fn server_type(&self) -> ServerType {
        if self.msg.as_deref() == Some("isdbgrid") {
            ServerType::Mongos
        } else if self.set_name.is_some() {
            if self.hidden == Some(true) {
                ServerType::RsOther
            } else if self.is_writable_primary == Some(true) || self.is_master == Some(true) {
                ServerType::RsPrimary
            } else if self.secondary == Some(true) {
                ServerType::RsSecondary
            } else if self.arbiter_only == Some(true) {
                ServerType::RsArbiter
            } else {
                ServerType::RsOther
            }
        } else if self.is_replica_set == Some(true) {
            ServerType::RsGhost
        } else {
            ServerType::Standalone
        }
    }
}

impl StreamDescription {
    /// Constructs a new StreamDescription from the reply to a `hello` command. Limits missing
    /// from the reply fall back to the server defaults.
    pub fn from_hello_reply(reply: &Document) -> Result<Self> {
        let response: HelloCommandResponse = bson::from_document(reply.clone())?;
        Ok(Self {
            server_type: response.server_type(),
            max_wire_version: response.max_wire_version,
            logical_session_timeout: response
                .logical_session_timeout_minutes
                .map(|mins| Duration::from_secs(mins.max(0) as u64 * 60)),
            max_bson_object_size: response
                .max_bson_object_size
                .unwrap_or(DEFAULT_MAX_BSON_OBJECT_SIZE),
            max_write_batch_size: response
                .max_write_batch_size
                .unwrap_or(DEFAULT_MAX_WRITE_BATCH_SIZE),
            max_message_size_bytes: response
                .max_message_size_bytes
                .unwrap_or(DEFAULT_MAX_MESSAGE_SIZE_BYTES),
        })
    }

    /// Whether this StreamDescription supports retryable writes.
    pub(crate) fn supports_retryable_writes(&self) -> bool {
        self.server_type != ServerType::Standalone
            && self.logical_session_timeout.is_some()
            && self.max_wire_version.map_or(false, |version| version >= 6)
    }

    /// Whether the server accepts sessions.
    pub(crate) fn supports_sessions(&self) -> bool {
        self.logical_session_timeout.is_some()
    }

    /// Gets a description of a stream for a 4.2 replica set primary.
    #[cfg(test)]
    pub(crate) fn new_testing() -> Self {
        Self::with_wire_version(8)
    }

    /// Gets a description of a stream for a connection to a replica set primary with the
    /// provided maxWireVersion.
    #[cfg(test)]
    pub(crate) fn with_wire_version(max_wire_version: i32) -> Self {
        Self {
            server_type: ServerType::RsPrimary,
            max_wire_version: Some(max_wire_version),
            logical_session_timeout: Some(Duration::from_secs(30 * 60)),
            max_bson_object_size: 16 * 1024 * 1024,
            max_write_batch_size: 100_000,
            max_message_size_bytes: 48_000_000,
        }
    }
}
