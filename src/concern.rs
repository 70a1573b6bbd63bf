//! Write concerns attached to the commands of a bulk.


use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::skip_serializing_none;
use typed_builder::TypedBuilder;

use crate::{
    bson::serde_helpers,
    error::{Error, Result},
    serde_util,
};

/// The acknowledgement requested from the server for the commands of a bulk. It is sent as the
/// `writeConcern` field of every batch.
///
/// A write concern of `w: 0` without journaling makes the bulk unacknowledged: batches are not
/// retried, no session is attached, and the merged counts stay at zero.
#[skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[builder(field_defaults(default, setter(into)))]
#[non_exhaustive]
pub struct WriteConcern {
    /// How many or which members must apply a batch before the server replies.
    pub w: Option<Acknowledgment>,

    /// How long the server waits for `w` to be satisfied before reporting a write concern error.
    /// The writes themselves are not rolled back when the timeout expires.
    #[serde(rename = "wtimeout", alias = "wtimeoutMS")]
    #[serde(serialize_with = "serde_util::serialize_duration_option_as_int_millis")]
    #[serde(deserialize_with = "serde_util::deserialize_duration_option_from_u64_millis")]
    #[serde(default)]
    pub w_timeout: Option<Duration>,

    /// Whether the server waits for a batch to reach the on-disk journal.
    #[serde(rename = "j", alias = "journal")]
    pub journal: Option<bool>,
}

/// The `w` field of a [`WriteConcern`].
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum Acknowledgment {
    /// A number of members. `Nodes(0)` requests no acknowledgement at all.
    Nodes(u32),

    /// A majority of the voting members.
    Majority,

    /// A custom write concern defined through replica set tags.
    Custom(String),
}

impl Serialize for Acknowledgment {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Nodes(n) => serde_helpers::serialize_u32_as_i32(n, serializer),
            Self::Majority => serializer.serialize_str("majority"),
            Self::Custom(tag) => serializer.serialize_str(tag),
        }
    }
}

impl<'de> Deserialize<'de> for Acknowledgment {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Nodes(u32),
            Tag(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Nodes(n) => Self::Nodes(n),
            Raw::Tag(tag) => Self::from(tag),
        })
    }
}

impl From<u32> for Acknowledgment {
    fn from(n: u32) -> Self {
        Self::Nodes(n)
    }
}

impl From<String> for Acknowledgment {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "majority" => Self::Majority,
            _ => Self::Custom(tag),
        }
    }
}

impl From<&str> for Acknowledgment {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl WriteConcern {
    /// Acknowledgement from `n` members.
    pub fn nodes(n: u32) -> Self {
        Acknowledgment::Nodes(n).into()
    }

    /// Acknowledgement from a majority of the voting members.
    pub fn majority() -> Self {
        Acknowledgment::Majority.into()
    }

    /// Acknowledgement according to the tag set named `tag`.
    pub fn custom(tag: impl AsRef<str>) -> Self {
        Acknowledgment::from(tag.as_ref()).into()
    }

    /// Journaling makes even `w: 0` acknowledged.
    pub(crate) fn is_acknowledged(&self) -> bool {
        self.journal == Some(true) || self.w != Some(Acknowledgment::Nodes(0))
    }

    /// An empty write concern defers to the server default and is left out of commands.
    pub(crate) fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.w == Some(Acknowledgment::Nodes(0)) && self.journal == Some(true) {
            return Err(Error::invalid_argument(
                "write concern cannot have w=0 and j=true",
            ));
        }
        Ok(())
    }
}

impl From<Acknowledgment> for WriteConcern {
    fn from(w: Acknowledgment) -> Self {
        Self {
            w: Some(w),
            ..Default::default()
        }
    }
}
