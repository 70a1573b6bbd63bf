use std::{collections::HashMap, time::Duration};

use serde::{ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};

use crate::{bson::Bson, bson_util::get_u64, concern::WriteConcern};

pub(crate) fn serialize_duration_option_as_int_millis<S: Serializer>(
    val: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match val {
        Some(duration) if duration.as_millis() > i32::MAX as u128 => {
            serializer.serialize_i64(duration.as_millis() as i64)
        }
        Some(duration) => serializer.serialize_i32(duration.as_millis() as i32),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn deserialize_duration_option_from_u64_millis<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<Bson>::deserialize(deserializer)?;
    match millis {
        Some(bson) => get_u64(&bson)
            .map(|millis| Some(Duration::from_millis(millis)))
            .ok_or_else(|| {
                serde::de::Error::custom(format!("could not deserialize duration from {bson:?}"))
            }),
        None => Ok(None),
    }
}

/// Serializes `Some(false)` as `false` and everything else as `true`.
pub(crate) fn serialize_bool_or_true<S: Serializer>(
    val: &Option<bool>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let val = val.unwrap_or(true);
    serializer.serialize_bool(val)
}

/// Serializes the inverse of the given flag, treating `None` as `false`.
pub(crate) fn serialize_opposite_bool<S: Serializer>(
    val: &Option<bool>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let val = !val.unwrap_or(false);
    serializer.serialize_bool(val)
}

/// Serializes a map keyed by operation index with string keys in ascending index order.
pub(crate) fn serialize_indexed_map<S: Serializer, T: Serialize>(
    map: &HashMap<usize, T>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by_key(|(index, _)| **index);

    let mut map_serializer = serializer.serialize_map(Some(entries.len()))?;
    for (index, value) in entries {
        map_serializer.serialize_entry(&index.to_string(), value)?;
    }
    map_serializer.end()
}

pub(crate) fn write_concern_is_empty(write_concern: &Option<WriteConcern>) -> bool {
    write_concern
        .as_ref()
        .map_or(true, |write_concern| write_concern.is_empty())
}
