//! # Snapshot
//! A snapshot is the full value stored at a path at some moment. Subscribers always get full snapshots, never diffs.
//! An absent value and a JSON `null` are the same thing: nothing is stored there.

use serde::de::DeserializeOwned;

use crate::data_model::StorePath;

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub path: StorePath,
    pub value: Option<serde_json::Value>,
}

impl Snapshot {
    pub fn new(path: StorePath, value: Option<serde_json::Value>) -> Self {
        Self {
            path,
            value: value.filter(|value| !value.is_null()),
        }
    }

    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    /// Children of an object value, in the order the store delivered them.
    pub fn children(&self) -> impl Iterator<Item = (&str, &serde_json::Value)> {
        self.value
            .as_ref()
            .and_then(serde_json::Value::as_object)
            .into_iter()
            .flat_map(|map| map.iter())
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        self.value
            .as_ref()
            .map(|value| T::deserialize(value))
            .transpose()
    }
}
