//! Ordered reply data with positional and named entries.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ReplyError;

/// Key of a [`ResponseData`] entry.
///
/// Canonical non-negative decimal strings are integer keys, so `"3"` and a
/// positional append landing on index 3 address the same slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataKey {
    Index(u64),
    Name(String),
}

impl From<u64> for DataKey {
    fn from(index: u64) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for DataKey {
    fn from(key: &str) -> Self {
        match key.parse::<u64>() {
            Ok(index) if index.to_string() == key => Self::Index(index),
            _ => Self::Name(key.to_owned()),
        }
    }
}

impl From<String> for DataKey {
    fn from(key: String) -> Self {
        match Self::from(key.as_str()) {
            Self::Index(index) => Self::Index(index),
            Self::Name(_) => Self::Name(key),
        }
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl Serialize for DataKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The `data` section of a reply.
///
/// Serializes as a JSON array when the keys are exactly `0..n` in insertion
/// order, otherwise as an object. Empty data serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseData {
    entries: IndexMap<DataKey, Value>,
    next_index: u64,
}

impl ResponseData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append under the next free integer index.
    ///
    /// Once the cursor has reached `u64::MAX` and that slot is taken the
    /// value is dropped with a warning instead of overwriting it.
    pub fn push(&mut self, value: impl Into<Value>) {
        let key = DataKey::Index(self.next_index);
        if self.entries.contains_key(&key) {
            tracing::warn!(
                index = self.next_index,
                "next data index is already occupied; value dropped"
            );
            return;
        }
        self.insert(key, value);
    }

    /// Set `key` to `value`. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<DataKey>, value: impl Into<Value>) {
        let key = key.into();
        if let DataKey::Index(index) = key {
            self.next_index = self.next_index.max(index.saturating_add(1));
        }
        self.entries.insert(key, value.into());
    }

    #[must_use]
    pub fn get(&self, key: impl Into<DataKey>) -> Option<&Value> {
        self.entries.get(&key.into())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, DataKey, Value> {
        self.entries.iter()
    }

    /// Drop every entry and restart positional indexing at 0.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.next_index = 0;
    }

    /// True when the data would serialize as a JSON array.
    #[must_use]
    pub fn is_list(&self) -> bool {
        !self.entries.is_empty()
            && self.entries.keys().enumerate().all(|(pos, key)| match key {
                DataKey::Index(index) => usize::try_from(*index).is_ok_and(|i| i == pos),
                DataKey::Name(_) => false,
            })
    }
}

impl Serialize for ResponseData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_list() {
            let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
            for value in self.entries.values() {
                seq.serialize_element(value)?;
            }
            seq.end()
        } else {
            let mut map = serializer.serialize_map(Some(self.entries.len()))?;
            for (key, value) in &self.entries {
                map.serialize_entry(key, value)?;
            }
            map.end()
        }
    }
}

impl<'a> IntoIterator for &'a ResponseData {
    type Item = (&'a DataKey, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, DataKey, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl From<Vec<Value>> for ResponseData {
    fn from(values: Vec<Value>) -> Self {
        let mut data = Self::new();
        for value in values {
            data.push(value);
        }
        data
    }
}

impl From<Map<String, Value>> for ResponseData {
    fn from(map: Map<String, Value>) -> Self {
        let mut data = Self::new();
        for (key, value) in map {
            data.insert(key, value);
        }
        data
    }
}

impl TryFrom<Value> for ResponseData {
    type Error = ReplyError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Array(values) => Ok(values.into()),
            Value::Object(map) => Ok(map.into()),
            Value::Bool(_) => Err(ReplyError::ScalarData { kind: "bool" }),
            Value::Number(_) => Err(ReplyError::ScalarData { kind: "number" }),
            Value::String(_) => Err(ReplyError::ScalarData { kind: "string" }),
        }
    }
}

impl<K: Into<DataKey>, V: Into<Value>> FromIterator<(K, V)> for ResponseData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = Self::new();
        for (key, value) in iter {
            data.insert(key, value);
        }
        data
    }
}
