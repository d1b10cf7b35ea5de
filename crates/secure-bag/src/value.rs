//! Typed record model.
//!
//! Stored items are plain JSON. Converting into [`Value`] classifies every
//! mapping carrying an `encrypted_data` key as [`Value::Encrypted`] once, up
//! front, so the walker matches on variants instead of probing keys.

use std::collections::{BTreeMap, btree_map};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Reserved key marking a mapping as an encrypted value.
pub const ENCRYPTED_DATA_KEY: &str = "encrypted_data";

/// A single value inside a [`Record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Record),
    Encrypted(EncryptedValue),
}

impl Value {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Record> {
        match self {
            Self::Mapping(r) => Some(r),
            _ => None,
        }
    }

    /// Whether this value holds encrypted material at any depth.
    pub fn contains_encrypted(&self) -> bool {
        match self {
            Self::Encrypted(_) => true,
            Self::Mapping(r) => r.contains_encrypted(),
            Self::Sequence(items) => items.iter().any(Self::contains_encrypted),
            _ => false,
        }
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = Error;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        Ok(match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::Sequence(
                items
                    .into_iter()
                    .map(Self::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_json::Value::Object(map) if map.contains_key(ENCRYPTED_DATA_KEY) => {
                Self::Encrypted(EncryptedValue::from_map(map)?)
            },
            serde_json::Value::Object(map) => Self::Mapping(Record::try_from(map)?),
        })
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::String(s),
            Value::Sequence(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Mapping(record) => record.into(),
            Value::Encrypted(encrypted) => encrypted.into_json(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Self::Mapping(record)
    }
}

impl From<EncryptedValue> for Value {
    fn from(encrypted: EncryptedValue) -> Self {
        Self::Encrypted(encrypted)
    }
}

/// Mapping from field names to values. Keys are unique at every level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub struct Record(BTreeMap<String, Value>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document that must be an object.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        Self::try_from(value)
    }

    pub fn into_json(self) -> serde_json::Value {
        self.into()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.0.get_mut(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains_key(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn contains_encrypted(&self) -> bool {
        self.0.values().any(Value::contains_encrypted)
    }
}

impl TryFrom<serde_json::Map<String, serde_json::Value>> for Record {
    type Error = Error;

    fn try_from(map: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        map.into_iter()
            .map(|(k, v)| Ok((k, Value::try_from(v)?)))
            .collect()
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = Error;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(map) if map.contains_key(ENCRYPTED_DATA_KEY) => {
                Err(Error::MalformedRecord(
                    "expected a plain mapping, found an encrypted value".into(),
                ))
            },
            serde_json::Value::Object(map) => Self::try_from(map),
            other => Err(Error::MalformedRecord(format!(
                "expected a mapping, found {}",
                json_kind(&other)
            ))),
        }
    }
}

impl From<Record> for serde_json::Value {
    fn from(record: Record) -> Self {
        Self::Object(
            record
                .0
                .into_iter()
                .map(|(k, v)| (k, Self::from(v)))
                .collect(),
        )
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Record {
    type IntoIter = btree_map::IntoIter<String, Value>;
    type Item = (String, Value);

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type IntoIter = btree_map::Iter<'a, String, Value>;
    type Item = (&'a String, &'a Value);

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Per-field encryption envelope, as stored.
///
/// Binary fields are standard base64. `hmac` is absent for AEAD ciphers and
/// for version 1 data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    pub encrypted_data: String,
    pub iv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
    #[serde(default = "default_version")]
    pub version: u32,
    pub cipher: String,
}

fn default_version() -> u32 {
    1
}

impl EncryptedValue {
    fn from_map(map: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| Error::MalformedRecord(format!("invalid encrypted value: {e}")))
    }

    pub fn into_json(self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert(ENCRYPTED_DATA_KEY.into(), self.encrypted_data.into());
        map.insert("iv".into(), self.iv.into());
        if let Some(hmac) = self.hmac {
            map.insert("hmac".into(), hmac.into());
        }
        map.insert("version".into(), self.version.into());
        map.insert("cipher".into(), self.cipher.into());
        serde_json::Value::Object(map)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a sequence",
        serde_json::Value::Object(_) => "a mapping",
    }
}
