//! Recursive encode/decode over a [`Record`].
//!
//! Decode is driven by structure: every [`Value::Encrypted`] found at any
//! depth is opened, whatever its field name. Encode is driven by names: a
//! field whose name is in the effective field set is sealed, at whatever
//! depth it appears. Names are matched per level, never as dotted paths.
//!
//! Both directions descend into sequences. Encode only applies field names
//! to mappings found inside a sequence; bare sequence elements have no name
//! and are left alone.

use std::collections::HashSet;

use crate::{
    adapter::CipherAdapter,
    encryption::Encryption,
    error::Result,
    secret::SecretKey,
    value::{Record, Value},
};

/// Decode a single value. An encrypted top-level value is opened in place.
pub fn decode_value(value: Value, key: &SecretKey) -> Result<Value> {
    Decoder::new(key).value(value)
}

/// Decode every encrypted value in `record`.
///
/// Idempotent: a plaintext record comes back unchanged.
pub fn decode(record: Record, key: &SecretKey) -> Result<Record> {
    let mut decoder = Decoder::new(key);
    let decoded = decoder.record(record)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(decrypted = decoder.opened, "decoded record");

    Ok(decoded)
}

/// Encrypt the fields of `record` named by `encryption.effective_fields()`.
///
/// Not guarded against double encoding: an already encrypted value under a
/// selected name gets wrapped again. Decode first.
pub fn encode(record: Record, key: &SecretKey, encryption: &Encryption) -> Result<Record> {
    let fields = encryption.effective_fields();
    let mut encoder = Encoder {
        adapter: CipherAdapter::new(key),
        cipher: &encryption.cipher,
        fields: fields.iter().map(String::as_str).collect(),
        sealed: 0,
    };
    let encoded = encoder.record(record)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        cipher = %encryption.cipher,
        encrypted = encoder.sealed,
        "encoded record"
    );

    Ok(encoded)
}

struct Decoder {
    adapter: CipherAdapter,
    opened: usize,
}

impl Decoder {
    fn new(key: &SecretKey) -> Self {
        Self {
            adapter: CipherAdapter::new(key),
            opened: 0,
        }
    }

    fn value(&mut self, value: Value) -> Result<Value> {
        match value {
            Value::Encrypted(encrypted) => {
                self.opened += 1;
                self.adapter.decrypt(&encrypted)
            },
            Value::Mapping(record) => self.record(record).map(Value::Mapping),
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            scalar => Ok(scalar),
        }
    }

    fn record(&mut self, record: Record) -> Result<Record> {
        record
            .into_iter()
            .map(|(field, value)| Ok((field, self.value(value)?)))
            .collect()
    }
}

struct Encoder<'a> {
    adapter: CipherAdapter,
    cipher: &'a str,
    fields: HashSet<&'a str>,
    sealed: usize,
}

impl Encoder<'_> {
    fn record(&mut self, record: Record) -> Result<Record> {
        record
            .into_iter()
            .map(|(field, value)| {
                let value = if self.fields.contains(field.as_str()) {
                    self.sealed += 1;
                    Value::Encrypted(self.adapter.encrypt(value, self.cipher)?)
                } else {
                    self.value(value)?
                };
                Ok((field, value))
            })
            .collect()
    }

    fn value(&mut self, value: Value) -> Result<Value> {
        match value {
            Value::Mapping(record) => self.record(record).map(Value::Mapping),
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| self.value(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }
}
