//! Encryption envelope: cipher id, shared IV, and the protected field set.

use serde::{Deserialize, Serialize};

use secure_bag_config::{AES_256_CBC, DEFAULT_ENCODED_FIELDS};

/// Describes how an item's fields were or will be encrypted.
///
/// `encoded_fields` holds only what the caller asked for; the baseline
/// fields are merged in by [`effective_fields`](Self::effective_fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encryption {
    pub cipher: String,
    /// Base64 IV shared by every field, only used by the whole-record format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default)]
    pub encoded_fields: Vec<String>,
}

impl Default for Encryption {
    fn default() -> Self {
        Self {
            cipher: AES_256_CBC.to_string(),
            iv: None,
            encoded_fields: Vec::new(),
        }
    }
}

impl Encryption {
    pub fn new(cipher: impl Into<String>) -> Self {
        Self {
            cipher: cipher.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_encoded_fields(fields);
        self
    }

    /// Replace the caller-supplied fields, dropping duplicates.
    pub fn set_encoded_fields<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.encoded_fields = dedupe(fields.into_iter().map(Into::into));
    }

    /// Caller fields unioned with the baseline, deduplicated, first occurrence wins.
    pub fn effective_fields(&self) -> Vec<String> {
        effective_fields(&self.encoded_fields)
    }

    /// `{cipher, iv, encoded_fields}` as written by the whole-record format.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "cipher": self.cipher,
            "iv": self.iv,
            "encoded_fields": self.effective_fields(),
        })
    }
}

/// `dedupe(explicit ∪ baseline)`.
pub fn effective_fields(explicit: &[String]) -> Vec<String> {
    dedupe(
        explicit
            .iter()
            .cloned()
            .chain(DEFAULT_ENCODED_FIELDS.iter().map(|f| (*f).to_string())),
    )
}

fn dedupe(fields: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for field in fields {
        if !out.contains(&field) {
            out.push(field);
        }
    }
    out
}
