/// Config schema types (secret source, encoding defaults).
use serde::{Deserialize, Serialize};

/// Cipher identifier for AES-256-CBC with an HMAC-SHA256 tag.
pub const AES_256_CBC: &str = "aes-256-cbc";

/// Cipher identifier for XChaCha20-Poly1305.
pub const XCHACHA20_POLY1305: &str = "xchacha20-poly1305";

/// Every cipher identifier the encoder knows how to produce.
pub const KNOWN_CIPHERS: &[&str] = &[AES_256_CBC, XCHACHA20_POLY1305];

/// Fields that are always protected, whatever the caller asks for.
pub const DEFAULT_ENCODED_FIELDS: &[&str] = &["password"];

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecureBagConfig {
    pub secret: SecretConfig,
    pub encoding: EncodingConfig,
}

/// Where the shared secret comes from when a caller does not name one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    /// Default secret source: a local path or a `scheme://` URI.
    pub path: Option<String>,
    /// Total timeout for remote secret fetches, in seconds.
    pub fetch_timeout_secs: u64,
    /// TCP/TLS connect timeout for remote secret fetches, in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            path: None,
            fetch_timeout_secs: 10,
            connect_timeout_secs: 3,
        }
    }
}

/// Defaults applied when encoding items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Cipher used for newly encoded fields.
    pub cipher: String,
    /// Extra fields protected on every encode. `password` is always protected
    /// on top of these.
    pub encoded_fields: Vec<String>,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            cipher: AES_256_CBC.into(),
            encoded_fields: DEFAULT_ENCODED_FIELDS
                .iter()
                .map(|f| (*f).to_string())
                .collect(),
        }
    }
}
