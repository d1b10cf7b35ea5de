//! Secure data bag error types.

/// Errors produced while resolving secrets or encoding/decoding items.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither an explicit source nor a configured default was available.
    #[error("no secret specified and no secret found")]
    SecretMissing,

    /// The source was specified but does not exist (missing file, non-2xx response).
    #[error("secret not found at '{location}'")]
    SecretNotFound { location: String },

    /// The source exists but could not be read or reached.
    #[error("secret not available from '{location}': {reason}")]
    SecretUnavailable { location: String, reason: String },

    /// The resolved secret is empty after stripping whitespace.
    #[error("invalid zero length secret in '{location}'")]
    InvalidSecret { location: String },

    /// Sealing a value failed (unsupported cipher, serialization failure).
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Opening a value failed (wrong key, tampered or corrupt envelope, unsupported cipher).
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Input is not a mapping where one is required, or an encrypted marker is malformed.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] secure_bag_config::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
