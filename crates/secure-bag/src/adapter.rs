//! Seam between the walker and the [`Cipher`] backends.
//!
//! Values are serialized as `{"json_wrapper": <value>}` before sealing so
//! scalars and structures alike come back with their JSON type. The cipher
//! key is `SHA-256(secret)`.

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    sha2::{Digest, Sha256},
    zeroize::Zeroizing,
};

use crate::{
    aes_cbc::Aes256CbcCipher,
    error::{Error, Result},
    secret::SecretKey,
    traits::{Cipher, Sealed},
    value::{EncryptedValue, Value},
    xchacha20::XChaCha20Poly1305Cipher,
};

const JSON_WRAPPER: &str = "json_wrapper";

/// Look up a cipher backend by its envelope id.
pub fn cipher_for(id: &str) -> Option<&'static dyn Cipher> {
    match id {
        secure_bag_config::AES_256_CBC => Some(&Aes256CbcCipher as &dyn Cipher),
        secure_bag_config::XCHACHA20_POLY1305 => Some(&XChaCha20Poly1305Cipher as &dyn Cipher),
        _ => None,
    }
}

/// Derive the 32-byte cipher key from raw secret bytes.
pub fn derive_key(secret: &SecretKey) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(Sha256::digest(secret.as_bytes()).into())
}

/// Encrypts and decrypts single values under one secret.
pub struct CipherAdapter {
    key: Zeroizing<[u8; 32]>,
}

impl CipherAdapter {
    pub fn new(secret: &SecretKey) -> Self {
        Self {
            key: derive_key(secret),
        }
    }

    pub(crate) fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// Seal `value` with the cipher named `cipher_id`.
    pub fn encrypt(&self, value: Value, cipher_id: &str) -> Result<EncryptedValue> {
        let cipher = cipher_for(cipher_id)
            .ok_or_else(|| Error::EncryptionFailed(format!("unsupported cipher '{cipher_id}'")))?;
        self.seal_with(cipher, value)
    }

    fn seal_with(&self, cipher: &dyn Cipher, value: Value) -> Result<EncryptedValue> {
        let plaintext = Zeroizing::new(wrap(value)?);
        let sealed = cipher.seal(&self.key, &plaintext)?;
        if sealed.version != cipher.version() {
            return Err(Error::EncryptionFailed(format!(
                "{} sealed version {}, expected {}",
                cipher.id(),
                sealed.version,
                cipher.version()
            )));
        }

        Ok(EncryptedValue {
            encrypted_data: STANDARD.encode(&sealed.ciphertext),
            iv: STANDARD.encode(&sealed.iv),
            hmac: sealed.auth_tag.as_ref().map(|t| STANDARD.encode(t)),
            version: sealed.version,
            cipher: cipher.id().to_string(),
        })
    }

    /// Open `value` with the cipher its envelope names.
    pub fn decrypt(&self, value: &EncryptedValue) -> Result<Value> {
        let cipher = cipher_for(&value.cipher).ok_or_else(|| {
            Error::DecryptionFailed(format!("unsupported cipher '{}'", value.cipher))
        })?;
        if value.version > cipher.version() {
            return Err(Error::DecryptionFailed(format!(
                "{} envelope version {} is newer than supported version {}",
                cipher.id(),
                value.version,
                cipher.version()
            )));
        }

        let sealed = Sealed {
            version: value.version,
            iv: decode_b64("iv", &value.iv)?,
            ciphertext: decode_b64("encrypted_data", &value.encrypted_data)?,
            auth_tag: value
                .hmac
                .as_deref()
                .map(|h| decode_b64("hmac", h))
                .transpose()?,
        };

        let plaintext = Zeroizing::new(cipher.open(&self.key, &sealed)?);
        unwrap(&plaintext)
    }
}

pub(crate) fn decode_b64(field: &str, encoded: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| Error::DecryptionFailed(format!("invalid base64 in {field}: {e}")))
}

/// Serialize a value inside the `json_wrapper` object.
pub(crate) fn wrap(value: Value) -> Result<Vec<u8>> {
    let mut wrapper = serde_json::Map::new();
    wrapper.insert(JSON_WRAPPER.into(), value.into());
    serde_json::to_vec(&wrapper).map_err(|e| Error::EncryptionFailed(e.to_string()))
}

/// Parse decrypted bytes back into the wrapped value.
pub(crate) fn unwrap(plaintext: &[u8]) -> Result<Value> {
    let parsed: serde_json::Value = serde_json::from_slice(plaintext)
        .map_err(|e| Error::DecryptionFailed(format!("decrypted data is not json: {e}")))?;
    let serde_json::Value::Object(mut map) = parsed else {
        return Err(Error::DecryptionFailed("decrypted data is not a wrapper object".into()));
    };
    let inner = map
        .remove(JSON_WRAPPER)
        .ok_or_else(|| Error::DecryptionFailed(format!("decrypted data lacks '{JSON_WRAPPER}'")))?;
    Value::try_from(inner)
}
