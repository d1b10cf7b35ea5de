//! Whole-record encryption format.
//!
//! Older items carry a single top-level `encryption` envelope
//! (`{cipher, iv, encoded_fields}`) and store each listed top-level field as
//! a bare base64 ciphertext, all sealed under the one shared IV. Field names
//! are matched at the top level only. There is no authentication tag; a wrong
//! key is caught by the padding check or by the wrapper parse.

use {
    base64::{Engine, engine::general_purpose::STANDARD},
    rand::RngCore,
};

use crate::{
    adapter::{self, CipherAdapter},
    aes_cbc::{Aes256CbcCipher, IV_LEN},
    encryption::Encryption,
    error::{Error, Result},
    secret::SecretKey,
    value::{Record, Value},
};

/// Top-level key holding the shared envelope.
pub const ENCRYPTION_KEY: &str = "encryption";

/// Whether `record` was written in the whole-record format.
pub fn is_legacy(record: &Record) -> bool {
    record.contains_key(ENCRYPTION_KEY)
}

/// Strip the shared envelope and decrypt the fields it lists.
///
/// Returns the record unchanged, with `None`, when no envelope is present.
pub fn decode(mut record: Record, key: &SecretKey) -> Result<(Record, Option<Encryption>)> {
    let Some(envelope) = record.remove(ENCRYPTION_KEY) else {
        return Ok((record, None));
    };
    let encryption: Encryption = serde_json::from_value(envelope.into())
        .map_err(|e| Error::MalformedRecord(format!("invalid encryption envelope: {e}")))?;
    ensure_cbc(&encryption.cipher).map_err(Error::DecryptionFailed)?;

    let iv_b64 = encryption
        .iv
        .as_deref()
        .ok_or_else(|| Error::MalformedRecord("encryption envelope is missing its iv".into()))?;
    let iv = adapter::decode_b64("iv", iv_b64)?;
    let cipher_adapter = CipherAdapter::new(key);

    for field in &encryption.encoded_fields {
        let Some(value) = record.get_mut(field) else {
            continue;
        };
        let Value::String(ciphertext) = value else {
            return Err(Error::MalformedRecord(format!(
                "encoded field '{field}' is not a ciphertext string"
            )));
        };
        let ciphertext = adapter::decode_b64(field, ciphertext)?;
        let plaintext = zeroize::Zeroizing::new(Aes256CbcCipher.decrypt_unauthenticated(
            cipher_adapter.key(),
            &iv,
            &ciphertext,
        )?);
        *value = adapter::unwrap(&plaintext)?;
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        fields = encryption.encoded_fields.len(),
        "decoded whole-record envelope"
    );

    Ok((record, Some(encryption)))
}

/// Encrypt the listed top-level fields under one fresh IV and attach the
/// envelope. Returns the envelope that was written.
pub fn encode(
    mut record: Record,
    key: &SecretKey,
    encryption: &Encryption,
) -> Result<(Record, Encryption)> {
    ensure_cbc(&encryption.cipher).map_err(Error::EncryptionFailed)?;

    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);

    let written = Encryption {
        cipher: encryption.cipher.clone(),
        iv: Some(STANDARD.encode(iv)),
        encoded_fields: encryption.effective_fields(),
    };

    let cipher_adapter = CipherAdapter::new(key);
    for field in &written.encoded_fields {
        let Some(value) = record.remove(field) else {
            continue;
        };
        let plaintext = zeroize::Zeroizing::new(adapter::wrap(value)?);
        let ciphertext = Aes256CbcCipher.encrypt_with_iv(cipher_adapter.key(), &iv, &plaintext);
        record.insert(field.as_str(), STANDARD.encode(ciphertext));
    }

    let envelope = Value::try_from(written.describe())
        .map_err(|e| Error::EncryptionFailed(e.to_string()))?;
    record.insert(ENCRYPTION_KEY, envelope);
    Ok((record, written))
}

fn ensure_cbc(cipher: &str) -> std::result::Result<(), String> {
    if cipher == secure_bag_config::AES_256_CBC {
        Ok(())
    } else {
        Err(format!(
            "whole-record format only supports {}, got '{cipher}'",
            secure_bag_config::AES_256_CBC
        ))
    }
}
