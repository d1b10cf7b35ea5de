//! XChaCha20-Poly1305 implementation of the [`Cipher`] trait.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;

use crate::{
    error::{Error, Result},
    traits::{Cipher, Sealed},
};

/// Envelope version for XChaCha20-Poly1305 values.
pub const VERSION: u32 = 3;

/// Nonce size for XChaCha20-Poly1305 (24 bytes).
const NONCE_LEN: usize = 24;

/// Poly1305 tag size, appended to the ciphertext.
const TAG_LEN: usize = 16;

/// Binds the envelope version into the tag so a value cannot be replayed
/// under a different version number.
const AAD: &[u8] = b"secure-bag:v3";

/// XChaCha20-Poly1305 AEAD cipher.
///
/// The 24-byte nonce is stored as the envelope `iv`; the ciphertext carries
/// the Poly1305 tag in its last 16 bytes.
pub struct XChaCha20Poly1305Cipher;

impl Cipher for XChaCha20Poly1305Cipher {
    fn id(&self) -> &'static str {
        secure_bag_config::XCHACHA20_POLY1305
    }

    fn version(&self) -> u32 {
        VERSION
    }

    #[allow(deprecated)]
    fn seal(&self, key: &[u8; 32], plaintext: &[u8]) -> Result<Sealed> {
        let cipher = XChaCha20Poly1305::new(key.into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, Payload {
                msg: plaintext,
                aad: AAD,
            })
            .map_err(|e| Error::EncryptionFailed(e.to_string()))?;

        Ok(Sealed {
            version: VERSION,
            iv: nonce_bytes.to_vec(),
            ciphertext,
            auth_tag: None,
        })
    }

    #[allow(deprecated)]
    fn open(&self, key: &[u8; 32], sealed: &Sealed) -> Result<Vec<u8>> {
        if sealed.iv.len() != NONCE_LEN {
            return Err(Error::DecryptionFailed(format!(
                "nonce must be {NONCE_LEN} bytes, got {}",
                sealed.iv.len()
            )));
        }
        if sealed.ciphertext.len() < TAG_LEN {
            return Err(Error::DecryptionFailed("ciphertext too short".to_string()));
        }

        let nonce = XNonce::from_slice(&sealed.iv);
        let cipher = XChaCha20Poly1305::new(key.into());

        cipher
            .decrypt(nonce, Payload {
                msg: &sealed.ciphertext,
                aad: AAD,
            })
            .map_err(|_| Error::DecryptionFailed("authentication failed (wrong key or tampered data)".into()))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 32] = [0x42; 32];

    #[test]
    fn round_trip() {
        let sealed = XChaCha20Poly1305Cipher.seal(&KEY, b"hello bag").unwrap();
        assert_eq!(sealed.iv.len(), NONCE_LEN);
        assert_eq!(sealed.ciphertext.len(), b"hello bag".len() + TAG_LEN);
        assert!(sealed.auth_tag.is_none());

        let opened = XChaCha20Poly1305Cipher.open(&KEY, &sealed).unwrap();
        assert_eq!(opened, b"hello bag");
    }

    #[test]
    fn wrong_key_fails() {
        let sealed = XChaCha20Poly1305Cipher.seal(&KEY, b"secret").unwrap();
        let result = XChaCha20Poly1305Cipher.open(&[0x43; 32], &sealed);
        assert!(matches!(result, Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let mut sealed = XChaCha20Poly1305Cipher.seal(&KEY, b"secret").unwrap();
        let last = sealed.ciphertext.len() - 1;
        sealed.ciphertext[last] ^= 0x01;
        assert!(XChaCha20Poly1305Cipher.open(&KEY, &sealed).is_err());
    }

    #[test]
    fn bad_nonce_length_fails() {
        let mut sealed = XChaCha20Poly1305Cipher.seal(&KEY, b"secret").unwrap();
        sealed.iv.truncate(12);
        let err = XChaCha20Poly1305Cipher.open(&KEY, &sealed).unwrap_err();
        assert!(err.to_string().contains("24 bytes"));
    }

    #[test]
    fn too_short_ciphertext_fails() {
        let sealed = Sealed {
            version: VERSION,
            iv: vec![0; NONCE_LEN],
            ciphertext: vec![0; 4],
            auth_tag: None,
        };
        assert!(XChaCha20Poly1305Cipher.open(&KEY, &sealed).is_err());
    }

    #[test]
    fn different_nonces_produce_different_ciphertexts() {
        let a = XChaCha20Poly1305Cipher.seal(&KEY, b"same input").unwrap();
        let b = XChaCha20Poly1305Cipher.seal(&KEY, b"same input").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn empty_plaintext_round_trip() {
        let sealed = XChaCha20Poly1305Cipher.seal(&KEY, b"").unwrap();
        let opened = XChaCha20Poly1305Cipher.open(&KEY, &sealed).unwrap();
        assert!(opened.is_empty());
    }
}
