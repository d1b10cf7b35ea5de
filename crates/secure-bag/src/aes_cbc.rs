//! AES-256-CBC implementation of the [`Cipher`] trait.
//!
//! CBC gives no integrity on its own, so version 2 envelopes carry an
//! HMAC-SHA256 tag over `iv || ciphertext` (encrypt-then-MAC). Version 1
//! envelopes predate the tag and are opened without it.

use {
    aes::Aes256,
    cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7},
    hmac::{Hmac, Mac},
    rand::RngCore,
    sha2::{Digest, Sha256},
    zeroize::Zeroizing,
};

use crate::{
    error::{Error, Result},
    traits::{Cipher, Sealed},
};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// Envelope version for HMAC-authenticated CBC.
pub const VERSION: u32 = 2;

/// AES block size; also the IV length.
pub const IV_LEN: usize = 16;

/// Domain separation for the MAC key, so AES and HMAC never share a key.
const MAC_KEY_CONTEXT: &[u8] = b"secure-bag-hmac-sha256";

/// AES-256-CBC with PKCS#7 padding.
pub struct Aes256CbcCipher;

impl Aes256CbcCipher {
    /// Encrypt under a caller-chosen IV. Produces no tag.
    ///
    /// Only the whole-record legacy format needs this; everything else goes
    /// through [`Cipher::seal`].
    pub fn encrypt_with_iv(&self, key: &[u8; 32], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Vec<u8> {
        Aes256CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Decrypt without checking any tag.
    pub fn decrypt_unauthenticated(
        &self,
        key: &[u8; 32],
        iv: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let decryptor = Aes256CbcDec::new_from_slices(key, iv)
            .map_err(|_| Error::DecryptionFailed(format!("iv must be {IV_LEN} bytes")))?;
        decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| Error::DecryptionFailed("bad padding (wrong key or corrupt data)".into()))
    }
}

fn mac(key: &[u8; 32], iv: &[u8], ciphertext: &[u8]) -> Result<HmacSha256> {
    let mac_key: Zeroizing<[u8; 32]> = Zeroizing::new(
        Sha256::new()
            .chain_update(MAC_KEY_CONTEXT)
            .chain_update(key)
            .finalize()
            .into(),
    );
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key.as_slice())
        .map_err(|e| Error::EncryptionFailed(e.to_string()))?;
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac)
}

impl Cipher for Aes256CbcCipher {
    fn id(&self) -> &'static str {
        secure_bag_config::AES_256_CBC
    }

    fn version(&self) -> u32 {
        VERSION
    }

    fn seal(&self, key: &[u8; 32], plaintext: &[u8]) -> Result<Sealed> {
        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);

        let ciphertext = self.encrypt_with_iv(key, &iv, plaintext);
        let tag = mac(key, &iv, &ciphertext)?.finalize().into_bytes().to_vec();

        Ok(Sealed {
            version: VERSION,
            iv: iv.to_vec(),
            ciphertext,
            auth_tag: Some(tag),
        })
    }

    fn open(&self, key: &[u8; 32], sealed: &Sealed) -> Result<Vec<u8>> {
        match (&sealed.auth_tag, sealed.version) {
            (Some(tag), _) => mac(key, &sealed.iv, &sealed.ciphertext)?
                .verify_slice(tag)
                .map_err(|_| {
                    Error::DecryptionFailed("hmac mismatch (wrong key or tampered data)".into())
                })?,
            (None, v) if v >= VERSION => {
                return Err(Error::DecryptionFailed(format!(
                    "version {v} envelope is missing its hmac"
                )));
            },
            (None, _) => {},
        }

        self.decrypt_unauthenticated(key, &sealed.iv, &sealed.ciphertext)
    }
}
