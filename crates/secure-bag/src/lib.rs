//! Field-level encryption for data bag items.
//!
//! A [`SecureDataBagItem`] holds a plaintext [`Record`] and produces a
//! storable copy in which selected fields are replaced by encrypted markers.
//! Decoding is structural: any marker at any depth is opened, whatever its
//! field name. Encoding is by name: fields listed in the [`Encryption`]
//! envelope (plus the `password` baseline) are sealed at every depth.
//!
//! Ciphers sit behind the [`Cipher`] trait; AES-256-CBC with HMAC-SHA256 is
//! the default and XChaCha20-Poly1305 is available for new data.

pub mod adapter;
pub mod aes_cbc;
pub mod encryption;
pub mod error;
pub mod item;
pub mod legacy;
pub mod secret;
pub mod traits;
pub mod value;
pub mod walker;
pub mod xchacha20;

pub use {
    adapter::CipherAdapter,
    aes_cbc::Aes256CbcCipher,
    encryption::Encryption,
    error::{Error, Result},
    item::{ItemOptions, SecureDataBagItem},
    secret::{SecretKey, SecretResolver, SecretSource},
    traits::{Cipher, Sealed},
    value::{EncryptedValue, Record, Value},
    xchacha20::XChaCha20Poly1305Cipher,
};
