//! Cipher trait for swappable field encryption backends.

use crate::error::Result;

/// Output of a [`Cipher::seal`] call, and input to [`Cipher::open`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Envelope format version the bytes were produced under.
    pub version: u32,
    /// Initialization vector or nonce.
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
    /// Detached authentication tag, for ciphers that are not AEAD.
    pub auth_tag: Option<Vec<u8>>,
}

/// Symmetric cipher used to protect a single serialized field value.
///
/// Implementations can be swapped without changing the walker. The `id` is
/// stored next to every encrypted value so decoding picks the same backend.
pub trait Cipher: Send + Sync {
    /// Identifier written to the envelope's `cipher` field.
    fn id(&self) -> &'static str;

    /// Envelope version produced by [`seal`](Self::seal).
    fn version(&self) -> u32;

    /// Encrypt `plaintext` under a fresh random IV.
    fn seal(&self, key: &[u8; 32], plaintext: &[u8]) -> Result<Sealed>;

    /// Authenticate and decrypt bytes produced by [`seal`](Self::seal).
    fn open(&self, key: &[u8; 32], sealed: &Sealed) -> Result<Vec<u8>>;
}
