//! The keyed crypto engine.
//!
//! Keys are derived from the shared secret with HKDF-SHA512 and fixed
//! info strings, so independently constructed engines interoperate.

use crate::error::{CryptoError, CryptoResult};
use crate::stream::{DecryptStream, EncryptStream};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha512};
use zeroize::{Zeroize, ZeroizeOnDrop};

pub(crate) type Aes256CbcEnc = cbc::Encryptor<Aes256>;
pub(crate) type Aes256CbcDec = cbc::Decryptor<Aes256>;
pub(crate) type HmacSha512 = Hmac<Sha512>;

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Digest size in bytes, produced by both `hash` and `sign`.
pub const HASH_SIZE: usize = 64;

/// Smallest possible ciphertext: one block of IV plus one block of
/// padded data.
pub const MIN_CIPHERTEXT: usize = 2 * BLOCK_SIZE;

const CIPHER_KEY_INFO: &[u8] = b"driftsync cipher key v1";
const MAC_KEY_INFO: &[u8] = b"driftsync mac key v1";

/// The symmetric crypto engine.
///
/// Cloning transfers only key material; streams obtained from a clone are
/// independent of streams obtained from the original.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Crypt {
    cipher_key: [u8; 32],
    mac_key: [u8; HASH_SIZE],
}

impl Crypt {
    /// Builds an engine from the shared secret string.
    #[must_use]
    pub fn new(key: &str) -> Self {
        let hk = Hkdf::<Sha512>::new(None, key.as_bytes());
        let mut cipher_key = [0u8; 32];
        let mut mac_key = [0u8; HASH_SIZE];
        hk.expand(CIPHER_KEY_INFO, &mut cipher_key)
            .expect("HKDF output within limit");
        hk.expand(MAC_KEY_INFO, &mut mac_key)
            .expect("HKDF output within limit");
        Self {
            cipher_key,
            mac_key,
        }
    }

    /// Ciphertext length for an `n`-byte plaintext: one IV block plus the
    /// PKCS#7-padded data, which always grows by at least one byte.
    #[must_use]
    pub fn enc_len(&self, n: usize) -> usize {
        BLOCK_SIZE + (n / BLOCK_SIZE + 1) * BLOCK_SIZE
    }

    /// Digest length in bytes.
    #[must_use]
    pub fn hash_len(&self) -> usize {
        HASH_SIZE
    }

    /// Unkeyed SHA-512 digest of `data`.
    #[must_use]
    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        Sha512::digest(data).to_vec()
    }

    /// Keyed HMAC-SHA512 digest of `data` under the derived MAC key.
    #[must_use]
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(data);
        mac.finalize().into_bytes().to_vec()
    }

    /// Encrypts `data` with a fresh random IV. Output is
    /// `IV || AES-256-CBC(pad(data))` and has length `enc_len(data.len())`.
    #[must_use]
    pub fn encrypt(&self, data: &[u8]) -> Vec<u8> {
        let iv = random_iv();
        let enc = Aes256CbcEnc::new(&self.cipher_key.into(), &iv.into());
        let mut out = Vec::with_capacity(self.enc_len(data.len()));
        out.extend_from_slice(&iv);
        out.extend_from_slice(&enc.encrypt_padded_vec_mut::<Pkcs7>(data));
        out
    }

    /// Decrypts a buffer produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails when the input length is not a valid ciphertext length or
    /// when the padding check fails.
    pub fn decrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        if data.len() < MIN_CIPHERTEXT || data.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::Length(data.len()));
        }
        let (iv, body) = data.split_at(BLOCK_SIZE);
        let dec = Aes256CbcDec::new(&self.cipher_key.into(), GenericArray::from_slice(iv));
        dec.decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_| CryptoError::Padding)
    }

    /// Starts an incremental encryptor. Total output for `n` plaintext
    /// bytes is `enc_len(n) + hash_len()`, the trailing `hash_len()`
    /// bytes being `sign(plaintext)`.
    #[must_use]
    pub fn ecstream(&self) -> EncryptStream {
        EncryptStream::new(&self.cipher_key, self.mac(), random_iv())
    }

    /// Starts an incremental decryptor that verifies the trailing
    /// signature at finish.
    #[must_use]
    pub fn dcstream(&self) -> DecryptStream {
        DecryptStream::new(&self.cipher_key, self.mac())
    }

    fn mac(&self) -> HmacSha512 {
        HmacSha512::new_from_slice(&self.mac_key).expect("HMAC accepts any key length")
    }
}

impl std::fmt::Debug for Crypt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crypt").field("key", &"[REDACTED]").finish()
    }
}

fn random_iv() -> [u8; BLOCK_SIZE] {
    let mut iv = [0u8; BLOCK_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    iv
}
