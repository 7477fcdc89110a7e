//! Symmetric crypto engine for DriftSync transports.
//!
//! Everything is driven by a single shared secret string. The engine
//! derives independent cipher and MAC keys from it and exposes:
//!
//! - whole-buffer [`encrypt`](Crypt::encrypt) / [`decrypt`](Crypt::decrypt)
//!   (AES-256-CBC, PKCS#7 padding, random one-block IV prepended)
//! - [`hash`](Crypt::hash) (SHA-512) and [`sign`](Crypt::sign)
//!   (HMAC-SHA512 under the derived MAC key)
//! - incremental [`ecstream`](Crypt::ecstream) / [`dcstream`](Crypt::dcstream)
//!   state machines that wrap arbitrary byte streams as
//!   `ciphertext || signature`, verifying the trailing signature on the
//!   decrypting side
//!
//! Two engines built from the same secret string are interchangeable;
//! key derivation uses no stored salt.

mod engine;
mod error;
mod stream;

pub use engine::{Crypt, BLOCK_SIZE, HASH_SIZE, MIN_CIPHERTEXT};
pub use error::{CryptoError, CryptoResult};
pub use stream::{CryptStream, DecryptStream, EncryptStream};
