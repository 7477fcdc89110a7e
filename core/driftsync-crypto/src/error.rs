//! Error types for the crypto engine.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in crypto operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The input is not a possible ciphertext length.
    #[error("invalid ciphertext length: {0} bytes")]
    Length(usize),

    /// PKCS#7 padding check failed after decryption.
    #[error("padding check failed")]
    Padding,

    /// The trailing signature does not match the decrypted plaintext.
    #[error("signature verification failed")]
    Signature,

    /// The stream was used after it finished or failed.
    #[error("crypt stream is finished")]
    Finished,
}
