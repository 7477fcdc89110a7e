//! Incremental crypt streams.
//!
//! Both directions follow the same push/pull shape: feed input with
//! [`CryptStream::write`], signal end-of-input with
//! [`CryptStream::finish`], drain output with [`CryptStream::read`].
//! The encryptor frames its output as `ciphertext || signature`; the
//! decryptor consumes that framing and verifies the signature against
//! the plaintext it produced. All verification failures surface from
//! `finish`.

use crate::engine::{Aes256CbcDec, Aes256CbcEnc, HmacSha512, BLOCK_SIZE, HASH_SIZE};
use crate::error::{CryptoError, CryptoResult};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::Mac;

/// Bytes the decryptor must hold back until end-of-input: the trailing
/// signature plus the final (padded) ciphertext block.
const HOLDBACK: usize = HASH_SIZE + BLOCK_SIZE;

/// Common surface of the incremental encryptor and decryptor.
pub trait CryptStream {
    /// Feeds an input chunk of any size.
    fn write(&mut self, buf: &[u8]) -> CryptoResult<()>;

    /// Signals end-of-input. The encryptor emits the final padded block
    /// and the trailing signature; the decryptor unpads the final block
    /// and verifies the signature.
    fn finish(&mut self) -> CryptoResult<()>;

    /// Drains up to `out.len()` bytes of pending output, returning the
    /// number of bytes written. Returns a positive count whenever output
    /// is available.
    fn read(&mut self, out: &mut [u8]) -> usize;
}

/// Incremental encryptor: plaintext in, `IV || CBC blocks || signature` out.
pub struct EncryptStream {
    enc: Aes256CbcEnc,
    mac: Option<HmacSha512>,
    pending: Vec<u8>,
    out: Vec<u8>,
    read_pos: usize,
}

impl EncryptStream {
    pub(crate) fn new(cipher_key: &[u8; 32], mac: HmacSha512, iv: [u8; BLOCK_SIZE]) -> Self {
        Self {
            enc: Aes256CbcEnc::new(cipher_key.into(), &iv.into()),
            mac: Some(mac),
            pending: Vec::new(),
            out: iv.to_vec(),
            read_pos: 0,
        }
    }

    fn encrypt_full_blocks(&mut self) {
        let full = self.pending.len() - self.pending.len() % BLOCK_SIZE;
        for chunk in self.pending[..full].chunks_exact(BLOCK_SIZE) {
            let mut block = GenericArray::clone_from_slice(chunk);
            self.enc.encrypt_block_mut(&mut block);
            self.out.extend_from_slice(&block);
        }
        self.pending.drain(..full);
    }
}

impl CryptStream for EncryptStream {
    fn write(&mut self, buf: &[u8]) -> CryptoResult<()> {
        let mac = self.mac.as_mut().ok_or(CryptoError::Finished)?;
        mac.update(buf);
        self.pending.extend_from_slice(buf);
        self.encrypt_full_blocks();
        Ok(())
    }

    fn finish(&mut self) -> CryptoResult<()> {
        let mac = self.mac.take().ok_or(CryptoError::Finished)?;
        // PKCS#7: always pad, a full block when the data is block-aligned.
        let pad = BLOCK_SIZE - self.pending.len();
        self.pending.resize(BLOCK_SIZE, pad as u8);
        let mut block = GenericArray::clone_from_slice(&self.pending);
        self.enc.encrypt_block_mut(&mut block);
        self.out.extend_from_slice(&block);
        self.pending.clear();
        self.out.extend_from_slice(&mac.finalize().into_bytes());
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> usize {
        drain(&mut self.out, &mut self.read_pos, out)
    }
}

/// Incremental decryptor: `IV || CBC blocks || signature` in, plaintext out.
///
/// The trailing [`HOLDBACK`] bytes are withheld from decryption until
/// `finish`, since only then is the final block known to be the padded
/// one and the rest the signature.
pub struct DecryptStream {
    cipher_key: [u8; 32],
    dec: Option<Aes256CbcDec>,
    mac: Option<HmacSha512>,
    buf: Vec<u8>,
    total_in: usize,
    out: Vec<u8>,
    read_pos: usize,
}

impl DecryptStream {
    pub(crate) fn new(cipher_key: &[u8; 32], mac: HmacSha512) -> Self {
        Self {
            cipher_key: *cipher_key,
            dec: None,
            mac: Some(mac),
            buf: Vec::new(),
            total_in: 0,
            out: Vec::new(),
            read_pos: 0,
        }
    }

    /// Decrypts every block that can no longer be part of the holdback.
    fn process(&mut self) {
        let mut start = 0;
        while self.buf.len() - start >= HOLDBACK + BLOCK_SIZE {
            let chunk = &self.buf[start..start + BLOCK_SIZE];
            match self.dec.as_mut() {
                None => {
                    self.dec = Some(Aes256CbcDec::new(
                        &self.cipher_key.into(),
                        GenericArray::from_slice(chunk),
                    ));
                }
                Some(dec) => {
                    let mut block = GenericArray::clone_from_slice(chunk);
                    dec.decrypt_block_mut(&mut block);
                    if let Some(mac) = self.mac.as_mut() {
                        mac.update(&block);
                    }
                    self.out.extend_from_slice(&block);
                }
            }
            start += BLOCK_SIZE;
        }
        if start > 0 {
            self.buf.drain(..start);
        }
    }
}

impl CryptStream for DecryptStream {
    fn write(&mut self, buf: &[u8]) -> CryptoResult<()> {
        if self.mac.is_none() {
            return Err(CryptoError::Finished);
        }
        self.total_in += buf.len();
        self.buf.extend_from_slice(buf);
        self.process();
        Ok(())
    }

    fn finish(&mut self) -> CryptoResult<()> {
        let mut mac = self.mac.take().ok_or(CryptoError::Finished)?;
        let ct_len = self.total_in.saturating_sub(HASH_SIZE);

        // A valid stream leaves exactly the final block and the signature,
        // and must have yielded at least the IV before them.
        if self.buf.len() != HOLDBACK {
            return Err(CryptoError::Length(ct_len));
        }
        let Some(mut dec) = self.dec.take() else {
            return Err(CryptoError::Length(ct_len));
        };

        let mut block = GenericArray::clone_from_slice(&self.buf[..BLOCK_SIZE]);
        dec.decrypt_block_mut(&mut block);
        let pad = block[BLOCK_SIZE - 1] as usize;
        if pad == 0 || pad > BLOCK_SIZE || block[BLOCK_SIZE - pad..].iter().any(|&b| b != pad as u8)
        {
            return Err(CryptoError::Padding);
        }
        let plain = &block[..BLOCK_SIZE - pad];
        mac.update(plain);
        self.out.extend_from_slice(plain);

        let sig = &self.buf[BLOCK_SIZE..HOLDBACK];
        mac.verify_slice(sig).map_err(|_| CryptoError::Signature)?;
        self.buf.clear();
        Ok(())
    }

    fn read(&mut self, out: &mut [u8]) -> usize {
        drain(&mut self.out, &mut self.read_pos, out)
    }
}

fn drain(src: &mut Vec<u8>, pos: &mut usize, out: &mut [u8]) -> usize {
    let n = out.len().min(src.len() - *pos);
    out[..n].copy_from_slice(&src[*pos..*pos + n]);
    *pos += n;
    if *pos == src.len() {
        src.clear();
        *pos = 0;
    }
    n
}
