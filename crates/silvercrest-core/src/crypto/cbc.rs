//! AES-128-CBC cipher for envelope bodies.
//!
//! Every plug shares one key and one IV, and the firmware applies no padding:
//! a frame must already span a whole number of 16-byte blocks. The fixed IV
//! makes encryption deterministic, so identical frames always produce
//! identical ciphertext.

use std::fmt;

use aes::Aes128;
use aes::cipher::{Block, BlockDecrypt, BlockEncrypt, KeyInit};

use crate::error::Error;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Key shared by all plugs running the known firmware.
pub const DEFAULT_KEY: [u8; 16] = *b"0123456789abcdef";

/// IV shared by all plugs running the known firmware.
pub const DEFAULT_IV: [u8; 16] = *b"0123456789abcdef";

/// AES-128-CBC with a fixed IV.
///
/// The cipher is immutable once built and can be shared freely between
/// concurrent exchanges.
///
/// # Example
///
/// ```
/// use silvercrest_core::crypto::EnvelopeCipher;
///
/// let cipher = EnvelopeCipher::default();
/// let ciphertext = cipher.encrypt(&[0u8; 16]).unwrap();
/// assert_eq!(cipher.decrypt(&ciphertext).unwrap(), vec![0u8; 16]);
/// ```
#[derive(Clone)]
pub struct EnvelopeCipher {
    cipher: Aes128,
    iv: [u8; BLOCK_SIZE],
}

impl EnvelopeCipher {
    /// Creates a cipher from a 16-byte key and IV.
    pub fn new(key: [u8; 16], iv: [u8; BLOCK_SIZE]) -> Self {
        Self {
            cipher: Aes128::new(&key.into()),
            iv,
        }
    }

    /// Encrypts a block-aligned plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EncryptionFailed`] if the plaintext is empty or its
    /// length is not a multiple of [`BLOCK_SIZE`].
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        if plaintext.is_empty() || plaintext.len() % BLOCK_SIZE != 0 {
            return Err(Error::EncryptionFailed(format!(
                "plaintext length {} is not a multiple of {}",
                plaintext.len(),
                BLOCK_SIZE
            )));
        }

        let mut data = plaintext.to_vec();
        let mut prev = self.iv;

        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            for (byte, chain) in chunk.iter_mut().zip(prev.iter()) {
                *byte ^= chain;
            }
            self.cipher.encrypt_block(Block::<Aes128>::from_mut_slice(chunk));
            prev.copy_from_slice(chunk);
        }

        Ok(data)
    }

    /// Decrypts a block-aligned ciphertext.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DecryptionFailed`] if the ciphertext is empty or its
    /// length is not a multiple of [`BLOCK_SIZE`].
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(Error::DecryptionFailed(format!(
                "ciphertext length {} is not a multiple of {}",
                ciphertext.len(),
                BLOCK_SIZE
            )));
        }

        let mut data = ciphertext.to_vec();
        let mut prev = self.iv;

        for chunk in data.chunks_exact_mut(BLOCK_SIZE) {
            let mut current = [0u8; BLOCK_SIZE];
            current.copy_from_slice(chunk);

            self.cipher.decrypt_block(Block::<Aes128>::from_mut_slice(chunk));
            for (byte, chain) in chunk.iter_mut().zip(prev.iter()) {
                *byte ^= chain;
            }
            prev = current;
        }

        Ok(data)
    }
}

impl Default for EnvelopeCipher {
    fn default() -> Self {
        Self::new(DEFAULT_KEY, DEFAULT_IV)
    }
}

// Keeps key material out of logs.
impl fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_hex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn test_fips197_single_block() {
        // CBC with a zero IV reduces to the raw block cipher for one block.
        let key: [u8; 16] = decode_hex("000102030405060708090a0b0c0d0e0f")
            .try_into()
            .unwrap();
        let cipher = EnvelopeCipher::new(key, [0u8; 16]);

        let ciphertext = cipher
            .encrypt(&decode_hex("00112233445566778899aabbccddeeff"))
            .unwrap();
        assert_eq!(hex::encode(ciphertext), "69c4e0d86a7b0430d8cdb78070b4c55a");
    }

    #[test]
    fn test_query_frame_known_ciphertext() {
        // 7-byte frame header followed by the 9-byte query payload
        let plaintext = decode_hex("00ffffc1117150020000000004040404");
        let ciphertext = EnvelopeCipher::default().encrypt(&plaintext).unwrap();
        assert_eq!(hex::encode(ciphertext), "98e6eaac14bdd3cfcebc486e7ad390ff");
    }

    #[test]
    fn test_roundtrip_multiple_blocks() {
        let cipher = EnvelopeCipher::default();
        let plaintext: Vec<u8> = (0u8..48).collect();
        let ciphertext = cipher.encrypt(&plaintext).unwrap();
        assert_eq!(ciphertext.len(), 48);
        assert_ne!(ciphertext, plaintext);
        assert_eq!(cipher.decrypt(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn test_encryption_is_deterministic() {
        let cipher = EnvelopeCipher::default();
        let plaintext = [0x42u8; 32];
        assert_eq!(
            cipher.encrypt(&plaintext).unwrap(),
            cipher.encrypt(&plaintext).unwrap()
        );
    }

    #[test]
    fn test_change_diverges_from_its_block_on() {
        let cipher = EnvelopeCipher::default();
        let a = [0x11u8; 48];

        // Last byte of block 0: every block diverges through chaining.
        let mut b = a;
        b[15] ^= 0x01;
        let ca = cipher.encrypt(&a).unwrap();
        let cb = cipher.encrypt(&b).unwrap();
        for block in 0..3 {
            let range = block * 16..(block + 1) * 16;
            assert_ne!(ca[range.clone()], cb[range]);
        }

        // Last byte of the message: earlier blocks are untouched.
        let mut c = a;
        c[47] ^= 0x01;
        let cc = cipher.encrypt(&c).unwrap();
        assert_eq!(ca[..32], cc[..32]);
        assert_ne!(ca[32..], cc[32..]);
    }

    #[test]
    fn test_unaligned_input_rejected() {
        let cipher = EnvelopeCipher::default();
        assert!(matches!(
            cipher.encrypt(&[0u8; 15]),
            Err(Error::EncryptionFailed(_))
        ));
        assert!(matches!(
            cipher.decrypt(&[0u8; 17]),
            Err(Error::DecryptionFailed(_))
        ));
        assert!(matches!(cipher.decrypt(&[]), Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_debug_hides_key() {
        let debug = format!("{:?}", EnvelopeCipher::default());
        assert!(!debug.contains("0123456789abcdef"));
    }
}
