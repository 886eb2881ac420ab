//! Error types for silvercrest-core.
//!
//! Codec failures, timeouts and socket failures are kept apart so callers can
//! log what went wrong, even though a command exchange treats all of them as
//! "no reliable result".

use thiserror::Error;

/// Error type for silvercrest-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Decrypted plaintext is too short to hold the frame header.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Datagram does not have the envelope layout.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Ciphertext was rejected by the cipher.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Plaintext frame cannot be encrypted without padding.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Reply payload is too short for the layout it announces.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// No reply arrived within the bounded wait.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Socket bind, connect, send or receive failed.
    #[error("network error: {0}")]
    Network(String),
}

impl Error {
    /// Returns true when the error means the device gave no usable answer.
    ///
    /// Garbled replies and missing replies are indistinguishable to a caller
    /// deciding on device state; only local socket failures are excluded.
    pub fn is_no_response(&self) -> bool {
        !matches!(self, Error::Network(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Network(err.to_string())
    }
}
