//! Inner command/response frame.
//!
//! This is the plaintext that travels inside an encrypted envelope.
//!
//! ```text
//! 0x00 | sequence (u16 BE) | vendor_id (u8) | device_type (u8) | auth_code (u16 BE) | payload
//! ```
//!
//! There is no length field: the enclosing envelope states how many
//! ciphertext bytes follow, and the payload runs to the end of the
//! decrypted plaintext.

use crate::{crypto::BLOCK_SIZE, error::Error};

/// Leading byte of every frame.
pub const FRAME_MARKER: u8 = 0x00;

/// Bytes before the payload.
pub const HEADER_LEN: usize = 7;

/// Vendor identifier understood by the known firmware.
pub const VENDOR_ID: u8 = 0xC1;

/// Device type identifier for the switchable plug.
pub const DEVICE_TYPE: u8 = 0x11;

/// Fixed authorization code of the protocol dialect.
pub const AUTH_CODE: u16 = 0x7150;

/// Sequence value meaning "not tracked".
pub const UNTRACKED_SEQUENCE: u16 = 0xFFFF;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u16,
    pub vendor_id: u8,
    pub device_type: u8,
    pub auth_code: u16,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame with the dialect's fixed header values and an
    /// untracked sequence number.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence: UNTRACKED_SEQUENCE,
            vendor_id: VENDOR_ID,
            device_type: DEVICE_TYPE,
            auth_code: AUTH_CODE,
            payload: payload.into(),
        }
    }

    /// Sets the sequence number.
    pub fn with_sequence(mut self, sequence: u16) -> Self {
        self.sequence = sequence;
        self
    }

    /// Serialized length: header plus payload.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.payload.len()
    }

    /// Zero-pads the payload so the encoded frame fills whole cipher blocks.
    ///
    /// The fixed 9-byte command payloads already produce a 16-byte frame and
    /// are returned unchanged.
    pub fn padded(mut self) -> Self {
        let remainder = self.encoded_len() % BLOCK_SIZE;
        if remainder != 0 {
            self.payload
                .resize(self.payload.len() + BLOCK_SIZE - remainder, 0);
        }
        self
    }

    /// Serializes the frame, big-endian.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.push(FRAME_MARKER);
        bytes.extend_from_slice(&self.sequence.to_be_bytes());
        bytes.push(self.vendor_id);
        bytes.push(self.device_type);
        bytes.extend_from_slice(&self.auth_code.to_be_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Parses a frame; everything after the header is payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if `data` is shorter than the header.
    pub fn decode(data: &[u8]) -> Result<Self, Error> {
        if data.len() < HEADER_LEN {
            return Err(Error::MalformedFrame(format!(
                "{} bytes, need at least {}",
                data.len(),
                HEADER_LEN
            )));
        }

        Ok(Self {
            sequence: u16::from_be_bytes([data[1], data[2]]),
            vendor_id: data[3],
            device_type: data[4],
            auth_code: u16::from_be_bytes([data[5], data[6]]),
            payload: data[HEADER_LEN..].to_vec(),
        })
    }
}
