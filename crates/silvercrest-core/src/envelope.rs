//! Outer envelope around an encrypted frame.
//!
//! ```text
//! 0x01 | lock_status (u8) | mac (6 bytes) | body_len (u8) | AES-128-CBC(frame)
//! ```
//!
//! A UDP read fills a buffer larger than the message, so the explicit body
//! length is what tells the receiver where the ciphertext ends.

use std::fmt;

use crate::{crypto::EnvelopeCipher, error::Error, frame::Frame, mac::MacAddress};

/// Leading byte of every envelope.
pub const ENVELOPE_MARKER: u8 = 0x01;

/// Bytes before the ciphertext.
pub const HEADER_LEN: usize = 9;

/// Largest body the one-byte length prefix can describe.
pub const MAX_BODY_LEN: usize = u8::MAX as usize;

/// Request/reply discriminator carried in the envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum LockStatus {
    /// Outbound request to an unlocked device.
    #[default]
    Open = 0x40,
    /// Outbound request to a locked device.
    Locked = 0x44,
    /// Inbound reply.
    Response = 0x42,
}

impl From<LockStatus> for u8 {
    fn from(status: LockStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for LockStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x40 => Ok(LockStatus::Open),
            0x44 => Ok(LockStatus::Locked),
            0x42 => Ok(LockStatus::Response),
            other => Err(Error::MalformedEnvelope(format!(
                "unknown lock status 0x{:02x}",
                other
            ))),
        }
    }
}

impl fmt::Display for LockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockStatus::Open => write!(f, "open"),
            LockStatus::Locked => write!(f, "locked"),
            LockStatus::Response => write!(f, "response"),
        }
    }
}

/// A frame addressed to (or received from) one plug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub lock_status: LockStatus,
    pub mac: MacAddress,
    pub frame: Frame,
}

impl Envelope {
    /// Wraps a frame as an unaddressed, open request.
    pub fn new(frame: Frame) -> Self {
        Self {
            lock_status: LockStatus::Open,
            mac: MacAddress::BROADCAST,
            frame,
        }
    }

    /// Builds the request for a raw command payload.
    pub fn for_command(payload: &[u8]) -> Self {
        Self::new(Frame::new(payload.to_vec()))
    }

    pub fn with_lock_status(mut self, lock_status: LockStatus) -> Self {
        self.lock_status = lock_status;
        self
    }

    pub fn with_mac(mut self, mac: MacAddress) -> Self {
        self.mac = mac;
        self
    }

    /// Encrypts the frame and serializes the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EncryptionFailed`] if the encoded frame is not
    /// block-aligned (see [`Frame::padded`]) or the ciphertext does not fit
    /// the one-byte length prefix.
    pub fn encode(&self, cipher: &EnvelopeCipher) -> Result<Vec<u8>, Error> {
        let body = cipher.encrypt(&self.frame.encode())?;
        if body.len() > MAX_BODY_LEN {
            return Err(Error::EncryptionFailed(format!(
                "body of {} bytes exceeds {}",
                body.len(),
                MAX_BODY_LEN
            )));
        }

        let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
        bytes.push(ENVELOPE_MARKER);
        bytes.push(self.lock_status.into());
        bytes.extend_from_slice(&self.mac.octets());
        bytes.push(body.len() as u8);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }

    /// Parses a datagram and decrypts the frame inside it.
    ///
    /// Bytes beyond the announced body length are ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::MalformedEnvelope`] for a short header, wrong marker,
    ///   unknown lock status, or a length byte past the end of `data`
    /// - [`Error::DecryptionFailed`] if the body is not block-aligned
    /// - [`Error::MalformedFrame`] if the plaintext is shorter than a frame header
    pub fn decode(data: &[u8], cipher: &EnvelopeCipher) -> Result<Self, Error> {
        if data.len() < HEADER_LEN {
            return Err(Error::MalformedEnvelope(format!(
                "{} bytes, need at least {}",
                data.len(),
                HEADER_LEN
            )));
        }

        if data[0] != ENVELOPE_MARKER {
            return Err(Error::MalformedEnvelope(format!(
                "unexpected marker 0x{:02x}",
                data[0]
            )));
        }

        let lock_status = LockStatus::try_from(data[1])?;

        let mut mac = [0u8; 6];
        mac.copy_from_slice(&data[2..8]);

        let body_len = data[8] as usize;
        let body = data.get(HEADER_LEN..HEADER_LEN + body_len).ok_or_else(|| {
            Error::MalformedEnvelope(format!(
                "body length {} exceeds the {} bytes received",
                body_len,
                data.len() - HEADER_LEN
            ))
        })?;

        let plaintext = cipher.decrypt(body)?;
        let frame = Frame::decode(&plaintext)?;

        Ok(Self {
            lock_status,
            mac: MacAddress(mac),
            frame,
        })
    }
}
