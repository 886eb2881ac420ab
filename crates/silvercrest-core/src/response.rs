//! Interpretation of device replies.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of the relay status byte in a reply payload.
pub const STATE_BYTE_INDEX: usize = 3;

/// Status byte value reported while the relay is energized.
pub const STATE_ON: u8 = 0xFF;

/// Relay state as far as the caller can tell.
///
/// `Unknown` means no reliable reply was obtained. It must never be read as
/// "off".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    On,
    Off,
    #[default]
    Unknown,
}

impl RelayState {
    /// Classifies a reply payload by its status byte.
    ///
    /// ```
    /// use silvercrest_core::RelayState;
    ///
    /// assert_eq!(RelayState::from_reply(&[0x01, 0x00, 0x00, 0xFF]), RelayState::On);
    /// assert_eq!(RelayState::from_reply(&[0x01, 0x00, 0x00, 0x00]), RelayState::Off);
    /// assert_eq!(RelayState::from_reply(&[0x01]), RelayState::Unknown);
    /// ```
    pub fn from_reply(payload: &[u8]) -> Self {
        match payload.get(STATE_BYTE_INDEX) {
            Some(&STATE_ON) => RelayState::On,
            Some(_) => RelayState::Off,
            None => RelayState::Unknown,
        }
    }

    pub fn is_on(&self) -> bool {
        *self == RelayState::On
    }

    pub fn is_known(&self) -> bool {
        *self != RelayState::Unknown
    }

    /// `Some(true)` for on, `Some(false)` for off, `None` when unknown.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            RelayState::On => Some(true),
            RelayState::Off => Some(false),
            RelayState::Unknown => None,
        }
    }
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        if on { RelayState::On } else { RelayState::Off }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::On => write!(f, "on"),
            RelayState::Off => write!(f, "off"),
            RelayState::Unknown => write!(f, "unknown"),
        }
    }
}
