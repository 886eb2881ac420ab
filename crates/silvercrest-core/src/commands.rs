//! Fixed command payloads of the known firmware dialect.
//!
//! Every payload is 9 bytes, so a command frame is exactly one cipher block.
//!
//! ```text
//! byte 0     operation (0x01 = set state, 0x02 = query state)
//! bytes 1-4  state masks
//! bytes 5-8  trailer 04 04 04 04, required verbatim by the firmware
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Switch the relay on.
pub const RELAY_ON: [u8; 9] = [0x01, 0x00, 0x00, 0xFF, 0xFF, 0x04, 0x04, 0x04, 0x04];

/// Switch the relay off.
pub const RELAY_OFF: [u8; 9] = [0x01, 0x00, 0x00, 0x00, 0xFF, 0x04, 0x04, 0x04, 0x04];

/// Ask for the relay state.
pub const QUERY: [u8; 9] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x04, 0x04, 0x04, 0x04];

/// Discovery search, `0x23` variant.
pub const SEARCH: [u8; 9] = [0x23, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02, 0x02];

/// Discovery search, `0x25` variant seen in some firmware builds.
pub const SEARCH_ALT: [u8; 9] = [0x25, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x02, 0x02];

/// Operations a plug accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    On,
    Off,
    Query,
}

impl Command {
    /// The payload sent for this command.
    pub fn payload(&self) -> &'static [u8; 9] {
        match self {
            Command::On => &RELAY_ON,
            Command::Off => &RELAY_OFF,
            Command::Query => &QUERY,
        }
    }

    /// Whether the command changes the relay.
    pub fn is_set(&self) -> bool {
        matches!(self, Command::On | Command::Off)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::On => write!(f, "on"),
            Command::Off => write!(f, "off"),
            Command::Query => write!(f, "query"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_match_firmware_dialect() {
        assert_eq!(hex::encode(Command::On.payload()), "010000ffff04040404");
        assert_eq!(hex::encode(Command::Off.payload()), "01000000ff04040404");
        assert_eq!(hex::encode(Command::Query.payload()), "020000000004040404");
    }

    #[test]
    fn test_set_commands() {
        assert!(Command::On.is_set());
        assert!(Command::Off.is_set());
        assert!(!Command::Query.is_set());
    }

    #[test]
    fn test_search_variants_differ_only_in_marker() {
        assert_eq!(SEARCH[0], 0x23);
        assert_eq!(SEARCH_ALT[0], 0x25);
        assert_eq!(SEARCH[1..], SEARCH_ALT[1..]);
    }
}
