//! Broadcast discovery of Silvercrest plugs.
//!
//! A single search envelope is broadcast to the protocol port, then every
//! datagram arriving within a fixed window is decoded. Replies tagged
//! [`LockStatus::Response`] whose payload starts with the search marker are
//! parsed into [`DiscoveredDevice`]s:
//!
//! ```text
//! 0x23 | ip (4) | mac (6) | key_len (1) | key (key_len)
//! ```
//!
//! The listening socket also sees unrelated broadcast traffic (including
//! our own request), so anything that fails to decode is skipped.
//!
//! Two firmware generations disagree on the search marker (`0x23` and
//! `0x25`). Both are available through [`DiscoveryMarker`]; a window with no
//! replies logs a warning naming the other variant.

use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::{net::UdpSocket, time::timeout};
use tracing::{debug, warn};

use crate::{
    DEFAULT_PORT, commands,
    crypto::EnvelopeCipher,
    envelope::{self, Envelope, LockStatus},
    error::Error,
    mac::MacAddress,
};

/// Default listening window.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// First byte of a search reply payload.
pub const SEARCH_RESPONSE_PREFIX: u8 = 0x23;

/// Fixed bytes of a search reply before the key: prefix, IP, MAC, key length.
const SEARCH_RESPONSE_HEADER_LEN: usize = 12;

const RECV_BUFFER_SIZE: usize = 1024;

/// Which search command variant to broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryMarker {
    /// `0x23`, the variant the standalone discovery tool uses.
    #[default]
    Search,
    /// `0x25`, the variant some integration builds send.
    SearchAlt,
}

impl DiscoveryMarker {
    pub fn byte(&self) -> u8 {
        self.payload()[0]
    }

    pub fn payload(&self) -> &'static [u8; 9] {
        match self {
            DiscoveryMarker::Search => &commands::SEARCH,
            DiscoveryMarker::SearchAlt => &commands::SEARCH_ALT,
        }
    }

    /// The variant to suggest when this one gets no answer.
    pub fn other(&self) -> Self {
        match self {
            DiscoveryMarker::Search => DiscoveryMarker::SearchAlt,
            DiscoveryMarker::SearchAlt => DiscoveryMarker::Search,
        }
    }
}

impl fmt::Display for DiscoveryMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.byte())
    }
}

/// A plug that answered the search broadcast.
///
/// `key` is the per-device key material from the reply. Command exchanges
/// still use the shared cipher; the key is reported for callers that store it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// IP address the device reports for itself.
    pub ip: Ipv4Addr,
    /// MAC address the device reports for itself.
    pub mac: MacAddress,
    /// Device key, hex-encoded when serialized.
    #[serde(with = "hex_key")]
    pub key: Vec<u8>,
}

mod hex_key {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(key: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(key))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

/// Discovery settings.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Listening window.
    pub timeout: Duration,
    /// Search command variant.
    pub marker: DiscoveryMarker,
    /// Local address to listen on.
    pub bind_addr: SocketAddr,
    /// Where the search is sent.
    pub target: SocketAddr,
    /// Cipher for the envelope body.
    pub cipher: EnvelopeCipher,
}

impl DiscoveryConfig {
    /// Listens on the protocol port and broadcasts to the local subnet.
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
            marker: DiscoveryMarker::default(),
            bind_addr: (Ipv4Addr::UNSPECIFIED, DEFAULT_PORT).into(),
            target: (Ipv4Addr::BROADCAST, DEFAULT_PORT).into(),
            cipher: EnvelopeCipher::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_marker(mut self, marker: DiscoveryMarker) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    pub fn with_cipher(mut self, cipher: EnvelopeCipher) -> Self {
        self.cipher = cipher;
        self
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses the payload of a search reply.
///
/// The prefix byte is not checked here; see [`discover_with`] for which
/// prefixes are accepted. Bytes after the key (cipher padding) are ignored.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if the payload is shorter than its
/// header or than the key length it announces.
pub fn parse_search_response(payload: &[u8]) -> Result<DiscoveredDevice, Error> {
    if payload.len() < SEARCH_RESPONSE_HEADER_LEN {
        return Err(Error::MalformedResponse(format!(
            "search reply of {} bytes, need at least {}",
            payload.len(),
            SEARCH_RESPONSE_HEADER_LEN
        )));
    }

    let ip = Ipv4Addr::new(payload[1], payload[2], payload[3], payload[4]);

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&payload[5..11]);

    let key_len = payload[11] as usize;
    let key = payload
        .get(SEARCH_RESPONSE_HEADER_LEN..SEARCH_RESPONSE_HEADER_LEN + key_len)
        .ok_or_else(|| {
            Error::MalformedResponse(format!(
                "key length {} exceeds the {} bytes available",
                key_len,
                payload.len() - SEARCH_RESPONSE_HEADER_LEN
            ))
        })?;

    Ok(DiscoveredDevice {
        ip,
        mac: MacAddress(mac),
        key: key.to_vec(),
    })
}

/// Decodes one datagram received during discovery.
///
/// `Ok(None)` means a well-formed envelope that is not a search reply.
fn parse_discovery_reply(
    data: &[u8],
    config: &DiscoveryConfig,
) -> Result<Option<DiscoveredDevice>, Error> {
    let envelope = Envelope::decode(data, &config.cipher)?;
    if envelope.lock_status != LockStatus::Response {
        return Ok(None);
    }

    match envelope.frame.payload.first() {
        Some(&prefix) if prefix == SEARCH_RESPONSE_PREFIX || prefix == config.marker.byte() => {
            parse_search_response(&envelope.frame.payload).map(Some)
        }
        _ => Ok(None),
    }
}

/// Whether a datagram has the envelope shape: marker, header and a length
/// byte that fits the datagram.
fn looks_like_envelope(data: &[u8]) -> bool {
    data.len() > envelope::HEADER_LEN
        && data[0] == envelope::ENVELOPE_MARKER
        && data[8] as usize <= data.len() - envelope::HEADER_LEN
}

/// Discovers plugs using the default configuration and the given window.
///
/// # Example
///
/// ```no_run
/// use silvercrest_core::{discover, DEFAULT_DISCOVERY_TIMEOUT};
///
/// #[tokio::main]
/// async fn main() -> Result<(), silvercrest_core::Error> {
///     for device in discover(DEFAULT_DISCOVERY_TIMEOUT).await? {
///         println!("{} {}", device.ip, device.mac);
///     }
///     Ok(())
/// }
/// ```
pub async fn discover(discovery_timeout: Duration) -> Result<Vec<DiscoveredDevice>, Error> {
    discover_with(&DiscoveryConfig::new().with_timeout(discovery_timeout)).await
}

/// Broadcasts a search and collects replies until the window closes.
///
/// Duplicate replies are kept. An empty result is not an error.
///
/// # Errors
///
/// Receive errors are logged and listening continues. Only socket setup
/// and the initial send fail the call; see
/// [`Error::Network`] and [`Error::EncryptionFailed`].
pub async fn discover_with(config: &DiscoveryConfig) -> Result<Vec<DiscoveredDevice>, Error> {
    let request = Envelope::for_command(config.marker.payload()).encode(&config.cipher)?;

    let socket = UdpSocket::bind(config.bind_addr)
        .await
        .map_err(|e| Error::Network(format!("bind {} failed: {}", config.bind_addr, e)))?;
    socket.set_broadcast(true)?;

    debug!(to = %config.target, marker = %config.marker, "sending discovery broadcast");
    socket
        .send_to(&request, config.target)
        .await
        .map_err(|e| Error::Network(format!("send to {} failed: {}", config.target, e)))?;

    let mut devices = Vec::new();
    let mut buf = [0u8; RECV_BUFFER_SIZE];

    let deadline = tokio::time::Instant::now() + config.timeout;

    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            debug!("Discovery timeout reached");
            break;
        }

        match timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, addr))) => {
                debug!(from = %addr, bytes = n, "received datagram");
                match parse_discovery_reply(&buf[..n], config) {
                    Ok(Some(device)) => {
                        debug!(from = %addr, ip = %device.ip, mac = %device.mac, "found device");
                        devices.push(device);
                    }
                    Ok(None) => {}
                    Err(e) if looks_like_envelope(&buf[..n]) => {
                        warn!(from = %addr, error = %e, "undecodable envelope")
                    }
                    Err(e) => debug!(from = %addr, error = %e, "ignoring datagram"),
                }
            }
            // The window stays open; the deadline alone ends the loop.
            Ok(Err(e)) => debug!("Error receiving discovery response: {}", e),
            Err(_) => {
                debug!("Discovery timeout reached");
                break;
            }
        }
    }

    if devices.is_empty() {
        warn!(
            marker = %config.marker,
            "no plugs answered; firmware that ignores this search marker may answer {}",
            config.marker.other()
        );
    }

    debug!("Discovered {} devices", devices.len());
    Ok(devices)
}
