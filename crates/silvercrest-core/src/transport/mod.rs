//! Transport layer for exchanging commands with a plug.
//!
//! - [`UdpTransport`]: one encrypted datagram out, at most one back, over a
//!   fresh socket per exchange
//!
//! [`TransportExt`] layers the on/off/query operations on top of any
//! [`Transport`].

pub mod udp;

pub use udp::UdpTransport;

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::{
    DEFAULT_PORT,
    commands::Command,
    crypto::EnvelopeCipher,
    envelope::LockStatus,
    error::Error,
    frame::UNTRACKED_SEQUENCE,
    mac::MacAddress,
    response::RelayState,
};

/// Default wait for a command reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration for talking to one plug.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// The device hostname or IP address.
    pub host: String,
    /// Remote UDP port.
    pub port: u16,
    /// How long to wait for the reply.
    pub timeout: Duration,
    /// Local port to bind; 0 picks an ephemeral port.
    pub local_port: u16,
    /// Cipher for the envelope body.
    pub cipher: EnvelopeCipher,
    /// Frame sequence number.
    pub sequence: u16,
    /// Destination MAC written into the envelope.
    pub mac: MacAddress,
    /// Lock status written into the envelope.
    pub lock_status: LockStatus,
}

impl DeviceConfig {
    /// Creates a configuration with the protocol defaults.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            local_port: 0,
            cipher: EnvelopeCipher::default(),
            sequence: UNTRACKED_SEQUENCE,
            mac: MacAddress::BROADCAST,
            lock_status: LockStatus::Open,
        }
    }

    /// Copies this configuration for another host.
    pub fn for_host(&self, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..self.clone()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Binds the local socket to a fixed port.
    ///
    /// Some firmware only answers to the protocol port; pass
    /// [`DEFAULT_PORT`] for those devices.
    pub fn with_local_port(mut self, local_port: u16) -> Self {
        self.local_port = local_port;
        self
    }

    pub fn with_cipher(mut self, cipher: EnvelopeCipher) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_sequence(mut self, sequence: u16) -> Self {
        self.sequence = sequence;
        self
    }

    /// Addresses a specific plug instead of the broadcast MAC.
    pub fn with_mac(mut self, mac: MacAddress) -> Self {
        self.mac = mac;
        self
    }

    pub fn with_lock_status(mut self, lock_status: LockStatus) -> Self {
        self.lock_status = lock_status;
        self
    }
}

/// A request/response channel to a single plug.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a command payload and returns the reply payload.
    async fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, Error>;

    /// The device host.
    fn host(&self) -> &str;

    /// The device port.
    fn port(&self) -> u16;
}

/// Relay operations available on every [`Transport`].
///
/// # Example
///
/// ```no_run
/// use silvercrest_core::transport::{DeviceConfig, TransportExt, UdpTransport};
///
/// #[tokio::main]
/// async fn main() {
///     let plug = UdpTransport::new(DeviceConfig::new("192.168.1.50"));
///     if plug.turn_on().await.is_ok() {
///         println!("now {}", plug.query_state().await);
///     }
/// }
/// ```
#[async_trait]
pub trait TransportExt: Transport {
    /// Sends a command and returns the relay state it implies.
    ///
    /// Set commands succeed on any non-empty reply. A query succeeds only
    /// when the reply carries a status byte.
    async fn send_command(&self, command: Command) -> Result<RelayState, Error>;

    /// Switches the relay on; `Ok` means the device acknowledged.
    async fn turn_on(&self) -> Result<(), Error>;

    /// Switches the relay off; `Ok` means the device acknowledged.
    async fn turn_off(&self) -> Result<(), Error>;

    /// Reads the relay state, reporting `Unknown` on any failure.
    async fn query_state(&self) -> RelayState;
}

#[async_trait]
impl<T: Transport + ?Sized> TransportExt for T {
    async fn send_command(&self, command: Command) -> Result<RelayState, Error> {
        let reply = self.exchange(command.payload()).await?;

        match command {
            Command::On | Command::Off if reply.is_empty() => Err(Error::MalformedResponse(
                format!("empty acknowledgement for {}", command),
            )),
            Command::On => Ok(RelayState::On),
            Command::Off => Ok(RelayState::Off),
            Command::Query => match RelayState::from_reply(&reply) {
                RelayState::Unknown => Err(Error::MalformedResponse(format!(
                    "status reply of {} bytes",
                    reply.len()
                ))),
                state => Ok(state),
            },
        }
    }

    async fn turn_on(&self) -> Result<(), Error> {
        self.send_command(Command::On).await.map(|_| ())
    }

    async fn turn_off(&self) -> Result<(), Error> {
        self.send_command(Command::Off).await.map(|_| ())
    }

    async fn query_state(&self) -> RelayState {
        match self.send_command(Command::Query).await {
            Ok(state) => state,
            Err(e) => {
                debug!(host = %self.host(), port = self.port(), error = %e, "state unknown");
                RelayState::Unknown
            }
        }
    }
}
