//! Core library for controlling Silvercrest Wi-Fi smart plugs.
//!
//! The plugs speak a small UDP protocol on port 8530. Every command is a
//! short binary frame, encrypted with AES-128-CBC under a key and IV shared
//! by all devices, and wrapped in an envelope that carries the target MAC
//! and the ciphertext length.
//!
//! # Example
//!
//! ```no_run
//! use silvercrest_core::{RelayState, query_state, turn_on};
//!
//! #[tokio::main]
//! async fn main() {
//!     if turn_on("192.168.1.50").await {
//!         assert_eq!(query_state("192.168.1.50").await, RelayState::On);
//!     }
//! }
//! ```
//!
//! # Protocol Details
//!
//! 1. A 9-byte command payload goes into a frame:
//!    `00 | sequence | C1 | 11 | 71 50 | payload`
//! 2. The 16-byte frame is encrypted with AES-128-CBC, no padding
//! 3. The envelope `01 | lock_status | mac | len | ciphertext` is sent as
//!    one datagram
//! 4. The plug answers with an envelope tagged `0x42`; byte 3 of the reply
//!    payload is `0xFF` while the relay is on
//!
//! Discovery broadcasts a search command and collects replies carrying each
//! plug's IP, MAC and key; see [`discovery`].

pub mod commands;
pub mod crypto;
pub mod discovery;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod mac;
pub mod response;
pub mod transport;

#[cfg(test)]
mod testing;

use std::{net::Ipv4Addr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use commands::Command;
pub use crypto::EnvelopeCipher;
pub use discovery::{
    DEFAULT_DISCOVERY_TIMEOUT, DiscoveredDevice, DiscoveryConfig, DiscoveryMarker, discover,
    discover_with,
};
pub use envelope::{Envelope, LockStatus};
pub use error::Error;
pub use frame::Frame;
pub use mac::MacAddress;
pub use response::RelayState;
pub use transport::{DEFAULT_TIMEOUT, DeviceConfig, Transport, TransportExt, UdpTransport};

/// The version of the silvercrest-core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// UDP port the plugs listen on, for commands and discovery alike.
pub const DEFAULT_PORT: u16 = 8530;

/// Switches a plug on; `true` if it acknowledged.
pub async fn turn_on(host: &str) -> bool {
    set_relay(host, Command::On).await
}

/// Switches a plug off; `true` if it acknowledged.
pub async fn turn_off(host: &str) -> bool {
    set_relay(host, Command::Off).await
}

/// Reads a plug's relay state; `Unknown` if it did not answer usefully.
pub async fn query_state(host: &str) -> RelayState {
    UdpTransport::new(DeviceConfig::new(host)).query_state().await
}

async fn set_relay(host: &str, command: Command) -> bool {
    let transport = UdpTransport::new(DeviceConfig::new(host));
    match transport.send_command(command).await {
        Ok(_) => true,
        Err(e) => {
            debug!(host, %command, error = %e, "command not acknowledged");
            false
        }
    }
}

/// Result of a broadcast command to a single device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResult {
    /// IP address of the device.
    pub ip: Ipv4Addr,
    /// MAC address of the device.
    pub mac: MacAddress,
    /// Whether the device gave a usable answer.
    pub success: bool,
    /// Relay state after the command.
    pub state: RelayState,
    /// Error message (if failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Discovers plugs, then sends `command` to all of them concurrently.
///
/// # Example
///
/// ```no_run
/// use silvercrest_core::{Command, broadcast, DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_TIMEOUT};
///
/// #[tokio::main]
/// async fn main() -> Result<(), silvercrest_core::Error> {
///     for result in broadcast(DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_TIMEOUT, Command::Off).await? {
///         println!("{}: {}", result.ip, result.state);
///     }
///     Ok(())
/// }
/// ```
pub async fn broadcast(
    discovery_timeout: Duration,
    command_timeout: Duration,
    command: Command,
) -> Result<Vec<BroadcastResult>, Error> {
    let devices = discover(discovery_timeout).await?;
    debug!("Broadcasting {} to {} devices", command, devices.len());

    let template =
        DeviceConfig::new(Ipv4Addr::UNSPECIFIED.to_string()).with_timeout(command_timeout);
    Ok(send_to_devices(&devices, &template, command).await)
}

/// Sends `command` to each device at its reported IP.
///
/// Every exchange uses `template` with the host replaced by the device IP.
/// Exchanges run concurrently unless the template pins a local port, in
/// which case they run one after another so each can bind it.
pub async fn send_to_devices(
    devices: &[DiscoveredDevice],
    template: &DeviceConfig,
    command: Command,
) -> Vec<BroadcastResult> {
    if template.local_port == 0 {
        let futures = devices
            .iter()
            .map(|device| send_to_device(device, template, command));
        return futures::future::join_all(futures).await;
    }

    debug!(
        local_port = template.local_port,
        "fixed local port, sending sequentially"
    );
    let mut results = Vec::with_capacity(devices.len());
    for device in devices {
        results.push(send_to_device(device, template, command).await);
    }
    results
}

async fn send_to_device(
    device: &DiscoveredDevice,
    template: &DeviceConfig,
    command: Command,
) -> BroadcastResult {
    let transport = UdpTransport::new(template.for_host(device.ip.to_string()));

    match transport.send_command(command).await {
        Ok(state) => BroadcastResult {
            ip: device.ip,
            mac: device.mac,
            success: true,
            state,
            error: None,
        },
        Err(e) => BroadcastResult {
            ip: device.ip,
            mac: device.mac,
            success: false,
            state: RelayState::Unknown,
            error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakePlug;

    fn device(ip: Ipv4Addr, last: u8) -> DiscoveredDevice {
        DiscoveredDevice {
            ip,
            mac: MacAddress([0, 0, 0, 0, 0, last]),
            key: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_send_to_devices_reports_each_device() {
        let plug = FakePlug::spawn().await;
        let devices = vec![device(Ipv4Addr::LOCALHOST, 1)];

        let template = DeviceConfig::new("unused")
            .with_port(plug.addr.port())
            .with_timeout(Duration::from_millis(300));
        let results = send_to_devices(&devices, &template, Command::On).await;

        assert_eq!(results.len(), 1);
        assert!(results[0].success);
        assert_eq!(results[0].state, RelayState::On);
        assert_eq!(results[0].mac, devices[0].mac);
        assert!(results[0].error.is_none());
    }

    #[tokio::test]
    async fn test_send_to_devices_shares_fixed_local_port() {
        let plug = FakePlug::spawn().await;
        let devices: Vec<_> = (1..=3).map(|n| device(Ipv4Addr::LOCALHOST, n)).collect();

        let local_port = {
            let free = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
            free.local_addr().unwrap().port()
        };
        let template = DeviceConfig::new("unused")
            .with_port(plug.addr.port())
            .with_local_port(local_port)
            .with_timeout(Duration::from_millis(300));
        let results = send_to_devices(&devices, &template, Command::On).await;

        assert_eq!(results.len(), 3);
        for result in &results {
            assert!(result.success, "{:?}", result.error);
            assert_eq!(result.state, RelayState::On);
        }
        assert_eq!(plug.received.lock().await.len(), 3);
    }

    #[tokio::test]
    async fn test_send_to_devices_marks_failures() {
        let silent = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let devices = vec![device(Ipv4Addr::LOCALHOST, 2)];

        let template = DeviceConfig::new("unused")
            .with_port(silent.local_addr().unwrap().port())
            .with_timeout(Duration::from_millis(100));
        let results = send_to_devices(&devices, &template, Command::Query).await;

        assert!(!results[0].success);
        assert_eq!(results[0].state, RelayState::Unknown);
        assert!(results[0].error.as_deref().unwrap().contains("timeout"));
    }

    #[test]
    fn test_broadcast_result_json() {
        let result = BroadcastResult {
            ip: Ipv4Addr::new(10, 0, 0, 9),
            mac: MacAddress([0xAA; 6]),
            success: true,
            state: RelayState::Off,
            error: None,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["state"], "off");
        assert!(json.get("error").is_none());
    }
}
