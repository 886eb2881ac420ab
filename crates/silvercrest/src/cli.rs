use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use silvercrest_core::{Command as PlugCommand, DEFAULT_PORT, DiscoveryMarker, MacAddress};

use crate::utils::parse_key;

pub fn parse_millis(arg: &str) -> Result<Duration, std::num::ParseIntError> {
    let millis = arg.parse()?;
    Ok(Duration::from_millis(millis))
}

/// Silvercrest Wi-Fi Smart Plug client
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// AES key: 16 ASCII characters or 32 hex digits.
    /// Defaults to the key shared by all plugs on the known firmware.
    #[arg(long, global = true, env = "SILVERCREST_AES_KEY", value_parser = parse_key, hide_env_values = true)]
    pub key: Option<[u8; 16]>,

    /// AES IV: 16 ASCII characters or 32 hex digits.
    #[arg(long, global = true, env = "SILVERCREST_AES_IV", value_parser = parse_key, hide_env_values = true)]
    pub iv: Option<[u8; 16]>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Discover plugs on the local network
    Discover {
        /// Listening window in milliseconds
        #[arg(long, value_parser = parse_millis, default_value = "3000")]
        timeout: Duration,

        /// Search command variant to broadcast
        #[arg(long, value_enum, default_value_t = Marker::Search)]
        marker: Marker,

        /// Protocol port to listen on and broadcast to
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Show version information for CLI and core library
    Version,

    /// Send a command to a specific plug
    Device {
        /// Target hostname or IP address
        target: String,

        /// Target port
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Reply timeout in milliseconds
        #[arg(long, value_parser = parse_millis, default_value = "500")]
        timeout: Duration,

        /// Local port to send from (0 = ephemeral).
        /// Some firmware only answers requests sent from port 8530.
        #[arg(long, default_value_t = 0)]
        local_port: u16,

        /// Address the plug by MAC instead of the broadcast MAC
        #[arg(long)]
        mac: Option<MacAddress>,

        /// Mark the request as addressed to a locked plug
        #[arg(long)]
        locked: bool,

        #[command(subcommand)]
        command: DeviceCommand,
    },

    /// Discover plugs, then send a command to all of them
    Broadcast {
        /// Discovery window in milliseconds
        #[arg(long, value_parser = parse_millis, default_value = "3000")]
        discovery_timeout: Duration,

        /// Reply timeout in milliseconds (per plug)
        #[arg(long, value_parser = parse_millis, default_value = "500")]
        timeout: Duration,

        /// Local port to send from (0 = ephemeral).
        /// A fixed port makes plugs be contacted one at a time.
        #[arg(long, default_value_t = 0)]
        local_port: u16,

        /// Search command variant to broadcast
        #[arg(long, value_enum, default_value_t = Marker::Search)]
        marker: Marker,

        #[command(subcommand)]
        command: BroadcastCommand,
    },
}

/// Commands available for single plug operations
#[derive(Subcommand)]
pub enum DeviceCommand {
    /// Turn relay on
    On,
    /// Turn relay off
    Off,
    /// Query relay state
    State,
    /// Send a raw command payload and print the reply payload
    Raw {
        /// Payload as hex, e.g. "020000000004040404"
        payload: String,
    },
}

/// Commands available for broadcast operations.
#[derive(Subcommand)]
pub enum BroadcastCommand {
    /// Turn relay on on all plugs
    On,
    /// Turn relay off on all plugs
    Off,
    /// Query relay state of all plugs
    State,
}

/// Search command variant.
#[derive(Clone, Copy, ValueEnum)]
pub enum Marker {
    /// 0x23
    Search,
    /// 0x25
    SearchAlt,
}

impl From<Marker> for DiscoveryMarker {
    fn from(marker: Marker) -> Self {
        match marker {
            Marker::Search => DiscoveryMarker::Search,
            Marker::SearchAlt => DiscoveryMarker::SearchAlt,
        }
    }
}

impl BroadcastCommand {
    pub fn to_command(&self) -> PlugCommand {
        match self {
            BroadcastCommand::On => PlugCommand::On,
            BroadcastCommand::Off => PlugCommand::Off,
            BroadcastCommand::State => PlugCommand::Query,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_device_on() {
        let cli = Cli::try_parse_from(["silvercrest", "device", "10.0.0.5", "--timeout", "250", "on"])
            .unwrap();
        match cli.command {
            Command::Device {
                target,
                port,
                timeout,
                local_port,
                command: DeviceCommand::On,
                ..
            } => {
                assert_eq!(target, "10.0.0.5");
                assert_eq!(port, 8530);
                assert_eq!(timeout, Duration::from_millis(250));
                assert_eq!(local_port, 0);
            }
            _ => panic!("expected device on"),
        }
    }

    #[test]
    fn test_parse_discover_alt_marker() {
        let cli = Cli::try_parse_from(["silvercrest", "discover", "--marker", "search-alt"]).unwrap();
        match cli.command {
            Command::Discover { marker, timeout, .. } => {
                assert_eq!(DiscoveryMarker::from(marker), DiscoveryMarker::SearchAlt);
                assert_eq!(timeout, Duration::from_secs(3));
            }
            _ => panic!("expected discover"),
        }
    }

    #[test]
    fn test_parse_key_option() {
        let cli = Cli::try_parse_from([
            "silvercrest",
            "--key",
            "00112233445566778899aabbccddeeff",
            "version",
        ])
        .unwrap();
        assert_eq!(cli.key.unwrap()[1], 0x11);
    }

    #[test]
    fn test_parse_broadcast_local_port() {
        let cli =
            Cli::try_parse_from(["silvercrest", "broadcast", "--local-port", "8530", "off"]).unwrap();
        match cli.command {
            Command::Broadcast {
                local_port,
                command: BroadcastCommand::Off,
                ..
            } => assert_eq!(local_port, 8530),
            _ => panic!("expected broadcast off"),
        }
    }

    #[test]
    fn test_broadcast_state_is_query() {
        assert_eq!(BroadcastCommand::State.to_command(), PlugCommand::Query);
    }
}
