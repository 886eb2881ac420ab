use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use serde::Serialize;
use silvercrest_core::{
    Command, DeviceConfig, DiscoveryConfig, DiscoveryMarker, EnvelopeCipher, Frame, LockStatus,
    MacAddress, RelayState, Transport, TransportExt, UdpTransport, discover_with,
    send_to_devices,
};
use tracing::{debug, error};

use crate::cli::{BroadcastCommand, DeviceCommand};
use crate::utils::{parse_hex_payload, print_json};

#[derive(Serialize)]
struct SetOutput<'a> {
    host: &'a str,
    command: Command,
    success: bool,
}

#[derive(Serialize)]
struct StateOutput<'a> {
    host: &'a str,
    state: RelayState,
}

/// Handle the discover command.
pub async fn handle_discover(
    timeout: Duration,
    marker: DiscoveryMarker,
    port: u16,
    cipher: EnvelopeCipher,
) {
    let config = DiscoveryConfig::new()
        .with_timeout(timeout)
        .with_marker(marker)
        .with_bind_addr(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .with_target(SocketAddr::from((Ipv4Addr::BROADCAST, port)))
        .with_cipher(cipher);

    match discover_with(&config).await {
        Ok(devices) => {
            debug!(device_count = devices.len(), "discovered devices");
            print_json(&devices);
        }
        Err(e) => {
            error!(error = %e, "discovery failed");
            eprintln!("Error: Discovery failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle the device command.
#[allow(clippy::too_many_arguments)]
pub async fn handle_device(
    target: String,
    port: u16,
    timeout: Duration,
    local_port: u16,
    mac: Option<MacAddress>,
    locked: bool,
    cipher: EnvelopeCipher,
    command: DeviceCommand,
) {
    let mut config = DeviceConfig::new(&target)
        .with_port(port)
        .with_timeout(timeout)
        .with_local_port(local_port)
        .with_cipher(cipher);
    if let Some(mac) = mac {
        config = config.with_mac(mac);
    }
    if locked {
        config = config.with_lock_status(LockStatus::Locked);
    }
    let transport = UdpTransport::new(config);

    match command {
        DeviceCommand::On => set_relay(&transport, &target, Command::On).await,
        DeviceCommand::Off => set_relay(&transport, &target, Command::Off).await,
        DeviceCommand::State => {
            let state = transport.query_state().await;
            print_json(&StateOutput {
                host: &target,
                state,
            });
            if !state.is_known() {
                std::process::exit(1);
            }
        }
        DeviceCommand::Raw { payload } => {
            let bytes = match parse_hex_payload(&payload) {
                Ok(b) => b,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            let padded = Frame::new(bytes).padded().payload;
            debug!(payload = %hex::encode(&padded), "sending raw payload");

            match transport.exchange(&padded).await {
                Ok(reply) => println!("{}", hex::encode(reply)),
                Err(e) => {
                    error!(host = %target, port, error = %e, "raw command failed");
                    eprintln!("Error: Command failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

async fn set_relay(transport: &UdpTransport, target: &str, command: Command) {
    let success = match transport.send_command(command).await {
        Ok(_) => true,
        Err(e) => {
            error!(host = %target, %command, error = %e, "command not acknowledged");
            false
        }
    };

    print_json(&SetOutput {
        host: target,
        command,
        success,
    });
    if !success {
        std::process::exit(1);
    }
}

/// Handle the broadcast command.
pub async fn handle_broadcast(
    discovery_timeout: Duration,
    timeout: Duration,
    local_port: u16,
    marker: DiscoveryMarker,
    cipher: EnvelopeCipher,
    command: BroadcastCommand,
) {
    let command = command.to_command();
    debug!(%command, "broadcasting command");

    let config = DiscoveryConfig::new()
        .with_timeout(discovery_timeout)
        .with_marker(marker)
        .with_cipher(cipher.clone());

    let devices = match discover_with(&config).await {
        Ok(devices) => devices,
        Err(e) => {
            error!(error = %e, "broadcast failed");
            eprintln!("Error: Broadcast failed: {}", e);
            std::process::exit(1);
        }
    };

    let template = DeviceConfig::new(Ipv4Addr::UNSPECIFIED.to_string())
        .with_timeout(timeout)
        .with_local_port(local_port)
        .with_cipher(cipher);
    let results = send_to_devices(&devices, &template, command).await;
    print_json(&results);
}
