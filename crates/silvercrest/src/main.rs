mod cli;
mod handlers;
mod utils;

use clap::Parser;

use cli::{Cli, Command};
use handlers::{handle_broadcast, handle_device, handle_discover};
use utils::build_cipher;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let cipher = build_cipher(cli.key, cli.iv);

    match cli.command {
        Command::Version => {
            println!("silvercrest {}", env!("CARGO_PKG_VERSION"));
            println!("silvercrest-core {}", silvercrest_core::VERSION);
        }

        Command::Discover {
            timeout,
            marker,
            port,
        } => handle_discover(timeout, marker.into(), port, cipher).await,

        Command::Device {
            target,
            port,
            timeout,
            local_port,
            mac,
            locked,
            command,
        } => {
            handle_device(
                target, port, timeout, local_port, mac, locked, cipher, command,
            )
            .await
        }

        Command::Broadcast {
            discovery_timeout,
            timeout,
            local_port,
            marker,
            command,
        } => {
            handle_broadcast(
                discovery_timeout,
                timeout,
                local_port,
                marker.into(),
                cipher,
                command,
            )
            .await
        }
    }
}
