//! UDP transport for Silvercrest plugs.
//!
//! Each exchange binds its own socket, `connect()`s it to the plug so that
//! datagrams from other sources are dropped by the kernel, sends one
//! envelope and waits a bounded time for one reply. The socket is closed
//! when the exchange returns, whatever the outcome. Nothing is retried.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use async_trait::async_trait;
use tokio::{
    net::{UdpSocket, lookup_host},
    time::timeout,
};
use tracing::debug;

use crate::{
    envelope::{Envelope, LockStatus},
    error::Error,
    frame::Frame,
    transport::{DeviceConfig, Transport},
};

/// Read buffer size; replies are far smaller.
const RECV_BUFFER_SIZE: usize = 1024;

/// Transport using one UDP datagram per direction.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use silvercrest_core::{commands, transport::{DeviceConfig, Transport, UdpTransport}};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DeviceConfig::new("192.168.1.50").with_timeout(Duration::from_secs(1));
///     let transport = UdpTransport::new(config);
///     let reply = transport.exchange(&commands::QUERY).await?;
///     println!("{:02x?}", reply);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct UdpTransport {
    config: DeviceConfig,
}

impl UdpTransport {
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    async fn resolve(&self) -> Result<SocketAddr, Error> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        lookup_host(&addr)
            .await
            .map_err(|e| Error::Network(format!("could not resolve {}: {}", addr, e)))?
            .next()
            .ok_or_else(|| Error::Network(format!("no address for {}", addr)))
    }

    fn local_addr_for(&self, peer: &SocketAddr) -> SocketAddr {
        match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, self.config.local_port).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, self.config.local_port).into(),
        }
    }

    fn build_request(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let frame = Frame::new(payload.to_vec()).with_sequence(self.config.sequence);
        Envelope::new(frame)
            .with_lock_status(self.config.lock_status)
            .with_mac(self.config.mac)
            .encode(&self.config.cipher)
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn exchange(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let request = self.build_request(payload)?;
        let peer = self.resolve().await?;

        let socket = UdpSocket::bind(self.local_addr_for(&peer))
            .await
            .map_err(|e| Error::Network(format!("bind failed: {}", e)))?;
        socket
            .connect(peer)
            .await
            .map_err(|e| Error::Network(format!("connect to {} failed: {}", peer, e)))?;

        debug!(peer = %peer, bytes = request.len(), "sending request");
        socket
            .send(&request)
            .await
            .map_err(|e| Error::Network(format!("send to {} failed: {}", peer, e)))?;

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let n = timeout(self.config.timeout, socket.recv(&mut buf))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "no reply from {} within {:?}",
                    peer, self.config.timeout
                ))
            })?
            .map_err(|e| Error::Network(format!("receive from {} failed: {}", peer, e)))?;

        debug!(peer = %peer, bytes = n, "received reply");

        let reply = Envelope::decode(&buf[..n], &self.config.cipher)?;
        if reply.lock_status != LockStatus::Response {
            debug!(peer = %peer, lock_status = %reply.lock_status, "reply not tagged as response");
        }

        Ok(reply.frame.payload)
    }

    fn host(&self) -> &str {
        &self.config.host
    }

    fn port(&self) -> u16 {
        self.config.port
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        commands,
        response::RelayState,
        testing::{FakePlug, PLUG_MAC},
        transport::TransportExt,
    };

    #[tokio::test]
    async fn test_turn_on_then_query() {
        let plug = FakePlug::spawn().await;
        let transport = plug.transport();

        transport.turn_on().await.unwrap();
        assert_eq!(transport.query_state().await, RelayState::On);

        transport.turn_off().await.unwrap();
        assert_eq!(transport.query_state().await, RelayState::Off);
    }

    #[tokio::test]
    async fn test_request_envelope_on_the_wire() {
        let plug = FakePlug::spawn().await;
        plug.transport().turn_on().await.unwrap();

        let received = plug.received.lock().await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].lock_status, LockStatus::Open);
        assert!(received[0].mac.is_broadcast());
        assert_eq!(received[0].frame.sequence, 0xFFFF);
        assert_eq!(received[0].frame.payload, commands::RELAY_ON);
    }

    #[tokio::test]
    async fn test_turn_on_is_idempotent() {
        let plug = FakePlug::spawn().await;
        let transport = plug.transport();

        transport.turn_on().await.unwrap();
        transport.turn_on().await.unwrap();
        assert_eq!(transport.query_state().await, RelayState::On);
    }

    #[tokio::test]
    async fn test_exchange_returns_reply_payload() {
        let plug = FakePlug::spawn().await;
        let reply = plug.transport().exchange(&commands::RELAY_ON).await.unwrap();
        assert_eq!(reply, vec![0x01, 0x00, 0x00, 0xFF, 0xFF, 0x04, 0x04, 0x04, 0x04]);
    }

    #[tokio::test]
    async fn test_silent_device_times_out() {
        // Bound but never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::new(
            DeviceConfig::new("127.0.0.1")
                .with_port(silent.local_addr().unwrap().port())
                .with_timeout(Duration::from_millis(100)),
        );

        assert!(matches!(
            transport.exchange(&commands::QUERY).await,
            Err(Error::Timeout(_))
        ));
        assert_eq!(transport.query_state().await, RelayState::Unknown);
    }

    #[tokio::test]
    async fn test_garbled_reply_is_unknown() {
        let plug = FakePlug::spawn_with(|_| Some(b"garbage!garbage!".to_vec())).await;
        let transport = plug.transport();

        assert!(matches!(
            transport.exchange(&commands::QUERY).await,
            Err(Error::MalformedEnvelope(_))
        ));
        assert_eq!(transport.query_state().await, RelayState::Unknown);
    }

    #[tokio::test]
    async fn test_empty_body_reply_is_unknown() {
        let plug = FakePlug::spawn_with(|_| {
            let mut bytes = vec![0x01, 0x42];
            bytes.extend_from_slice(&PLUG_MAC.octets());
            bytes.push(0x00);
            Some(bytes)
        })
        .await;
        let transport = plug.transport();

        assert!(matches!(
            transport.exchange(&commands::QUERY).await,
            Err(Error::DecryptionFailed(_))
        ));
        assert_eq!(transport.query_state().await, RelayState::Unknown);
        assert!(transport.turn_on().await.is_err());
    }
}
