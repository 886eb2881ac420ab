//! Loopback plug used by socket tests.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use tokio::{net::UdpSocket, sync::Mutex, task::JoinHandle};

use crate::{
    crypto::EnvelopeCipher,
    envelope::{Envelope, LockStatus},
    frame::Frame,
    mac::MacAddress,
    transport::{DeviceConfig, UdpTransport},
};

pub(crate) const PLUG_MAC: MacAddress = MacAddress([0x00, 0x1A, 0x22, 0x33, 0x44, 0x55]);

/// A loopback plug that answers like the firmware.
pub(crate) struct FakePlug {
    pub addr: SocketAddr,
    pub received: Arc<Mutex<Vec<Envelope>>>,
    handle: JoinHandle<()>,
}

impl FakePlug {
    pub(crate) async fn spawn() -> Self {
        Self::spawn_with(|_| None).await
    }

    /// Spawns a plug whose replies can be overridden per request.
    pub(crate) async fn spawn_with<F>(override_reply: F) -> Self
    where
        F: Fn(&Envelope) -> Option<Vec<u8>> + Send + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&received);

        let handle = tokio::spawn(async move {
            let cipher = EnvelopeCipher::default();
            let mut on = false;
            let mut buf = [0u8; 1024];

            loop {
                let Ok((n, from)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(request) = Envelope::decode(&buf[..n], &cipher) else {
                    continue;
                };
                log.lock().await.push(request.clone());

                let reply = match override_reply(&request) {
                    Some(bytes) => bytes,
                    None => {
                        let payload = &request.frame.payload;
                        if payload[0] == 0x01 {
                            on = payload[3] == 0xFF;
                        }
                        let status = if on { 0xFF } else { 0x00 };
                        let body = vec![payload[0], 0x00, 0x00, status, 0xFF, 0x04, 0x04, 0x04, 0x04];
                        Envelope::new(Frame::new(body))
                            .with_lock_status(LockStatus::Response)
                            .with_mac(PLUG_MAC)
                            .encode(&cipher)
                            .unwrap()
                    }
                };

                if !reply.is_empty() {
                    let _ = socket.send_to(&reply, from).await;
                }
            }
        });

        Self {
            addr,
            received,
            handle,
        }
    }

    pub(crate) fn transport(&self) -> UdpTransport {
        UdpTransport::new(
            DeviceConfig::new("127.0.0.1")
                .with_port(self.addr.port())
                .with_timeout(Duration::from_millis(300)),
        )
    }
}

impl Drop for FakePlug {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
