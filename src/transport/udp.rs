// MIT License - Copyright (c) 2026 Peter Wright
// UDP transport

use tokio::net::UdpSocket;
use tracing::{debug, error, info};

use crate::config::HubConfig;
use crate::error::{K1Error, Result};
use crate::transport::Transport;

/// Largest datagram the hub sends (name and status bursts stay well below this).
const RECV_BUFFER_SIZE: usize = 4096;

/// UDP socket connected to the hub's address.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind an ephemeral local port and connect it to the hub.
    pub async fn connect(config: &HubConfig) -> Result<Self> {
        let addr = config.hub_addr();
        info!("Opening UDP session to hub at {addr}");

        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(|e| {
            error!("UDP bind failed: {}", e);
            K1Error::Io(e)
        })?;
        socket.connect(&addr).await.map_err(|e| {
            error!("UDP connect to {addr} failed: {}", e);
            K1Error::Io(e)
        })?;

        debug!("UDP socket bound to {:?}", socket.local_addr().ok());
        Ok(Self { socket })
    }
}

impl Transport for UdpTransport {
    async fn send(&self, datagram: &[u8]) -> Result<()> {
        self.socket.send(datagram).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let n = self.socket.recv(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_over_loopback() {
        let hub = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = hub.local_addr().unwrap().port();
        let config = HubConfig::builder().hub_ip("127.0.0.1").hub_port(port).build();

        let transport = UdpTransport::connect(&config).await.unwrap();
        transport.send(b"IOT_KEY?ST_0123456789ab").await.unwrap();

        let mut buf = [0u8; 64];
        let (n, from) = hub.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"IOT_KEY?ST_0123456789ab");

        hub.send_to(b"NAME:ST_0123456789ab", from).await.unwrap();
        assert_eq!(transport.recv().await.unwrap(), b"NAME:ST_0123456789ab");
    }
}
