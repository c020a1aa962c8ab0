// MIT License - Copyright (c) 2026 Peter Wright
// Datagram transports

pub mod udp;
#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;

use crate::error::Result;

pub use udp::UdpTransport;

/// A datagram link to the hub.
///
/// The session only needs to send and receive whole datagrams; the UDP socket
/// is the production implementation, tests plug in an in-memory one.
pub trait Transport: Send + Sync + 'static {
    /// Send one datagram.
    fn send(&self, datagram: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next datagram.
    fn recv(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;
}
