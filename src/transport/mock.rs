// MIT License - Copyright (c) 2026 Peter Wright
// In-memory transport for unit tests

use tokio::sync::{Mutex, mpsc};

use crate::error::{K1Error, Result};
use crate::transport::Transport;

/// Transport fed and drained by a [`MockHub`].
pub struct MockTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Result<Vec<u8>>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// The hub's side of a [`MockTransport`].
pub struct MockHub {
    inbound: mpsc::UnboundedSender<Result<Vec<u8>>>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

pub fn pair() -> (MockTransport, MockHub) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    (
        MockTransport {
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
        },
        MockHub {
            inbound: in_tx,
            outbound: out_rx,
        },
    )
}

impl Transport for MockTransport {
    async fn send(&self, datagram: &[u8]) -> Result<()> {
        self.outbound
            .send(datagram.to_vec())
            .map_err(|_| K1Error::TransportClosed)
    }

    async fn recv(&self) -> Result<Vec<u8>> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .unwrap_or(Err(K1Error::TransportClosed))
    }
}

impl MockHub {
    /// Deliver a datagram to the session.
    pub fn push(&self, text: &str) {
        let _ = self.inbound.send(Ok(text.as_bytes().to_vec()));
    }

    /// Make the next receive fail with an I/O error.
    pub fn push_io_error(&self) {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let _ = self.inbound.send(Err(K1Error::Io(err)));
    }

    /// Next datagram the session sent.
    pub async fn next_raw(&mut self) -> String {
        let bytes = self.outbound.recv().await.expect("session closed");
        String::from_utf8(bytes).expect("utf-8 datagram")
    }

    /// Next sent JSON frame, skipping handshake probes and acknowledgements.
    pub async fn next_frame(&mut self) -> serde_json::Value {
        loop {
            let raw = self.next_raw().await;
            if raw.starts_with('{') {
                return serde_json::from_str(&raw).expect("frame is JSON");
            }
        }
    }

    /// Everything sent so far, without waiting.
    pub fn drain(&mut self) -> Vec<String> {
        let mut sent = Vec::new();
        while let Ok(bytes) = self.outbound.try_recv() {
            sent.push(String::from_utf8_lossy(&bytes).into_owned());
        }
        sent
    }
}
