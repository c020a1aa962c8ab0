// MIT License - Copyright (c) 2026 Peter Wright
// Error types

/// Reasons an inbound datagram could not be turned into a hub message.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("not a hub envelope: {text:?}")]
    NotAnEnvelope { text: String },

    #[error("invalid envelope JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope has no params.data payload")]
    MissingData,
}

/// All errors that can occur in the elro-k1-bridge library.
#[derive(Debug, thiserror::Error)]
pub enum K1Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Receive failed after {attempts} attempts: {source}")]
    ReceiveExhausted {
        attempts: u32,
        #[source]
        source: Box<K1Error>,
    },

    #[error("Invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("Invalid device name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Transport closed")]
    TransportClosed,
}

impl K1Error {
    /// Whether a failed receive should be retried rather than ending the session.
    pub fn is_retryable(&self) -> bool {
        matches!(self, K1Error::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, K1Error>;
