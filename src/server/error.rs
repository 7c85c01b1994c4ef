//! Server-layer error types.

use thiserror::Error;

/// Failures at the transport and fan-out layer.
///
/// A `BrokenSubscriber` is never fatal to the tick loop: the subscriber
/// is dropped and broadcasting continues for everyone else.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Could not bind the listen address at startup.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The configured listen address.
        addr: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// WebSocket handshake or transport failure on one connection.
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The subscriber's outbound channel is gone.
    #[error("subscriber channel closed")]
    BrokenSubscriber,

    /// A message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}
