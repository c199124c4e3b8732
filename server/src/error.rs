//! Error type for server startup and per-connection setup

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or accepting on the listener failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or framing failed
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The heartbeat task exited while the server was running
    #[error("Liveness monitor stopped unexpectedly")]
    MonitorStopped,

    /// Startup configuration violates an invariant
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
