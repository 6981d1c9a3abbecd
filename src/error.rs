use thiserror::Error;

/// Error taxonomy for the live session client and its survey glue.
///
/// Validation failures (`Config`, `NotConnected`) are returned synchronously
/// to the caller and are never retried by this crate. Transport failures are
/// surfaced as [`LiveEvent`](crate::client::LiveEvent)s so every subscriber
/// observes them; only the operation that was in flight gets an `Err`.
#[derive(Error, Debug)]
pub enum LiveError {
    /// Invalid configuration or input supplied by the caller.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An operation that requires an open session was attempted while the
    /// connection was not in the `Connected` state.
    #[error("operation requires an open session")]
    NotConnected,

    /// The socket closed, errored, or was disconnected before the remote
    /// acknowledged the setup message.
    #[error("connection ended before setup completed: {0}")]
    Handshake(String),

    /// Microphone access was denied by the host environment.
    #[error("microphone permission denied: {0}")]
    Permission(String),

    /// No usable audio input device, or the device went away.
    #[error("audio device unavailable: {0}")]
    Device(String),

    /// A frame or payload that does not match any known wire shape.
    #[error("protocol violation: {0}")]
    Protocol(String),

    #[cfg(feature = "audio-resampling")]
    #[error("audio resampling failed: {0}")]
    Resample(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("survey backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The outgoing message queue is gone; the session task has shut down.
    #[error("failed to queue outgoing message: session task is gone")]
    Send,
}
