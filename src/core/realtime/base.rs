//! Base traits and types for the realtime AI endpoint connection.
//!
//! A connected endpoint is exposed as an [`UpstreamLink`]: a bounded command
//! channel of [`ClientEvent`]s and a bounded channel of [`UpstreamSignal`]s.
//! The socket itself is owned by a pump task on the other side of those
//! channels, so a relay never touches the transport directly.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::openai::{ClientEvent, ServerEvent, SessionConfig};

/// Capacity of the command and signal channels of a link.
pub const LINK_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to the realtime endpoint.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the endpoint failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Link is closed
    #[error("Not connected")]
    NotConnected,

    /// The command queue is full
    #[error("Command queue full")]
    QueueFull,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Link
// =============================================================================

/// Signals delivered from the pump task to the owner of a link.
#[derive(Debug)]
pub enum UpstreamSignal {
    /// A parsed server event
    Event(ServerEvent),
    /// A text frame that did not parse as a server event
    Malformed(String),
    /// The socket ended; carries the reason when one is known.
    /// Emitted exactly once, always last.
    Closed(Option<String>),
}

/// Owner side of an open realtime connection.
#[derive(Debug)]
pub struct UpstreamLink {
    commands: mpsc::Sender<ClientEvent>,
    signals: mpsc::Receiver<UpstreamSignal>,
    shutdown: CancellationToken,
}

/// Pump side of a link; held by whatever task owns the transport.
#[derive(Debug)]
pub struct UpstreamEndpoint {
    /// Commands queued by the link owner
    pub commands: mpsc::Receiver<ClientEvent>,
    /// Where parsed events are delivered
    pub signals: mpsc::Sender<UpstreamSignal>,
    /// Cancelled when the owner closes the link
    pub shutdown: CancellationToken,
}

impl UpstreamLink {
    /// Create a connected link/endpoint pair.
    pub fn pair() -> (UpstreamLink, UpstreamEndpoint) {
        let (command_tx, command_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        let (signal_tx, signal_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        let shutdown = CancellationToken::new();

        (
            UpstreamLink {
                commands: command_tx,
                signals: signal_rx,
                shutdown: shutdown.clone(),
            },
            UpstreamEndpoint {
                commands: command_rx,
                signals: signal_tx,
                shutdown,
            },
        )
    }

    /// Queue a client event for the endpoint.
    pub async fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        if !self.is_open() {
            return Err(RealtimeError::NotConnected);
        }
        self.commands
            .send(event)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    /// Queue a client event without waiting for queue space.
    pub fn try_send(&self, event: ClientEvent) -> RealtimeResult<()> {
        if !self.is_open() {
            return Err(RealtimeError::NotConnected);
        }
        self.commands.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => RealtimeError::QueueFull,
            TrySendError::Closed(_) => RealtimeError::NotConnected,
        })
    }

    /// Receive the next signal. Returns `None` once the pump is gone and
    /// every buffered signal has been drained.
    pub async fn recv(&mut self) -> Option<UpstreamSignal> {
        self.signals.recv().await
    }

    pub fn is_open(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.commands.is_closed()
    }

    /// Ask the pump to close the socket. Idempotent.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for UpstreamLink {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// =============================================================================
// Connector
// =============================================================================

/// Opens one realtime connection per call.
///
/// Implementations perform the transport handshake and send the given
/// session configuration as the first message before returning the link.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    async fn connect(&self, session: SessionConfig) -> RealtimeResult<UpstreamLink>;
}
