use std::net::SocketAddr;

use thiserror::Error;

use crate::command::PeerId;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
    #[error("transport is closed")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The remote end closed the stream.
    Graceful,
    /// Closed from this side.
    Kicked,
    /// Read error or malformed frame.
    Dropped,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Kicked => "kicked",
            DisconnectReason::Dropped => "connection lost",
        }
    }
}

/// What a transport reports back to the host. Each peer sees exactly one
/// `Connected` and at most one `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected { peer: PeerId, addr: SocketAddr },
    Received { peer: PeerId, bytes: Vec<u8> },
    Disconnected { peer: PeerId, reason: DisconnectReason },
}

/// Reliable, ordered byte delivery to numbered peers.
///
/// Sends are fire-and-forget: an `Ok` means the frame was queued, not that
/// it arrived.
pub trait Transport: Send + Sync {
    fn send_to(&self, peer: PeerId, bytes: Vec<u8>) -> Result<(), TransportError>;

    fn disconnect(&self, peer: PeerId) -> Result<(), TransportError>;
}
