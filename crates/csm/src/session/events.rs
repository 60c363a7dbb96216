use crossbeam_channel::{Receiver, Sender};

use super::players::Player;
use crate::command::PeerId;
use crate::net::DisconnectReason;

/// Notifications for the UI and other observers. They are produced on
/// network threads and consumed wherever the receiver lives.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PlayerConnected {
        player: Player,
    },
    PlayerDisconnected {
        player: Player,
        reason: DisconnectReason,
    },
    ConnectionAccepted {
        client_id: PeerId,
    },
    ConnectionRejected {
        reason: String,
    },
    RemotePlayerJoined {
        username: String,
    },
    RemotePlayerLeft {
        username: String,
    },
    ChatReceived {
        username: String,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Sender<SessionEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, Receiver<SessionEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            log::trace!("Session event dropped, no observer attached");
        }
    }
}
