use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use super::transport::{Transport, TransportError};
use crate::command::{CodecError, Command, Envelope, PeerId};

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Encodes commands and hands them to the transport. Owns the outgoing
/// sequence counter of every peer, so transactional commands are numbered
/// per destination no matter who originally sent them.
pub struct Outbox {
    transport: Arc<dyn Transport>,
    sequences: Mutex<HashMap<PeerId, u32>>,
}

impl Outbox {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            sequences: Mutex::new(HashMap::new()),
        }
    }

    pub fn next_sequence(&self, peer: PeerId) -> u32 {
        let mut sequences = self.sequences.lock();
        let next = sequences.entry(peer).or_insert(0);
        let sequence = *next;
        *next = next.wrapping_add(1);
        sequence
    }

    pub fn send<C: Command>(&self, peer: PeerId, command: &C) -> Result<(), SendError> {
        let sequence = C::KIND
            .policy()
            .transaction
            .then(|| self.next_sequence(peer));
        let bytes = command.encode(sequence)?;
        self.transport.send_to(peer, bytes)?;
        Ok(())
    }

    pub fn send_raw(&self, peer: PeerId, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.transport.send_to(peer, bytes)
    }

    /// Sends `command` to every recipient except `exclude`. Per-peer send
    /// failures are logged; the number of frames queued is returned.
    pub fn broadcast<C: Command>(
        &self,
        command: &C,
        recipients: &[PeerId],
        exclude: Option<PeerId>,
    ) -> Result<usize, CodecError> {
        if C::KIND.policy().transaction {
            Ok(self.relay_sequenced(&command.to_envelope(None), recipients, exclude))
        } else {
            let bytes = command.encode(None)?;
            Ok(self.broadcast_bytes(&bytes, recipients, exclude))
        }
    }

    /// Forwards an already encoded frame unchanged.
    pub fn broadcast_bytes(
        &self,
        bytes: &[u8],
        recipients: &[PeerId],
        exclude: Option<PeerId>,
    ) -> usize {
        let mut sent = 0;
        for &peer in recipients.iter().filter(|&&p| Some(p) != exclude) {
            match self.transport.send_to(peer, bytes.to_vec()) {
                Ok(()) => sent += 1,
                Err(e) => log::warn!("Failed to send to peer {}: {}", peer, e),
            }
        }
        sent
    }

    /// Re-stamps `envelope` with each recipient's own outgoing sequence.
    pub fn relay_sequenced(
        &self,
        envelope: &Envelope,
        recipients: &[PeerId],
        exclude: Option<PeerId>,
    ) -> usize {
        let mut sent = 0;
        for &peer in recipients.iter().filter(|&&p| Some(p) != exclude) {
            let stamped = envelope.with_sequence(Some(self.next_sequence(peer)));
            let result = stamped
                .encode()
                .map_err(SendError::from)
                .and_then(|bytes| Ok(self.transport.send_to(peer, bytes)?));
            match result {
                Ok(()) => sent += 1,
                Err(e) => log::warn!("Failed to relay to peer {}: {}", peer, e),
            }
        }
        sent
    }

    /// Drops the peer's sequence counter. Called once the peer is gone.
    pub fn forget(&self, peer: PeerId) {
        self.sequences.lock().remove(&peer);
    }

    pub fn disconnect(&self, peer: PeerId) -> Result<(), TransportError> {
        self.forget(peer);
        self.transport.disconnect(peer)
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("peers", &self.sequences.lock().len())
            .finish_non_exhaustive()
    }
}
