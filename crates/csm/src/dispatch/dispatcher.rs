use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use super::lane::{Offer, TransactionLane};
use super::registry::{Pending, Registry};
use crate::command::{CommandKind, Envelope, PeerId};
use crate::handler::{Context, HandlerError, Services};
use crate::net::{DisconnectReason, TransportEvent};
use crate::relay::{self, RelayDecision};
use crate::session::{ClientStatus, Role, SessionEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown command type {0}")]
    UnknownCommandType(u16),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("no active session")]
    NoActiveRole,
    #[error("{kind:?} is not accepted by a {role}")]
    WrongRole { kind: CommandKind, role: Role },
    #[error("peer {peer} sent {kind:?} before completing the handshake")]
    PeerNotAdmitted { peer: PeerId, kind: CommandKind },
    #[error("peer {peer} repeated {kind:?} after the handshake")]
    DuplicateHandshake { peer: PeerId, kind: CommandKind },
    #[error("no handler registered for {0:?}")]
    Unhandled(CommandKind),
    #[error("{kind:?} handler failed: {source}")]
    HandlerFailed {
        kind: CommandKind,
        #[source]
        source: HandlerError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Ran locally, and relayed as `relay` says.
    Handled {
        kind: CommandKind,
        relay: RelayDecision,
    },
    /// Held back until the sender's earlier transactions arrive.
    Queued { kind: CommandKind, sequence: u32 },
    /// A transaction that was already applied or is already waiting.
    Duplicate { kind: CommandKind, sequence: u32 },
}

struct Queued {
    kind: CommandKind,
    pending: Pending,
    envelope: Envelope,
    bytes: Vec<u8>,
}

type Lane = Arc<Mutex<TransactionLane<Queued>>>;

/// Turns received frames into handler calls. Safe to call from any number of
/// transport threads; transactions from one peer still run one at a time and
/// in order.
pub struct Dispatcher {
    registry: Registry,
    services: Services,
    lanes: Mutex<HashMap<PeerId, Lane>>,
}

impl Dispatcher {
    pub fn new(registry: Registry, services: Services) -> Self {
        Self {
            registry,
            services,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Processes one frame from `sender`. Failures only drop this frame; they
    /// are logged and handed back.
    pub fn dispatch(&self, bytes: &[u8], sender: PeerId) -> Result<DispatchOutcome, DispatchError> {
        let result = self.try_dispatch(bytes, sender);
        if let Err(e) = &result {
            log::warn!("Dropped message from peer {}: {}", sender, e);
        }
        result
    }

    fn try_dispatch(&self, bytes: &[u8], sender: PeerId) -> Result<DispatchOutcome, DispatchError> {
        let envelope =
            Envelope::decode(bytes).map_err(|e| DispatchError::MalformedPayload(e.to_string()))?;
        let kind = CommandKind::from_id(envelope.type_id)
            .ok_or(DispatchError::UnknownCommandType(envelope.type_id))?;

        let session = &self.services.session;
        let role = session.role();
        if role == Role::None {
            return Err(DispatchError::NoActiveRole);
        }
        let policy = kind.policy();
        if !policy.accepts.allows(role) {
            return Err(DispatchError::WrongRole { kind, role });
        }

        let admitted = session.is_admitted(sender);
        if kind.is_handshake() && admitted {
            return Err(DispatchError::DuplicateHandshake { peer: sender, kind });
        }
        if !kind.is_handshake() && !admitted {
            return Err(DispatchError::PeerNotAdmitted { peer: sender, kind });
        }

        let pending = self
            .registry
            .decode(kind, &envelope)
            .ok_or(DispatchError::Unhandled(kind))?
            .map_err(|e| DispatchError::MalformedPayload(e.to_string()))?;

        let ctx = Context {
            sender,
            role,
            services: &self.services,
        };

        if policy.transaction {
            let sequence = envelope.sequence.ok_or_else(|| {
                DispatchError::MalformedPayload(format!("{kind:?} without sequence"))
            })?;
            let queued = Queued {
                kind,
                pending,
                envelope,
                bytes: bytes.to_vec(),
            };
            return self.apply_in_order(sequence, queued, &ctx);
        }

        pending(&ctx).map_err(|source| DispatchError::HandlerFailed { kind, source })?;
        let relay = relay::decide(kind, role);
        relay::forward(relay, &envelope, bytes, sender, &self.services);
        Ok(DispatchOutcome::Handled { kind, relay })
    }

    fn lane(&self, peer: PeerId) -> Lane {
        Arc::clone(self.lanes.lock().entry(peer).or_default())
    }

    fn apply_in_order(
        &self,
        sequence: u32,
        queued: Queued,
        ctx: &Context<'_>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let kind = queued.kind;
        let lane = self.lane(ctx.sender);
        let mut lane = lane.lock();

        match lane.offer(sequence, queued) {
            Offer::Duplicate => {
                log::debug!(
                    "Dropped duplicate transaction {} from peer {}",
                    sequence,
                    ctx.sender
                );
                return Ok(DispatchOutcome::Duplicate { kind, sequence });
            }
            Offer::Buffered => {
                log::debug!(
                    "Holding transaction {} from peer {}, expecting {}",
                    sequence,
                    ctx.sender,
                    lane.next_expected()
                );
                return Ok(DispatchOutcome::Queued { kind, sequence });
            }
            Offer::Ready => {}
        }

        let mut outcome = Ok(DispatchOutcome::Queued { kind, sequence });
        while let Some((seq, item)) = lane.pop_ready() {
            let relay = relay::decide(item.kind, ctx.role);
            let result = (item.pending)(ctx);
            if result.is_ok() {
                relay::forward(relay, &item.envelope, &item.bytes, ctx.sender, &self.services);
            }

            match result {
                Ok(()) if seq == sequence => {
                    outcome = Ok(DispatchOutcome::Handled { kind, relay });
                }
                Err(source) if seq == sequence => {
                    outcome = Err(DispatchError::HandlerFailed { kind, source });
                }
                Err(e) => log::warn!(
                    "Buffered {:?} {} from peer {} failed: {}",
                    item.kind,
                    seq,
                    ctx.sender,
                    e
                ),
                Ok(()) => {}
            }
        }
        outcome
    }

    /// Forgets a peer's ordering state, including transactions still waiting
    /// for a gap to close.
    pub fn close_peer(&self, peer: PeerId) {
        if let Some(lane) = self.lanes.lock().remove(&peer) {
            let dropped = lane.lock().pending_count();
            if dropped > 0 {
                log::debug!(
                    "Discarded {} buffered transactions from peer {}",
                    dropped,
                    peer
                );
            }
        }
    }

    pub fn handle_transport_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected { peer, addr } => {
                log::info!("Peer {} connected from {}", peer, addr);
            }
            TransportEvent::Received { peer, bytes } => {
                let _ = self.dispatch(&bytes, peer);
            }
            TransportEvent::Disconnected { peer, reason } => self.peer_disconnected(peer, reason),
        }
    }

    fn peer_disconnected(&self, peer: PeerId, reason: DisconnectReason) {
        self.close_peer(peer);
        let session = &self.services.session;

        if let Some(server) = session.server() {
            if server.disconnect(peer, reason, &self.services.outbox).is_none() {
                self.services.outbox.forget(peer);
                log::debug!("Peer {} left before joining ({})", peer, reason.as_str());
            }
        } else if let Some(client) = session.client() {
            if client.server_peer() != Some(peer) {
                return;
            }
            log::info!("Disconnected from server ({})", reason.as_str());
            if client.status() == ClientStatus::Connecting {
                let reason = format!("Connection closed by server ({})", reason.as_str());
                client.reject(reason.clone());
                session
                    .events()
                    .emit(SessionEvent::ConnectionRejected { reason });
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("lanes", &self.lanes.lock().len())
            .finish_non_exhaustive()
    }
}
