use crate::command::{CommandKind, Envelope, PeerId};
use crate::handler::Services;
use crate::session::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayDecision {
    Skip,
    /// Forward the received frame unchanged.
    Broadcast,
    /// Forward with each destination's own outgoing sequence.
    Sequenced,
}

/// Whether a command processed locally in `role` goes on to the other peers.
/// Only a server relays.
pub fn decide(kind: CommandKind, role: Role) -> RelayDecision {
    let policy = kind.policy();
    match role {
        Role::Server if policy.relay_on_server && policy.transaction => RelayDecision::Sequenced,
        Role::Server if policy.relay_on_server => RelayDecision::Broadcast,
        _ => RelayDecision::Skip,
    }
}

/// Sends a processed command to every admitted player except its sender.
/// Failures are logged per peer. Returns the number of frames queued.
pub fn forward(
    decision: RelayDecision,
    envelope: &Envelope,
    bytes: &[u8],
    sender: PeerId,
    services: &Services,
) -> usize {
    if decision == RelayDecision::Skip {
        return 0;
    }
    let Some(server) = services.session.server() else {
        return 0;
    };

    let recipients = server.peer_ids();
    let sent = match decision {
        RelayDecision::Broadcast => {
            services
                .outbox
                .broadcast_bytes(bytes, &recipients, Some(sender))
        }
        RelayDecision::Sequenced => {
            services
                .outbox
                .relay_sequenced(envelope, &recipients, Some(sender))
        }
        RelayDecision::Skip => 0,
    };
    log::trace!(
        "Relayed type {} from peer {} to {} peers",
        envelope.type_id,
        sender,
        sent
    );
    sent
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clients_never_relay() {
        for kind in CommandKind::ALL {
            assert_eq!(decide(kind, Role::Client), RelayDecision::Skip);
            assert_eq!(decide(kind, Role::None), RelayDecision::Skip);
        }
    }

    #[test]
    fn server_follows_catalog_policy() {
        assert_eq!(
            decide(CommandKind::ConnectionRequest, Role::Server),
            RelayDecision::Skip
        );
        assert_eq!(
            decide(CommandKind::ChatMessage, Role::Server),
            RelayDecision::Broadcast
        );
        assert_eq!(
            decide(CommandKind::SpeedPause, Role::Server),
            RelayDecision::Broadcast
        );
        assert_eq!(
            decide(CommandKind::BuildingCreate, Role::Server),
            RelayDecision::Sequenced
        );
    }
}
