use parking_lot::Mutex;

use super::config::ServerConfig;
use super::events::{EventSink, SessionEvent};
use super::password::PasswordGuard;
use super::players::{Player, PlayerTable};
use crate::collab::SimulationView;
use crate::command::{Command, PeerId, PlayerJoinedCommand, PlayerLeftCommand, WorldInfoCommand};
use crate::handler::AdmissionError;
use crate::net::{DisconnectReason, Outbox};

/// State of a hosted game. The host itself is not in the player table but
/// its username and slot still count.
#[derive(Debug)]
pub struct ServerSession {
    config: ServerConfig,
    password: PasswordGuard,
    players: Mutex<PlayerTable>,
    events: EventSink,
}

impl ServerSession {
    pub(crate) fn new(mut config: ServerConfig, events: EventSink) -> Self {
        let password = PasswordGuard::new(config.password.take().as_deref());
        Self {
            config,
            password,
            players: Mutex::new(PlayerTable::new()),
            events,
        }
    }

    /// The configuration the session was started with, minus the password.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn host_username(&self) -> &str {
        &self.config.host_username
    }

    pub fn verify_password(&self, candidate: Option<&str>) -> bool {
        self.password.verify(candidate)
    }

    pub fn is_username_taken(&self, username: &str) -> bool {
        username == self.config.host_username || self.players.lock().contains_username(username)
    }

    /// Reserves a slot and the name for a new player. Uniqueness and capacity
    /// are re-checked under the same lock as the reservation, so two racing
    /// requests for one name admit at most one of them. The player stays
    /// invisible to broadcasts and relays until [`ServerSession::publish`].
    pub fn admit(&self, peer_id: PeerId, username: &str) -> Result<Player, AdmissionError> {
        let mut players = self.players.lock();
        if username == self.config.host_username || players.contains_username(username) {
            return Err(AdmissionError::UsernameConflict);
        }
        if players.occupied() + 1 >= self.config.max_players {
            return Err(AdmissionError::ServerFull);
        }

        let player = Player::new(peer_id, username);
        players.reserve(player.clone());
        Ok(player)
    }

    /// Makes an admitted player a recipient of broadcasts and relays. Called
    /// once its connection result is queued. `None` if the admission was
    /// revoked or the peer left first.
    pub fn publish(&self, peer_id: PeerId) -> Option<Player> {
        self.players.lock().publish(peer_id).cloned()
    }

    /// Undoes an admission that never reached the client. Nobody else has
    /// heard of the player yet, so nothing is broadcast.
    pub fn revoke(&self, peer_id: PeerId) -> Option<Player> {
        self.players.lock().cancel(peer_id)
    }

    pub fn is_admitted(&self, peer_id: PeerId) -> bool {
        self.players.lock().contains(peer_id)
    }

    pub fn player(&self, peer_id: PeerId) -> Option<Player> {
        self.players.lock().get(peer_id).cloned()
    }

    pub fn players(&self) -> Vec<Player> {
        self.players.lock().iter().cloned().collect()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.players.lock().peer_ids()
    }

    /// Remote players only.
    pub fn player_count(&self) -> usize {
        self.players.lock().len()
    }

    pub fn on_player_connected(
        &self,
        player: &Player,
        outbox: &Outbox,
        simulation: &dyn SimulationView,
    ) {
        let world_info = WorldInfoCommand::from_time(simulation.time_of_day());
        if let Err(e) = outbox.send(player.peer_id, &world_info) {
            log::warn!("Failed to send world info to {}: {}", player.username, e);
        }

        let joined = PlayerJoinedCommand {
            username: player.username.clone(),
        };
        self.broadcast(&joined, Some(player.peer_id), outbox);

        log::info!("{} joined the game", player.username);
        self.events.emit(SessionEvent::PlayerConnected {
            player: player.clone(),
        });
    }

    /// Removes the player behind `peer_id`. Only the first call for a peer
    /// has any effect; later calls return `None`.
    pub fn disconnect(
        &self,
        peer_id: PeerId,
        reason: DisconnectReason,
        outbox: &Outbox,
    ) -> Option<Player> {
        let mut players = self.players.lock();
        let Some(player) = players.remove(peer_id) else {
            let reserved = players.cancel(peer_id);
            drop(players);
            if let Some(player) = reserved {
                outbox.forget(peer_id);
                log::debug!("{} left before the handshake completed", player.username);
            }
            return None;
        };
        drop(players);
        outbox.forget(peer_id);

        let left = PlayerLeftCommand {
            username: player.username.clone(),
        };
        self.broadcast(&left, None, outbox);

        log::info!("{} left the game ({})", player.username, reason.as_str());
        self.events.emit(SessionEvent::PlayerDisconnected {
            player: player.clone(),
            reason,
        });
        Some(player)
    }

    /// Sends `command` to every admitted player except `exclude`.
    pub fn broadcast<C: Command>(
        &self,
        command: &C,
        exclude: Option<PeerId>,
        outbox: &Outbox,
    ) -> usize {
        let recipients = self.peer_ids();
        match outbox.broadcast(command, &recipients, exclude) {
            Ok(sent) => sent,
            Err(e) => {
                log::error!("Failed to encode {:?}: {}", C::KIND, e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(max_players: usize) -> (ServerSession, crossbeam_channel::Receiver<SessionEvent>) {
        let (events, rx) = EventSink::channel();
        let config = ServerConfig {
            max_players,
            host_username: "Host".to_string(),
            password: Some("secret".to_string()),
            ..Default::default()
        };
        (ServerSession::new(config, events), rx)
    }

    #[test]
    fn password_is_not_kept_in_config() {
        let (server, _rx) = server(4);
        assert_eq!(server.config().password, None);
        assert!(server.verify_password(Some("secret")));
        assert!(!server.verify_password(None));
    }

    #[test]
    fn host_name_and_capacity_count() {
        let (server, _rx) = server(3);

        assert!(matches!(
            server.admit(1, "Host"),
            Err(AdmissionError::UsernameConflict)
        ));
        server.admit(1, "alice").unwrap();
        assert!(matches!(
            server.admit(2, "alice"),
            Err(AdmissionError::UsernameConflict)
        ));
        server.admit(2, "Alice").unwrap();
        assert!(matches!(
            server.admit(3, "bob"),
            Err(AdmissionError::ServerFull)
        ));
        assert_eq!(server.player_count(), 0);

        server.publish(1).unwrap();
        server.publish(2).unwrap();
        assert_eq!(server.player_count(), 2);
    }

    #[test]
    fn admitted_player_is_invisible_until_published() {
        let (server, _rx) = server(8);
        server.admit(1, "alice").unwrap();
        server.publish(1).unwrap();
        server.admit(2, "bob").unwrap();

        assert_eq!(server.peer_ids(), vec![1]);
        assert!(!server.is_admitted(2));
        assert!(server.is_username_taken("bob"));

        assert_eq!(server.publish(2), Some(Player::new(2, "bob")));
        assert!(server.is_admitted(2));
    }

    #[test]
    fn revoke_removes_silently() {
        let (server, rx) = server(4);
        server.admit(7, "alice").unwrap();

        assert_eq!(server.revoke(7), Some(Player::new(7, "alice")));
        assert!(!server.is_admitted(7));
        assert!(rx.try_recv().is_err());
    }
}
