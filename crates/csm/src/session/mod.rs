mod client;
mod config;
mod events;
mod password;
mod players;
mod server;

pub use client::{ClientSession, ClientStatus};
pub use config::{ClientConfig, DEFAULT_MAX_PLAYERS, DEFAULT_PORT, ServerConfig};
pub use events::{EventSink, SessionEvent};
pub use password::PasswordGuard;
pub use players::{Player, PlayerTable};
pub use server::ServerSession;

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use thiserror::Error;

use crate::command::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    None,
    Server,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::None => "none",
            Role::Server => "server",
            Role::Client => "client",
        })
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a {0} session is already active")]
    AlreadyActiveRole(Role),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug)]
enum SessionState {
    Idle,
    Server(Arc<ServerSession>),
    Client(Arc<ClientSession>),
}

/// The local side of a multiplayer game: idle, hosting, or joined. Shared by
/// the dispatcher, the handlers and the UI through `Arc`.
#[derive(Debug)]
pub struct Session {
    state: RwLock<SessionState>,
    events: EventSink,
}

impl Session {
    pub fn new() -> (Self, Receiver<SessionEvent>) {
        let (events, rx) = EventSink::channel();
        (
            Self {
                state: RwLock::new(SessionState::Idle),
                events,
            },
            rx,
        )
    }

    pub fn start_server(&self, config: ServerConfig) -> Result<Arc<ServerSession>, SessionError> {
        let mut state = self.state.write();
        if let Some(role) = Self::active_role(&state) {
            return Err(SessionError::AlreadyActiveRole(role));
        }
        config.validate()?;

        log::info!(
            "Hosting on port {} as {} (max {} players)",
            config.port,
            config.host_username,
            config.max_players
        );
        let server = Arc::new(ServerSession::new(config, self.events.clone()));
        *state = SessionState::Server(Arc::clone(&server));
        Ok(server)
    }

    pub fn start_client(&self, config: ClientConfig) -> Result<Arc<ClientSession>, SessionError> {
        let mut state = self.state.write();
        if let Some(role) = Self::active_role(&state) {
            return Err(SessionError::AlreadyActiveRole(role));
        }
        config.validate()?;

        log::info!(
            "Joining {} as {}",
            config.server_addr(),
            config.username
        );
        let client = Arc::new(ClientSession::new(config));
        *state = SessionState::Client(Arc::clone(&client));
        Ok(client)
    }

    /// Returns to idle. Stopping an idle session does nothing.
    pub fn stop(&self) -> Role {
        let previous = std::mem::replace(&mut *self.state.write(), SessionState::Idle);
        let role = Self::active_role(&previous).unwrap_or(Role::None);
        if role != Role::None {
            log::info!("Stopped {} session", role);
        }
        role
    }

    fn active_role(state: &SessionState) -> Option<Role> {
        match state {
            SessionState::Idle => None,
            SessionState::Server(_) => Some(Role::Server),
            SessionState::Client(_) => Some(Role::Client),
        }
    }

    pub fn role(&self) -> Role {
        Self::active_role(&self.state.read()).unwrap_or(Role::None)
    }

    pub fn server(&self) -> Option<Arc<ServerSession>> {
        match &*self.state.read() {
            SessionState::Server(server) => Some(Arc::clone(server)),
            _ => None,
        }
    }

    pub fn client(&self) -> Option<Arc<ClientSession>> {
        match &*self.state.read() {
            SessionState::Client(client) => Some(Arc::clone(client)),
            _ => None,
        }
    }

    /// Whether `peer` completed the handshake. On a server this means it is
    /// in the player table; on a client the only peer is the server, which
    /// counts once the connection was accepted.
    pub fn is_admitted(&self, peer: PeerId) -> bool {
        match &*self.state.read() {
            SessionState::Idle => false,
            SessionState::Server(server) => server.is_admitted(peer),
            SessionState::Client(client) => {
                client.is_connected() && client.server_peer() == Some(peer)
            }
        }
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_role_at_a_time() {
        let (session, _events) = Session::new();
        assert_eq!(session.role(), Role::None);

        session.start_server(ServerConfig::default()).unwrap();
        assert_eq!(session.role(), Role::Server);
        assert!(matches!(
            session.start_client(ClientConfig::default()),
            Err(SessionError::AlreadyActiveRole(Role::Server))
        ));
        assert!(matches!(
            session.start_server(ServerConfig::default()),
            Err(SessionError::AlreadyActiveRole(Role::Server))
        ));
        assert!(session.client().is_none());
    }

    #[test]
    fn stop_is_idempotent() {
        let (session, _events) = Session::new();
        session.start_client(ClientConfig::default()).unwrap();

        assert_eq!(session.stop(), Role::Client);
        assert_eq!(session.stop(), Role::None);
        assert_eq!(session.role(), Role::None);

        session.start_server(ServerConfig::default()).unwrap();
        assert_eq!(session.role(), Role::Server);
    }

    #[test]
    fn invalid_config_leaves_session_idle() {
        let (session, _events) = Session::new();
        let config = ServerConfig {
            max_players: 0,
            ..Default::default()
        };

        assert!(matches!(
            session.start_server(config),
            Err(SessionError::InvalidConfig(_))
        ));
        assert_eq!(session.role(), Role::None);
    }

    #[test]
    fn nobody_is_admitted_while_idle() {
        let (session, _events) = Session::new();
        assert!(!session.is_admitted(1));
    }
}
