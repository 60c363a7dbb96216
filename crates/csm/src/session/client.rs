use parking_lot::Mutex;

use super::config::ClientConfig;
use crate::collab::{Platform, SimulationView};
use crate::command::{ConnectionRequestCommand, MOD_VERSION, PeerId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStatus {
    Connecting,
    Connected { client_id: PeerId },
    Rejected { reason: String },
}

#[derive(Debug)]
struct ClientState {
    status: ClientStatus,
    server_peer: Option<PeerId>,
}

/// State of a joined game, from the request until the server answers.
#[derive(Debug)]
pub struct ClientSession {
    config: ClientConfig,
    state: Mutex<ClientState>,
}

impl ClientSession {
    pub(crate) fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: Mutex::new(ClientState {
                status: ClientStatus::Connecting,
                server_peer: None,
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn username(&self) -> &str {
        &self.config.username
    }

    /// Records which transport peer is the server.
    pub fn attach_server(&self, peer: PeerId) {
        self.state.lock().server_peer = Some(peer);
    }

    pub fn server_peer(&self) -> Option<PeerId> {
        self.state.lock().server_peer
    }

    pub fn connection_request(
        &self,
        platform: &dyn Platform,
        simulation: &dyn SimulationView,
    ) -> ConnectionRequestCommand {
        ConnectionRequestCommand {
            game_version: simulation.game_version(),
            mod_version: MOD_VERSION.to_string(),
            username: self.config.username.clone(),
            password: self.config.password.clone().filter(|p| !p.is_empty()),
            dlc_mask: platform.owned_features(),
            request_world: self.config.request_world,
        }
    }

    pub fn accept(&self, client_id: PeerId) {
        self.state.lock().status = ClientStatus::Connected { client_id };
    }

    pub fn reject(&self, reason: impl Into<String>) {
        self.state.lock().status = ClientStatus::Rejected {
            reason: reason.into(),
        };
    }

    pub fn status(&self) -> ClientStatus {
        self.state.lock().status.clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state.lock().status, ClientStatus::Connected { .. })
    }

    pub fn client_id(&self) -> Option<PeerId> {
        match self.state.lock().status {
            ClientStatus::Connected { client_id } => Some(client_id),
            _ => None,
        }
    }
}
