use super::SessionError;

pub const DEFAULT_PORT: u16 = 4230;
pub const DEFAULT_MAX_PLAYERS: usize = 32;

/// Highest port outside the dynamic/private range.
const MAX_PORT: u16 = 49151;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Empty or `None` means the server is open.
    pub password: Option<String>,
    /// Counts the host.
    pub max_players: usize,
    pub host_username: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            password: None,
            max_players: DEFAULT_MAX_PLAYERS,
            host_username: "Host".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if !(1..=MAX_PORT).contains(&self.port) {
            return Err(SessionError::InvalidConfig(format!(
                "port must be between 1 and {MAX_PORT}, got {}",
                self.port
            )));
        }
        if self.host_username.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "host username must not be empty".to_string(),
            ));
        }
        if self.max_players == 0 {
            return Err(SessionError::InvalidConfig(
                "max players must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    /// Ask the server to ship its world with the connection result.
    pub request_world: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            username: "Player".to_string(),
            password: None,
            request_world: true,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.address.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "server address must not be empty".to_string(),
            ));
        }
        if self.port == 0 {
            return Err(SessionError::InvalidConfig(
                "server port must not be 0".to_string(),
            ));
        }
        if self.username.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "username must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
