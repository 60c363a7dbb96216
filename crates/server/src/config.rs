use std::time::Duration;

use csm::{DlcMask, ServerConfig};

/// Everything the headless host needs besides the session settings.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub bind: String,
    pub tick_rate: u32,
    /// How often every player gets a fresh clock.
    pub world_info_interval: Duration,
    pub game_version: String,
    pub dlc: DlcMask,
    pub world: Vec<u8>,
    pub session: ServerConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            tick_rate: 30,
            world_info_interval: Duration::from_secs(5),
            game_version: "1.17.1-f4".to_string(),
            dlc: DlcMask::empty(),
            world: Vec::new(),
            session: ServerConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind, self.session.port)
    }
}
