mod client;

use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use client::NetworkClient;
use csm::{ClientConfig, DlcMask, SessionEvent};

#[derive(Parser)]
#[command(name = "csm-client")]
#[command(about = "Joins a Cities: Skylines multiplayer session from the terminal")]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    address: String,

    #[arg(short, long, default_value_t = csm::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, default_value = "Player")]
    username: String,

    #[arg(long)]
    password: Option<String>,

    #[arg(long, help = "Join without downloading the host's city")]
    no_world: bool,

    #[arg(long, default_value = "1.17.1-f4")]
    game_version: String,

    #[arg(long, default_value_t = 0, help = "Installed DLC bitmask")]
    dlc: u64,

    #[arg(short, long, help = "Chat message to send once admitted")]
    message: Option<String>,

    #[arg(long, help = "Leave right after joining instead of following the session")]
    once: bool,

    #[arg(long, default_value_t = 30, help = "Seconds to wait for admission")]
    timeout: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ClientConfig {
        address: args.address,
        port: args.port,
        username: args.username,
        password: args.password,
        request_world: !args.no_world,
    };

    let mut client = NetworkClient::connect(
        config,
        &args.game_version,
        DlcMask::from_wire(args.dlc),
    )?;
    let client_id = client.wait_for_admission(Duration::from_secs(args.timeout))?;
    client.pump();
    log::info!(
        "Joined as client {} (world: {} bytes, hour {:.1})",
        client_id,
        client.world_len(),
        client.time_of_day().hour
    );

    if let Some(message) = &args.message {
        client.send_chat(message)?;
    }

    if !args.once {
        while client.is_open() {
            client.pump();
            let events: Vec<SessionEvent> = client.events().collect();
            for event in events {
                log_event(event);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    client.disconnect();
    Ok(())
}

fn log_event(event: SessionEvent) {
    match event {
        SessionEvent::ChatReceived { username, message } => {
            log::info!("[chat] {}: {}", username, message);
        }
        SessionEvent::RemotePlayerJoined { username } => log::info!("{} joined", username),
        SessionEvent::RemotePlayerLeft { username } => log::info!("{} left", username),
        other => log::debug!("{:?}", other),
    }
}
