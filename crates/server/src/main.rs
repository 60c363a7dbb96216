mod address;
mod config;
mod server;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use config::HostConfig;
use csm::{DlcMask, ServerConfig};
use server::GameServer;

#[derive(Parser)]
#[command(name = "csm-server")]
#[command(about = "Headless host for Cities: Skylines multiplayer sessions")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = csm::DEFAULT_PORT)]
    port: u16,

    #[arg(long, help = "Password clients must present (empty disables the check)")]
    password: Option<String>,

    #[arg(short, long, default_value = "Host")]
    username: String,

    #[arg(short, long, default_value_t = 32)]
    max_players: usize,

    #[arg(short, long, help = "Serialized city sent to joining players")]
    world: Option<PathBuf>,

    #[arg(short, long, default_value_t = 30)]
    tick_rate: u32,

    #[arg(long, default_value = "1.17.1-f4")]
    game_version: String,

    #[arg(long, default_value_t = 0, help = "Installed DLC bitmask")]
    dlc: u64,

    #[arg(long, default_value_t = 5, help = "Seconds between clock broadcasts")]
    world_info_interval: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let world = match &args.world {
        Some(path) => std::fs::read(path)
            .with_context(|| format!("Failed to read world file {}", path.display()))?,
        None => Vec::new(),
    };

    let config = HostConfig {
        bind: args.bind,
        tick_rate: args.tick_rate,
        world_info_interval: Duration::from_secs(args.world_info_interval.max(1)),
        game_version: args.game_version,
        dlc: DlcMask::from_wire(args.dlc),
        world,
        session: ServerConfig {
            port: args.port,
            password: args.password,
            max_players: args.max_players,
            host_username: args.username,
        },
    };

    let mut server = GameServer::new(config)?;
    log::info!("Server started on {} (type 'quit' to stop)", server.local_addr());
    watch_stdin(server.running());
    server.run();
    log::info!("Server shutting down");

    Ok(())
}

/// Clears `running` once `quit` is typed. A closed stdin leaves the server
/// running so it can be detached.
fn watch_stdin(running: Arc<AtomicBool>) {
    let spawned = thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if is_quit(&line) {
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("Could not watch stdin, stop the server with a signal: {}", e);
    }
}

fn is_quit(line: &str) -> bool {
    matches!(line.trim(), "q" | "quit" | "exit")
}
