use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use crossbeam_channel::Receiver;

use csm::{
    Dispatcher, HeadlessSimulation, MainThreadQueue, NetworkStats, Outbox, Registry, Services,
    Session, SessionEvent, SimulationView, StaticPlatform, TcpTransport, TransportEvent,
    WorldInfoCommand,
};

use crate::address::{self, AddressReport};
use crate::config::HostConfig;

#[derive(Debug, Clone, Copy)]
pub struct ServerStats {
    pub tick: u64,
    pub player_count: usize,
    pub max_players: usize,
    pub network_stats: NetworkStats,
}

pub struct GameServer {
    transport: TcpTransport,
    transport_events: Receiver<TransportEvent>,
    session: Arc<Session>,
    session_events: Receiver<SessionEvent>,
    dispatcher: Dispatcher,
    simulation: HeadlessSimulation,
    addresses: Receiver<AddressReport>,
    local_addr: SocketAddr,
    max_players: usize,
    tick: u64,
    tick_duration: Duration,
    last_tick_time: Instant,
    accumulator: Duration,
    world_info_interval: Duration,
    since_world_info: Duration,
    running: Arc<AtomicBool>,
}

impl GameServer {
    pub fn new(config: HostConfig) -> Result<Self> {
        let (transport, transport_events, local_addr) = TcpTransport::listen(config.bind_addr())?;
        let simulation = HeadlessSimulation::new(&config.game_version, config.world, Utc::now());

        let (session, session_events) = Session::new();
        let session = Arc::new(session);
        let max_players = config.session.max_players;
        session.start_server(config.session)?;

        let services = Services {
            session: Arc::clone(&session),
            outbox: Arc::new(Outbox::new(Arc::new(transport.clone()))),
            simulation: Arc::new(simulation.view()),
            platform: Arc::new(StaticPlatform(config.dlc)),
            main_thread: MainThreadQueue::new(),
        };
        let dispatcher = Dispatcher::new(Registry::with_default_handlers()?, services);

        Ok(Self {
            transport,
            transport_events,
            session,
            session_events,
            dispatcher,
            simulation,
            addresses: address::spawn_lookup(),
            local_addr,
            max_players,
            tick: 0,
            tick_duration: Duration::from_secs_f64(1.0 / f64::from(config.tick_rate.max(1))),
            last_tick_time: Instant::now(),
            accumulator: Duration::ZERO,
            world_info_interval: config.world_info_interval,
            since_world_info: Duration::ZERO,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Clearing this flag makes [`GameServer::run`] shut down after the
    /// current tick.
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn run(&mut self) {
        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            std::thread::sleep(Duration::from_millis(1));
        }
        self.shutdown();
    }

    pub fn tick_once(&mut self) {
        let now = Instant::now();
        let delta = now - self.last_tick_time;
        self.last_tick_time = now;
        self.accumulator += delta;

        self.process_network();

        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            self.tick();
        }

        self.report_addresses();
        self.log_session_events();
    }

    fn process_network(&mut self) {
        while let Ok(event) = self.transport_events.try_recv() {
            self.dispatcher.handle_transport_event(event);
        }
    }

    fn tick(&mut self) {
        let queue = &self.dispatcher.services().main_thread;
        queue.drain(&mut self.simulation);

        self.simulation.advance(self.tick_duration);
        self.tick += 1;

        self.since_world_info += self.tick_duration;
        if self.since_world_info >= self.world_info_interval {
            self.since_world_info = Duration::ZERO;
            self.broadcast_world_info();
        }
    }

    fn broadcast_world_info(&self) {
        let Some(server) = self.session.server() else {
            return;
        };
        let services = self.dispatcher.services();
        let info = WorldInfoCommand::from_time(services.simulation.time_of_day());
        let sent = server.broadcast(&info, None, &services.outbox);
        log::trace!("World info sent to {} players", sent);
    }

    fn report_addresses(&self) {
        let port = self.local_addr.port();
        while let Ok(report) = self.addresses.try_recv() {
            match report {
                AddressReport::Local(ip) => log::info!("Local address: {}:{}", ip, port),
                AddressReport::External(ip) => log::info!("External address: {}:{}", ip, port),
                AddressReport::Failed { what, error } => {
                    log::warn!("Could not determine {} address: {}", what, error)
                }
            }
        }
    }

    fn log_session_events(&self) {
        while let Ok(event) = self.session_events.try_recv() {
            match event {
                SessionEvent::PlayerConnected { player } => {
                    log::info!(
                        "Player {} is peer {} ({}/{})",
                        player.username,
                        player.peer_id,
                        self.player_count(),
                        self.max_players
                    );
                }
                SessionEvent::PlayerDisconnected { player, reason } => {
                    log::debug!("Peer {} closed: {}", player.peer_id, reason.as_str());
                }
                SessionEvent::ChatReceived { username, message } => {
                    log::info!("[chat] {}: {}", username, message);
                }
                other => log::debug!("Session event: {:?}", other),
            }
        }
    }

    fn player_count(&self) -> usize {
        self.session
            .server()
            .map_or(0, |server| server.player_count())
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            tick: self.tick,
            player_count: self.player_count(),
            max_players: self.max_players,
            network_stats: self.transport.stats(),
        }
    }

    pub fn shutdown(&mut self) {
        let stats = self.stats();
        self.session.stop();
        self.transport.shutdown();
        log::info!(
            "Served {} ticks. Sent {} packets ({} bytes), received {} packets ({} bytes)",
            stats.tick,
            stats.network_stats.packets_sent,
            stats.network_stats.bytes_sent,
            stats.network_stats.packets_received,
            stats.network_stats.bytes_received
        );
    }
}
