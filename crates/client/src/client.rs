use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use crossbeam_channel::Receiver;

use csm::{
    ChatMessageCommand, ClientConfig, ClientSession, ClientStatus, Dispatcher, DlcMask,
    HeadlessSimulation, MainThreadQueue, Outbox, PeerId, Registry, Services, Session,
    SessionEvent, StaticPlatform, TcpTransport, TimeOfDay, TransportEvent,
};

pub struct NetworkClient {
    transport: TcpTransport,
    transport_events: Receiver<TransportEvent>,
    session: Arc<Session>,
    client: Arc<ClientSession>,
    session_events: Receiver<SessionEvent>,
    dispatcher: Dispatcher,
    simulation: HeadlessSimulation,
    server_peer: PeerId,
    server_closed: bool,
}

impl NetworkClient {
    /// Opens the connection and sends the handshake. Admission arrives later
    /// through [`NetworkClient::wait_for_admission`].
    pub fn connect(config: ClientConfig, game_version: &str, dlc: DlcMask) -> Result<Self> {
        let (session, session_events) = Session::new();
        let session = Arc::new(session);
        let client = session.start_client(config)?;

        let server_addr = client.config().server_addr();
        let (transport, transport_events, server_peer) = TcpTransport::connect(server_addr.as_str())
            .with_context(|| format!("Failed to connect to {}", server_addr))?;
        client.attach_server(server_peer);

        let simulation = HeadlessSimulation::new(game_version, Vec::new(), Utc::now());
        let services = Services {
            session: Arc::clone(&session),
            outbox: Arc::new(Outbox::new(Arc::new(transport.clone()))),
            simulation: Arc::new(simulation.view()),
            platform: Arc::new(StaticPlatform(dlc)),
            main_thread: MainThreadQueue::new(),
        };

        let request =
            client.connection_request(services.platform.as_ref(), services.simulation.as_ref());
        services.outbox.send(server_peer, &request)?;

        Ok(Self {
            transport,
            transport_events,
            session,
            client,
            session_events,
            dispatcher: Dispatcher::new(Registry::with_default_handlers()?, services),
            simulation,
            server_peer,
            server_closed: false,
        })
    }

    /// Feeds received frames to the dispatcher and applies whatever they
    /// queued for the simulation.
    pub fn pump(&mut self) {
        while let Ok(event) = self.transport_events.try_recv() {
            if let TransportEvent::Disconnected { peer, .. } = &event {
                if *peer == self.server_peer {
                    self.server_closed = true;
                }
            }
            self.dispatcher.handle_transport_event(event);
        }
        let queue = &self.dispatcher.services().main_thread;
        queue.drain(&mut self.simulation);
    }

    pub fn events(&self) -> impl Iterator<Item = SessionEvent> + '_ {
        self.session_events.try_iter()
    }

    pub fn wait_for_admission(&mut self, timeout: Duration) -> Result<PeerId> {
        let start = Instant::now();
        loop {
            self.pump();
            match self.client.status() {
                ClientStatus::Connected { client_id } => return Ok(client_id),
                ClientStatus::Rejected { reason } => bail!("Connection rejected: {}", reason),
                ClientStatus::Connecting => {}
            }
            if self.server_closed {
                bail!("Server closed the connection during the handshake");
            }
            if start.elapsed() >= timeout {
                bail!("No answer from the server after {:?}", timeout);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn send_chat(&self, message: &str) -> Result<()> {
        let chat = ChatMessageCommand {
            username: self.client.username().to_string(),
            message: message.to_string(),
        };
        self.dispatcher
            .services()
            .outbox
            .send(self.server_peer, &chat)?;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        !self.server_closed
    }

    pub fn world_len(&self) -> usize {
        self.simulation.world_len()
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        csm::SimulationView::time_of_day(&self.simulation.view())
    }

    pub fn disconnect(self) {
        self.session.stop();
        self.transport.shutdown();
        let stats = self.transport.stats();
        log::debug!(
            "Sent {} packets, received {} packets",
            stats.packets_sent,
            stats.packets_received
        );
    }
}
