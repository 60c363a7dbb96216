#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;

use csm::{
    ClientConfig, Command, CommandKind, ConnectionRequestCommand, ConnectionResultCommand,
    Dispatcher, DlcMask, Envelope, HeadlessSimulation, MOD_VERSION, MainThreadQueue, Outbox,
    PeerId, Registry, ServerConfig, Services, Session, SessionEvent, StaticPlatform, Transport,
    TransportError,
};

pub const GAME_VERSION: &str = "1.17.1-f4";
pub const SERVER_DLC: DlcMask = DlcMask::AFTER_DARK.union(DlcMask::SNOWFALL);
pub const WORLD: &[u8] = b"serialized city";
pub const SERVER_PEER: PeerId = 1;

pub type SendHook = Arc<dyn Fn(PeerId, &[u8]) + Send + Sync>;

/// Records every frame instead of sending it.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(PeerId, Vec<u8>)>>,
    failing: Mutex<HashSet<PeerId>>,
    disconnected: Mutex<Vec<PeerId>>,
    before_send: Mutex<Option<SendHook>>,
}

impl RecordingTransport {
    /// Runs `hook` ahead of recording each frame, as if another thread got
    /// there first.
    pub fn before_send(&self, hook: impl Fn(PeerId, &[u8]) + Send + Sync + 'static) {
        *self.before_send.lock() = Some(Arc::new(hook));
    }

    pub fn fail_sends_to(&self, peer: PeerId) {
        self.failing.lock().insert(peer);
    }

    /// Every frame sent so far, decoded, oldest first. Clears the record.
    pub fn take(&self) -> Vec<(PeerId, Envelope)> {
        std::mem::take(&mut *self.sent.lock())
            .into_iter()
            .map(|(peer, bytes)| (peer, Envelope::decode(&bytes).expect("valid frame")))
            .collect()
    }

    pub fn raw(&self) -> Vec<(PeerId, Vec<u8>)> {
        self.sent.lock().clone()
    }

    pub fn disconnected(&self) -> Vec<PeerId> {
        self.disconnected.lock().clone()
    }
}

impl Transport for RecordingTransport {
    fn send_to(&self, peer: PeerId, bytes: Vec<u8>) -> Result<(), TransportError> {
        if self.failing.lock().contains(&peer) {
            return Err(TransportError::Closed);
        }
        let hook = self.before_send.lock().clone();
        if let Some(hook) = hook {
            hook(peer, &bytes);
        }
        self.sent.lock().push((peer, bytes));
        Ok(())
    }

    fn disconnect(&self, peer: PeerId) -> Result<(), TransportError> {
        self.disconnected.lock().push(peer);
        Ok(())
    }
}

pub struct Harness {
    pub dispatcher: Dispatcher,
    pub transport: Arc<RecordingTransport>,
    pub session: Arc<Session>,
    pub events: Receiver<SessionEvent>,
    pub main_thread: MainThreadQueue,
    pub sim: HeadlessSimulation,
}

impl Harness {
    fn new(platform: DlcMask) -> Self {
        let start = Utc
            .with_ymd_and_hms(2031, 6, 1, 8, 0, 0)
            .single()
            .expect("valid date");
        let sim = HeadlessSimulation::new(GAME_VERSION, WORLD.to_vec(), start);
        let transport = Arc::new(RecordingTransport::default());
        let (session, events) = Session::new();
        let session = Arc::new(session);
        let main_thread = MainThreadQueue::new();

        let services = Services {
            session: Arc::clone(&session),
            outbox: Arc::new(Outbox::new(transport.clone())),
            simulation: Arc::new(sim.view()),
            platform: Arc::new(StaticPlatform(platform)),
            main_thread: main_thread.clone(),
        };
        let registry = Registry::with_default_handlers().expect("default handlers");

        Self {
            dispatcher: Dispatcher::new(registry, services),
            transport,
            session,
            events,
            main_thread,
            sim,
        }
    }

    pub fn server(config: ServerConfig) -> Self {
        let harness = Self::new(SERVER_DLC);
        harness.session.start_server(config).expect("server starts");
        harness
    }

    pub fn client(config: ClientConfig) -> Self {
        let harness = Self::new(SERVER_DLC);
        let client = harness.session.start_client(config).expect("client starts");
        client.attach_server(SERVER_PEER);
        harness
    }

    pub fn send<C: Command>(
        &self,
        peer: PeerId,
        command: &C,
    ) -> Result<csm::DispatchOutcome, csm::DispatchError> {
        self.dispatcher.dispatch(&frame(command), peer)
    }

    /// Runs the handshake for `peer` and returns what it was told.
    pub fn connect(
        &self,
        peer: PeerId,
        request: &ConnectionRequestCommand,
    ) -> ConnectionResultCommand {
        self.send(peer, request).expect("request dispatched");
        self.result_for(peer).expect("a connection result")
    }

    /// Admits `peer` as `username` and clears the recorded frames.
    pub fn join(&self, peer: PeerId, username: &str) {
        let result = self.connect(peer, &request(username));
        assert!(result.success, "{username} rejected: {:?}", result.reason);
        self.transport.take();
        while self.events.try_recv().is_ok() {}
    }

    /// The connection results sent to `peer`, leaving other frames in place.
    pub fn results_for(&self, peer: PeerId) -> Vec<ConnectionResultCommand> {
        self.transport
            .raw()
            .into_iter()
            .filter(|(to, _)| *to == peer)
            .filter_map(|(_, bytes)| Envelope::decode(&bytes).ok())
            .filter(|envelope| envelope.type_id == CommandKind::ConnectionResult.id())
            .map(|envelope| {
                ConnectionResultCommand::from_envelope(&envelope).expect("valid result")
            })
            .collect()
    }

    pub fn result_for(&self, peer: PeerId) -> Option<ConnectionResultCommand> {
        let mut results = self.results_for(peer);
        assert!(results.len() <= 1, "peer {peer} got {} results", results.len());
        results.pop()
    }

    pub fn drain_events(&self) -> Vec<SessionEvent> {
        self.events.try_iter().collect()
    }
}

pub fn request(username: &str) -> ConnectionRequestCommand {
    ConnectionRequestCommand {
        game_version: GAME_VERSION.to_string(),
        mod_version: MOD_VERSION.to_string(),
        username: username.to_string(),
        password: None,
        dlc_mask: SERVER_DLC,
        request_world: true,
    }
}

pub fn frame<C: Command>(command: &C) -> Vec<u8> {
    command.encode(None).expect("encodable command")
}

pub fn frame_seq<C: Command>(command: &C, sequence: u32) -> Vec<u8> {
    command.encode(Some(sequence)).expect("encodable command")
}

pub fn host_config() -> ServerConfig {
    ServerConfig {
        host_username: "Host".to_string(),
        ..Default::default()
    }
}
