pub mod collab;
pub mod command;
pub mod dispatch;
pub mod executor;
pub mod handler;
pub mod net;
pub mod relay;
pub mod session;

pub use collab::{
    HeadlessSimulation, HeadlessView, Platform, SimulationMut, SimulationView, StaticPlatform,
    TimeOfDay,
};
pub use command::{
    BuildingCreateCommand, BuildingRemoveCommand, ChatMessageCommand, CodecError, Command,
    CommandKind, ConnectionRequestCommand, ConnectionResultCommand, DecodeError, DlcMask,
    Envelope, MOD_VERSION, PeerId, PlayerJoinedCommand, PlayerLeftCommand, SpeedPauseCommand,
    WorldInfoCommand,
};
pub use dispatch::{DispatchError, DispatchOutcome, Dispatcher, Registry, RegistryError};
pub use executor::MainThreadQueue;
pub use handler::{AdmissionError, Context, Handler, HandlerError, Services};
pub use net::{
    DisconnectReason, NetworkStats, Outbox, SendError, TcpTransport, Transport, TransportError,
    TransportEvent,
};
pub use relay::RelayDecision;
pub use session::{
    ClientConfig, ClientSession, ClientStatus, DEFAULT_PORT, Player, Role, ServerConfig,
    ServerSession, Session, SessionError, SessionEvent,
};
