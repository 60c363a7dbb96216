mod admission;
mod connection_result;
mod game;

pub use admission::{AdmissionError, VersionComponent, handle_connection_request};
pub use connection_result::handle_connection_result;
pub use game::{
    handle_building_create, handle_building_remove, handle_chat_message, handle_player_joined,
    handle_player_left, handle_speed_pause, handle_world_info,
};

use std::sync::Arc;

use thiserror::Error;

use crate::collab::{Platform, SimulationView};
use crate::command::{
    BuildingCreateCommand, BuildingRemoveCommand, ChatMessageCommand, Command,
    ConnectionRequestCommand, ConnectionResultCommand, PeerId, PlayerJoinedCommand,
    PlayerLeftCommand, SpeedPauseCommand, WorldInfoCommand,
};
use crate::dispatch::{Registry, RegistryError};
use crate::executor::MainThreadQueue;
use crate::net::{Outbox, SendError};
use crate::session::{ClientSession, Role, ServerSession, Session};

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("no active {0} session")]
    SessionMissing(Role),
    #[error(transparent)]
    Send(#[from] SendError),
    #[error("rejected: {0}")]
    Rejected(String),
}

/// Everything a handler may reach. Built once by the host and shared by
/// every dispatch.
pub struct Services {
    pub session: Arc<Session>,
    pub outbox: Arc<Outbox>,
    pub simulation: Arc<dyn SimulationView>,
    pub platform: Arc<dyn Platform>,
    pub main_thread: MainThreadQueue,
}

/// Per-message view handed to a handler.
pub struct Context<'a> {
    pub sender: PeerId,
    /// Local role at the time the message was dispatched.
    pub role: Role,
    pub services: &'a Services,
}

impl Context<'_> {
    pub fn server(&self) -> Result<Arc<ServerSession>, HandlerError> {
        self.services
            .session
            .server()
            .ok_or(HandlerError::SessionMissing(Role::Server))
    }

    pub fn client(&self) -> Result<Arc<ClientSession>, HandlerError> {
        self.services
            .session
            .client()
            .ok_or(HandlerError::SessionMissing(Role::Client))
    }

    pub fn outbox(&self) -> &Outbox {
        &self.services.outbox
    }

    pub fn simulation(&self) -> &dyn SimulationView {
        self.services.simulation.as_ref()
    }

    pub fn main_thread(&self) -> &MainThreadQueue {
        &self.services.main_thread
    }
}

/// Reacts to one decoded command. Plain functions and closures with the
/// matching signature are handlers too.
pub trait Handler<C: Command>: Send + Sync + 'static {
    fn handle(&self, command: C, ctx: &Context<'_>) -> Result<(), HandlerError>;
}

impl<C, F> Handler<C> for F
where
    C: Command,
    F: Fn(C, &Context<'_>) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    fn handle(&self, command: C, ctx: &Context<'_>) -> Result<(), HandlerError> {
        self(command, ctx)
    }
}

/// Binds the built-in handler of every command in the catalog.
pub fn register_defaults(registry: &mut Registry) -> Result<(), RegistryError> {
    registry.register::<ConnectionRequestCommand, _>(handle_connection_request)?;
    registry.register::<ConnectionResultCommand, _>(handle_connection_result)?;
    registry.register::<WorldInfoCommand, _>(handle_world_info)?;
    registry.register::<PlayerJoinedCommand, _>(handle_player_joined)?;
    registry.register::<PlayerLeftCommand, _>(handle_player_left)?;
    registry.register::<ChatMessageCommand, _>(handle_chat_message)?;
    registry.register::<SpeedPauseCommand, _>(handle_speed_pause)?;
    registry.register::<BuildingCreateCommand, _>(handle_building_create)?;
    registry.register::<BuildingRemoveCommand, _>(handle_building_remove)?;
    Ok(())
}
