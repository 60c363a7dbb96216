use super::{Context, HandlerError};
use crate::command::{
    BuildingCreateCommand, BuildingRemoveCommand, ChatMessageCommand, PlayerJoinedCommand,
    PlayerLeftCommand, SpeedPauseCommand, WorldInfoCommand,
};
use crate::session::{Role, SessionEvent};

pub fn handle_world_info(command: WorldInfoCommand, ctx: &Context<'_>) -> Result<(), HandlerError> {
    let time = command.time_of_day();
    ctx.main_thread().post(move |sim| sim.set_time_of_day(time));
    Ok(())
}

pub fn handle_player_joined(
    command: PlayerJoinedCommand,
    ctx: &Context<'_>,
) -> Result<(), HandlerError> {
    log::info!("{} joined the game", command.username);
    ctx.services
        .session
        .events()
        .emit(SessionEvent::RemotePlayerJoined {
            username: command.username,
        });
    Ok(())
}

pub fn handle_player_left(
    command: PlayerLeftCommand,
    ctx: &Context<'_>,
) -> Result<(), HandlerError> {
    log::info!("{} left the game", command.username);
    ctx.services
        .session
        .events()
        .emit(SessionEvent::RemotePlayerLeft {
            username: command.username,
        });
    Ok(())
}

/// On the server the claimed username must be the sender's own; a forged
/// name is dropped and not relayed.
pub fn handle_chat_message(
    command: ChatMessageCommand,
    ctx: &Context<'_>,
) -> Result<(), HandlerError> {
    if ctx.role == Role::Server {
        let server = ctx.server()?;
        let owner = server.player(ctx.sender);
        if owner.as_ref().map(|p| p.username.as_str()) != Some(command.username.as_str()) {
            return Err(HandlerError::Rejected(format!(
                "peer {} sent chat as {}",
                ctx.sender, command.username
            )));
        }
    }

    ctx.services
        .session
        .events()
        .emit(SessionEvent::ChatReceived {
            username: command.username,
            message: command.message,
        });
    Ok(())
}

pub fn handle_speed_pause(
    command: SpeedPauseCommand,
    ctx: &Context<'_>,
) -> Result<(), HandlerError> {
    ctx.main_thread()
        .post(move |sim| sim.set_speed(command.speed(), command.paused()));
    Ok(())
}

pub fn handle_building_create(
    command: BuildingCreateCommand,
    ctx: &Context<'_>,
) -> Result<(), HandlerError> {
    ctx.main_thread().post(move |sim| sim.create_building(&command));
    Ok(())
}

pub fn handle_building_remove(
    command: BuildingRemoveCommand,
    ctx: &Context<'_>,
) -> Result<(), HandlerError> {
    ctx.main_thread()
        .post(move |sim| sim.remove_building(command.building_id));
    Ok(())
}
