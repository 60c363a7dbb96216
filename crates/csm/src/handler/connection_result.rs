use super::{Context, HandlerError};
use crate::command::ConnectionResultCommand;
use crate::session::SessionEvent;

/// Client side of the handshake.
pub fn handle_connection_result(
    command: ConnectionResultCommand,
    ctx: &Context<'_>,
) -> Result<(), HandlerError> {
    let client = ctx.client()?;
    let events = ctx.services.session.events();

    match command.client_id.filter(|_| command.success) {
        Some(client_id) => {
            log::info!("Connection accepted, client id {}", client_id);
            client.accept(client_id);
            if let Some(world) = command.world {
                log::info!("Loading world from server ({} bytes)", world.len());
                ctx.main_thread().post(move |sim| sim.load_world(&world));
            }
            events.emit(SessionEvent::ConnectionAccepted { client_id });
        }
        None => {
            let mut reason = command
                .reason
                .unwrap_or_else(|| "Connection rejected".to_string());
            if let Some(server_mask) = command.dlc_mask {
                let local = ctx.services.platform.owned_features();
                reason = format!("{reason} ({})", local.describe_difference(server_mask));
            }
            log::warn!("Connection rejected: {}", reason);
            client.reject(reason.clone());
            events.emit(SessionEvent::ConnectionRejected { reason });
        }
    }
    Ok(())
}
