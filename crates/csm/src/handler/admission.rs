use std::fmt;

use thiserror::Error;

use super::{Context, HandlerError};
use crate::command::{ConnectionRequestCommand, ConnectionResultCommand, DlcMask, MOD_VERSION};
use crate::session::{Player, ServerSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComponent {
    Game,
    Mod,
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VersionComponent::Game => "game",
            VersionComponent::Mod => "CSM Mod",
        })
    }
}

/// Why a connection request was turned down. The `Display` text is what the
/// client gets to see.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("Client and server have different {component} versions. Client: {client}, Server: {server}.")]
    ProtocolMismatch {
        component: VersionComponent,
        client: String,
        server: String,
    },
    #[error("This username is already in use.")]
    UsernameConflict,
    #[error("Invalid password for this server.")]
    AuthFailure,
    #[error("DLCs don't match. Client: {:#x}, Server: {:#x}.", .client.bits(), .server.bits())]
    FeatureMismatch { client: DlcMask, server: DlcMask },
    #[error("The server is full.")]
    ServerFull,
}

impl AdmissionError {
    fn into_result(self) -> ConnectionResultCommand {
        let dlc_mask = match &self {
            AdmissionError::FeatureMismatch { server, .. } => Some(*server),
            _ => None,
        };
        ConnectionResultCommand::rejected(self.to_string(), dlc_mask)
    }
}

/// Server side of the handshake: runs the gates in order, admits the peer and
/// answers with exactly one [`ConnectionResultCommand`].
pub fn handle_connection_request(
    command: ConnectionRequestCommand,
    ctx: &Context<'_>,
) -> Result<(), HandlerError> {
    let server = ctx.server()?;
    log::info!("Received connection request from peer {}", ctx.sender);

    let player = match admit(&server, &command, ctx) {
        Ok(player) => player,
        Err(err) => {
            match err {
                AdmissionError::AuthFailure => {
                    log::warn!("Connection rejected: invalid password from peer {}", ctx.sender)
                }
                _ => log::info!("Connection rejected for peer {}: {}", ctx.sender, err),
            }
            ctx.outbox().send(ctx.sender, &err.into_result())?;
            return Ok(());
        }
    };

    let world = command
        .request_world
        .then(|| ctx.simulation().world_snapshot());
    let result = ConnectionResultCommand::accepted(ctx.sender, world);
    if let Err(e) = ctx.outbox().send(ctx.sender, &result) {
        server.revoke(ctx.sender);
        return Err(e.into());
    }

    // Relays may only reach the player after its result is queued.
    if server.publish(ctx.sender).is_none() {
        log::debug!("{} left before being announced", player.username);
        return Ok(());
    }
    server.on_player_connected(&player, ctx.outbox(), ctx.simulation());
    Ok(())
}

fn admit(
    server: &ServerSession,
    command: &ConnectionRequestCommand,
    ctx: &Context<'_>,
) -> Result<Player, AdmissionError> {
    let game_version = ctx.simulation().game_version();
    if command.game_version != game_version {
        return Err(AdmissionError::ProtocolMismatch {
            component: VersionComponent::Game,
            client: command.game_version.clone(),
            server: game_version,
        });
    }

    if command.mod_version != MOD_VERSION {
        return Err(AdmissionError::ProtocolMismatch {
            component: VersionComponent::Mod,
            client: command.mod_version.clone(),
            server: MOD_VERSION.to_string(),
        });
    }

    if server.is_username_taken(&command.username) {
        return Err(AdmissionError::UsernameConflict);
    }

    if !server.verify_password(command.password.as_deref()) {
        return Err(AdmissionError::AuthFailure);
    }

    let owned = ctx.services.platform.owned_features();
    if command.dlc_mask != owned {
        return Err(AdmissionError::FeatureMismatch {
            client: command.dlc_mask,
            server: owned,
        });
    }

    server.admit(ctx.sender, &command.username)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_both_sides() {
        let err = AdmissionError::ProtocolMismatch {
            component: VersionComponent::Game,
            client: "1.16.0".to_string(),
            server: "1.17.1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Client and server have different game versions. Client: 1.16.0, Server: 1.17.1."
        );

        let err = AdmissionError::FeatureMismatch {
            client: DlcMask::DELUXE,
            server: DlcMask::DELUXE | DlcMask::SNOWFALL,
        };
        assert_eq!(
            err.to_string(),
            "DLCs don't match. Client: 0x1, Server: 0x5."
        );
    }

    #[test]
    fn only_feature_mismatch_echoes_server_mask() {
        let result = AdmissionError::FeatureMismatch {
            client: DlcMask::empty(),
            server: DlcMask::CAMPUS,
        }
        .into_result();
        assert!(!result.success);
        assert_eq!(result.dlc_mask, Some(DlcMask::CAMPUS));

        let result = AdmissionError::AuthFailure.into_result();
        assert_eq!(result.dlc_mask, None);
        assert_eq!(
            result.reason.as_deref(),
            Some("Invalid password for this server.")
        );
    }
}
