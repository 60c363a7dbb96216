use super::codec::{DecodeError, FieldReader, FieldWriter};
use super::types::{DlcMask, PeerId};
use super::{Command, CommandKind};

/// Sent once by a client when it opens a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequestCommand {
    pub game_version: String,
    pub mod_version: String,
    pub username: String,
    pub password: Option<String>,
    pub dlc_mask: DlcMask,
    pub request_world: bool,
}

impl Command for ConnectionRequestCommand {
    const KIND: CommandKind = CommandKind::ConnectionRequest;

    fn write(&self, writer: &mut FieldWriter) {
        writer
            .put(1, self.game_version.as_str())
            .put(2, self.mod_version.as_str())
            .put(3, self.username.as_str())
            .put_opt(4, self.password.as_deref())
            .put(5, self.dlc_mask.bits())
            .put(6, self.request_world);
    }

    fn read(reader: &FieldReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            game_version: reader.required(1)?,
            mod_version: reader.required(2)?,
            username: reader.required(3)?,
            password: reader.optional(4)?,
            dlc_mask: DlcMask::from_wire(reader.required(5)?),
            request_world: reader.optional(6)?.unwrap_or(false),
        })
    }
}

/// The server's single answer to a [`ConnectionRequestCommand`].
///
/// Build it with [`ConnectionResultCommand::accepted`] or
/// [`ConnectionResultCommand::rejected`]; decoding refuses combinations those
/// constructors cannot produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionResultCommand {
    pub success: bool,
    pub reason: Option<String>,
    pub client_id: Option<PeerId>,
    pub dlc_mask: Option<DlcMask>,
    pub world: Option<Vec<u8>>,
}

impl ConnectionResultCommand {
    pub fn accepted(client_id: PeerId, world: Option<Vec<u8>>) -> Self {
        Self {
            success: true,
            reason: None,
            client_id: Some(client_id),
            dlc_mask: None,
            world,
        }
    }

    pub fn rejected(reason: impl Into<String>, dlc_mask: Option<DlcMask>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
            client_id: None,
            dlc_mask,
            world: None,
        }
    }
}

impl Command for ConnectionResultCommand {
    const KIND: CommandKind = CommandKind::ConnectionResult;

    fn write(&self, writer: &mut FieldWriter) {
        writer
            .put(1, self.success)
            .put_opt(2, self.reason.as_deref())
            .put_opt(3, self.client_id)
            .put_opt(4, self.dlc_mask.map(|mask| mask.bits()))
            .put_opt(5, self.world.clone());
    }

    fn read(reader: &FieldReader<'_>) -> Result<Self, DecodeError> {
        let result = Self {
            success: reader.required(1)?,
            reason: reader.optional(2)?,
            client_id: reader.optional(3)?,
            dlc_mask: reader.optional::<u64>(4)?.map(DlcMask::from_wire),
            world: reader.optional(5)?,
        };

        match (result.success, &result.client_id, &result.reason) {
            (true, None, _) => Err(DecodeError::Invalid(
                "successful connection result without client id".into(),
            )),
            (true, _, Some(_)) => Err(DecodeError::Invalid(
                "successful connection result with rejection reason".into(),
            )),
            (false, Some(_), _) => Err(DecodeError::Invalid(
                "failed connection result with client id".into(),
            )),
            (false, _, None) => Err(DecodeError::Invalid(
                "failed connection result without reason".into(),
            )),
            _ if !result.success && result.world.is_some() => Err(DecodeError::Invalid(
                "failed connection result with world payload".into(),
            )),
            _ => Ok(result),
        }
    }
}

/// Broadcast to the other clients once a player has been admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerJoinedCommand {
    pub username: String,
}

impl Command for PlayerJoinedCommand {
    const KIND: CommandKind = CommandKind::PlayerJoined;

    fn write(&self, writer: &mut FieldWriter) {
        writer.put(1, self.username.as_str());
    }

    fn read(reader: &FieldReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            username: reader.required(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerLeftCommand {
    pub username: String,
}

impl Command for PlayerLeftCommand {
    const KIND: CommandKind = CommandKind::PlayerLeft;

    fn write(&self, writer: &mut FieldWriter) {
        writer.put(1, self.username.as_str());
    }

    fn read(reader: &FieldReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            username: reader.required(1)?,
        })
    }
}
