mod codec;
mod game;
mod internal;
mod types;

pub use codec::{
    CodecError, DecodeError, Envelope, Field, FieldReader, FieldValue, FieldWriter, FromField,
    PROTOCOL_MAGIC, PROTOCOL_VERSION, sequence_greater_than,
};
pub use game::{
    BuildingCreateCommand, BuildingRemoveCommand, ChatMessageCommand, SpeedPauseCommand,
    WorldInfoCommand,
};
pub use internal::{
    ConnectionRequestCommand, ConnectionResultCommand, PlayerJoinedCommand, PlayerLeftCommand,
};
pub use types::{DlcMask, MOD_VERSION, PeerId};

use crate::session::Role;

/// Every command the protocol knows, with its stable wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum CommandKind {
    ConnectionRequest = 1,
    ConnectionResult = 2,
    WorldInfo = 3,
    PlayerJoined = 4,
    PlayerLeft = 5,
    ChatMessage = 10,
    SpeedPause = 11,
    BuildingCreate = 20,
    BuildingRemove = 21,
}

/// Which role processes a command when it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepts {
    Server,
    Client,
    Both,
}

impl Accepts {
    pub fn allows(self, role: Role) -> bool {
        matches!(
            (self, role),
            (Accepts::Both, Role::Server | Role::Client)
                | (Accepts::Server, Role::Server)
                | (Accepts::Client, Role::Client)
        )
    }
}

/// Static delivery policy of a command type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPolicy {
    /// Applied in per-sender sequence order and re-sequenced when relayed.
    pub transaction: bool,
    /// Forwarded by the server to the other admitted peers after local
    /// processing.
    pub relay_on_server: bool,
    pub accepts: Accepts,
}

impl CommandKind {
    pub const ALL: [CommandKind; 9] = [
        CommandKind::ConnectionRequest,
        CommandKind::ConnectionResult,
        CommandKind::WorldInfo,
        CommandKind::PlayerJoined,
        CommandKind::PlayerLeft,
        CommandKind::ChatMessage,
        CommandKind::SpeedPause,
        CommandKind::BuildingCreate,
        CommandKind::BuildingRemove,
    ];

    pub fn id(self) -> u16 {
        self as u16
    }

    pub fn from_id(id: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    /// The only command a peer may send before the handshake completes in
    /// the given role.
    pub fn is_handshake(self) -> bool {
        matches!(
            self,
            CommandKind::ConnectionRequest | CommandKind::ConnectionResult
        )
    }

    pub const fn policy(self) -> CommandPolicy {
        const fn make(transaction: bool, relay_on_server: bool, accepts: Accepts) -> CommandPolicy {
            CommandPolicy {
                transaction,
                relay_on_server,
                accepts,
            }
        }

        match self {
            CommandKind::ConnectionRequest => make(false, false, Accepts::Server),
            CommandKind::ConnectionResult => make(false, false, Accepts::Client),
            CommandKind::WorldInfo => make(false, false, Accepts::Client),
            CommandKind::PlayerJoined => make(false, false, Accepts::Client),
            CommandKind::PlayerLeft => make(false, false, Accepts::Client),
            CommandKind::ChatMessage => make(false, true, Accepts::Both),
            CommandKind::SpeedPause => make(false, true, Accepts::Both),
            CommandKind::BuildingCreate => make(true, true, Accepts::Both),
            CommandKind::BuildingRemove => make(true, true, Accepts::Both),
        }
    }
}

/// A typed wire message. Implementors are plain data; their encoding is a
/// list of tagged fields, see [`FieldWriter`] and [`FieldReader`].
pub trait Command: Sized + Send + 'static {
    const KIND: CommandKind;

    fn write(&self, writer: &mut FieldWriter);

    fn read(reader: &FieldReader<'_>) -> Result<Self, DecodeError>;

    fn to_envelope(&self, sequence: Option<u32>) -> Envelope {
        let mut writer = FieldWriter::new();
        self.write(&mut writer);
        Envelope::new(Self::KIND.id(), sequence, writer.into_fields())
    }

    fn from_envelope(envelope: &Envelope) -> Result<Self, DecodeError> {
        if envelope.type_id != Self::KIND.id() {
            return Err(DecodeError::WrongCommand {
                expected: Self::KIND.id(),
                found: envelope.type_id,
            });
        }
        Self::read(&envelope.reader())
    }

    fn encode(&self, sequence: Option<u32>) -> Result<Vec<u8>, CodecError> {
        self.to_envelope(sequence).encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_resolvable() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_id(kind.id()), Some(kind));
        }
        let mut ids: Vec<u16> = CommandKind::ALL.iter().map(|k| k.id()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), CommandKind::ALL.len());
        assert_eq!(CommandKind::from_id(0), None);
        assert_eq!(CommandKind::from_id(999), None);
    }

    #[test]
    fn handshake_commands_are_never_relayed() {
        for kind in CommandKind::ALL.into_iter().filter(|k| k.is_handshake()) {
            let policy = kind.policy();
            assert!(!policy.relay_on_server);
            assert!(!policy.transaction);
        }
    }

    #[test]
    fn accepts_matches_roles() {
        assert!(Accepts::Server.allows(Role::Server));
        assert!(!Accepts::Server.allows(Role::Client));
        assert!(Accepts::Client.allows(Role::Client));
        assert!(Accepts::Both.allows(Role::Client));
        assert!(!Accepts::Both.allows(Role::None));
    }
}
