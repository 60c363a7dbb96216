use chrono::{DateTime, Utc};

use super::codec::{DecodeError, FieldReader, FieldWriter};
use super::{Command, CommandKind};
use crate::collab::TimeOfDay;

/// Day-time and calendar of the server's simulation. Sent to a client right
/// after admission and then periodically so that both clocks agree.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldInfoCommand {
    pub current_day_time_hour: f32,
    pub current_game_time: DateTime<Utc>,
}

impl WorldInfoCommand {
    pub fn from_time(time: TimeOfDay) -> Self {
        Self {
            current_day_time_hour: time.hour,
            current_game_time: time.game_time,
        }
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        TimeOfDay {
            hour: self.current_day_time_hour,
            game_time: self.current_game_time,
        }
    }
}

impl Command for WorldInfoCommand {
    const KIND: CommandKind = CommandKind::WorldInfo;

    fn write(&self, writer: &mut FieldWriter) {
        writer
            .put(1, self.current_day_time_hour)
            .put(2, self.current_game_time.timestamp())
            .put(3, self.current_game_time.timestamp_subsec_nanos());
    }

    fn read(reader: &FieldReader<'_>) -> Result<Self, DecodeError> {
        let secs: i64 = reader.required(2)?;
        let nanos: u32 = reader.required(3)?;
        let current_game_time = DateTime::from_timestamp(secs, nanos).ok_or_else(|| {
            DecodeError::Invalid(format!("game time {secs}s + {nanos}ns out of range"))
        })?;
        Ok(Self {
            current_day_time_hour: reader.required(1)?,
            current_game_time,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessageCommand {
    pub username: String,
    pub message: String,
}

impl Command for ChatMessageCommand {
    const KIND: CommandKind = CommandKind::ChatMessage;

    fn write(&self, writer: &mut FieldWriter) {
        writer
            .put(1, self.username.as_str())
            .put(2, self.message.as_str());
    }

    fn read(reader: &FieldReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            username: reader.required(1)?,
            message: reader.required(2)?,
        })
    }
}

/// Simulation speed and pause state. The speed is always within
/// `1..=MAX_SPEED`, so every value built here is also accepted on decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedPauseCommand {
    speed: u8,
    paused: bool,
}

impl SpeedPauseCommand {
    pub const MAX_SPEED: u8 = 3;

    /// Returns `None` when `speed` is outside `1..=MAX_SPEED`.
    pub fn new(speed: u8, paused: bool) -> Option<Self> {
        (1..=Self::MAX_SPEED)
            .contains(&speed)
            .then_some(Self { speed, paused })
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn paused(&self) -> bool {
        self.paused
    }
}

impl Command for SpeedPauseCommand {
    const KIND: CommandKind = CommandKind::SpeedPause;

    fn write(&self, writer: &mut FieldWriter) {
        writer.put(1, u32::from(self.speed)).put(2, self.paused);
    }

    fn read(reader: &FieldReader<'_>) -> Result<Self, DecodeError> {
        let speed: u32 = reader.required(1)?;
        let paused = reader.required(2)?;
        u8::try_from(speed)
            .ok()
            .and_then(|speed| Self::new(speed, paused))
            .ok_or_else(|| DecodeError::Invalid(format!("simulation speed {speed} out of range")))
    }
}

/// Placement of a building. Ordered against other building edits from the
/// same peer.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingCreateCommand {
    pub building_id: u32,
    pub position: [f32; 3],
    pub angle: f32,
    pub info_index: u32,
}

impl Command for BuildingCreateCommand {
    const KIND: CommandKind = CommandKind::BuildingCreate;

    fn write(&self, writer: &mut FieldWriter) {
        writer
            .put(1, self.building_id)
            .put(2, self.position)
            .put(3, self.angle)
            .put(4, self.info_index);
    }

    fn read(reader: &FieldReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            building_id: reader.required(1)?,
            position: reader.required(2)?,
            angle: reader.required(3)?,
            info_index: reader.required(4)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildingRemoveCommand {
    pub building_id: u32,
}

impl Command for BuildingRemoveCommand {
    const KIND: CommandKind = CommandKind::BuildingRemove;

    fn write(&self, writer: &mut FieldWriter) {
        writer.put(1, self.building_id);
    }

    fn read(reader: &FieldReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            building_id: reader.required(1)?,
        })
    }
}
