//! Seams to the parts of the game this crate does not own.
//!
//! The simulation is split in two: [`SimulationView`] is read from network
//! threads and must be thread-safe, while [`SimulationMut`] is only ever
//! touched on the simulation thread through [`crate::MainThreadQueue`].

mod headless;

pub use headless::{HeadlessSimulation, HeadlessView};

use chrono::{DateTime, Utc};

use crate::command::{BuildingCreateCommand, DlcMask};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOfDay {
    /// Fractional hour in `0.0..24.0`.
    pub hour: f32,
    pub game_time: DateTime<Utc>,
}

pub trait SimulationView: Send + Sync {
    fn game_version(&self) -> String;

    /// Serialized world handed to clients that ask for it on connect. The
    /// bytes are opaque to the protocol.
    fn world_snapshot(&self) -> Vec<u8>;

    fn time_of_day(&self) -> TimeOfDay;
}

pub trait SimulationMut {
    fn set_time_of_day(&mut self, time: TimeOfDay);

    fn load_world(&mut self, world: &[u8]);

    fn set_speed(&mut self, speed: u8, paused: bool);

    fn create_building(&mut self, building: &BuildingCreateCommand);

    fn remove_building(&mut self, building_id: u32);
}

pub trait Platform: Send + Sync {
    fn owned_features(&self) -> DlcMask;
}

/// A platform whose owned content is fixed at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPlatform(pub DlcMask);

impl Platform for StaticPlatform {
    fn owned_features(&self) -> DlcMask {
        self.0
    }
}
