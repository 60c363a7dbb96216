use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;

use super::{SimulationMut, SimulationView, TimeOfDay};
use crate::command::BuildingCreateCommand;

/// Game hours that pass per real second at speed 1.
const GAME_HOURS_PER_SECOND: f64 = 1.0 / 60.0;

#[derive(Debug)]
struct CityState {
    world: Vec<u8>,
    time: TimeOfDay,
    speed: u8,
    paused: bool,
    buildings: BTreeMap<u32, BuildingCreateCommand>,
}

/// Stand-in city used by the binaries and tests when no real engine is
/// attached. Keeps the clock, speed and building list that remote commands
/// modify.
#[derive(Debug)]
pub struct HeadlessSimulation {
    state: Arc<RwLock<CityState>>,
    game_version: Arc<str>,
}

/// Thread-safe read handle onto a [`HeadlessSimulation`].
#[derive(Debug, Clone)]
pub struct HeadlessView {
    state: Arc<RwLock<CityState>>,
    game_version: Arc<str>,
}

impl HeadlessSimulation {
    pub fn new(game_version: &str, world: Vec<u8>, start: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(RwLock::new(CityState {
                world,
                time: TimeOfDay {
                    hour: 12.0,
                    game_time: start,
                },
                speed: 1,
                paused: false,
                buildings: BTreeMap::new(),
            })),
            game_version: Arc::from(game_version),
        }
    }

    pub fn view(&self) -> HeadlessView {
        HeadlessView {
            state: Arc::clone(&self.state),
            game_version: Arc::clone(&self.game_version),
        }
    }

    pub fn advance(&mut self, dt: Duration) {
        let mut state = self.state.write();
        if state.paused {
            return;
        }

        let hours = dt.as_secs_f64() * GAME_HOURS_PER_SECOND * f64::from(state.speed);
        state.time.hour = ((f64::from(state.time.hour) + hours) % 24.0) as f32;
        let millis = (hours * 3_600_000.0) as i64;
        state.time.game_time += TimeDelta::milliseconds(millis);
    }

    pub fn speed(&self) -> (u8, bool) {
        let state = self.state.read();
        (state.speed, state.paused)
    }

    pub fn building_ids(&self) -> Vec<u32> {
        self.state.read().buildings.keys().copied().collect()
    }

    pub fn world_len(&self) -> usize {
        self.state.read().world.len()
    }
}

impl SimulationMut for HeadlessSimulation {
    fn set_time_of_day(&mut self, time: TimeOfDay) {
        self.state.write().time = time;
    }

    fn load_world(&mut self, world: &[u8]) {
        let mut state = self.state.write();
        state.world = world.to_vec();
        state.buildings.clear();
    }

    fn set_speed(&mut self, speed: u8, paused: bool) {
        let mut state = self.state.write();
        state.speed = speed;
        state.paused = paused;
    }

    fn create_building(&mut self, building: &BuildingCreateCommand) {
        self.state
            .write()
            .buildings
            .insert(building.building_id, building.clone());
    }

    fn remove_building(&mut self, building_id: u32) {
        if self.state.write().buildings.remove(&building_id).is_none() {
            log::debug!("Remove of unknown building {}", building_id);
        }
    }
}

impl SimulationView for HeadlessView {
    fn game_version(&self) -> String {
        self.game_version.to_string()
    }

    fn world_snapshot(&self) -> Vec<u8> {
        self.state.read().world.clone()
    }

    fn time_of_day(&self) -> TimeOfDay {
        self.state.read().time
    }
}
