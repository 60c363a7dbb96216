use std::collections::HashMap;

use crate::command::PeerId;

/// A remote peer that passed admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub peer_id: PeerId,
    pub username: String,
}

impl Player {
    pub fn new(peer_id: PeerId, username: impl Into<String>) -> Self {
        Self {
            peer_id,
            username: username.into(),
        }
    }
}

/// Connected players keyed by transport peer id. Not synchronised on its
/// own; the server session keeps it behind a lock.
///
/// A player is first reserved: its name and slot are taken but it is not
/// listed by [`PlayerTable::peer_ids`] or [`PlayerTable::get`] until it is
/// published.
#[derive(Debug, Default)]
pub struct PlayerTable {
    players: HashMap<PeerId, Player>,
    reserved: HashMap<PeerId, Player>,
}

impl PlayerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive comparison: `"Mayor"` and `"mayor"` are two
    /// different players.
    pub fn contains_username(&self, username: &str) -> bool {
        self.players
            .values()
            .chain(self.reserved.values())
            .any(|p| p.username == username)
    }

    pub fn contains(&self, peer_id: PeerId) -> bool {
        self.players.contains_key(&peer_id)
    }

    pub fn get(&self, peer_id: PeerId) -> Option<&Player> {
        self.players.get(&peer_id)
    }

    pub fn reserve(&mut self, player: Player) {
        self.reserved.insert(player.peer_id, player);
    }

    /// Moves a reserved player into the visible table. `None` if the
    /// reservation was cancelled in the meantime.
    pub fn publish(&mut self, peer_id: PeerId) -> Option<&Player> {
        let player = self.reserved.remove(&peer_id)?;
        Some(self.players.entry(peer_id).or_insert(player))
    }

    pub fn cancel(&mut self, peer_id: PeerId) -> Option<Player> {
        self.reserved.remove(&peer_id)
    }

    pub fn remove(&mut self, peer_id: PeerId) -> Option<Player> {
        self.players.remove(&peer_id)
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        self.players.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// Published and reserved slots together.
    pub fn occupied(&self) -> usize {
        self.players.len() + self.reserved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
