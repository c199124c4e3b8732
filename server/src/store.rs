//! Authoritative player state store
//!
//! Holds one [`PlayerEntry`] per admitted, not yet eliminated player. Entries
//! are kept in a `BTreeMap` so that iteration, and with it the order in which
//! one attack resolves several targets, is deterministic.

use crate::config::GameRules;
use log::info;
use rand::Rng;
use shared::{Arena, PlayerId, PlayerState, Position};
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct PlayerEntry {
    pub state: PlayerState,
    /// Start of the current attack cooldown, if the player has attacked
    pub last_attack_at: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct PlayerStore {
    players: BTreeMap<PlayerId, PlayerEntry>,
}

impl PlayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh entry at a random legal position
    pub fn spawn<R: Rng + ?Sized>(
        &mut self,
        id: PlayerId,
        rules: &GameRules,
        rng: &mut R,
    ) -> &PlayerState {
        let position = random_position(&rules.arena, rng);
        info!("Added player {} at ({:.1}, {:.1})", id, position.x, position.y);

        let entry = self.players.entry(id).or_insert(PlayerEntry {
            state: PlayerState::new(position, rules.max_hp, rules.starting_lives),
            last_attack_at: None,
        });
        &entry.state
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerEntry> {
        self.players.get(&id)
    }

    pub fn get_mut(&mut self, id: PlayerId) -> Option<&mut PlayerEntry> {
        self.players.get_mut(&id)
    }

    pub fn remove(&mut self, id: PlayerId) -> Option<PlayerEntry> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            info!("Removed player {}", id);
        }
        removed
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &PlayerEntry)> {
        self.players.iter().map(|(id, entry)| (*id, entry))
    }

    /// Public view of every player, as sent in `init`
    pub fn snapshot(&self) -> BTreeMap<PlayerId, PlayerState> {
        self.players
            .iter()
            .map(|(id, entry)| (*id, entry.state.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Uniformly random point inside the arena's legal rectangle
pub fn random_position<R: Rng + ?Sized>(arena: &Arena, rng: &mut R) -> Position {
    Position::new(
        rng.gen_range(arena.min_x()..=arena.max_x()),
        rng.gen_range(arena.min_y()..=arena.max_y()),
    )
}
