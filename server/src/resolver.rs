//! Action resolution against the player store
//!
//! [`ActionResolver`] validates one inbound [`ClientMessage`] on behalf of a
//! player, applies it to the [`PlayerStore`] and returns the events to
//! broadcast, in order. Invalid or ineffective actions return no events and
//! leave the store untouched.

use crate::config::GameRules;
use crate::store::{random_position, PlayerStore};
use log::{debug, info};
use rand::Rng;
use serde_json::Value;
use shared::{
    ClientMessage, PlayerId, Position, Respawn, ServerEvent, FALLBACK_CHARACTER,
    MAX_CHARACTER_LEN,
};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ActionResolver {
    rules: GameRules,
}

impl ActionResolver {
    pub fn new(rules: GameRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Applies `action` for `player`. Actions from players no longer in the
    /// store (eliminated spectators) are ignored.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        store: &mut PlayerStore,
        rng: &mut R,
        player: PlayerId,
        action: ClientMessage,
        now: Instant,
    ) -> Vec<ServerEvent> {
        match action {
            ClientMessage::Select { character } => self.select(store, player, &character),
            ClientMessage::Move { position } => self.move_to(store, player, position),
            ClientMessage::Attack => self.attack(store, rng, player, now),
            ClientMessage::Heal => self.heal(store, player),
        }
    }

    pub fn select(
        &self,
        store: &mut PlayerStore,
        player: PlayerId,
        character: &Value,
    ) -> Vec<ServerEvent> {
        let Some(entry) = store.get_mut(player) else {
            return Vec::new();
        };

        let character = character_name(character);
        info!("Player {} selected {}", player, character);
        entry.state.character = Some(character);

        vec![ServerEvent::Spawn {
            id: player,
            state: entry.state.clone(),
        }]
    }

    pub fn move_to(
        &self,
        store: &mut PlayerStore,
        player: PlayerId,
        requested: Position,
    ) -> Vec<ServerEvent> {
        if !requested.is_finite() {
            debug!("Dropped non-finite move from player {}", player);
            return Vec::new();
        }
        let Some(entry) = store.get_mut(player) else {
            return Vec::new();
        };

        let position = self.rules.arena.clamp(requested);
        entry.state.set_position(position);

        vec![ServerEvent::Update {
            id: player,
            position,
        }]
    }

    /// Damages every other player within range of the attacker.
    ///
    /// Attempts inside the cooldown are silent no-ops. Targets are resolved
    /// in store order; each hit yields `damage`, then `dead` (respawn) or
    /// `eliminated` + `remove` once hp reaches zero.
    pub fn attack<R: Rng + ?Sized>(
        &self,
        store: &mut PlayerStore,
        rng: &mut R,
        attacker: PlayerId,
        now: Instant,
    ) -> Vec<ServerEvent> {
        let Some(entry) = store.get_mut(attacker) else {
            return Vec::new();
        };

        if let Some(last) = entry.last_attack_at {
            if now.saturating_duration_since(last) < self.rules.attack_cooldown {
                return Vec::new();
            }
        }
        entry.last_attack_at = Some(now);

        let origin = entry.state.position();
        let targets: Vec<PlayerId> = store
            .iter()
            .filter(|(id, target)| {
                *id != attacker
                    && origin.distance(&target.state.position()) <= self.rules.attack_range
            })
            .map(|(id, _)| id)
            .collect();

        let mut events = Vec::new();
        for target in targets {
            self.apply_hit(store, rng, target, &mut events);
        }
        events
    }

    fn apply_hit<R: Rng + ?Sized>(
        &self,
        store: &mut PlayerStore,
        rng: &mut R,
        target: PlayerId,
        events: &mut Vec<ServerEvent>,
    ) {
        let Some(entry) = store.get_mut(target) else {
            return;
        };

        entry.state.hp = entry.state.hp.saturating_sub(self.rules.attack_damage);
        events.push(ServerEvent::Damage {
            id: target,
            hp: entry.state.hp,
        });
        if entry.state.hp > 0 {
            return;
        }

        entry.state.lives = entry.state.lives.saturating_sub(1);
        if entry.state.lives > 0 {
            let position = random_position(&self.rules.arena, rng);
            entry.state.set_position(position);
            entry.state.hp = self.rules.max_hp;
            info!(
                "Player {} died, respawning with {} lives left",
                target, entry.state.lives
            );

            events.push(ServerEvent::Dead {
                id: target,
                respawn: Respawn {
                    x: position.x,
                    y: position.y,
                    hp: entry.state.hp,
                    lives: entry.state.lives,
                },
            });
        } else {
            info!("Player {} eliminated", target);
            events.push(ServerEvent::Eliminated { id: target });
            store.remove(target);
            events.push(ServerEvent::Remove { id: target });
        }
    }

    /// Last-stand heal: only a player on their final life below full hp
    /// is restored.
    pub fn heal(&self, store: &mut PlayerStore, player: PlayerId) -> Vec<ServerEvent> {
        let Some(entry) = store.get_mut(player) else {
            return Vec::new();
        };
        if entry.state.lives != 1 || entry.state.hp >= self.rules.max_hp {
            return Vec::new();
        }

        entry.state.hp = self.rules.max_hp;
        vec![ServerEvent::Healed {
            id: player,
            hp: entry.state.hp,
        }]
    }
}

/// Trimmed character name, or the fallback for anything that is not a
/// short non-empty string
pub fn character_name(value: &Value) -> String {
    match value.as_str().map(str::trim) {
        Some(name) if !name.is_empty() && name.chars().count() <= MAX_CHARACTER_LEN => {
            name.to_string()
        }
        _ => FALLBACK_CHARACTER.to_string(),
    }
}
