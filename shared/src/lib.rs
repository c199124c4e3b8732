use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const ARENA_WIDTH: f64 = 1200.0;
pub const ARENA_HEIGHT: f64 = 800.0;
pub const ARENA_PADDING: f64 = 40.0;
pub const MAX_HP: u32 = 100;
pub const STARTING_LIVES: u32 = 2;
pub const ATTACK_RANGE: f64 = 50.0;
pub const ATTACK_COOLDOWN_MS: u64 = 500;
pub const ATTACK_DAMAGE: u32 = 15;
pub const RATE_LIMIT_MESSAGES: u32 = 40;
pub const RATE_LIMIT_WINDOW_MS: u64 = 1000;
pub const HEARTBEAT_INTERVAL_MS: u64 = 15_000;
pub const DEFAULT_PORT: u16 = 8080;

pub const FALLBACK_CHARACTER: &str = "default";
pub const MAX_CHARACTER_LEN: usize = 32;

/// Close code sent to an address that has already been seen once
pub const CLOSE_IP_BLOCKED: u16 = 4001;
/// Close code sent to an address that already holds a live session
pub const CLOSE_IP_IN_USE: u16 = 4002;
/// Close code sent when a connection floods the server
pub const CLOSE_RATE_LIMITED: u16 = 4003;

pub type PlayerId = u32;

/// Rectangle bounding every legal coordinate, shrunk by `padding` on each side
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Arena {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

impl Arena {
    /// Builds an arena, returning None when the padding leaves no legal area
    pub fn new(width: f64, height: f64, padding: f64) -> Option<Self> {
        let arena = Self {
            width,
            height,
            padding,
        };
        arena.is_valid().then_some(arena)
    }

    pub fn is_valid(&self) -> bool {
        self.width.is_finite()
            && self.height.is_finite()
            && self.padding.is_finite()
            && self.padding >= 0.0
            && self.padding * 2.0 < self.width
            && self.padding * 2.0 < self.height
    }

    pub fn min_x(&self) -> f64 {
        self.padding
    }

    pub fn max_x(&self) -> f64 {
        self.width - self.padding
    }

    pub fn min_y(&self) -> f64 {
        self.padding
    }

    pub fn max_y(&self) -> f64 {
        self.height - self.padding
    }

    /// Clamps each axis independently into the legal rectangle
    pub fn clamp(&self, position: Position) -> Position {
        Position {
            x: position.x.clamp(self.min_x(), self.max_x()),
            y: position.y.clamp(self.min_y(), self.max_y()),
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        (self.min_x()..=self.max_x()).contains(&position.x)
            && (self.min_y()..=self.max_y()).contains(&position.y)
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self {
            width: ARENA_WIDTH,
            height: ARENA_HEIGHT,
            padding: ARENA_PADDING,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Public view of a player, as carried by `init` and `spawn` events
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerState {
    pub x: f64,
    pub y: f64,
    pub character: Option<String>,
    pub hp: u32,
    pub lives: u32,
}

impl PlayerState {
    pub fn new(position: Position, hp: u32, lives: u32) -> Self {
        Self {
            x: position.x,
            y: position.y,
            character: None,
            hp,
            lives,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn set_position(&mut self, position: Position) {
        self.x = position.x;
        self.y = position.y;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Respawn {
    pub x: f64,
    pub y: f64,
    pub hp: u32,
    pub lives: u32,
}

/// Messages sent by the server. Serialized as JSON objects tagged by `type`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerEvent {
    Error {
        code: u16,
        reason: String,
    },
    Init {
        id: PlayerId,
        #[serde(deserialize_with = "players_by_id")]
        players: BTreeMap<PlayerId, PlayerState>,
        arena: Arena,
    },
    Spawn {
        id: PlayerId,
        state: PlayerState,
    },
    Update {
        id: PlayerId,
        position: Position,
    },
    Damage {
        id: PlayerId,
        hp: u32,
    },
    Dead {
        id: PlayerId,
        respawn: Respawn,
    },
    Eliminated {
        id: PlayerId,
    },
    Remove {
        id: PlayerId,
    },
    Healed {
        id: PlayerId,
        hp: u32,
    },
}

/// JSON object keys are always strings, and a `type`-tagged enum buffers its
/// content before the map is read, so ids are parsed back here by hand.
fn players_by_id<'de, D>(deserializer: D) -> Result<BTreeMap<PlayerId, PlayerState>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{Error, Unexpected};

    let raw = BTreeMap::<String, PlayerState>::deserialize(deserializer)?;
    let mut players = BTreeMap::new();
    for (key, state) in raw {
        let id = key
            .parse::<PlayerId>()
            .map_err(|_| D::Error::invalid_value(Unexpected::Str(&key), &"a player id"))?;
        players.insert(id, state);
    }
    Ok(players)
}

impl ServerEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Actions submitted by clients.
///
/// `character` is kept as a raw JSON value so that a non-string choice still
/// parses and falls back to the default character instead of being dropped.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Select {
        #[serde(default)]
        character: Value,
    },
    Move {
        position: Position,
    },
    Attack,
    Heal,
}

impl ClientMessage {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
