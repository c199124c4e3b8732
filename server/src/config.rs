//! Startup configuration
//!
//! Every knob is available as a command line flag and as an `ARENA_*`
//! environment variable. [`ServerArgs`] is converted into a validated
//! [`ServerConfig`] before the server binds.

use crate::admission::AdmissionPolicy;
use crate::error::ServerError;
use clap::Parser;
use shared::{
    Arena, ARENA_HEIGHT, ARENA_PADDING, ARENA_WIDTH, ATTACK_COOLDOWN_MS, ATTACK_DAMAGE,
    ATTACK_RANGE, DEFAULT_PORT, HEARTBEAT_INTERVAL_MS, MAX_HP, RATE_LIMIT_MESSAGES,
    RATE_LIMIT_WINDOW_MS, STARTING_LIVES,
};
use std::time::Duration;

/// Gameplay constants consumed by the player store and action resolver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameRules {
    pub arena: Arena,
    pub max_hp: u32,
    pub starting_lives: u32,
    pub attack_range: f64,
    pub attack_cooldown: Duration,
    pub attack_damage: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            arena: Arena::default(),
            max_hp: MAX_HP,
            starting_lives: STARTING_LIVES,
            attack_range: ATTACK_RANGE,
            attack_cooldown: Duration::from_millis(ATTACK_COOLDOWN_MS),
            attack_damage: ATTACK_DAMAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_messages: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_messages: RATE_LIMIT_MESSAGES,
            window: Duration::from_millis(RATE_LIMIT_WINDOW_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub admission: AdmissionPolicy,
    pub rate_limit: RateLimitConfig,
    pub heartbeat_interval: Duration,
    pub rules: GameRules,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ServerError> {
        if !self.rules.arena.is_valid() {
            return Err(ServerError::InvalidConfig(format!(
                "arena padding {} leaves no legal area in {}x{}",
                self.rules.arena.padding, self.rules.arena.width, self.rules.arena.height
            )));
        }
        if self.rules.max_hp == 0 || self.rules.starting_lives == 0 {
            return Err(ServerError::InvalidConfig(
                "max hp and starting lives must be positive".to_string(),
            ));
        }
        if !self.rules.attack_range.is_finite() || self.rules.attack_range < 0.0 {
            return Err(ServerError::InvalidConfig(format!(
                "attack range {} must be a non-negative number",
                self.rules.attack_range
            )));
        }
        if self.heartbeat_interval.is_zero() || self.rate_limit.window.is_zero() {
            return Err(ServerError::InvalidConfig(
                "heartbeat interval and rate limit window must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("0.0.0.0:{}", DEFAULT_PORT),
            admission: AdmissionPolicy::SingleSession,
            rate_limit: RateLimitConfig::default(),
            heartbeat_interval: Duration::from_millis(HEARTBEAT_INTERVAL_MS),
            rules: GameRules::default(),
        }
    }
}

/// Command line arguments of the `server` binary
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Authoritative arena session server", long_about = None)]
pub struct ServerArgs {
    /// IP address to bind to
    #[arg(short = 'H', long, env = "ARENA_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "ARENA_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Admission policy applied to client addresses
    #[arg(long, env = "ARENA_ADMISSION", value_enum, default_value_t = AdmissionPolicy::SingleSession)]
    pub admission: AdmissionPolicy,

    /// Inbound messages allowed per connection per second
    #[arg(long, env = "ARENA_RATE_LIMIT", default_value_t = RATE_LIMIT_MESSAGES)]
    pub rate_limit: u32,

    /// Heartbeat probe period in milliseconds
    #[arg(long, env = "ARENA_HEARTBEAT_MS", default_value_t = HEARTBEAT_INTERVAL_MS)]
    pub heartbeat_ms: u64,

    /// Nominal arena width
    #[arg(long, env = "ARENA_WIDTH", default_value_t = ARENA_WIDTH)]
    pub width: f64,

    /// Nominal arena height
    #[arg(long, env = "ARENA_HEIGHT", default_value_t = ARENA_HEIGHT)]
    pub height: f64,

    /// Margin removed from each arena edge
    #[arg(long, env = "ARENA_PADDING", default_value_t = ARENA_PADDING)]
    pub padding: f64,

    /// Radius of the attack check
    #[arg(long, env = "ARENA_ATTACK_RANGE", default_value_t = ATTACK_RANGE)]
    pub attack_range: f64,

    /// Minimum time between two attacks of one player, in milliseconds
    #[arg(long, env = "ARENA_ATTACK_COOLDOWN_MS", default_value_t = ATTACK_COOLDOWN_MS)]
    pub attack_cooldown_ms: u64,

    /// Damage dealt per hit
    #[arg(long, env = "ARENA_ATTACK_DAMAGE", default_value_t = ATTACK_DAMAGE)]
    pub attack_damage: u32,

    /// Lives each player starts with
    #[arg(long, env = "ARENA_STARTING_LIVES", default_value_t = STARTING_LIVES)]
    pub starting_lives: u32,
}

impl TryFrom<ServerArgs> for ServerConfig {
    type Error = ServerError;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        let config = ServerConfig {
            bind_addr: format!("{}:{}", args.host, args.port),
            admission: args.admission,
            rate_limit: RateLimitConfig {
                max_messages: args.rate_limit,
                window: Duration::from_millis(RATE_LIMIT_WINDOW_MS),
            },
            heartbeat_interval: Duration::from_millis(args.heartbeat_ms),
            rules: GameRules {
                arena: Arena {
                    width: args.width,
                    height: args.height,
                    padding: args.padding,
                },
                max_hp: MAX_HP,
                starting_lives: args.starting_lives,
                attack_range: args.attack_range,
                attack_cooldown: Duration::from_millis(args.attack_cooldown_ms),
                attack_damage: args.attack_damage,
            },
        };

        config.validate()?;
        Ok(config)
    }
}
