//! # Arena Session Server Library
//!
//! This library provides the authoritative session server for a small
//! multiplayer arena game. It owns the single source of truth for every
//! player's position, health, lives and character, validates the actions
//! clients submit, and broadcasts the resulting state changes to every
//! connected client.
//!
//! ## Core Responsibilities
//!
//! ### Admission
//! New WebSocket connections are admitted by source address, taken from an
//! `X-Forwarded-For` header when present. Depending on configuration an
//! address may hold one live session at a time, or may connect only once for
//! the lifetime of the process.
//!
//! ### Authoritative State
//! Clients never report state, only intents (`select`, `move`, `attack`,
//! `heal`). The server clamps positions to the arena, enforces the attack
//! cooldown and resolves damage, respawn and elimination.
//!
//! ### Abuse and Liveness Protection
//! Each connection may send a bounded number of messages per second; the
//! first message over the limit closes it. A periodic heartbeat terminates
//! connections that stop answering pings.
//!
//! ## Architecture Design
//!
//! ### One Lock, Many Tasks
//! Each connection runs in its own task, and a separate task drives the
//! heartbeat. All of them share one [`game::GameState`] behind a single
//! `tokio::sync::Mutex`, so every message is validated, applied and
//! broadcast before the next one touches the store.
//!
//! ### Fire-and-Forget Broadcast
//! Every connection owns an unbounded outbound queue drained by a writer
//! task. Broadcasting only enqueues, so a slow or dead client never delays
//! the others.
//!
//! ## Module Organization
//!
//! - `admission`: IP admission policies and client address resolution
//! - `broadcast`: registry of outbound queues and event fan-out
//! - `config`: command line / environment configuration
//! - `error`: error type for startup and connection setup
//! - `game`: shared state and session lifecycle
//! - `liveness`: heartbeat sweep and monitor task
//! - `network`: listener, handshake and per-connection tasks
//! - `rate_limit`: per-connection message throttling
//! - `resolver`: select/move/attack/heal resolution
//! - `session`: per-connection record owned by its handler
//! - `store`: authoritative player state store
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod admission;
pub mod broadcast;
pub mod config;
pub mod error;
pub mod game;
pub mod liveness;
pub mod network;
pub mod rate_limit;
pub mod resolver;
pub mod session;
pub mod store;
