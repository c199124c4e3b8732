//! Shared authoritative game state
//!
//! [`GameState`] owns every piece of state touched by more than one task: the
//! player store, the connection registry and the admission table. It is kept
//! behind a single `tokio::sync::Mutex`, so each inbound message, session
//! change and heartbeat sweep is applied and broadcast as one unit.

use crate::admission::{Admission, AdmissionController, Denial};
use crate::broadcast::{ConnectionHandle, ConnectionRegistry, Outbound};
use crate::config::{GameRules, ServerConfig};
use crate::liveness;
use crate::resolver::ActionResolver;
use crate::store::PlayerStore;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ClientMessage, PlayerId, ServerEvent};
use std::net::IpAddr;
use std::time::Instant;
use tokio::sync::mpsc;

pub struct GameState {
    resolver: ActionResolver,
    store: PlayerStore,
    registry: ConnectionRegistry,
    admission: AdmissionController,
    rng: StdRng,
    next_player_id: PlayerId,
}

impl GameState {
    pub fn new(config: &ServerConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_rng(config: &ServerConfig, rng: StdRng) -> Self {
        Self {
            resolver: ActionResolver::new(config.rules),
            store: PlayerStore::new(),
            registry: ConnectionRegistry::new(),
            admission: AdmissionController::new(config.admission),
            rng,
            next_player_id: 1,
        }
    }

    pub fn rules(&self) -> &GameRules {
        self.resolver.rules()
    }

    pub fn players(&self) -> &PlayerStore {
        &self.store
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Admits a new connection from `ip`.
    ///
    /// On success the player is created and sent a private `init` snapshot
    /// through `sender`; no other connection is notified.
    pub fn open_session(
        &mut self,
        ip: IpAddr,
        sender: mpsc::UnboundedSender<Outbound>,
    ) -> Result<PlayerId, Denial> {
        let id = self.next_player_id;
        if let Admission::Deny(denial) = self.admission.admit(ip, id) {
            return Err(denial);
        }
        self.next_player_id += 1;

        let rules = *self.resolver.rules();
        self.store.spawn(id, &rules, &mut self.rng);
        self.registry.register(id, ConnectionHandle::new(ip, sender));

        let init = ServerEvent::Init {
            id,
            players: self.store.snapshot(),
            arena: rules.arena,
        };
        self.registry.send_to(id, &init);

        info!(
            "Session {} opened from {} ({} connected)",
            id,
            ip,
            self.registry.len()
        );
        Ok(id)
    }

    /// Parses and applies one text message from `player`, broadcasting the
    /// resulting events. Malformed payloads are dropped silently.
    pub fn handle_message(&mut self, player: PlayerId, text: &str, now: Instant) {
        let action = match ClientMessage::from_json(text) {
            Ok(action) => action,
            Err(e) => {
                debug!("Dropped malformed message from {}: {}", player, e);
                return;
            }
        };
        self.apply(player, action, now);
    }

    pub fn apply(&mut self, player: PlayerId, action: ClientMessage, now: Instant) {
        let events = self
            .resolver
            .resolve(&mut self.store, &mut self.rng, player, action, now);
        for event in &events {
            self.registry.broadcast(event);
        }
    }

    /// Marks `player`'s connection as having answered the heartbeat
    pub fn mark_alive(&mut self, player: PlayerId) {
        if let Some(handle) = self.registry.get_mut(player) {
            handle.alive = true;
        }
    }

    /// Tears down `player`'s session. Safe to call more than once; only the
    /// first call releases the admission slot and broadcasts `remove`.
    pub fn close_session(&mut self, player: PlayerId) -> bool {
        let Some(handle) = self.registry.unregister(player) else {
            return false;
        };
        self.admission.release(handle.ip, player);

        if self.store.remove(player).is_some() {
            self.registry.broadcast(&ServerEvent::Remove { id: player });
        }

        info!(
            "Session {} closed ({} connected)",
            player,
            self.registry.len()
        );
        true
    }

    /// Runs one heartbeat pass and tears down every connection that missed
    /// the previous probe
    pub fn sweep_liveness(&mut self) -> Vec<PlayerId> {
        let terminated = liveness::sweep(&mut self.registry);
        for player in &terminated {
            self.close_session(*player);
        }
        terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::AdmissionPolicy;
    use shared::{Position, CLOSE_IP_BLOCKED, CLOSE_IP_IN_USE};
    use std::net::Ipv4Addr;
    use std::time::Duration;

    struct Conn {
        id: PlayerId,
        rx: mpsc::UnboundedReceiver<Outbound>,
    }

    impl Conn {
        fn events(&mut self) -> Vec<ServerEvent> {
            let mut events = Vec::new();
            while let Ok(outbound) = self.rx.try_recv() {
                if let Outbound::Text(text) = outbound {
                    events.push(ServerEvent::from_json(&text).unwrap());
                }
            }
            events
        }
    }

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn state_with(policy: AdmissionPolicy) -> GameState {
        let config = ServerConfig {
            admission: policy,
            ..ServerConfig::default()
        };
        GameState::with_rng(&config, StdRng::seed_from_u64(99))
    }

    fn connect(state: &mut GameState, addr: IpAddr) -> Result<Conn, Denial> {
        let (tx, rx) = mpsc::unbounded_channel();
        state.open_session(addr, tx).map(|id| Conn { id, rx })
    }

    fn place(state: &mut GameState, conn: &Conn, x: f64, y: f64) {
        let text = ClientMessage::Move {
            position: Position::new(x, y),
        }
        .to_json()
        .unwrap();
        state.handle_message(conn.id, &text, Instant::now());
    }

    #[test]
    fn test_init_is_sent_only_to_new_connection() {
        let mut state = state_with(AdmissionPolicy::SingleSession);
        let mut first = connect(&mut state, ip(1)).unwrap();
        assert_eq!(first.events().len(), 1);

        let mut second = connect(&mut state, ip(2)).unwrap();
        assert!(first.events().is_empty());

        match second.events().as_slice() {
            [ServerEvent::Init { id, players, arena }] => {
                assert_eq!(*id, second.id);
                assert_eq!(players.len(), 2);
                assert!(players.contains_key(&first.id));
                assert_eq!(*arena, state.rules().arena);
            }
            other => panic!("expected init, got {:?}", other),
        }
    }

    #[test]
    fn test_identities_are_unique() {
        let mut state = state_with(AdmissionPolicy::SingleSession);
        let a = connect(&mut state, ip(1)).unwrap();
        let b = connect(&mut state, ip(2)).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_duplicate_ip_denied_until_close() {
        let mut state = state_with(AdmissionPolicy::SingleSession);
        let first = connect(&mut state, ip(1)).unwrap();

        let denial = connect(&mut state, ip(1)).err().unwrap();
        assert_eq!(denial.code, CLOSE_IP_IN_USE);
        assert_eq!(state.players().len(), 1);

        assert!(state.close_session(first.id));
        assert!(connect(&mut state, ip(1)).is_ok());
    }

    #[test]
    fn test_permanent_block_survives_close() {
        let mut state = state_with(AdmissionPolicy::PermanentBlock);
        let first = connect(&mut state, ip(1)).unwrap();
        state.close_session(first.id);

        let denial = connect(&mut state, ip(1)).err().unwrap();
        assert_eq!(denial.code, CLOSE_IP_BLOCKED);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut state = state_with(AdmissionPolicy::SingleSession);
        let leaving = connect(&mut state, ip(1)).unwrap();
        let mut watcher = connect(&mut state, ip(2)).unwrap();
        watcher.events();

        assert!(state.close_session(leaving.id));
        assert!(!state.close_session(leaving.id));

        assert_eq!(
            watcher.events(),
            vec![ServerEvent::Remove { id: leaving.id }]
        );
        assert_eq!(state.connection_count(), 1);
    }

    #[test]
    fn test_moves_are_broadcast_to_all() {
        let mut state = state_with(AdmissionPolicy::SingleSession);
        let mut mover = connect(&mut state, ip(1)).unwrap();
        let mut watcher = connect(&mut state, ip(2)).unwrap();
        mover.events();
        watcher.events();

        place(&mut state, &mover, 300.0, 300.0);
        let expected = vec![ServerEvent::Update {
            id: mover.id,
            position: Position::new(300.0, 300.0),
        }];
        assert_eq!(mover.events(), expected);
        assert_eq!(watcher.events(), expected);
    }

    #[test]
    fn test_malformed_messages_are_dropped() {
        let mut state = state_with(AdmissionPolicy::SingleSession);
        let mut conn = connect(&mut state, ip(1)).unwrap();
        conn.events();
        let before = state.players().get(conn.id).unwrap().state.clone();

        for text in ["", "{", r#"{"type":"move","position":{"x":"left","y":1}}"#, "42"] {
            state.handle_message(conn.id, text, Instant::now());
        }

        assert!(conn.events().is_empty());
        assert_eq!(state.players().get(conn.id).unwrap().state, before);
    }

    #[test]
    fn test_elimination_leaves_spectator_connected() {
        let mut state = state_with(AdmissionPolicy::SingleSession);
        let attacker = connect(&mut state, ip(1)).unwrap();
        let mut victim = connect(&mut state, ip(2)).unwrap();
        place(&mut state, &attacker, 500.0, 500.0);
        place(&mut state, &victim, 500.0, 500.0);
        victim.events();

        let start = Instant::now();
        let mut hits = 0;
        while state.players().contains(victim.id) {
            let now = start + Duration::from_millis(500 * hits);
            state.apply(attacker.id, ClientMessage::Attack, now);
            hits += 1;
            let respawned = state
                .players()
                .get(victim.id)
                .is_some_and(|entry| entry.state.position() != Position::new(500.0, 500.0));
            if respawned {
                place(&mut state, &victim, 500.0, 500.0);
            }
        }

        let events = victim.events();
        let tail = &events[events.len() - 2..];
        assert_eq!(
            tail,
            &[
                ServerEvent::Eliminated { id: victim.id },
                ServerEvent::Remove { id: victim.id },
            ]
        );
        assert_eq!(state.connection_count(), 2);

        // Spectator actions are ignored and its close broadcasts nothing
        state.apply(victim.id, ClientMessage::Heal, Instant::now());
        assert!(state.close_session(victim.id));
        assert!(victim.events().is_empty());

        let mut late = connect(&mut state, ip(3)).unwrap();
        match late.events().as_slice() {
            [ServerEvent::Init { players, .. }] => assert!(!players.contains_key(&victim.id)),
            other => panic!("expected init, got {:?}", other),
        }
    }

    #[test]
    fn test_sweep_terminates_and_cleans_up() {
        let mut state = state_with(AdmissionPolicy::SingleSession);
        let mut silent = connect(&mut state, ip(1)).unwrap();
        let mut alive = connect(&mut state, ip(2)).unwrap();
        silent.events();
        alive.events();

        assert!(state.sweep_liveness().is_empty());
        state.mark_alive(alive.id);
        assert_eq!(state.sweep_liveness(), vec![silent.id]);

        assert!(!state.players().contains(silent.id));
        assert_eq!(alive.events(), vec![ServerEvent::Remove { id: silent.id }]);

        let mut outbound = Vec::new();
        while let Ok(item) = silent.rx.try_recv() {
            outbound.push(item);
        }
        assert_eq!(outbound, vec![Outbound::Ping, Outbound::Terminate]);

        // The handler's own teardown afterwards is a no-op
        assert!(!state.close_session(silent.id));
        assert!(connect(&mut state, ip(1)).is_ok());
    }
}
