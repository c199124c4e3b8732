//! Performance benchmarks for the hot paths of action resolution

use server::broadcast::{ConnectionHandle, ConnectionRegistry};
use server::config::GameRules;
use server::rate_limit::RateLimiter;
use server::resolver::ActionResolver;
use server::store::PlayerStore;
use shared::{Position, ServerEvent};
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn seeded_rng() -> rand::rngs::StdRng {
    use rand::SeedableRng;
    rand::rngs::StdRng::seed_from_u64(2024)
}

/// Benchmarks move validation and clamping
#[test]
fn benchmark_move_resolution() {
    let rules = GameRules::default();
    let resolver = ActionResolver::new(rules);
    let mut store = PlayerStore::new();
    let mut rng = seeded_rng();
    store.spawn(1, &rules, &mut rng);

    let iterations = 100_000;
    let start = Instant::now();

    for i in 0..iterations {
        let offset = (i % 3000) as f64 - 1000.0;
        let events = resolver.move_to(&mut store, 1, Position::new(offset, -offset));
        assert_eq!(events.len(), 1);
    }

    let duration = start.elapsed();
    println!(
        "Move resolution: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(rules.arena.contains(store.get(1).unwrap().state.position()));
    assert!(duration.as_secs() < 5);
}

/// Benchmarks an attack scanning a crowded arena
#[test]
fn benchmark_attack_scan() {
    let rules = GameRules {
        attack_cooldown: Duration::ZERO,
        attack_damage: 0,
        ..GameRules::default()
    };
    let resolver = ActionResolver::new(rules);
    let mut store = PlayerStore::new();
    let mut rng = seeded_rng();
    for id in 1..=200 {
        store.spawn(id, &rules, &mut rng);
    }

    let iterations = 10_000;
    let now = Instant::now();
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = resolver.attack(&mut store, &mut rng, 1, now);
    }

    let duration = start.elapsed();
    println!(
        "Attack scan over {} players: {} iterations in {:?} ({:.2} μs/iter)",
        store.len(),
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(store.len(), 200);
    assert!(duration.as_secs() < 10);
}

/// Benchmarks fan-out of one event to many connections
#[test]
fn benchmark_broadcast_fanout() {
    let mut registry = ConnectionRegistry::new();
    let mut receivers = Vec::new();
    for id in 0..100 {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(id, ConnectionHandle::new(IpAddr::V4(Ipv4Addr::LOCALHOST), tx));
        receivers.push(rx);
    }

    let iterations = 1_000;
    let event = ServerEvent::Damage { id: 1, hp: 85 };
    let start = Instant::now();

    for _ in 0..iterations {
        assert_eq!(registry.broadcast(&event), 100);
    }

    let duration = start.elapsed();
    println!(
        "Broadcast to {} connections: {} iterations in {:?}",
        registry.len(),
        iterations,
        duration
    );

    for rx in &mut receivers {
        let mut received = 0;
        while rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, iterations);
    }
    assert!(duration.as_secs() < 10);
}

/// Benchmarks the per-message rate limiter check
#[test]
fn benchmark_rate_limiter() {
    let start = Instant::now();
    let mut limiter = RateLimiter::new(40, Duration::from_millis(1000), start);

    let iterations = 1_000_000u64;
    let mut allowed = 0;
    for i in 0..iterations {
        // 50 messages per simulated second
        if limiter.record(start + Duration::from_millis(i * 20)) {
            allowed += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Rate limiter: {} checks in {:?} ({:.2} ns/check)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(allowed, iterations / 50 * 40);
    assert!(duration.as_secs() < 5);
}
