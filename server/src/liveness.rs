//! Heartbeat-based liveness detection
//!
//! Every period each connection is either probed or, if it failed to answer
//! the previous probe, terminated. An unresponsive connection is therefore
//! dropped after one to two periods.

use crate::broadcast::{ConnectionRegistry, Outbound};
use crate::game::GameState;
use log::{debug, warn};
use shared::PlayerId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Runs one heartbeat pass over `registry`.
///
/// Connections still flagged dead from the previous pass are sent
/// [`Outbound::Terminate`] and returned; all others are flagged dead and
/// probed.
pub fn sweep(registry: &mut ConnectionRegistry) -> Vec<PlayerId> {
    let mut unresponsive = Vec::new();

    for id in registry.ids() {
        let Some(handle) = registry.get_mut(id) else {
            continue;
        };

        if !handle.alive {
            warn!("Connection {} missed heartbeat, terminating", id);
            handle.send(Outbound::Terminate);
            unresponsive.push(id);
            continue;
        }

        handle.alive = false;
        if !handle.send(Outbound::Ping) {
            debug!("Heartbeat to closed connection {} skipped", id);
        }
    }

    unresponsive
}

/// Spawns the periodic heartbeat task. The first sweep runs one full
/// `period` after start.
pub fn spawn_monitor(state: Arc<Mutex<GameState>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let terminated = state.lock().await.sweep_liveness();
            if !terminated.is_empty() {
                debug!("Heartbeat sweep terminated {:?}", terminated);
            }
        }
    })
}
