//! Delta broadcasting
//!
//! The broadcaster never mutates world state; it observes completed
//! snapshots and keeps, per subscriber, the baseline that subscriber last
//! acknowledged (the `tick` field of their command frames). Every
//! broadcast frame is a delta against that baseline, so frame loss costs
//! nothing: the next frame diffs from whatever the client proved it has.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use tokio::sync::mpsc;
use tracing::debug;

use crate::game::world::{PlayerId, WorldState};
use crate::ws::protocol::{
    PlayerDelta, PlayerSnapshot, ProjectileDeltas, ServerMsg, SnapshotDelta, TickEvent,
};

/// Position change below this is not broadcast (world units)
pub const POS_EPSILON: f32 = 0.01;
/// Yaw change below this is not broadcast (radians)
pub const YAW_EPSILON: f32 = 0.01;

/// Broadcast snapshots retained as diff baselines (~13 s at 10 Hz).
/// An ack older than the window falls back to a full delta.
const HISTORY_LIMIT: usize = 128;

struct HistoryEntry {
    tick: u64,
    players: BTreeMap<PlayerId, PlayerSnapshot>,
    projectile_ids: BTreeSet<u64>,
}

struct Subscriber {
    tx: mpsc::Sender<ServerMsg>,
    acked_tick: Option<u64>,
    last_sent_tick: u64,
}

/// Per-room delta broadcaster.
pub struct DeltaBroadcaster {
    history: VecDeque<HistoryEntry>,
    events: VecDeque<TickEvent>,
    subscribers: HashMap<PlayerId, Subscriber>,
}

impl DeltaBroadcaster {
    pub fn new() -> Self {
        Self {
            history: VecDeque::new(),
            events: VecDeque::new(),
            subscribers: HashMap::new(),
        }
    }

    /// Register a subscriber. Its first delta is keyed on the empty
    /// JoinAck baseline, i.e. a full snapshot.
    pub fn subscribe(&mut self, id: PlayerId, tx: mpsc::Sender<ServerMsg>, current_tick: u64) {
        self.subscribers.insert(
            id,
            Subscriber {
                tx,
                acked_tick: None,
                last_sent_tick: current_tick,
            },
        );
    }

    pub fn unsubscribe(&mut self, id: &PlayerId) {
        self.subscribers.remove(id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Note a subscriber's acknowledged tick (from their command frames).
    pub fn ack(&mut self, id: &PlayerId, tick: u64) {
        if let Some(sub) = self.subscribers.get_mut(id) {
            sub.acked_tick = Some(sub.acked_tick.map_or(tick, |t| t.max(tick)));
        }
    }

    /// Accumulate the events of a completed simulation tick. Called every
    /// tick, including non-broadcast ones, so no event is lost between
    /// broadcast frames.
    pub fn record_events(&mut self, world: &WorldState) {
        self.events.extend(world.events.iter().cloned());
    }

    /// Send a message to one subscriber outside the delta flow
    /// (terminal errors, room end).
    pub fn send_to_all(&self, msg: &ServerMsg) {
        for sub in self.subscribers.values() {
            let _ = sub.tx.try_send(msg.clone());
        }
    }

    /// Emit one delta frame per subscriber for the current snapshot.
    pub fn broadcast(&mut self, world: &WorldState) {
        let players: BTreeMap<PlayerId, PlayerSnapshot> = world
            .players
            .values()
            .map(|p| (p.id.clone(), p.snapshot()))
            .collect();
        let projectile_ids: BTreeSet<u64> = world.projectiles.iter().map(|p| p.id).collect();

        let mut dead = Vec::new();
        for (id, sub) in &mut self.subscribers {
            let baseline = sub
                .acked_tick
                .and_then(|acked| baseline_at(&self.history, acked));

            let delta = build_delta(
                world,
                &players,
                &projectile_ids,
                baseline,
                &self.events,
                sub.last_sent_tick,
            );

            match sub.tx.try_send(ServerMsg::Snapshot { delta }) {
                Ok(()) => {
                    sub.last_sent_tick = world.tick;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Best-effort: drop the frame, the next one covers it.
                    debug!(player_id = %id, "subscriber channel full, dropping snapshot");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    dead.push(id.clone());
                }
            }
        }
        for id in dead {
            self.subscribers.remove(&id);
        }

        self.history.push_back(HistoryEntry {
            tick: world.tick,
            players,
            projectile_ids,
        });
        while self.history.len() > HISTORY_LIMIT {
            self.history.pop_front();
        }
        if let Some(oldest) = self.history.front().map(|h| h.tick) {
            while self.events.front().is_some_and(|e| e.tick < oldest) {
                self.events.pop_front();
            }
        }
    }
}

impl Default for DeltaBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Most recent retained snapshot at or before `acked`.
fn baseline_at(history: &VecDeque<HistoryEntry>, acked: u64) -> Option<&HistoryEntry> {
    history.iter().rev().find(|entry| entry.tick <= acked)
}

fn build_delta(
    world: &WorldState,
    players: &BTreeMap<PlayerId, PlayerSnapshot>,
    projectile_ids: &BTreeSet<u64>,
    baseline: Option<&HistoryEntry>,
    events: &VecDeque<TickEvent>,
    last_sent_tick: u64,
) -> SnapshotDelta {
    let empty_players = BTreeMap::new();
    let empty_projectiles = BTreeSet::new();
    let (base_players, base_projectiles) = match baseline {
        Some(entry) => (&entry.players, &entry.projectile_ids),
        None => (&empty_players, &empty_projectiles),
    };

    let mut added_players = Vec::new();
    let mut changed = BTreeMap::new();
    for (id, current) in players {
        match base_players.get(id) {
            None => added_players.push(current.clone()),
            Some(base) => {
                let delta = diff_player(base, current);
                if !delta.is_empty() {
                    changed.insert(id.clone(), delta);
                }
            }
        }
    }
    let removed_players: Vec<PlayerId> = base_players
        .keys()
        .filter(|id| !players.contains_key(*id))
        .cloned()
        .collect();

    let added = world
        .projectiles
        .iter()
        .filter(|p| !base_projectiles.contains(&p.id))
        .map(|p| p.snapshot())
        .collect();
    let expired = base_projectiles
        .iter()
        .filter(|id| !projectile_ids.contains(*id))
        .copied()
        .collect();

    SnapshotDelta {
        tick: world.tick,
        added_players,
        removed_players,
        changed,
        projectiles: ProjectileDeltas { added, expired },
        events: events
            .iter()
            .filter(|e| e.tick > last_sent_tick)
            .cloned()
            .collect(),
    }
}

/// Per-field comparison with epsilons on the continuous fields.
pub fn diff_player(base: &PlayerSnapshot, current: &PlayerSnapshot) -> PlayerDelta {
    let mut delta = PlayerDelta::default();

    let moved = (current.pos.x - base.pos.x).abs() > POS_EPSILON
        || (current.pos.y - base.pos.y).abs() > POS_EPSILON
        || (current.pos.z - base.pos.z).abs() > POS_EPSILON;
    if moved {
        delta.pos = Some(current.pos);
    }
    if (current.yaw - base.yaw).abs() > YAW_EPSILON {
        delta.yaw = Some(current.yaw);
    }
    if current.health != base.health {
        delta.health = Some(current.health);
    }
    if current.weapon != base.weapon {
        delta.weapon = Some(current.weapon);
    }
    if current.ammo != base.ammo {
        delta.ammo = Some(current.ammo);
    }
    if current.alive != base.alive {
        delta.alive = Some(current.alive);
    }

    delta
}
