//! World state - pure data mutated only by the simulator

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::combat::{Projectile, WeaponStats};
use crate::game::map::{MapDescriptor, Point3};
use crate::ws::protocol::{OwnerKind, PlayerSnapshot, Team, TickEvent, WeaponKind};

/// Stable player identifier.
///
/// Ordered lexicographically; combat tie-breaks and deterministic
/// iteration rely on that ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for a joining human.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Synthetic id for a bot slot.
    pub fn bot(n: u32) -> Self {
        Self(format!("bot-{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authoritative per-player state
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub display_name: String,
    pub kind: OwnerKind,
    pub team: Team,

    // Position and aim
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub yaw: f32,

    // Combat
    pub health: f32,
    pub alive: bool,
    pub weapon: WeaponKind,
    pub ammo: u16,
    /// Tick at which the running reload completes (absent if not reloading)
    pub reload_done_tick: Option<u64>,
    /// Tick at which a dead player respawns (absent if alive)
    pub respawn_tick: Option<u64>,
    /// Tick of the last accepted fire (cooldown gate)
    pub last_fire_tick: Option<u64>,

    // Score
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,

    // Input tracking
    pub last_input_seq: u32,
}

/// Health granted on spawn and respawn
pub const MAX_HEALTH: f32 = 100.0;

impl Player {
    pub fn new(
        id: PlayerId,
        display_name: String,
        kind: OwnerKind,
        team: Team,
        spawn: Point3,
        yaw: f32,
    ) -> Self {
        let weapon = WeaponKind::default();
        Self {
            id,
            display_name,
            kind,
            team,
            x: spawn.x,
            y: spawn.y,
            z: spawn.z,
            yaw,
            health: MAX_HEALTH,
            alive: true,
            weapon,
            ammo: WeaponStats::for_kind(weapon).magazine,
            reload_done_tick: None,
            respawn_tick: None,
            last_fire_tick: None,
            score: 0,
            kills: 0,
            deaths: 0,
            last_input_seq: 0,
        }
    }

    pub fn pos(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_done_tick.is_some()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id.clone(),
            name: self.display_name.clone(),
            kind: self.kind,
            team: self.team,
            pos: self.pos(),
            yaw: self.yaw,
            health: self.health,
            weapon: self.weapon,
            ammo: self.ammo,
            alive: self.alive,
            score: self.score,
            kills: self.kills,
            deaths: self.deaths,
        }
    }
}

/// Complete world state at the end of a tick.
///
/// Produced by the simulator once per tick; readers (broadcaster,
/// diagnostics) only ever observe the latest completed snapshot.
#[derive(Debug, Clone)]
pub struct WorldState {
    /// Tick this snapshot corresponds to
    pub tick: u64,
    /// Live players, ordered by id for deterministic iteration
    pub players: BTreeMap<PlayerId, Player>,
    /// In-flight projectiles
    pub projectiles: Vec<Projectile>,
    /// Map descriptor (read-only after startup)
    pub map: Arc<MapDescriptor>,
    /// Events emitted during the tick just completed
    pub events: Vec<TickEvent>,
}

impl WorldState {
    pub fn new(map: Arc<MapDescriptor>) -> Self {
        Self {
            tick: 0,
            players: BTreeMap::new(),
            projectiles: Vec::new(),
            map,
            events: Vec::new(),
        }
    }

    pub fn humans(&self) -> impl Iterator<Item = &Player> {
        self.players
            .values()
            .filter(|p| p.kind == OwnerKind::Human)
    }

    pub fn bots(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.kind == OwnerKind::Bot)
    }

    pub fn human_count(&self) -> usize {
        self.humans().count()
    }

    pub fn bot_count(&self) -> usize {
        self.bots().count()
    }
}
