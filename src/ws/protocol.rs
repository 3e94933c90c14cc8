//! WebSocket and HTTP wire types
//!
//! Field names are normative: the browser client reads these frames as-is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::error::GameError;
use crate::game::map::{MapDescriptor, Point3};
use crate::game::world::PlayerId;

/// Weapons available in the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    /// Sidearm: small magazine, slow fire, quick reload
    Pistol,
    /// Rifle: long range, fast fire, slow reload
    Rifle,
}

impl Default for WeaponKind {
    fn default() -> Self {
        Self::Pistol
    }
}

/// Who drives a player slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerKind {
    Human,
    Bot,
}

/// Cosmetic team tag (no team scoring)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Green,
    Red,
}

/// Movement bitmask of a command frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFlags {
    #[serde(default)]
    pub fwd: bool,
    #[serde(default)]
    pub back: bool,
    #[serde(default)]
    pub left: bool,
    #[serde(default)]
    pub right: bool,
    #[serde(default)]
    pub run: bool,
}

impl MoveFlags {
    pub fn any(&self) -> bool {
        self.fwd || self.back || self.left || self.right
    }

    /// OR-merge another frame's movement into this one.
    pub fn merge(&mut self, other: MoveFlags) {
        self.fwd |= other.fwd;
        self.back |= other.back;
        self.left |= other.left;
        self.right |= other.right;
        self.run |= other.run;
    }
}

/// Action carried by a command frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandAction {
    #[default]
    None,
    Fire,
    Reload,
    Switch {
        weapon: WeaponKind,
    },
}

/// Client input frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInput {
    pub player_id: PlayerId,
    /// Strictly increasing per player
    pub seq: u32,
    /// Latest server tick the client has seen (delta ack baseline)
    pub tick: u64,
    #[serde(default)]
    pub mv: MoveFlags,
    pub yaw: f32,
    #[serde(default)]
    pub action: CommandAction,
}

impl ClientInput {
    /// Basic sanity validation; malformed frames are dropped with
    /// `InvalidCommand` and cause no state change.
    pub fn validate(&self) -> Result<(), GameError> {
        if !self.yaw.is_finite() {
            return Err(GameError::InvalidCommand("non-finite yaw".into()));
        }
        if self.player_id.as_str().is_empty() {
            return Err(GameError::InvalidCommand("empty playerId".into()));
        }
        Ok(())
    }
}

/// Join request (HTTP)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub room_id: Uuid,
    pub display_name: String,
}

/// Successful join reply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAck {
    pub player_id: PlayerId,
    pub spawn: Point3,
}

/// Failed join reply
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinError {
    pub kind: String,
}

impl From<&GameError> for JoinError {
    fn from(err: &GameError) -> Self {
        Self {
            kind: err.code().to_string(),
        }
    }
}

/// Room lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Playing,
    Ended,
}

/// Room descriptor as persisted/listed externally
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDescriptor {
    pub id: Uuid,
    pub name: String,
    pub map: crate::game::map::MapId,
    pub max_players: usize,
    pub status: RoomStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub host_id: Option<PlayerId>,
    pub player_count: usize,
}

/// Full player state, sent for newly visible players
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub kind: OwnerKind,
    pub team: Team,
    pub pos: Point3,
    pub yaw: f32,
    pub health: f32,
    pub weapon: WeaponKind,
    pub ammo: u16,
    pub alive: bool,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
}

/// Per-field change set for an already known player
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<Point3>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weapon: Option<WeaponKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ammo: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alive: Option<bool>,
}

impl PlayerDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// In-flight projectile as seen on the wire (tracer rendering)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub owner: PlayerId,
    pub pos: Point3,
    pub dir: Point3,
    /// World units per second
    pub speed: f32,
    pub weapon: WeaponKind,
    pub spawn_tick: u64,
    pub expiry_tick: u64,
}

/// Projectile change set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileDeltas {
    pub added: Vec<ProjectileSnapshot>,
    pub expired: Vec<u64>,
}

/// Game events (combat, lifecycle), tagged with tick + within-tick ordinal
/// so consumers can replay deterministically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    #[serde(rename_all = "camelCase")]
    PlayerHit {
        attacker: PlayerId,
        target: PlayerId,
        damage: f32,
        remaining_health: f32,
    },

    PlayerKilled {
        attacker: PlayerId,
        target: PlayerId,
    },

    PlayerRespawned {
        player: PlayerId,
    },

    WeaponSwitched {
        player: PlayerId,
        weapon: WeaponKind,
    },

    ReloadStarted {
        player: PlayerId,
    },

    ReloadFinished {
        player: PlayerId,
    },

    PlayerJoined {
        player: PlayerId,
    },

    PlayerLeft {
        player: PlayerId,
    },
}

/// Event envelope with replay ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickEvent {
    pub tick: u64,
    pub ordinal: u32,
    #[serde(flatten)]
    pub event: GameEvent,
}

/// Snapshot delta for one subscriber
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDelta {
    /// Producer tick; subscribers use it to order/discard stale frames
    pub tick: u64,
    pub added_players: Vec<PlayerSnapshot>,
    pub removed_players: Vec<PlayerId>,
    pub changed: BTreeMap<PlayerId, PlayerDelta>,
    pub projectiles: ProjectileDeltas,
    pub events: Vec<TickEvent>,
}

/// Messages sent from server to client over the WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once after the WebSocket subscription is accepted
    #[serde(rename_all = "camelCase")]
    Welcome {
        player_id: PlayerId,
        room_id: Uuid,
        tick: u64,
        map: MapDescriptor,
    },

    /// Per-subscriber snapshot delta
    Snapshot {
        #[serde(flatten)]
        delta: SnapshotDelta,
    },

    /// The room has ended; no further snapshots will arrive
    RoomEnded {
        reason: String,
    },

    /// Error frame (per-frame rejections, terminal failures)
    Error {
        code: String,
        message: String,
    },
}

impl ServerMsg {
    pub fn error(err: &GameError) -> Self {
        Self::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
