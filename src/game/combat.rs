//! Combat resolver - weapon table, hitscan, projectiles
//!
//! Hit detection is a hitscan-plus-projectile hybrid: damage comes from an
//! instantaneous line-of-aim test at the tick of the shot, while a
//! projectile is emitted alongside so clients can render tracers. The
//! projectile itself never applies damage.

use std::collections::BTreeMap;

use crate::game::clock::{tick_secs, ticks_from_secs};
use crate::game::map::Point3;
use crate::game::world::{Player, PlayerId};
use crate::ws::protocol::{ProjectileSnapshot, WeaponKind};

/// Horizontal hit radius of a player capsule
pub const PLAYER_RADIUS: f32 = 0.6;
/// Projectile speed in world units per second
pub const PROJECTILE_SPEED: f32 = 60.0;
/// Projectile lifetime in seconds
pub const PROJECTILE_LIFETIME_SECS: f32 = 2.0;
/// Ticks a dead player waits before respawning
pub const RESPAWN_TICKS: u64 = 60;

/// Weapon stats (authoritative)
#[derive(Debug, Clone, Copy)]
pub struct WeaponStats {
    pub magazine: u16,
    pub damage: f32,
    pub range: f32,
    pub fire_cooldown_ticks: u64,
    pub reload_ticks: u64,
}

impl WeaponStats {
    pub fn for_kind(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Pistol => Self {
                magazine: 12,
                damage: 15.0,
                range: 25.0,
                fire_cooldown_ticks: 6,
                reload_ticks: 20,
            },
            WeaponKind::Rifle => Self {
                magazine: 30,
                damage: 25.0,
                range: 40.0,
                fire_cooldown_ticks: 2,
                reload_ticks: 40,
            },
        }
    }
}

/// In-flight projectile (visual causality only)
///
/// Ids are per-room counters, not random: replays with the same seed and
/// input stream must be bit-identical.
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub owner: PlayerId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub dir_x: f32,
    pub dir_y: f32,
    pub dir_z: f32,
    pub weapon: WeaponKind,
    pub spawn_tick: u64,
    pub expiry_tick: u64,
}

impl Projectile {
    /// Emit a projectile for a fire at `tick` from `origin` along `yaw`.
    pub fn spawn(
        id: u64,
        owner: PlayerId,
        origin: Point3,
        yaw: f32,
        weapon: WeaponKind,
        tick: u64,
    ) -> Self {
        Self {
            id,
            owner,
            x: origin.x,
            y: origin.y,
            z: origin.z,
            dir_x: yaw.sin(),
            dir_y: 0.0,
            dir_z: yaw.cos(),
            weapon,
            spawn_tick: tick,
            expiry_tick: tick + ticks_from_secs(PROJECTILE_LIFETIME_SECS),
        }
    }

    /// Advance one tick along the flight path.
    pub fn advance(&mut self) {
        let step = PROJECTILE_SPEED * tick_secs();
        self.x += self.dir_x * step;
        self.y += self.dir_y * step;
        self.z += self.dir_z * step;
    }

    pub fn expired(&self, tick: u64) -> bool {
        self.expiry_tick <= tick
    }

    /// Overlap test against a player capsule (XZ plane). Used only to
    /// destroy the tracer on its first contact, never to apply damage.
    pub fn overlaps(&self, player: &Player) -> bool {
        let dx = player.x - self.x;
        let dz = player.z - self.z;
        dx * dx + dz * dz <= PLAYER_RADIUS * PLAYER_RADIUS
    }

    pub fn snapshot(&self) -> ProjectileSnapshot {
        ProjectileSnapshot {
            id: self.id,
            owner: self.owner.clone(),
            pos: Point3::new(self.x, self.y, self.z),
            dir: Point3::new(self.dir_x, self.dir_y, self.dir_z),
            speed: PROJECTILE_SPEED,
            weapon: self.weapon,
            spawn_tick: self.spawn_tick,
            expiry_tick: self.expiry_tick,
        }
    }
}

/// Wrap an angle into [-pi, pi).
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(std::f32::consts::TAU);
    if wrapped >= std::f32::consts::PI {
        wrapped - std::f32::consts::TAU
    } else {
        wrapped
    }
}

/// Resolve a hitscan fired by `shooter` along `yaw`.
///
/// A candidate is any other alive player within weapon range whose bearing
/// lies inside the angular tolerance subtended by the player radius at
/// that distance. Ties resolve to the smallest distance, then the
/// lexicographically smallest id (players iterate in id order).
pub fn resolve_hitscan(
    shooter: &Player,
    yaw: f32,
    stats: &WeaponStats,
    players: &BTreeMap<PlayerId, Player>,
) -> Option<PlayerId> {
    let mut best: Option<(f32, &PlayerId)> = None;

    for (id, target) in players {
        if *id == shooter.id || !target.alive {
            continue;
        }

        let dx = target.x - shooter.x;
        let dz = target.z - shooter.z;
        let distance = (dx * dx + dz * dz).sqrt();
        if distance > stats.range {
            continue;
        }

        let bearing = dx.atan2(dz);
        let tolerance = PLAYER_RADIUS.atan2(distance.max(0.001));
        if normalize_angle(bearing - yaw).abs() > tolerance {
            continue;
        }

        // Strict < keeps the first (smallest id) candidate on equal distance.
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, id));
        }
    }

    best.map(|(_, id)| id.clone())
}

/// Apply damage to health, returns (new_health, killed)
pub fn apply_damage(current_health: f32, damage: f32) -> (f32, bool) {
    let new_health = (current_health - damage).max(0.0);
    (new_health, new_health <= 0.0)
}
