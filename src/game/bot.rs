//! Bot controller
//!
//! Bots never touch world state directly: each tick they synthesize
//! command frames and push them through the same input queue as human
//! players, which keeps the simulator single-writer and makes a bot slot
//! indistinguishable from a networked player.

use std::collections::HashMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::game::input::InputQueue;
use crate::game::world::{Player, PlayerId, WorldState};
use crate::game::CommandFrame;
use crate::ws::protocol::{CommandAction, MoveFlags, OwnerKind};

/// Chance per tick that a bot picks a new heading and walks
pub const BOT_MOVE_CHANCE: f64 = 0.02;
/// Chance per tick that a bot attempts a shot
pub const BOT_FIRE_CHANCE: f64 = 0.01;
/// Bots only engage humans within this distance
pub const BOT_VIEW_RANGE: f32 = 15.0;
/// Aim error applied before the hitscan, radians either side
pub const BOT_AIM_JITTER: f32 = 0.05;

/// Drives every bot-owned player slot in a room.
pub struct BotController {
    rng: ChaCha8Rng,
    /// Synthetic per-bot sequence counters
    seqs: HashMap<PlayerId, u32>,
}

impl BotController {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seqs: HashMap::new(),
        }
    }

    pub fn forget(&mut self, id: &PlayerId) {
        self.seqs.remove(id);
    }

    /// Generate this tick's command frames for all alive bots.
    ///
    /// Bots iterate in id order so the per-room rng stream is identical
    /// across replays with the same seed.
    pub fn drive(&mut self, world: &WorldState, inputs: &InputQueue) {
        let bot_ids: Vec<PlayerId> = world
            .players
            .values()
            .filter(|p| p.kind == OwnerKind::Bot && p.alive)
            .map(|p| p.id.clone())
            .collect();

        for id in bot_ids {
            let bot = &world.players[&id];

            let mut movement = MoveFlags::default();
            let mut yaw = bot.yaw;
            let mut action = CommandAction::None;

            if self.rng.gen_bool(BOT_MOVE_CHANCE) {
                yaw = self.rng.gen_range(0.0..std::f32::consts::TAU);
                movement.fwd = true;
            }

            if self.rng.gen_bool(BOT_FIRE_CHANCE) {
                if let Some(target) = nearest_visible_human(bot, world) {
                    let dx = target.x - bot.x;
                    let dz = target.z - bot.z;
                    let jitter = self.rng.gen_range(-BOT_AIM_JITTER..BOT_AIM_JITTER);
                    yaw = dx.atan2(dz) + jitter;
                    action = CommandAction::Fire;
                }
            }

            if !movement.any() && action == CommandAction::None && yaw == bot.yaw {
                continue;
            }

            let seq = self.seqs.entry(id.clone()).or_insert(0);
            *seq += 1;
            inputs.submit(CommandFrame {
                player_id: id,
                seq: *seq,
                client_tick: world.tick,
                movement,
                yaw,
                action,
            });
        }
    }
}

/// Closest alive human within view range with a clear straight line
/// (trivially clear on an open map; both endpoints are inside the AABB).
fn nearest_visible_human<'a>(bot: &Player, world: &'a WorldState) -> Option<&'a Player> {
    let mut best: Option<(f32, &Player)> = None;

    for candidate in world.players.values() {
        if candidate.kind != OwnerKind::Human || !candidate.alive {
            continue;
        }

        let dx = candidate.x - bot.x;
        let dz = candidate.z - bot.z;
        let distance = (dx * dx + dz * dz).sqrt();
        if distance > BOT_VIEW_RANGE {
            continue;
        }
        if !line_in_bounds(bot, candidate, world) {
            continue;
        }

        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, candidate));
        }
    }

    best.map(|(_, p)| p)
}

fn line_in_bounds(a: &Player, b: &Player, world: &WorldState) -> bool {
    let bounds = &world.map.bounds;
    bounds.contains_xz(a.x, a.z) && bounds.contains_xz(b.x, b.z)
}
