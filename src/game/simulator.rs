//! The simulator - advances the world one tick at a time
//!
//! Single entry point `step()`: drains the input queues, folds frames into
//! per-player intents, applies movement, reload/action resolution, combat,
//! projectile advancement and respawns, then publishes the snapshot with
//! the tick's events. Deterministic given the same seed and input stream.

use std::collections::BTreeMap;
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::game::combat::{
    apply_damage, resolve_hitscan, Projectile, WeaponStats, RESPAWN_TICKS,
};
use crate::game::input::InputQueue;
use crate::game::map::{MapDescriptor, Point3};
use crate::game::world::{Player, PlayerId, WorldState, MAX_HEALTH};
use crate::ws::protocol::{CommandAction, GameEvent, MoveFlags, OwnerKind, Team, TickEvent};

/// Walk speed in world units per tick
pub const BASE_SPEED: f32 = 0.15;
/// Run speed in world units per tick
pub const RUN_SPEED: f32 = 0.225;

/// Per-tick byproducts the room feeds back into the broadcaster.
#[derive(Debug, Default)]
pub struct StepOutput {
    /// Highest client-acked tick seen per player this tick
    pub acks: Vec<(PlayerId, u64)>,
}

/// Folded intent of all frames a player submitted since the last tick.
#[derive(Debug, Default)]
struct ResolvedIntent {
    movement: MoveFlags,
    yaw: Option<f32>,
    action: CommandAction,
}

impl ResolvedIntent {
    /// Fold one more frame in: movement ORs, yaw takes the last value,
    /// action takes the last non-none action except that a weapon switch
    /// is not displaced by a later fire.
    fn fold(&mut self, movement: MoveFlags, yaw: f32, action: CommandAction) {
        self.movement.merge(movement);
        self.yaw = Some(yaw);
        match action {
            CommandAction::None => {}
            CommandAction::Fire if matches!(self.action, CommandAction::Switch { .. }) => {}
            other => self.action = other,
        }
    }
}

/// Authoritative per-room simulation.
pub struct Simulator {
    world: WorldState,
    rng: ChaCha8Rng,
    /// Join/leave events staged for the next tick's event list
    staged_events: Vec<GameEvent>,
    /// Monotonic projectile id source (deterministic across replays)
    next_projectile_id: u64,
}

impl Simulator {
    pub fn new(map: Arc<MapDescriptor>, seed: u64) -> Self {
        Self {
            world: WorldState::new(map),
            rng: ChaCha8Rng::seed_from_u64(seed),
            staged_events: Vec::new(),
            next_projectile_id: 0,
        }
    }

    /// Latest completed snapshot.
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Admit a player at a random spawn point. Called from the room's
    /// admission phase at the start of a tick.
    pub fn admit(
        &mut self,
        id: PlayerId,
        display_name: String,
        kind: OwnerKind,
        team: Team,
    ) -> Point3 {
        let spawn = self.pick_spawn();
        let yaw = self.rng.gen_range(0.0..std::f32::consts::TAU);
        self.admit_at(id, display_name, kind, team, spawn, yaw);
        spawn
    }

    /// Admit a player at an explicit position and yaw.
    pub fn admit_at(
        &mut self,
        id: PlayerId,
        display_name: String,
        kind: OwnerKind,
        team: Team,
        spawn: Point3,
        yaw: f32,
    ) {
        let player = Player::new(id.clone(), display_name, kind, team, spawn, yaw);
        self.world.players.insert(id.clone(), player);
        self.staged_events.push(GameEvent::PlayerJoined { player: id });
    }

    /// Remove a player. Returns false if unknown.
    pub fn remove(&mut self, id: &PlayerId) -> bool {
        if self.world.players.remove(id).is_some() {
            self.staged_events
                .push(GameEvent::PlayerLeft { player: id.clone() });
            true
        } else {
            false
        }
    }

    fn pick_spawn(&mut self) -> Point3 {
        let spawns = &self.world.map.spawn_points;
        spawns[self.rng.gen_range(0..spawns.len())]
    }

    /// Advance the world by `delta_ticks` simulation steps.
    pub fn step(&mut self, inputs: &InputQueue, delta_ticks: u64) -> StepOutput {
        let mut output = StepOutput::default();
        for _ in 0..delta_ticks {
            self.step_once(inputs, &mut output);
        }
        output
    }

    fn step_once(&mut self, inputs: &InputQueue, output: &mut StepOutput) {
        let tick = self.world.tick + 1;
        self.world.tick = tick;

        let mut events: Vec<GameEvent> = std::mem::take(&mut self.staged_events);

        let intents = self.resolve_intents(inputs, output);
        self.apply_movement(&intents);
        self.finish_reloads(tick, &mut events);
        self.apply_actions(&intents, tick, &mut events);
        self.advance_projectiles(tick);
        self.apply_respawns(tick, &mut events);

        self.world.events = events
            .into_iter()
            .enumerate()
            .map(|(ordinal, event)| TickEvent {
                tick,
                ordinal: ordinal as u32,
                event,
            })
            .collect();

        self.check_invariants();
    }

    /// Drain every player's queue and fold the frames into one intent per
    /// player for this tick.
    fn resolve_intents(
        &mut self,
        inputs: &InputQueue,
        output: &mut StepOutput,
    ) -> BTreeMap<PlayerId, ResolvedIntent> {
        let ids: Vec<PlayerId> = self.world.players.keys().cloned().collect();
        let mut intents = BTreeMap::new();

        for id in ids {
            let frames = inputs.drain(&id);
            if frames.is_empty() {
                continue;
            }

            let mut intent = ResolvedIntent::default();
            let mut last_seq = 0;
            let mut acked_tick = 0;
            for frame in frames {
                intent.fold(frame.movement, frame.yaw, frame.action);
                last_seq = frame.seq;
                acked_tick = acked_tick.max(frame.client_tick);
            }

            if let Some(player) = self.world.players.get_mut(&id) {
                player.last_input_seq = last_seq;
            }
            output.acks.push((id.clone(), acked_tick));
            intents.insert(id, intent);
        }

        intents
    }

    /// Integrate movement for alive players, clamped to the map AABB and
    /// snapped to stance height.
    fn apply_movement(&mut self, intents: &BTreeMap<PlayerId, ResolvedIntent>) {
        let map = Arc::clone(&self.world.map);

        for (id, intent) in intents {
            let Some(player) = self.world.players.get_mut(id) else {
                continue;
            };
            if !player.alive {
                continue;
            }

            if let Some(yaw) = intent.yaw {
                player.yaw = yaw;
            }

            let mv = intent.movement;
            if mv.any() {
                let (sin, cos) = player.yaw.sin_cos();
                // Forward is the aim direction; right is 90 degrees off it.
                let mut dx = 0.0;
                let mut dz = 0.0;
                if mv.fwd {
                    dx += sin;
                    dz += cos;
                }
                if mv.back {
                    dx -= sin;
                    dz -= cos;
                }
                if mv.right {
                    dx += cos;
                    dz -= sin;
                }
                if mv.left {
                    dx -= cos;
                    dz += sin;
                }

                let len = (dx * dx + dz * dz).sqrt();
                if len > f32::EPSILON {
                    let speed = if mv.run { RUN_SPEED } else { BASE_SPEED };
                    player.x += dx / len * speed;
                    player.z += dz / len * speed;
                    let (cx, cz) = map.bounds.clamp_xz(player.x, player.z);
                    player.x = cx;
                    player.z = cz;
                }
            }

            player.y = map.stance_y;
        }
    }

    fn finish_reloads(&mut self, tick: u64, events: &mut Vec<GameEvent>) {
        for player in self.world.players.values_mut() {
            if let Some(done) = player.reload_done_tick {
                if done <= tick {
                    player.ammo = WeaponStats::for_kind(player.weapon).magazine;
                    player.reload_done_tick = None;
                    events.push(GameEvent::ReloadFinished {
                        player: player.id.clone(),
                    });
                }
            }
        }
    }

    fn apply_actions(
        &mut self,
        intents: &BTreeMap<PlayerId, ResolvedIntent>,
        tick: u64,
        events: &mut Vec<GameEvent>,
    ) {
        for (id, intent) in intents {
            match intent.action {
                CommandAction::None => {}
                CommandAction::Switch { weapon } => self.switch_weapon(id, weapon, events),
                CommandAction::Reload => self.start_reload(id, tick, events),
                CommandAction::Fire => self.fire(id, tick, events),
            }
        }
    }

    fn switch_weapon(
        &mut self,
        id: &PlayerId,
        weapon: crate::ws::protocol::WeaponKind,
        events: &mut Vec<GameEvent>,
    ) {
        let Some(player) = self.world.players.get_mut(id) else {
            return;
        };
        if !player.alive || player.is_reloading() {
            return;
        }

        player.weapon = weapon;
        player.ammo = WeaponStats::for_kind(weapon).magazine;
        events.push(GameEvent::WeaponSwitched {
            player: id.clone(),
            weapon,
        });
    }

    fn start_reload(&mut self, id: &PlayerId, tick: u64, events: &mut Vec<GameEvent>) {
        let Some(player) = self.world.players.get_mut(id) else {
            return;
        };
        let stats = WeaponStats::for_kind(player.weapon);
        if !player.alive || player.is_reloading() || player.ammo >= stats.magazine {
            return;
        }

        player.reload_done_tick = Some(tick + stats.reload_ticks);
        events.push(GameEvent::ReloadStarted { player: id.clone() });
    }

    fn fire(&mut self, id: &PlayerId, tick: u64, events: &mut Vec<GameEvent>) {
        let Some(player) = self.world.players.get(id) else {
            return;
        };
        if !player.alive || player.is_reloading() {
            return;
        }

        // Empty magazine: the trigger pull silently becomes a reload.
        if player.ammo == 0 {
            self.start_reload(id, tick, events);
            return;
        }

        let stats = WeaponStats::for_kind(player.weapon);
        if let Some(last) = player.last_fire_tick {
            if tick - last < stats.fire_cooldown_ticks {
                return;
            }
        }

        let shooter = player.clone();
        let yaw = shooter.yaw;

        {
            let player = self.world.players.get_mut(id).expect("shooter exists");
            player.ammo -= 1;
            player.last_fire_tick = Some(tick);
        }

        // Tracer for the renderer; gameplay damage comes from the hitscan.
        self.next_projectile_id += 1;
        self.world.projectiles.push(Projectile::spawn(
            self.next_projectile_id,
            id.clone(),
            shooter.pos(),
            yaw,
            shooter.weapon,
            tick,
        ));

        let Some(target_id) = resolve_hitscan(&shooter, yaw, &stats, &self.world.players) else {
            return;
        };

        let (remaining, killed) = {
            let target = self
                .world
                .players
                .get_mut(&target_id)
                .expect("hitscan target exists");
            let (remaining, killed) = apply_damage(target.health, stats.damage);
            target.health = remaining;
            if killed {
                target.alive = false;
                target.deaths += 1;
                target.reload_done_tick = None;
                target.respawn_tick = Some(tick + RESPAWN_TICKS);
            }
            (remaining, killed)
        };

        events.push(GameEvent::PlayerHit {
            attacker: id.clone(),
            target: target_id.clone(),
            damage: stats.damage,
            remaining_health: remaining,
        });

        if killed {
            if let Some(attacker) = self.world.players.get_mut(id) {
                attacker.kills += 1;
                attacker.score += 100;
            }
            events.push(GameEvent::PlayerKilled {
                attacker: id.clone(),
                target: target_id,
            });
        }
    }

    /// Advance, prune and contact-test projectiles. Expired projectiles
    /// are pruned before any overlap test runs this tick; survivors are
    /// destroyed on their first contact with a non-owner live player.
    fn advance_projectiles(&mut self, tick: u64) {
        let projectiles = std::mem::take(&mut self.world.projectiles);
        let players = &self.world.players;

        self.world.projectiles = projectiles
            .into_iter()
            .filter_map(|mut projectile| {
                projectile.advance();
                if projectile.expired(tick) {
                    return None;
                }
                let contact = players
                    .values()
                    .any(|p| p.alive && p.id != projectile.owner && projectile.overlaps(p));
                (!contact).then_some(projectile)
            })
            .collect();
    }

    fn apply_respawns(&mut self, tick: u64, events: &mut Vec<GameEvent>) {
        let due: Vec<PlayerId> = self
            .world
            .players
            .values()
            .filter(|p| !p.alive && p.respawn_tick.is_some_and(|t| t <= tick))
            .map(|p| p.id.clone())
            .collect();

        for id in due {
            let spawn = self.pick_spawn();
            let stance = self.world.map.stance_y;
            let player = self.world.players.get_mut(&id).expect("respawning player");
            player.x = spawn.x;
            player.y = stance;
            player.z = spawn.z;
            player.health = MAX_HEALTH;
            player.ammo = WeaponStats::for_kind(player.weapon).magazine;
            player.alive = true;
            player.respawn_tick = None;
            player.last_fire_tick = None;
            events.push(GameEvent::PlayerRespawned { player: id });
        }
    }

    /// Terminal invariants. A violation here is an internal bug; the room
    /// catches the panic, ends itself and never poisons another room.
    fn check_invariants(&self) {
        for player in self.world.players.values() {
            assert!(
                (0.0..=MAX_HEALTH).contains(&player.health),
                "health out of range for {}",
                player.id
            );
            assert_eq!(
                player.alive,
                player.health > 0.0,
                "alive flag inconsistent for {}",
                player.id
            );
            assert_eq!(
                player.alive,
                player.respawn_tick.is_none(),
                "respawn deadline inconsistent for {}",
                player.id
            );
            assert!(
                player.ammo <= WeaponStats::for_kind(player.weapon).magazine,
                "ammo over magazine for {}",
                player.id
            );
            assert!(
                self.world
                    .map
                    .bounds
                    .contains_xz(player.x, player.z),
                "position out of bounds for {}",
                player.id
            );
        }
        for projectile in &self.world.projectiles {
            assert!(
                projectile.expiry_tick > self.world.tick,
                "expired projectile survived pruning"
            );
        }
    }
}
