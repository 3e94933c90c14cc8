//! Shared helpers for simulation tests

use std::sync::Arc;

use arena_game_server::game::input::InputQueue;
use arena_game_server::game::map::{MapDescriptor, MapId, Point3};
use arena_game_server::game::simulator::Simulator;
use arena_game_server::game::world::PlayerId;
use arena_game_server::game::CommandFrame;
use arena_game_server::ws::protocol::{
    CommandAction, GameEvent, MoveFlags, OwnerKind, Team, TickEvent,
};

pub fn arena_sim(seed: u64) -> (Simulator, InputQueue) {
    let map = Arc::new(MapDescriptor::builtin(MapId::Arena));
    (Simulator::new(map, seed), InputQueue::new())
}

/// Admit a human at an explicit position, with their input queue registered.
pub fn place_player(sim: &mut Simulator, inputs: &InputQueue, id: &str, pos: Point3, yaw: f32) {
    let pid = PlayerId::new(id);
    inputs.register(pid.clone());
    sim.admit_at(pid, id.to_string(), OwnerKind::Human, Team::Green, pos, yaw);
}

pub fn frame(id: &str, seq: u32, mv: MoveFlags, yaw: f32, action: CommandAction) -> CommandFrame {
    CommandFrame {
        player_id: PlayerId::new(id),
        seq,
        client_tick: 0,
        movement: mv,
        yaw,
        action,
    }
}

pub fn fire(id: &str, seq: u32, yaw: f32) -> CommandFrame {
    frame(id, seq, MoveFlags::default(), yaw, CommandAction::Fire)
}

/// Step once and append the tick's events to `log`.
pub fn step_logged(sim: &mut Simulator, inputs: &InputQueue, log: &mut Vec<TickEvent>) {
    sim.step(inputs, 1);
    log.extend(sim.world().events.iter().cloned());
}

pub fn hits<'a>(log: &'a [TickEvent]) -> Vec<&'a TickEvent> {
    log.iter()
        .filter(|e| matches!(e.event, GameEvent::PlayerHit { .. }))
        .collect()
}

pub fn count_kills(log: &[TickEvent]) -> usize {
    log.iter()
        .filter(|e| matches!(e.event, GameEvent::PlayerKilled { .. }))
        .count()
}
