//! End-to-end simulation scenarios: literal inputs, expected observable
//! outputs.

mod common;

use arena_game_server::game::combat::{RESPAWN_TICKS, WeaponStats};
use arena_game_server::game::input::{Reject, Submit};
use arena_game_server::game::map::Point3;
use arena_game_server::game::simulator::BASE_SPEED;
use arena_game_server::game::world::PlayerId;
use arena_game_server::ws::protocol::{CommandAction, GameEvent, MoveFlags, WeaponKind};

use common::*;

/// Scenario: seven pistol shots, six ticks apart, kill a stationary
/// target on the seventh hit.
#[test]
fn pistol_kill_after_seven_hits() {
    let (mut sim, inputs) = arena_sim(1);
    place_player(&mut sim, &inputs, "a", Point3::new(0.0, 1.8, 0.0), 0.0);
    place_player(&mut sim, &inputs, "b", Point3::new(0.0, 1.8, 5.0), 0.0);

    let mut log = Vec::new();
    for shot in 0..7u32 {
        inputs.submit(fire("a", shot + 1, 0.0));
        step_logged(&mut sim, &inputs, &mut log);
        if shot < 6 {
            // Pistol cooldown is 6 ticks.
            for _ in 0..5 {
                step_logged(&mut sim, &inputs, &mut log);
            }
        }
    }

    let hits = hits(&log);
    assert_eq!(hits.len(), 7);
    let mut expected_health = 100.0;
    for hit in &hits {
        let GameEvent::PlayerHit {
            attacker,
            target,
            damage,
            remaining_health,
        } = &hit.event
        else {
            unreachable!()
        };
        expected_health = (expected_health - 15.0f32).max(0.0);
        assert_eq!(attacker, &PlayerId::new("a"));
        assert_eq!(target, &PlayerId::new("b"));
        assert_eq!(*damage, 15.0);
        assert_eq!(*remaining_health, expected_health);
    }

    assert_eq!(count_kills(&log), 1);
    let kill = log
        .iter()
        .find(|e| matches!(e.event, GameEvent::PlayerKilled { .. }))
        .unwrap();
    // The kill lands on the seventh hit's tick.
    assert_eq!(kill.tick, hits[6].tick);

    let world = sim.world();
    let a = &world.players[&PlayerId::new("a")];
    let b = &world.players[&PlayerId::new("b")];
    assert_eq!(a.score, 100);
    assert_eq!(a.kills, 1);
    assert_eq!(b.deaths, 1);
    assert!(!b.alive);
    assert_eq!(b.health, 0.0);
    assert_eq!(b.respawn_tick, Some(kill.tick + RESPAWN_TICKS));
}

/// Scenario: firing on an empty rifle magazine silently starts a reload;
/// fires inside the reload window do nothing and start no second reload.
#[test]
fn reload_gating_on_empty_magazine() {
    let (mut sim, inputs) = arena_sim(2);
    place_player(&mut sim, &inputs, "a", Point3::new(0.0, 1.8, 0.0), 0.0);
    // Bystander behind the shooter: never on the firing line.
    place_player(&mut sim, &inputs, "b", Point3::new(0.0, 1.8, -5.0), 0.0);

    let mut log = Vec::new();
    let mut seq = 0u32;

    seq += 1;
    inputs.submit(frame(
        "a",
        seq,
        MoveFlags::default(),
        0.0,
        CommandAction::Switch {
            weapon: WeaponKind::Rifle,
        },
    ));
    step_logged(&mut sim, &inputs, &mut log);

    // Drain the full magazine at the rifle's 2-tick cadence.
    let magazine = WeaponStats::for_kind(WeaponKind::Rifle).magazine;
    for _ in 0..magazine {
        seq += 1;
        inputs.submit(fire("a", seq, 0.0));
        step_logged(&mut sim, &inputs, &mut log);
        step_logged(&mut sim, &inputs, &mut log);
    }
    assert_eq!(sim.world().players[&PlayerId::new("a")].ammo, 0);

    // Trigger pull on empty: implicit reload, no projectile.
    seq += 1;
    inputs.submit(fire("a", seq, 0.0));
    step_logged(&mut sim, &inputs, &mut log);

    let reload_start_tick = sim.world().tick;
    let a = &sim.world().players[&PlayerId::new("a")];
    assert_eq!(a.reload_done_tick, Some(reload_start_tick + 40));
    assert!(!sim
        .world()
        .projectiles
        .iter()
        .any(|p| p.spawn_tick == reload_start_tick));

    // Fires inside the window: no projectile, no duplicate ReloadStarted.
    for _ in 0..4 {
        seq += 1;
        inputs.submit(fire("a", seq, 0.0));
        for _ in 0..5 {
            step_logged(&mut sim, &inputs, &mut log);
        }
    }
    let during = sim.world().tick;
    assert!(during < reload_start_tick + 40);
    assert!(sim.world().players[&PlayerId::new("a")].is_reloading());

    // Run past the reload deadline.
    while sim.world().tick < reload_start_tick + 40 {
        step_logged(&mut sim, &inputs, &mut log);
    }

    let a = &sim.world().players[&PlayerId::new("a")];
    assert_eq!(a.ammo, magazine);
    assert_eq!(a.reload_done_tick, None);

    let starts = log
        .iter()
        .filter(|e| matches!(e.event, GameEvent::ReloadStarted { .. }))
        .count();
    let finishes = log
        .iter()
        .filter(|e| matches!(e.event, GameEvent::ReloadFinished { .. }))
        .count();
    assert_eq!(starts, 1);
    assert_eq!(finishes, 1);
    let finish = log
        .iter()
        .find(|e| matches!(e.event, GameEvent::ReloadFinished { .. }))
        .unwrap();
    assert_eq!(finish.tick, reload_start_tick + 40);

    // Nobody got hit at any point.
    assert!(hits(&log).is_empty());
}

/// Scenario: two targets at the identical spot resolve to exactly one
/// hit on the lexicographically smallest id.
#[test]
fn angular_tie_breaks_on_smallest_id() {
    let (mut sim, inputs) = arena_sim(3);
    place_player(&mut sim, &inputs, "a", Point3::new(0.0, 1.8, 0.0), 0.0);
    place_player(&mut sim, &inputs, "c", Point3::new(0.0, 1.8, 5.0), 0.0);
    place_player(&mut sim, &inputs, "b", Point3::new(0.0, 1.8, 5.0), 0.0);

    let mut log = Vec::new();
    inputs.submit(fire("a", 1, 0.0));
    step_logged(&mut sim, &inputs, &mut log);

    let hits = hits(&log);
    assert_eq!(hits.len(), 1);
    let GameEvent::PlayerHit { target, .. } = &hits[0].event else {
        unreachable!()
    };
    assert_eq!(target, &PlayerId::new("b"));
}

/// Scenario: a killed player respawns exactly `RESPAWN_TICKS` later, at
/// full health, on a map spawn point.
#[test]
fn respawn_after_fixed_delay() {
    let (mut sim, inputs) = arena_sim(4);
    place_player(&mut sim, &inputs, "a", Point3::new(0.0, 1.8, 0.0), 0.0);
    place_player(&mut sim, &inputs, "b", Point3::new(0.0, 1.8, 5.0), 0.0);

    let mut log = Vec::new();
    let mut seq = 0u32;

    seq += 1;
    inputs.submit(frame(
        "a",
        seq,
        MoveFlags::default(),
        0.0,
        CommandAction::Switch {
            weapon: WeaponKind::Rifle,
        },
    ));
    step_logged(&mut sim, &inputs, &mut log);

    // Four rifle hits (4 x 25) kill.
    while count_kills(&log) == 0 {
        seq += 1;
        inputs.submit(fire("a", seq, 0.0));
        step_logged(&mut sim, &inputs, &mut log);
        step_logged(&mut sim, &inputs, &mut log);
    }
    let kill_tick = log
        .iter()
        .find(|e| matches!(e.event, GameEvent::PlayerKilled { .. }))
        .unwrap()
        .tick;

    let b = &sim.world().players[&PlayerId::new("b")];
    assert!(!b.alive);
    assert_eq!(b.respawn_tick, Some(kill_tick + RESPAWN_TICKS));

    while sim.world().tick < kill_tick + RESPAWN_TICKS {
        step_logged(&mut sim, &inputs, &mut log);
    }

    let respawn = log
        .iter()
        .find(|e| matches!(e.event, GameEvent::PlayerRespawned { .. }))
        .expect("respawn event");
    assert_eq!(respawn.tick, kill_tick + RESPAWN_TICKS);

    let b = &sim.world().players[&PlayerId::new("b")];
    assert!(b.alive);
    assert_eq!(b.health, 100.0);
    assert_eq!(b.respawn_tick, None);
    assert!(sim
        .world()
        .map
        .spawn_points
        .iter()
        .any(|s| s.x == b.x && s.z == b.z));
}

/// Scenario: a frame with a lower seq than an already accepted one is
/// rejected and changes nothing.
#[test]
fn stale_frame_is_dropped_without_effect() {
    let (mut sim, inputs) = arena_sim(5);
    place_player(&mut sim, &inputs, "a", Point3::new(0.0, 1.8, 0.0), 0.0);

    let accepted = inputs.submit(frame(
        "a",
        5,
        MoveFlags {
            fwd: true,
            ..Default::default()
        },
        0.0,
        CommandAction::None,
    ));
    assert_eq!(accepted, Submit::Accepted);

    let stale = inputs.submit(fire("a", 3, 0.0));
    assert_eq!(stale, Submit::Rejected(Reject::Stale));

    sim.step(&inputs, 1);

    let a = &sim.world().players[&PlayerId::new("a")];
    // Only the movement frame applied: one step forward, no shot.
    assert!((a.z - BASE_SPEED).abs() < 1e-5);
    assert_eq!(a.ammo, WeaponStats::for_kind(WeaponKind::Pistol).magazine);
    assert!(sim.world().projectiles.is_empty());
    assert_eq!(a.last_input_seq, 5);
}
