//! Delta replay: applying a subscriber's stream of snapshot deltas to the
//! JoinAck baseline reconstructs the producer's state, including across
//! simulated frame loss.

#[allow(dead_code)]
mod common;

use std::collections::BTreeMap;

use tokio::sync::mpsc;

use arena_game_server::game::clock::BROADCAST_INTERVAL_TICKS;
use arena_game_server::game::map::Point3;
use arena_game_server::game::snapshot::{DeltaBroadcaster, POS_EPSILON, YAW_EPSILON};
use arena_game_server::game::world::PlayerId;
use arena_game_server::ws::protocol::{
    CommandAction, MoveFlags, PlayerSnapshot, ServerMsg, SnapshotDelta,
};

use common::*;

/// Client-side reconstruction: apply one delta to a known player map.
fn apply_delta(state: &mut BTreeMap<PlayerId, PlayerSnapshot>, delta: &SnapshotDelta) {
    for added in &delta.added_players {
        state.insert(added.id.clone(), added.clone());
    }
    for removed in &delta.removed_players {
        state.remove(removed);
    }
    for (id, change) in &delta.changed {
        let player = state.get_mut(id).expect("changed player must be known");
        if let Some(pos) = change.pos {
            player.pos = pos;
        }
        if let Some(yaw) = change.yaw {
            player.yaw = yaw;
        }
        if let Some(health) = change.health {
            player.health = health;
        }
        if let Some(weapon) = change.weapon {
            player.weapon = weapon;
        }
        if let Some(ammo) = change.ammo {
            player.ammo = ammo;
        }
        if let Some(alive) = change.alive {
            player.alive = alive;
        }
    }
}

fn assert_matches_producer(
    client: &BTreeMap<PlayerId, PlayerSnapshot>,
    producer: &BTreeMap<PlayerId, PlayerSnapshot>,
) {
    assert_eq!(
        client.keys().collect::<Vec<_>>(),
        producer.keys().collect::<Vec<_>>()
    );
    for (id, actual) in producer {
        let seen = &client[id];
        assert!(
            (seen.pos.x - actual.pos.x).abs() <= POS_EPSILON
                && (seen.pos.y - actual.pos.y).abs() <= POS_EPSILON
                && (seen.pos.z - actual.pos.z).abs() <= POS_EPSILON,
            "position diverged for {id}: {:?} vs {:?}",
            seen.pos,
            actual.pos
        );
        assert!((seen.yaw - actual.yaw).abs() <= YAW_EPSILON);
        assert_eq!(seen.health, actual.health);
        assert_eq!(seen.weapon, actual.weapon);
        assert_eq!(seen.ammo, actual.ammo);
        assert_eq!(seen.alive, actual.alive);
    }
}

/// Drive two players through 100+ ticks of movement and combat while one
/// subscriber consumes (and acks) every delta frame.
#[tokio::test]
async fn replaying_deltas_reconstructs_producer_state() {
    let (mut sim, inputs) = arena_sim(17);
    place_player(&mut sim, &inputs, "a", Point3::new(0.0, 1.8, 0.0), 0.0);
    place_player(&mut sim, &inputs, "b", Point3::new(3.0, 1.8, 6.0), 1.0);

    let mut broadcaster = DeltaBroadcaster::new();
    let (tx, mut rx) = mpsc::channel(1024);
    broadcaster.subscribe(PlayerId::new("a"), tx, sim.world().tick);

    let mut client: BTreeMap<PlayerId, PlayerSnapshot> = BTreeMap::new();
    let mut seq = 0u32;

    for i in 0..220u32 {
        // Both players wander and occasionally shoot.
        seq += 1;
        inputs.submit(frame(
            "a",
            seq,
            MoveFlags {
                fwd: true,
                run: i % 3 == 0,
                ..Default::default()
            },
            (i as f32) * 0.13,
            if i % 10 == 0 {
                CommandAction::Fire
            } else {
                CommandAction::None
            },
        ));
        seq += 1;
        inputs.submit(frame(
            "b",
            seq,
            MoveFlags {
                left: true,
                ..Default::default()
            },
            (i as f32) * -0.07,
            CommandAction::None,
        ));

        sim.step(&inputs, 1);
        broadcaster.record_events(sim.world());
        if sim.world().tick % BROADCAST_INTERVAL_TICKS == 0 {
            broadcaster.broadcast(sim.world());
        }

        while let Ok(msg) = rx.try_recv() {
            let ServerMsg::Snapshot { delta } = msg else {
                continue;
            };
            apply_delta(&mut client, &delta);
            // The client acks what it received; the next delta is keyed
            // on this baseline.
            broadcaster.ack(&PlayerId::new("a"), delta.tick);
        }
    }

    let producer: BTreeMap<PlayerId, PlayerSnapshot> = sim
        .world()
        .players
        .values()
        .map(|p| (p.id.clone(), p.snapshot()))
        .collect();
    assert_matches_producer(&client, &producer);
}

/// Frame loss: deltas that never arrive are also never acked, so the
/// stream still converges on the producer state.
#[tokio::test]
async fn lost_frames_do_not_corrupt_reconstruction() {
    let (mut sim, inputs) = arena_sim(23);
    place_player(&mut sim, &inputs, "a", Point3::new(0.0, 1.8, 0.0), 0.0);
    place_player(&mut sim, &inputs, "b", Point3::new(-4.0, 1.8, 2.0), 2.0);

    let mut broadcaster = DeltaBroadcaster::new();
    let (tx, mut rx) = mpsc::channel(1024);
    broadcaster.subscribe(PlayerId::new("a"), tx, sim.world().tick);

    let mut client: BTreeMap<PlayerId, PlayerSnapshot> = BTreeMap::new();
    let mut seq = 0u32;
    let mut frame_no = 0u32;

    for i in 0..200u32 {
        seq += 1;
        inputs.submit(frame(
            "a",
            seq,
            MoveFlags {
                fwd: i % 2 == 0,
                right: i % 5 == 0,
                ..Default::default()
            },
            (i as f32) * 0.21,
            CommandAction::None,
        ));

        sim.step(&inputs, 1);
        broadcaster.record_events(sim.world());
        if sim.world().tick % BROADCAST_INTERVAL_TICKS == 0 {
            broadcaster.broadcast(sim.world());
        }

        while let Ok(msg) = rx.try_recv() {
            let ServerMsg::Snapshot { delta } = msg else {
                continue;
            };
            frame_no += 1;
            // Every third frame vanishes in transit: not applied, not acked.
            if frame_no % 3 == 0 {
                continue;
            }
            apply_delta(&mut client, &delta);
            broadcaster.ack(&PlayerId::new("a"), delta.tick);
        }
    }

    // One final frame after the noise settles.
    sim.step(&inputs, 1);
    broadcaster.record_events(sim.world());
    sim.step(&inputs, 1);
    broadcaster.record_events(sim.world());
    broadcaster.broadcast(sim.world());
    while let Ok(msg) = rx.try_recv() {
        if let ServerMsg::Snapshot { delta } = msg {
            apply_delta(&mut client, &delta);
            broadcaster.ack(&PlayerId::new("a"), delta.tick);
        }
    }

    let producer: BTreeMap<PlayerId, PlayerSnapshot> = sim
        .world()
        .players
        .values()
        .map(|p| (p.id.clone(), p.snapshot()))
        .collect();
    assert_matches_producer(&client, &producer);
}

/// Every event is delivered exactly once while frames flow.
#[tokio::test]
async fn event_tail_is_gapless_across_frames() {
    let (mut sim, inputs) = arena_sim(31);
    place_player(&mut sim, &inputs, "a", Point3::new(0.0, 1.8, 0.0), 0.0);
    place_player(&mut sim, &inputs, "b", Point3::new(0.0, 1.8, 5.0), 0.0);

    let mut broadcaster = DeltaBroadcaster::new();
    let (tx, mut rx) = mpsc::channel(1024);
    broadcaster.subscribe(PlayerId::new("a"), tx, sim.world().tick);

    let mut produced = Vec::new();
    let mut received = Vec::new();
    let mut seq = 0u32;

    for i in 0..120u32 {
        if i % 6 == 0 {
            seq += 1;
            inputs.submit(fire("a", seq, 0.0));
        }
        sim.step(&inputs, 1);
        produced.extend(sim.world().events.iter().cloned());
        broadcaster.record_events(sim.world());
        if sim.world().tick % BROADCAST_INTERVAL_TICKS == 0 {
            broadcaster.broadcast(sim.world());
        }
        while let Ok(msg) = rx.try_recv() {
            if let ServerMsg::Snapshot { delta } = msg {
                received.extend(delta.events);
            }
        }
    }

    // Drop the trailing not-yet-broadcast tick's events.
    let last_received_tick = received.last().map(|e| e.tick).unwrap_or(0);
    produced.retain(|e| e.tick <= last_received_tick);
    assert_eq!(received, produced);
}
