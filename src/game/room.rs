//! Room state and authoritative tick loop
//!
//! One tokio task per room owns every piece of mutable room state
//! (simulator, bots, broadcaster). Everything else talks to the room
//! through the control channel or the shared input queue; a panicking
//! tick ends this room only.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::game::bot::BotController;
use crate::game::clock::{
    SystemClock, TickClock, TickSchedule, BROADCAST_INTERVAL_TICKS, TICK_DURATION,
};
use crate::game::error::GameError;
use crate::game::input::InputQueue;
use crate::game::map::{MapDescriptor, MapId};
use crate::game::simulator::Simulator;
use crate::game::snapshot::DeltaBroadcaster;
use crate::game::world::PlayerId;
use crate::ws::protocol::{JoinAck, OwnerKind, RoomDescriptor, RoomStatus, ServerMsg, Team};

/// Per-room configuration
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub name: String,
    pub map: Arc<MapDescriptor>,
    pub max_players: usize,
    /// Bots maintained while fewer than `bot_fill + 1` humans are present
    pub bot_fill: usize,
    /// How long a playing room survives with no humans
    pub empty_grace: Duration,
    /// How long a waiting room survives before anyone joins
    pub waiting_grace: Duration,
}

/// Control commands processed at the start of a tick (admissions)
pub enum RoomCommand {
    Join {
        display_name: String,
        reply: oneshot::Sender<Result<JoinAck, GameError>>,
    },
    Leave {
        player_id: PlayerId,
    },
    Kick {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Subscribe {
        player_id: PlayerId,
        tx: mpsc::Sender<ServerMsg>,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Unsubscribe {
        player_id: PlayerId,
    },
    End {
        reason: String,
    },
}

/// State shared between the room task and its handle
struct RoomShared {
    status: RwLock<RoomStatus>,
    player_count: AtomicUsize,
    host_id: RwLock<Option<PlayerId>>,
}

/// Handle to a running room
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub name: String,
    pub map_id: MapId,
    pub max_players: usize,
    pub created_at: DateTime<Utc>,
    pub control_tx: mpsc::Sender<RoomCommand>,
    pub inputs: Arc<InputQueue>,
    shared: Arc<RoomShared>,
}

impl RoomHandle {
    pub fn status(&self) -> RoomStatus {
        *self.shared.status.read()
    }

    pub fn player_count(&self) -> usize {
        self.shared.player_count.load(Ordering::Relaxed)
    }

    pub fn descriptor(&self) -> RoomDescriptor {
        RoomDescriptor {
            id: self.id,
            name: self.name.clone(),
            map: self.map_id,
            max_players: self.max_players,
            status: self.status(),
            created_at: self.created_at,
            host_id: self.shared.host_id.read().clone(),
            player_count: self.player_count(),
        }
    }
}

/// Registry of all active rooms
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.get(id).map(|r| r.value().clone())
    }

    pub fn insert(&self, handle: RoomHandle) {
        self.rooms.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<RoomHandle> {
        self.rooms.remove(id).map(|(_, h)| h)
    }

    pub fn list(&self) -> Vec<RoomDescriptor> {
        let mut rooms: Vec<RoomDescriptor> =
            self.rooms.iter().map(|r| r.value().descriptor()).collect();
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rooms
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|r| r.value().player_count()).sum()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The authoritative game room
pub struct GameRoom {
    id: Uuid,
    config: RoomConfig,
    sim: Simulator,
    bots: BotController,
    broadcaster: DeltaBroadcaster,
    inputs: Arc<InputQueue>,
    control_rx: mpsc::Receiver<RoomCommand>,
    shared: Arc<RoomShared>,
    status: RoomStatus,
    /// Set while no humans are present; drives the grace shutdown
    empty_since: Option<Instant>,
    end_reason: Option<String>,
    joins: u64,
    next_bot: u32,
    ticks_dropped: u64,
}

impl GameRoom {
    pub fn new(config: RoomConfig, seed: u64) -> (Self, RoomHandle) {
        let id = Uuid::new_v4();
        let (control_tx, control_rx) = mpsc::channel(256);
        let inputs = Arc::new(InputQueue::new());
        let shared = Arc::new(RoomShared {
            status: RwLock::new(RoomStatus::Waiting),
            player_count: AtomicUsize::new(0),
            host_id: RwLock::new(None),
        });

        let handle = RoomHandle {
            id,
            name: config.name.clone(),
            map_id: config.map.id,
            max_players: config.max_players,
            created_at: Utc::now(),
            control_tx,
            inputs: Arc::clone(&inputs),
            shared: Arc::clone(&shared),
        };

        let room = Self {
            id,
            sim: Simulator::new(Arc::clone(&config.map), seed),
            // Separate stream so bot decisions never perturb spawn picks.
            bots: BotController::new(seed.wrapping_add(1)),
            broadcaster: DeltaBroadcaster::new(),
            inputs,
            control_rx,
            shared,
            status: RoomStatus::Waiting,
            empty_since: Some(Instant::now()),
            end_reason: None,
            joins: 0,
            next_bot: 0,
            ticks_dropped: 0,
            config,
        };

        (room, handle)
    }

    /// Run the authoritative tick loop until the room ends.
    pub async fn run(mut self) {
        info!(room_id = %self.id, name = %self.config.name, "Room started");

        let clock = SystemClock::new();
        let mut schedule = TickSchedule::new(TICK_DURATION);
        let mut ticker = interval(TICK_DURATION);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        'room: loop {
            ticker.tick().await;

            let due = schedule.due_steps(clock.now());
            if due.dropped > 0 {
                self.ticks_dropped += due.dropped;
                warn!(
                    room_id = %self.id,
                    dropped = due.dropped,
                    total_dropped = self.ticks_dropped,
                    "Tick lag: simulation falling behind, dropping steps"
                );
            }

            for _ in 0..due.steps {
                if !self.run_tick() {
                    break 'room;
                }
            }
        }

        let reason = self.end_reason.take().unwrap_or_else(|| "ended".into());
        self.set_status(RoomStatus::Ended);
        self.broadcaster
            .send_to_all(&ServerMsg::RoomEnded {
                reason: reason.clone(),
            });

        info!(room_id = %self.id, reason = %reason, "Room ended");
    }

    /// One simulation tick. Returns false once the room is done.
    fn run_tick(&mut self) -> bool {
        self.process_control();
        if self.status == RoomStatus::Ended {
            return false;
        }

        self.fill_bots();
        self.bots.drive(self.sim.world(), &self.inputs);

        let step = {
            let sim = &mut self.sim;
            let inputs = &self.inputs;
            catch_unwind(AssertUnwindSafe(|| sim.step(inputs, 1)))
        };

        match step {
            Ok(output) => {
                for (id, acked) in output.acks {
                    self.broadcaster.ack(&id, acked);
                }
                self.broadcaster.record_events(self.sim.world());
                if self.sim.world().tick % BROADCAST_INTERVAL_TICKS == 0 {
                    self.broadcaster.broadcast(self.sim.world());
                }
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<String>()
                    .cloned()
                    .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                    .unwrap_or_else(|| "unknown panic".into());
                error!(room_id = %self.id, detail = %detail, "Simulator invariant violation, aborting room");

                self.broadcaster.send_to_all(&ServerMsg::error(
                    &GameError::TerminalInvariant(detail),
                ));
                self.end_reason = Some("terminal_invariant".into());
                return false;
            }
        }

        self.shared
            .player_count
            .store(self.sim.world().players.len(), Ordering::Relaxed);

        self.check_grace()
    }

    /// Drain queued control commands (admissions phase).
    fn process_control(&mut self) {
        while let Ok(command) = self.control_rx.try_recv() {
            match command {
                RoomCommand::Join {
                    display_name,
                    reply,
                } => {
                    let _ = reply.send(self.admit_human(display_name));
                }
                RoomCommand::Leave { player_id } => {
                    self.remove_player(&player_id);
                }
                RoomCommand::Kick { player_id, reply } => {
                    let result = if self.remove_player(&player_id) {
                        Ok(())
                    } else {
                        Err(GameError::NotJoined)
                    };
                    let _ = reply.send(result);
                }
                RoomCommand::Subscribe {
                    player_id,
                    tx,
                    reply,
                } => {
                    let _ = reply.send(self.subscribe(player_id, tx));
                }
                RoomCommand::Unsubscribe { player_id } => {
                    self.broadcaster.unsubscribe(&player_id);
                }
                RoomCommand::End { reason } => {
                    self.end_reason = Some(reason);
                    self.set_status(RoomStatus::Ended);
                }
            }
        }
    }

    fn admit_human(&mut self, display_name: String) -> Result<JoinAck, GameError> {
        if self.status == RoomStatus::Ended {
            return Err(GameError::RoomEnded);
        }
        // The cap gates humans; the bot fill target yields slots back as
        // humans arrive, so bots can never lock a human out.
        if self.sim.world().human_count() >= self.config.max_players {
            return Err(GameError::RoomFull);
        }

        let player_id = PlayerId::generate();
        let team = self.next_team();
        let spawn = self.sim.admit(
            player_id.clone(),
            display_name,
            OwnerKind::Human,
            team,
        );
        self.inputs.register(player_id.clone());
        self.empty_since = None;

        if self.status == RoomStatus::Waiting {
            self.set_status(RoomStatus::Playing);
        }
        if self.shared.host_id.read().is_none() {
            *self.shared.host_id.write() = Some(player_id.clone());
        }

        info!(
            room_id = %self.id,
            player_id = %player_id,
            player_count = self.sim.world().players.len(),
            "Player joined room"
        );

        Ok(JoinAck { player_id, spawn })
    }

    fn subscribe(
        &mut self,
        player_id: PlayerId,
        tx: mpsc::Sender<ServerMsg>,
    ) -> Result<(), GameError> {
        if !self.sim.world().players.contains_key(&player_id) {
            return Err(GameError::NotJoined);
        }

        let welcome = ServerMsg::Welcome {
            player_id: player_id.clone(),
            room_id: self.id,
            tick: self.sim.world().tick,
            map: (*self.config.map).clone(),
        };
        let _ = tx.try_send(welcome);
        self.broadcaster
            .subscribe(player_id, tx, self.sim.world().tick);
        Ok(())
    }

    fn remove_player(&mut self, player_id: &PlayerId) -> bool {
        if !self.sim.remove(player_id) {
            return false;
        }
        self.inputs.remove(player_id);
        self.broadcaster.unsubscribe(player_id);
        self.bots.forget(player_id);

        info!(
            room_id = %self.id,
            player_id = %player_id,
            player_count = self.sim.world().players.len(),
            "Player left room"
        );
        true
    }

    /// Maintain the bot headcount: fill up while humans are scarce, thin
    /// out as humans arrive.
    fn fill_bots(&mut self) {
        if self.status != RoomStatus::Playing {
            return;
        }

        let humans = self.sim.world().human_count();
        let target = if humans == 0 || humans > self.config.bot_fill {
            0
        } else {
            // Total headcount stays within the cap.
            self.config
                .bot_fill
                .min(self.config.max_players.saturating_sub(humans))
        };

        while self.sim.world().bot_count() < target {
            let id = PlayerId::bot(self.next_bot);
            self.next_bot += 1;
            let team = self.next_team();
            self.sim
                .admit(id.clone(), format!("Bot {}", self.next_bot - 1), OwnerKind::Bot, team);
            self.inputs.register(id);
        }

        while self.sim.world().bot_count() > target {
            let Some(surplus) = self.sim.world().bots().map(|b| b.id.clone()).last() else {
                break;
            };
            self.remove_player(&surplus);
        }
    }

    fn next_team(&mut self) -> Team {
        self.joins += 1;
        if self.joins % 2 == 1 {
            Team::Green
        } else {
            Team::Red
        }
    }

    /// Grace-window shutdown: a room with no humans ends after its grace
    /// period. Bots never keep a room alive.
    fn check_grace(&mut self) -> bool {
        if self.sim.world().human_count() > 0 {
            self.empty_since = None;
            return true;
        }

        let empty_since = *self.empty_since.get_or_insert_with(Instant::now);
        let grace = if self.status == RoomStatus::Playing {
            self.config.empty_grace
        } else {
            self.config.waiting_grace
        };

        if empty_since.elapsed() >= grace {
            self.end_reason = Some("empty".into());
            self.set_status(RoomStatus::Ended);
            return false;
        }
        true
    }

    fn set_status(&mut self, status: RoomStatus) {
        self.status = status;
        *self.shared.status.write() = status;
    }
}
