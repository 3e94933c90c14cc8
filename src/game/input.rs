//! Per-player input queues
//!
//! The submit path runs on connection executors; the room task drains at
//! tick boundaries. One lock around the whole table keeps the structure
//! simple; contention is bounded by the per-connection rate limit.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::game::error::GameError;
use crate::game::world::PlayerId;
use crate::game::CommandFrame;

/// Maximum queued frames per player
pub const QUEUE_CAPACITY: usize = 64;

/// Outcome of submitting a command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    Accepted,
    Rejected(Reject),
}

/// Why a frame was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    /// seq not above the last accepted seq
    Stale,
    /// queue saturated; the oldest half was discarded
    Overflow,
    /// no queue registered for this player
    NotJoined,
}

impl From<Reject> for GameError {
    fn from(reject: Reject) -> Self {
        match reject {
            Reject::Stale => GameError::Stale,
            Reject::Overflow => GameError::Overflow,
            Reject::NotJoined => GameError::NotJoined,
        }
    }
}

#[derive(Debug, Default)]
struct PlayerQueue {
    frames: VecDeque<CommandFrame>,
    last_seq: u32,
}

/// Thread-safe table of per-player bounded FIFOs
#[derive(Default)]
pub struct InputQueue {
    inner: Mutex<HashMap<PlayerId, PlayerQueue>>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the queue for a newly admitted player.
    pub fn register(&self, id: PlayerId) {
        self.inner.lock().entry(id).or_default();
    }

    /// Drop the queue (and any pending frames) for a leaving player.
    pub fn remove(&self, id: &PlayerId) {
        self.inner.lock().remove(id);
    }

    /// Submit a frame.
    ///
    /// Frames with `seq` at or below the last accepted seq are rejected as
    /// stale. On a full queue the oldest half is discarded and the frame
    /// rejected; subsequent frames are accepted again, preserving liveness.
    pub fn submit(&self, frame: CommandFrame) -> Submit {
        let mut inner = self.inner.lock();
        let Some(queue) = inner.get_mut(&frame.player_id) else {
            return Submit::Rejected(Reject::NotJoined);
        };

        if frame.seq <= queue.last_seq {
            return Submit::Rejected(Reject::Stale);
        }

        if queue.frames.len() >= QUEUE_CAPACITY {
            queue.frames.drain(..QUEUE_CAPACITY / 2);
            return Submit::Rejected(Reject::Overflow);
        }

        queue.last_seq = frame.seq;
        queue.frames.push_back(frame);
        Submit::Accepted
    }

    /// Return and clear a player's pending frames in insertion order.
    pub fn drain(&self, id: &PlayerId) -> Vec<CommandFrame> {
        match self.inner.lock().get_mut(id) {
            Some(queue) => queue.frames.drain(..).collect(),
            None => Vec::new(),
        }
    }
}
