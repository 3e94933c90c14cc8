//! Tick clock and scheduler
//!
//! The simulation runs at a fixed 20 Hz; snapshots go out every other tick
//! (10 Hz). The scheduler is decoupled from wall-clock I/O: the room task
//! asks `TickSchedule` how many steps are due for a monotonic `now` and
//! runs them back to back, capped at `MAX_CATCHUP_STEPS` per wakeup. Steps
//! beyond the cap are dropped and reported so the room can log a tick-lag
//! warning instead of spiraling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Simulation ticks per second
pub const SIMULATION_TPS: u32 = 20;
/// Simulation tick duration
pub const TICK_DURATION: Duration = Duration::from_millis(1_000 / SIMULATION_TPS as u64);
/// Broadcast every N simulation ticks (10 Hz)
pub const BROADCAST_INTERVAL_TICKS: u64 = 2;
/// Maximum simulation steps run per wakeup when catching up
pub const MAX_CATCHUP_STEPS: u64 = 5;

/// Seconds represented by one tick
pub fn tick_secs() -> f32 {
    1.0 / SIMULATION_TPS as f32
}

/// Convert a wall-clock duration into whole ticks
pub fn ticks_from_secs(secs: f32) -> u64 {
    (secs * SIMULATION_TPS as f32).round() as u64
}

/// Monotonic time source for the scheduler.
///
/// `SystemClock` is used in production; `ManualClock` advances by explicit
/// increments in tests.
pub trait TickClock: Send + Sync {
    /// Monotonic time elapsed since the clock was created.
    fn now(&self) -> Duration;
}

/// Wall-clock backed monotonic source
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock for SystemClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Test clock advanced by explicit increments
#[derive(Clone, Default)]
pub struct ManualClock {
    elapsed_micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.elapsed_micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl TickClock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.elapsed_micros.load(Ordering::SeqCst))
    }
}

/// Result of asking the schedule what is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueSteps {
    /// Simulation steps to run now
    pub steps: u64,
    /// Steps dropped because the catch-up cap was exceeded
    pub dropped: u64,
}

/// Fixed-rate tick schedule with capped catch-up.
pub struct TickSchedule {
    period: Duration,
    scheduled: u64,
}

impl TickSchedule {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            scheduled: 0,
        }
    }

    /// Number of ticks fully scheduled so far.
    pub fn current_tick(&self) -> u64 {
        self.scheduled
    }

    /// How many simulation steps are due at monotonic time `now`.
    ///
    /// Advances the schedule past dropped steps, so a stall costs lost
    /// ticks rather than a permanently lagging room.
    pub fn due_steps(&mut self, now: Duration) -> DueSteps {
        let target = (now.as_micros() / self.period.as_micros()) as u64;
        let owed = target.saturating_sub(self.scheduled);
        let steps = owed.min(MAX_CATCHUP_STEPS);
        let dropped = owed - steps;
        self.scheduled = target;
        DueSteps { steps, dropped }
    }
}
