//! Session error taxonomy
//!
//! Per-frame errors (`InvalidCommand`, `Stale`, `Overflow`, `NotJoined`)
//! are reported on the offending connection only; `RoomFull` and
//! `RoomEnded` surface to the joining client; `TickLag` is diagnostics
//! only; `TerminalInvariant` ends the room.

use thiserror::Error;

/// Errors produced by the game session core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("malformed command frame: {0}")]
    InvalidCommand(String),

    #[error("stale sequence number")]
    Stale,

    #[error("input queue overflow")]
    Overflow,

    #[error("player is not in this room")]
    NotJoined,

    #[error("room is full")]
    RoomFull,

    #[error("room has ended")]
    RoomEnded,

    #[error("simulation is falling behind")]
    TickLag,

    #[error("terminal invariant violation: {0}")]
    TerminalInvariant(String),
}

impl GameError {
    /// Stable wire code for error frames and JoinError kinds.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidCommand(_) => "invalid_command",
            GameError::Stale => "stale",
            GameError::Overflow => "overflow",
            GameError::NotJoined => "not_joined",
            GameError::RoomFull => "room_full",
            GameError::RoomEnded => "room_ended",
            GameError::TickLag => "tick_lag",
            GameError::TerminalInvariant(_) => "terminal_invariant",
        }
    }
}
