//! Game session core

pub mod bot;
pub mod clock;
pub mod combat;
pub mod error;
pub mod input;
pub mod map;
pub mod room;
pub mod simulator;
pub mod snapshot;
pub mod world;

pub use room::{GameRoom, RoomHandle, RoomRegistry};

use crate::game::world::PlayerId;
use crate::ws::protocol::{ClientInput, CommandAction, MoveFlags};

/// A single player intent at a given sequence number, as consumed by the
/// input queue and the simulator. Bots synthesize these through the same
/// path as humans.
#[derive(Debug, Clone)]
pub struct CommandFrame {
    pub player_id: PlayerId,
    pub seq: u32,
    /// Latest server tick seen by the sender
    pub client_tick: u64,
    pub movement: MoveFlags,
    pub yaw: f32,
    pub action: CommandAction,
}

impl From<ClientInput> for CommandFrame {
    fn from(input: ClientInput) -> Self {
        Self {
            player_id: input.player_id,
            seq: input.seq,
            client_tick: input.tick,
            movement: input.mv,
            yaw: input.yaw,
            action: input.action,
        }
    }
}
