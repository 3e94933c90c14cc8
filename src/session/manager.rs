//! Session manager - room creation, joins and teardown
//!
//! Owns no room state itself: each room runs as its own task and the
//! manager reaches it through the registry and the room's control
//! channel. Admissions resolve inside the room's tick loop; the oneshot
//! reply carries the JoinAck back to the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::game::error::GameError;
use crate::game::map::{MapCatalog, MapId};
use crate::game::room::{GameRoom, RoomCommand, RoomConfig, RoomHandle, RoomRegistry};
use crate::game::world::PlayerId;
use crate::ws::protocol::{JoinAck, RoomDescriptor, ServerMsg};

/// Hard ceiling on the per-room player cap
const MAX_ROOM_CAP: usize = 32;

pub struct SessionManager {
    registry: Arc<RoomRegistry>,
    catalog: MapCatalog,
    bot_fill: usize,
    empty_grace: Duration,
    waiting_grace: Duration,
}

impl SessionManager {
    pub fn new(registry: Arc<RoomRegistry>, catalog: MapCatalog, config: &Config) -> Self {
        Self {
            registry,
            catalog,
            bot_fill: config.bot_fill,
            empty_grace: Duration::from_secs(config.empty_grace_secs),
            waiting_grace: Duration::from_secs(config.waiting_grace_secs),
        }
    }

    /// Create a room and spawn its tick-loop task. The task cleans its
    /// registry entry up when it exits, whatever the reason.
    pub fn create_room(&self, name: String, map: MapId, max_players: usize) -> RoomDescriptor {
        let config = RoomConfig {
            name,
            map: self.catalog.get(map),
            max_players: max_players.clamp(1, MAX_ROOM_CAP),
            bot_fill: self.bot_fill,
            empty_grace: self.empty_grace,
            waiting_grace: self.waiting_grace,
        };

        let seed = rand::random::<u64>();
        let (room, handle) = GameRoom::new(config, seed);
        let descriptor = handle.descriptor();
        self.registry.insert(handle);

        let registry = Arc::clone(&self.registry);
        let room_id = descriptor.id;
        tokio::spawn(async move {
            room.run().await;
            registry.remove(&room_id);
            info!(room_id = %room_id, "Room removed from registry");
        });

        info!(room_id = %room_id, map = %descriptor.map, "Created room");
        descriptor
    }

    pub fn list_rooms(&self) -> Vec<RoomDescriptor> {
        self.registry.list()
    }

    pub fn room(&self, id: &Uuid) -> Option<RoomHandle> {
        self.registry.get(id)
    }

    /// Join a room; resolves at the room's next admission phase.
    pub async fn join(&self, room_id: Uuid, display_name: String) -> Result<JoinAck, GameError> {
        let handle = self.registry.get(&room_id).ok_or(GameError::RoomEnded)?;
        let (reply, rx) = oneshot::channel();
        handle
            .control_tx
            .send(RoomCommand::Join {
                display_name,
                reply,
            })
            .await
            .map_err(|_| GameError::RoomEnded)?;
        rx.await.map_err(|_| GameError::RoomEnded)?
    }

    /// Cooperative leave; takes effect at the start of the next tick.
    pub async fn leave(&self, room_id: Uuid, player_id: PlayerId) {
        if let Some(handle) = self.registry.get(&room_id) {
            let _ = handle
                .control_tx
                .send(RoomCommand::Leave { player_id })
                .await;
        }
    }

    pub async fn kick(&self, room_id: Uuid, player_id: PlayerId) -> Result<(), GameError> {
        let handle = self.registry.get(&room_id).ok_or(GameError::RoomEnded)?;
        let (reply, rx) = oneshot::channel();
        handle
            .control_tx
            .send(RoomCommand::Kick { player_id, reply })
            .await
            .map_err(|_| GameError::RoomEnded)?;
        rx.await.map_err(|_| GameError::RoomEnded)?
    }

    pub async fn end_room(&self, room_id: Uuid) -> Result<(), GameError> {
        let handle = self.registry.get(&room_id).ok_or(GameError::RoomEnded)?;
        handle
            .control_tx
            .send(RoomCommand::End {
                reason: "ended by admin".into(),
            })
            .await
            .map_err(|_| GameError::RoomEnded)
    }

    /// Register a snapshot subscriber for a joined player.
    pub async fn subscribe(
        &self,
        room_id: Uuid,
        player_id: PlayerId,
        tx: mpsc::Sender<ServerMsg>,
    ) -> Result<(), GameError> {
        let handle = self.registry.get(&room_id).ok_or(GameError::RoomEnded)?;
        let (reply, rx) = oneshot::channel();
        handle
            .control_tx
            .send(RoomCommand::Subscribe {
                player_id,
                tx,
                reply,
            })
            .await
            .map_err(|_| GameError::RoomEnded)?;
        rx.await.map_err(|_| GameError::RoomEnded)?
    }

    pub async fn unsubscribe(&self, room_id: Uuid, player_id: PlayerId) {
        if let Some(handle) = self.registry.get(&room_id) {
            let _ = handle
                .control_tx
                .send(RoomCommand::Unsubscribe { player_id })
                .await;
        }
    }
}
