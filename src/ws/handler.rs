//! WebSocket upgrade handler and session pump

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::error::GameError;
use crate::game::input::{Reject, Submit};
use crate::game::world::PlayerId;
use crate::game::CommandFrame;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientInput, ServerMsg};

/// Query parameters for the WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Room to attach to
    pub room: Uuid,
    /// Player id issued by the join ack
    pub player: PlayerId,
}

/// Outbound frames buffered per subscriber; overflow drops frames
/// (best-effort delivery, the next delta covers the gap).
const SUBSCRIBER_BUFFER: usize = 64;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query.room, query.player, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, room_id: Uuid, player_id: PlayerId, state: AppState) {
    info!(room_id = %room_id, player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    let Some(room) = state.registry.get(&room_id) else {
        let _ = send_msg(&mut ws_sink, &ServerMsg::error(&GameError::RoomEnded)).await;
        return;
    };

    // Register as a snapshot subscriber; the room replies with a Welcome
    // frame through the same channel.
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMsg>(SUBSCRIBER_BUFFER);
    if let Err(err) = state
        .sessions
        .subscribe(room_id, player_id.clone(), msg_tx.clone())
        .await
    {
        let _ = send_msg(&mut ws_sink, &ServerMsg::error(&err)).await;
        return;
    }

    // Writer task: room frames -> WebSocket
    let writer_player = player_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %writer_player, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> input queue
    let rate_limiter = ConnectionRateLimiter::new();
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited command frame");
                    continue;
                }
                handle_frame(&text, &player_id, &room.inputs, &msg_tx);
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Disconnect: drop the subscription and leave cooperatively at the
    // start of the room's next tick.
    state.sessions.unsubscribe(room_id, player_id.clone()).await;
    state.sessions.leave(room_id, player_id.clone()).await;
    writer.abort();

    info!(room_id = %room_id, player_id = %player_id, "WebSocket connection closed");
}

/// Parse, validate and enqueue one command frame. Per-frame failures go
/// back on this connection only; the session is never errored.
fn handle_frame(
    text: &str,
    player_id: &PlayerId,
    inputs: &crate::game::input::InputQueue,
    msg_tx: &mpsc::Sender<ServerMsg>,
) {
    let input: ClientInput = match serde_json::from_str(text) {
        Ok(input) => input,
        Err(e) => {
            let err = GameError::InvalidCommand(e.to_string());
            let _ = msg_tx.try_send(ServerMsg::error(&err));
            return;
        }
    };

    if let Err(err) = input.validate() {
        let _ = msg_tx.try_send(ServerMsg::error(&err));
        return;
    }

    if input.player_id != *player_id {
        let err = GameError::InvalidCommand("playerId does not match connection".into());
        let _ = msg_tx.try_send(ServerMsg::error(&err));
        return;
    }

    match inputs.submit(CommandFrame::from(input)) {
        Submit::Accepted => {}
        Submit::Rejected(Reject::Stale) => {
            // Out-of-order frame; dropping it is the whole contract.
            debug!(player_id = %player_id, "Dropped stale command frame");
        }
        Submit::Rejected(reject) => {
            let _ = msg_tx.try_send(ServerMsg::error(&GameError::from(reject)));
        }
    }
}

/// Send a message over the WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
