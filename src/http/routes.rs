//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::error::GameError;
use crate::game::map::MapId;
use crate::game::world::PlayerId;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::{JoinError, JoinRequest, RoomDescriptor};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.client_origin.trim() == "*" {
        CorsLayer::permissive()
    } else {
        let allowed_origins: Vec<header::HeaderValue> = state
            .config
            .client_origin
            .split(',')
            .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/rooms", get(list_rooms_handler).post(create_room_handler))
        .route("/rooms/:id", delete(end_room_handler))
        .route("/rooms/:id/kick", post(kick_handler))
        .route("/join", post(join_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Map a session error onto an HTTP status.
fn status_for(err: &GameError) -> StatusCode {
    match err {
        GameError::RoomFull => StatusCode::CONFLICT,
        GameError::RoomEnded | GameError::NotJoined => StatusCode::NOT_FOUND,
        GameError::InvalidCommand(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON error reply carrying the wire error code
struct AppError(GameError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        }));
        (status_for(&self.0), body).into_response()
    }
}

impl From<GameError> for AppError {
    fn from(err: GameError) -> Self {
        Self(err)
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_rooms: usize,
    active_players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_rooms: state.registry.active_rooms(),
        active_players: state.registry.total_players(),
    })
}

// ============================================================================
// Room endpoints
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomRequest {
    name: String,
    map: MapId,
    max_players: usize,
}

async fn list_rooms_handler(State(state): State<AppState>) -> Json<Vec<RoomDescriptor>> {
    Json(state.sessions.list_rooms())
}

async fn create_room_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> (StatusCode, Json<RoomDescriptor>) {
    let descriptor = state
        .sessions
        .create_room(req.name, req.map, req.max_players);
    (StatusCode::CREATED, Json(descriptor))
}

async fn end_room_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.sessions.end_room(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KickRequest {
    player_id: PlayerId,
}

async fn kick_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<KickRequest>,
) -> Result<StatusCode, AppError> {
    state.sessions.kick(id, req.player_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Join endpoint
// ============================================================================

async fn join_handler(
    State(state): State<AppState>,
    Json(req): Json<JoinRequest>,
) -> Response {
    match state.sessions.join(req.room_id, req.display_name).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(err) => (status_for(&err), Json(JoinError::from(&err))).into_response(),
    }
}
