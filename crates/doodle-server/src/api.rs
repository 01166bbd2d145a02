use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Serialize;

use doodle_core::room::{generate_room_id, validate_room_id};

use crate::coordinator::RoomSnapshot;
use crate::error::AppError;
use crate::state::AppState;

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Pictionary Game API" }))
}

#[derive(Serialize)]
pub struct NewRoomResponse {
    pub room_id: String,
}

/// Hand out a fresh room id. The room itself starts on first join.
pub async fn create_room() -> (StatusCode, Json<NewRoomResponse>) {
    (
        StatusCode::CREATED,
        Json(NewRoomResponse {
            room_id: generate_room_id(),
        }),
    )
}

pub async fn room_detail(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    validate_room_id(&room_id).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let handle = state.rooms.read().await.get(&room_id);
    let snapshot = match handle {
        Some(handle) => handle.snapshot().await,
        None => None,
    };
    snapshot
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("room {room_id} not found")))
}
