//! Read-only room routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::room::{RoomSnapshot, WaitingRoomsResponse},
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Read-only room endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/{id}", get(get_room))
}

#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Rooms waiting for players", body = WaitingRoomsResponse))
)]
/// List the rooms still accepting players, oldest first.
pub async fn list_rooms(State(state): State<SharedState>) -> Json<WaitingRoomsResponse> {
    Json(room_service::list_waiting_rooms(&state))
}

#[utoipa::path(
    get,
    path = "/rooms/{id}",
    tag = "rooms",
    params(("id" = String, Path, description = "Room code")),
    responses(
        (status = 200, description = "Current room state", body = RoomSnapshot),
        (status = 400, description = "Malformed room code"),
        (status = 404, description = "Unknown room")
    )
)]
/// Return the current state of one room.
pub async fn get_room(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let snapshot = room_service::get_room(&state, &id)?;
    Ok(Json(snapshot))
}
