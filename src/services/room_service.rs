//! Read-only projections of live rooms for the REST surface.

use crate::{
    dto::{
        room::{RoomSnapshot, WaitingRoomsResponse},
        validation::validate_room_code,
    },
    error::ServiceError,
    state::{SharedState, registry::RoomCode},
};

/// Return the latest snapshot of one room.
pub fn get_room(state: &SharedState, room_id: &str) -> Result<RoomSnapshot, ServiceError> {
    validate_room_code(room_id.trim())
        .map_err(|err| ServiceError::InvalidInput(format!("invalid room id: {err}")))?;

    let code = RoomCode::parse(room_id);
    state
        .rooms()
        .get(&code)
        .filter(|handle| !handle.is_closed())
        .map(|handle| handle.snapshot())
        .ok_or_else(|| ServiceError::NotFound(format!("room `{code}` not found")))
}

/// Return rooms still accepting players, oldest first.
pub fn list_waiting_rooms(state: &SharedState) -> WaitingRoomsResponse {
    WaitingRoomsResponse {
        rooms: state.rooms().list_waiting(),
    }
}
