//! Liveness reporting.

use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report the number of live rooms, degraded when the profile store is unreachable.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let active_rooms = state.rooms().len();

    match state.profiles().health_check().await {
        Ok(()) => HealthResponse::ok(active_rooms),
        Err(err) => {
            warn!(error = %err, "profile store health check failed");
            HealthResponse::degraded(active_rooms)
        }
    }
}
