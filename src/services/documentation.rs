//! OpenAPI document for the HTTP surface and WebSocket schemas.

use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Duel Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::get_room,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::RoomSnapshot,
            crate::dto::room::WaitingRoomsResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Read-only room status"),
        (name = "players", description = "WebSocket protocol for quiz players"),
    )
)]
/// OpenAPI document of the service.
pub struct ApiDoc;
