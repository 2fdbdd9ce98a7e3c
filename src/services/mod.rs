//! Request handling logic behind the routes.

/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Read-only room projections.
pub mod room_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
