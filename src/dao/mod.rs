//! Collaborators behind the rooms: identity, quiz content and profile progress.

/// Identity verification collaborator.
pub mod identity;
/// Data exchanged with collaborator stores.
pub mod models;
/// Player profile, experience and badge persistence.
pub mod profile_store;
/// Quiz content lookup.
pub mod quiz_store;
/// Shared storage error types.
pub mod storage;
