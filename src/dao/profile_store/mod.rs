//! Persistence of experience, levels and badges earned in quizzes.

#[cfg(feature = "http-profile-store")]
pub mod http;
pub mod memory;

use futures::future::BoxFuture;

use crate::dao::{models::ProfileProgress, storage::StorageResult};

/// Abstraction over the profile/XP service credited at the end of a session.
///
/// Implementations are responsible for idempotency: the session engine may
/// credit the same player more than once if a room is replayed.
pub trait ProfileStore: Send + Sync {
    /// Add experience to a profile and return its recomputed level.
    fn credit_experience(
        &self,
        player_id: &str,
        experience: u32,
    ) -> BoxFuture<'static, StorageResult<ProfileProgress>>;
    /// Append a badge to a profile.
    fn award_badge(&self, player_id: &str, badge: &str) -> BoxFuture<'static, StorageResult<()>>;
    /// Check that the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
