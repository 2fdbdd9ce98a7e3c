//! Process-local profile store, used when no profile service is configured.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, ready};

use crate::dao::{
    models::ProfileProgress, profile_store::ProfileStore, storage::StorageResult,
};

/// Experience needed to go from level 1 to level 2; each level costs this much more.
const LEVEL_STEP_XP: u64 = 100;

/// Progress tracked for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileRecord {
    /// Total experience.
    pub experience: u64,
    /// Current level.
    pub level: u32,
    /// Badges in award order.
    pub badges: Vec<String>,
}

/// Profile store keeping records in a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileStore {
    records: Arc<DashMap<String, ProfileRecord>>,
}

impl InMemoryProfileStore {
    /// Copy of the record kept for `player_id`.
    pub fn record(&self, player_id: &str) -> Option<ProfileRecord> {
        self.records.get(player_id).map(|entry| entry.value().clone())
    }
}

/// Level reached with `experience` points: level `n` costs `n * LEVEL_STEP_XP` to leave.
pub fn level_for_experience(experience: u64) -> u32 {
    let mut level = 1u32;
    let mut remaining = experience;
    let mut threshold = LEVEL_STEP_XP;
    while remaining >= threshold {
        remaining -= threshold;
        level += 1;
        threshold = u64::from(level) * LEVEL_STEP_XP;
    }
    level
}

impl ProfileStore for InMemoryProfileStore {
    fn credit_experience(
        &self,
        player_id: &str,
        experience: u32,
    ) -> BoxFuture<'static, StorageResult<ProfileProgress>> {
        let mut record = self.records.entry(player_id.to_string()).or_default();
        record.experience += u64::from(experience);
        record.level = level_for_experience(record.experience);
        let progress = ProfileProgress {
            experience: record.experience,
            level: record.level,
        };
        ready(Ok(progress)).boxed()
    }

    fn award_badge(&self, player_id: &str, badge: &str) -> BoxFuture<'static, StorageResult<()>> {
        let mut record = self.records.entry(player_id.to_string()).or_default();
        if !record.badges.iter().any(|existing| existing == badge) {
            record.badges.push(badge.to_string());
        }
        ready(Ok(())).boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        ready(Ok(())).boxed()
    }
}

/// Test double refusing selected writes while delegating the rest.
#[cfg(test)]
pub(crate) mod rejecting {
    use super::*;
    use crate::dao::storage::StorageError;

    #[derive(Debug, Clone, Default)]
    pub(crate) struct RejectingProfileStore {
        pub(crate) inner: InMemoryProfileStore,
        pub(crate) reject_credit_for: Vec<String>,
        pub(crate) reject_badges: bool,
    }

    impl ProfileStore for RejectingProfileStore {
        fn credit_experience(
            &self,
            player_id: &str,
            experience: u32,
        ) -> BoxFuture<'static, StorageResult<ProfileProgress>> {
            if self.reject_credit_for.iter().any(|id| id == player_id) {
                return ready(Err(StorageError::rejected(format!(
                    "credit refused for {player_id}"
                ))))
                .boxed();
            }
            self.inner.credit_experience(player_id, experience)
        }

        fn award_badge(
            &self,
            player_id: &str,
            badge: &str,
        ) -> BoxFuture<'static, StorageResult<()>> {
            if self.reject_badges {
                return ready(Err(StorageError::rejected("badges are read-only"))).boxed();
            }
            self.inner.award_badge(player_id, badge)
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_get_progressively_more_expensive() {
        assert_eq!(level_for_experience(0), 1);
        assert_eq!(level_for_experience(99), 1);
        assert_eq!(level_for_experience(100), 2);
        assert_eq!(level_for_experience(299), 2);
        assert_eq!(level_for_experience(300), 3);
        assert_eq!(level_for_experience(600), 4);
    }

    #[tokio::test]
    async fn credits_accumulate_and_badges_are_not_duplicated() {
        let store = InMemoryProfileStore::default();

        store.credit_experience("p1", 80).await.unwrap();
        let progress = store.credit_experience("p1", 40).await.unwrap();
        assert_eq!(progress, ProfileProgress { experience: 120, level: 2 });

        store.award_badge("p1", "top_finisher").await.unwrap();
        store.award_badge("p1", "top_finisher").await.unwrap();
        assert_eq!(store.record("p1").unwrap().badges, vec!["top_finisher"]);
    }
}
