//! Leaderboard projection and end-of-session reward hand-off.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    dao::profile_store::ProfileStore,
    state::{room::PlayerId, scoring::RewardTable},
};

/// Badge granted to the player finishing first.
pub const TOP_FINISHER_BADGE: &str = "top_finisher";

/// One line of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// One-based position; ties keep join order.
    pub position: usize,
    /// Player this line is about.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Points so far.
    pub score: u32,
    /// Questions answered correctly.
    pub correct_answers: usize,
}

/// Reward computed for one finisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reward {
    /// Recipient.
    pub player_id: PlayerId,
    /// Experience to credit.
    pub experience: u32,
    /// Badge to award, if any.
    pub badge: Option<&'static str>,
}

/// What happened when a reward was written to the profile store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardOutcome {
    /// Reward that was attempted.
    pub reward: Reward,
    /// Level reported by the store after crediting, if crediting succeeded.
    pub level: Option<u32>,
    /// Failure description, if any step failed.
    pub error: Option<String>,
}

/// Rank-based rewards for a final leaderboard (already sorted).
pub fn compute_rewards(leaderboard: &[LeaderboardEntry], table: &RewardTable) -> Vec<Reward> {
    leaderboard
        .iter()
        .enumerate()
        .map(|(rank, entry)| Reward {
            player_id: entry.player_id.clone(),
            experience: table.reward_for_rank(rank),
            badge: (rank == 0).then_some(TOP_FINISHER_BADGE),
        })
        .collect()
}

/// Write every reward to the profile store, logging failures per player.
///
/// Never fails as a whole: each outcome records its own error.
pub async fn persist_rewards(
    store: Arc<dyn ProfileStore>,
    room_id: String,
    rewards: Vec<Reward>,
) -> Vec<RewardOutcome> {
    let mut outcomes = Vec::with_capacity(rewards.len());

    for reward in rewards {
        let mut outcome = RewardOutcome {
            reward: reward.clone(),
            level: None,
            error: None,
        };

        match store
            .credit_experience(&reward.player_id, reward.experience)
            .await
        {
            Ok(progress) => outcome.level = Some(progress.level),
            Err(err) => {
                warn!(
                    room_id = %room_id,
                    player_id = %reward.player_id,
                    error = %err,
                    "failed to credit experience"
                );
                outcome.error = Some(err.to_string());
            }
        }

        if let Some(badge) = reward.badge {
            if let Err(err) = store.award_badge(&reward.player_id, badge).await {
                warn!(
                    room_id = %room_id,
                    player_id = %reward.player_id,
                    badge,
                    error = %err,
                    "failed to award badge"
                );
                outcome.error.get_or_insert_with(|| err.to_string());
            }
        }

        outcomes.push(outcome);
    }

    let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
    info!(
        room_id = %room_id,
        credited = outcomes.len() - failed,
        failed,
        "reward persistence finished"
    );
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::profile_store::memory::{
        InMemoryProfileStore, rejecting::RejectingProfileStore,
    };

    fn entry(position: usize, id: &str, score: u32) -> LeaderboardEntry {
        LeaderboardEntry {
            position,
            player_id: id.into(),
            name: id.to_uppercase(),
            score,
            correct_answers: 0,
        }
    }

    #[test]
    fn winner_gets_the_badge_and_the_largest_reward() {
        let board = vec![entry(1, "a", 900), entry(2, "b", 500), entry(3, "c", 0)];
        let rewards = compute_rewards(&board, &RewardTable::default());

        assert_eq!(rewards[0].badge, Some(TOP_FINISHER_BADGE));
        assert_eq!(rewards[0].experience, 100);
        assert_eq!(rewards[1].badge, None);
        assert_eq!(rewards[1].experience, 80);
        assert_eq!(rewards[2].experience, 60);
    }

    #[tokio::test]
    async fn persisting_rewards_reaches_the_store() {
        let store = Arc::new(InMemoryProfileStore::default());
        let board = vec![entry(1, "a", 900), entry(2, "b", 500)];
        let rewards = compute_rewards(&board, &RewardTable::default());

        let outcomes = persist_rewards(store.clone(), "ROOM42".into(), rewards).await;

        assert!(outcomes.iter().all(|o| o.error.is_none()));
        let winner = store.record("a").unwrap();
        assert_eq!(winner.experience, 100);
        assert_eq!(winner.badges, vec![TOP_FINISHER_BADGE.to_string()]);
        assert!(store.record("b").unwrap().badges.is_empty());
    }

    #[tokio::test]
    async fn one_failed_write_does_not_stop_the_others() {
        let inner = InMemoryProfileStore::default();
        let store = Arc::new(RejectingProfileStore {
            inner: inner.clone(),
            reject_credit_for: vec!["a".into()],
            reject_badges: true,
        });
        let board = vec![entry(1, "a", 900), entry(2, "b", 500), entry(3, "c", 100)];
        let rewards = compute_rewards(&board, &RewardTable::default());

        let outcomes = persist_rewards(store, "ROOM42".into(), rewards).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].error.is_some());
        assert_eq!(outcomes[0].level, None);
        assert!(outcomes[1].error.is_none());
        assert!(outcomes[1].level.is_some());
        assert!(outcomes[2].error.is_none());

        assert!(inner.record("a").is_none());
        assert_eq!(inner.record("b").unwrap().experience, 80);
        assert_eq!(inner.record("c").unwrap().experience, 60);
    }

    #[tokio::test]
    async fn refused_badge_keeps_the_credited_experience() {
        let inner = InMemoryProfileStore::default();
        let store = Arc::new(RejectingProfileStore {
            inner: inner.clone(),
            reject_credit_for: Vec::new(),
            reject_badges: true,
        });
        let rewards = compute_rewards(&[entry(1, "a", 900)], &RewardTable::default());

        let outcomes = persist_rewards(store, "ROOM42".into(), rewards).await;

        assert_eq!(outcomes[0].level, Some(2));
        assert!(outcomes[0].error.is_some());
        let winner = inner.record("a").unwrap();
        assert_eq!(winner.experience, 100);
        assert!(winner.badges.is_empty());
    }
}
