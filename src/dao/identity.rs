//! Token verification producing player profiles.

use std::{collections::HashMap, sync::Arc};

use futures::future::{BoxFuture, FutureExt, ready};
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::Profile;

/// Prefix of self-declared guest tokens (`guest:<name>`).
pub const GUEST_PREFIX: &str = "guest:";
const MAX_GUEST_NAME_LEN: usize = 32;

/// Reasons a token is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token is not in the table.
    #[error("unknown or expired token")]
    InvalidToken,
    /// A guest token was presented while guests are refused.
    #[error("guest access is disabled")]
    GuestsDisabled,
    /// The guest name is empty or too long.
    #[error("invalid guest name: {0}")]
    InvalidGuestName(String),
}

/// Verifies bearer tokens presented during the WebSocket handshake.
pub trait IdentityProvider: Send + Sync {
    /// Resolve `token` to the profile it belongs to.
    fn authenticate(&self, token: &str) -> BoxFuture<'static, Result<Profile, AuthError>>;
}

/// Identity provider backed by a fixed token table, optionally admitting guests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: Arc<HashMap<String, Profile>>,
    allow_guests: bool,
}

impl StaticIdentityProvider {
    /// Provider answering from `tokens`.
    pub fn new(tokens: HashMap<String, Profile>, allow_guests: bool) -> Self {
        Self {
            tokens: Arc::new(tokens),
            allow_guests,
        }
    }

    fn resolve(&self, token: &str) -> Result<Profile, AuthError> {
        if let Some(profile) = self.tokens.get(token) {
            return Ok(profile.clone());
        }

        let Some(name) = token.strip_prefix(GUEST_PREFIX) else {
            return Err(AuthError::InvalidToken);
        };
        if !self.allow_guests {
            return Err(AuthError::GuestsDisabled);
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::InvalidGuestName("name is empty".into()));
        }
        if name.chars().count() > MAX_GUEST_NAME_LEN {
            return Err(AuthError::InvalidGuestName(format!(
                "name exceeds {MAX_GUEST_NAME_LEN} characters"
            )));
        }

        Ok(Profile {
            id: format!("guest-{}", Uuid::new_v4()),
            name: name.to_string(),
            level: 1,
            avatar: None,
        })
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn authenticate(&self, token: &str) -> BoxFuture<'static, Result<Profile, AuthError>> {
        ready(self.resolve(token)).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(allow_guests: bool) -> StaticIdentityProvider {
        let alice = Profile {
            id: "u-alice".into(),
            name: "Alice".into(),
            level: 4,
            avatar: None,
        };
        StaticIdentityProvider::new(HashMap::from([("tok-alice".to_string(), alice)]), allow_guests)
    }

    #[tokio::test]
    async fn configured_tokens_resolve_to_their_profile() {
        let profile = provider(false).authenticate("tok-alice").await.unwrap();
        assert_eq!(profile.id, "u-alice");
        assert_eq!(profile.level, 4);
    }

    #[tokio::test]
    async fn unknown_tokens_are_rejected() {
        let err = provider(true).authenticate("nope").await.unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
    }

    #[tokio::test]
    async fn guests_get_a_fresh_identity_each_time() {
        let provider = provider(true);
        let first = provider.authenticate("guest: Bob ").await.unwrap();
        let second = provider.authenticate("guest:Bob").await.unwrap();
        assert_eq!(first.name, "Bob");
        assert_ne!(first.id, second.id);
        assert!(first.id.starts_with("guest-"));
    }

    #[tokio::test]
    async fn guest_rules_are_enforced() {
        assert_eq!(
            provider(false).authenticate("guest:Bob").await.unwrap_err(),
            AuthError::GuestsDisabled
        );
        assert!(matches!(
            provider(true).authenticate("guest:   ").await.unwrap_err(),
            AuthError::InvalidGuestName(_)
        ));
    }
}
