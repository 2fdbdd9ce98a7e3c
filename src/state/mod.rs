//! Shared application state and the room runtime.

pub mod actor;
pub mod leaderboard;
pub mod registry;
pub mod room;
pub mod scoring;
pub mod state_machine;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::{identity::IdentityProvider, profile_store::ProfileStore, quiz_store::QuizStore},
};

use self::{actor::RoomServices, registry::RoomRegistry};

/// Application state shared between handlers.
pub type SharedState = Arc<AppState>;

/// Central application state: configuration, collaborators and the room registry.
pub struct AppState {
    config: Arc<AppConfig>,
    registry: Arc<RoomRegistry>,
    identity: Arc<dyn IdentityProvider>,
    quizzes: Arc<dyn QuizStore>,
    profiles: Arc<dyn ProfileStore>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        config: AppConfig,
        identity: Arc<dyn IdentityProvider>,
        quizzes: Arc<dyn QuizStore>,
        profiles: Arc<dyn ProfileStore>,
    ) -> SharedState {
        let registry = RoomRegistry::new(RoomServices {
            timings: config.timings,
            rewards: config.rewards,
            profiles: profiles.clone(),
        });
        Arc::new(Self {
            config: Arc::new(config),
            registry,
            identity,
            quizzes,
            profiles,
        })
    }

    /// Immutable application configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Registry of live rooms.
    pub fn rooms(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Verifies handshake tokens.
    pub fn identity(&self) -> &Arc<dyn IdentityProvider> {
        &self.identity
    }

    /// Quiz content source.
    pub fn quizzes(&self) -> &Arc<dyn QuizStore> {
        &self.quizzes
    }

    /// Persistence for earned rewards.
    pub fn profiles(&self) -> &Arc<dyn ProfileStore> {
        &self.profiles
    }
}
