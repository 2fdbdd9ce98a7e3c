//! Data exchanged with the collaborator stores (identity, quiz content, profiles).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::scoring::Answer;

/// Display profile attached to a verified identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    /// Stable identity supplied by the identity provider.
    pub id: String,
    /// Name shown to other players.
    pub name: String,
    /// Level computed by the profile store.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Optional avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
}

fn default_level() -> u32 {
    1
}

/// Immutable quiz content served by the quiz store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    /// Stable identifier referenced by hosts.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Questions in play order.
    pub questions: Vec<Question>,
}

impl Quiz {
    /// Keep only the first `count` questions.
    pub fn truncated(mut self, count: usize) -> Self {
        self.questions.truncate(count);
        self
    }
}

/// One quiz question, including its answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Text shown to players.
    pub prompt: String,
    /// Choices; empty for free-text questions.
    #[serde(default)]
    pub options: Vec<String>,
    /// Answer key.
    pub correct_answer: Answer,
    /// Shown with the results.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Experience and level of a profile after a credit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileProgress {
    /// Total experience.
    pub experience: u64,
    /// Level derived from the experience.
    pub level: u32,
}
