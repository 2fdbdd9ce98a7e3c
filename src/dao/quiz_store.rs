//! Read-only quiz content lookup.

use std::{collections::HashMap, fs, path::Path, sync::Arc};

use futures::future::{BoxFuture, FutureExt, ready};
use thiserror::Error;
use tracing::info;

use crate::{
    dao::{
        models::{Question, Quiz},
        storage::StorageResult,
    },
    state::scoring::Answer,
};

/// Source of quiz content consumed by rooms at creation time.
pub trait QuizStore: Send + Sync {
    /// Quiz with `id`, or `None` when unknown.
    fn find_quiz(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<Quiz>>>;
}

/// Failures while loading the quiz file.
#[derive(Debug, Error)]
pub enum QuizFileError {
    /// The file could not be read.
    #[error("failed to read quiz file `{path}`")]
    Read {
        /// Path given in the configuration.
        path: String,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a valid quiz list.
    #[error("failed to parse quiz file `{path}`")]
    Parse {
        /// Path given in the configuration.
        path: String,
        /// Underlying failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Quizzes held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryQuizStore {
    quizzes: Arc<HashMap<String, Quiz>>,
}

impl InMemoryQuizStore {
    /// Build a store from an explicit quiz list; later duplicates win.
    pub fn new(quizzes: impl IntoIterator<Item = Quiz>) -> Self {
        let quizzes = quizzes
            .into_iter()
            .map(|quiz| (quiz.id.clone(), quiz))
            .collect();
        Self {
            quizzes: Arc::new(quizzes),
        }
    }

    /// Load a JSON array of quizzes, keeping the built-in sample available.
    pub fn load(path: &Path) -> Result<Self, QuizFileError> {
        let contents = fs::read_to_string(path).map_err(|source| QuizFileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let quizzes: Vec<Quiz> =
            serde_json::from_str(&contents).map_err(|source| QuizFileError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        info!(path = %path.display(), count = quizzes.len(), "loaded quizzes from file");
        Ok(Self::new(sample_quizzes().into_iter().chain(quizzes)))
    }

    /// Store containing only the built-in sample quiz.
    pub fn with_samples() -> Self {
        Self::new(sample_quizzes())
    }

    /// Number of quizzes held.
    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    /// Whether no quiz is held.
    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }
}

impl QuizStore for InMemoryQuizStore {
    fn find_quiz(&self, id: &str) -> BoxFuture<'static, StorageResult<Option<Quiz>>> {
        ready(Ok(self.quizzes.get(id).cloned())).boxed()
    }
}

fn question(prompt: &str, options: &[&str], correct: Answer, explanation: &str) -> Question {
    Question {
        prompt: prompt.to_string(),
        options: options.iter().map(|option| option.to_string()).collect(),
        correct_answer: correct,
        explanation: Some(explanation.to_string()),
    }
}

/// Quiz shipped with the binary so a fresh install can host a game.
pub fn sample_quizzes() -> Vec<Quiz> {
    vec![Quiz {
        id: "sample-general".into(),
        title: "General knowledge warm-up".into(),
        questions: vec![
            question(
                "What is the capital of France?",
                &["Berlin", "Madrid", "Paris", "Rome"],
                Answer::ByIndex(2),
                "Paris has been the French capital since 987.",
            ),
            question(
                "Which planet is known as the red planet?",
                &["Venus", "Mars", "Jupiter", "Mercury"],
                Answer::ByLetter('B'),
                "Iron oxide on its surface gives Mars its color.",
            ),
            question(
                "How many bytes are in a kibibyte?",
                &["1000", "1024", "512", "2048"],
                Answer::ByIndex(1),
                "A kibibyte is 2^10 bytes.",
            ),
            question(
                "Name the chemical element with symbol O.",
                &[],
                Answer::Text("Oxygen".into()),
                "O is oxygen, atomic number 8.",
            ),
        ],
    }]
}
