//! Room lifecycle states and the transitions allowed between them.

use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Coarse lifecycle status of a room, exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Lobby: players may join, the host may start.
    Waiting,
    /// Questions are being asked or revealed.
    InProgress,
    /// Terminal: final leaderboard has been produced.
    Finished,
}

/// Fine-grained phase of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Lobby before the quiz starts.
    Waiting,
    /// The question is open and answers are collected.
    Asking {
        /// Index of the open question.
        question_index: usize,
    },
    /// The question is closed and its results are on screen.
    Revealing {
        /// Index of the question whose results are shown.
        question_index: usize,
    },
    /// The session is over.
    Finished,
}

impl RoomPhase {
    /// Collapse the phase into the status visible to clients.
    pub fn status(&self) -> RoomStatus {
        match self {
            RoomPhase::Waiting => RoomStatus::Waiting,
            RoomPhase::Asking { .. } | RoomPhase::Revealing { .. } => RoomStatus::InProgress,
            RoomPhase::Finished => RoomStatus::Finished,
        }
    }
}

/// Indicates why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// Every question was asked and revealed.
    QuizCompleted,
    /// Every player left before the last question.
    Abandoned,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Host starts the quiz from the lobby.
    Start,
    /// Stop accepting answers for the open question and reveal it.
    CloseQuestion,
    /// Open the question after the revealed one.
    NextQuestion,
    /// End the session.
    Finish(FinishReason),
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoomEvent,
}

/// State machine enforcing `waiting → in_progress → finished`.
///
/// The phase never moves backwards and the question index only grows, one
/// question at a time.
#[derive(Debug, Clone)]
pub struct RoomStateMachine {
    phase: RoomPhase,
    version: usize,
}

impl Default for RoomStateMachine {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Waiting,
            version: 0,
        }
    }
}

impl RoomStateMachine {
    /// Create a new state machine initialised in the waiting state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Apply an event, returning the new phase.
    pub fn apply(&mut self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    fn compute_transition(&self, event: RoomEvent) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::Waiting, RoomEvent::Start) => RoomPhase::Asking { question_index: 0 },
            (RoomPhase::Asking { question_index }, RoomEvent::CloseQuestion) => {
                RoomPhase::Revealing { question_index }
            }
            (RoomPhase::Revealing { question_index }, RoomEvent::NextQuestion) => {
                RoomPhase::Asking {
                    question_index: question_index + 1,
                }
            }
            (RoomPhase::Revealing { .. }, RoomEvent::Finish(FinishReason::QuizCompleted)) => {
                RoomPhase::Finished
            }
            (
                RoomPhase::Asking { .. } | RoomPhase::Revealing { .. },
                RoomEvent::Finish(FinishReason::Abandoned),
            ) => RoomPhase::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut RoomStateMachine, event: RoomEvent) -> RoomPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = RoomStateMachine::new();
        assert_eq!(sm.phase(), RoomPhase::Waiting);
        assert_eq!(sm.phase().status(), RoomStatus::Waiting);
    }

    #[test]
    fn full_happy_path_through_quiz() {
        let mut sm = RoomStateMachine::new();

        assert_eq!(
            apply(&mut sm, RoomEvent::Start),
            RoomPhase::Asking { question_index: 0 }
        );
        assert_eq!(
            apply(&mut sm, RoomEvent::CloseQuestion),
            RoomPhase::Revealing { question_index: 0 }
        );
        assert_eq!(
            apply(&mut sm, RoomEvent::NextQuestion),
            RoomPhase::Asking { question_index: 1 }
        );
        assert_eq!(
            apply(&mut sm, RoomEvent::CloseQuestion),
            RoomPhase::Revealing { question_index: 1 }
        );
        assert_eq!(
            apply(&mut sm, RoomEvent::Finish(FinishReason::QuizCompleted)),
            RoomPhase::Finished
        );
        assert_eq!(sm.version(), 5);
    }

    #[test]
    fn status_never_moves_backwards() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::Start);
        assert!(sm.apply(RoomEvent::Start).is_err());

        apply(&mut sm, RoomEvent::Finish(FinishReason::Abandoned));
        for event in [
            RoomEvent::Start,
            RoomEvent::CloseQuestion,
            RoomEvent::NextQuestion,
            RoomEvent::Finish(FinishReason::QuizCompleted),
        ] {
            assert!(sm.apply(event).is_err());
            assert_eq!(sm.phase(), RoomPhase::Finished);
        }
    }

    #[test]
    fn completed_finish_requires_a_revealed_question() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::Start);
        let err = sm
            .apply(RoomEvent::Finish(FinishReason::QuizCompleted))
            .unwrap_err();
        assert_eq!(err.from, RoomPhase::Asking { question_index: 0 });
    }

    #[test]
    fn invalid_transition_returns_error() {
        let mut sm = RoomStateMachine::new();
        let err = sm.apply(RoomEvent::CloseQuestion).unwrap_err();
        assert_eq!(err.from, RoomPhase::Waiting);
        assert_eq!(err.event, RoomEvent::CloseQuestion);
        assert_eq!(sm.version(), 0);
    }
}
