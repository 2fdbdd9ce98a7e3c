//! WebSocket protocol: frames accepted from players and events pushed to them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{
    dao::models::Profile,
    dto::{
        room::{PlayerSummary, QuestionView, RoomSettingsInput, RoomSnapshot},
        validation::{validate_chat_message, validate_room_code},
    },
    error::ErrorKind,
    state::{leaderboard::LeaderboardEntry, room::PlayerResult, scoring::Answer},
};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First frame of every connection.
    Authenticate {
        /// Bearer token or `guest:<name>`.
        token: String,
    },
    /// Open a new room hosted by the sender.
    CreateRoom {
        /// Quiz to play; a room without one cannot start.
        #[serde(default)]
        quiz_id: Option<String>,
        /// Host overrides of the room defaults.
        #[serde(default)]
        settings: RoomSettingsInput,
    },
    /// Enter a waiting room by code.
    JoinRoom {
        /// Room code, case-insensitive.
        room_id: String,
    },
    /// Host request to begin the quiz.
    StartQuiz,
    /// Answer to the open question.
    SubmitAnswer {
        /// Option index, option letter or free text.
        #[schema(value_type = String)]
        answer: Answer,
        /// Seconds spent on the question as measured by the client.
        #[serde(default)]
        time_spent: Option<f64>,
    },
    /// Leave the current room.
    LeaveRoom,
    /// Chat line for the current room.
    ChatMessage {
        /// Text to relay.
        message: String,
    },
}

/// Reasons an inbound frame is refused before it reaches a room.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not a known JSON message.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// The message failed validation.
    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationErrors),
}

impl ClientMessage {
    /// Decode and validate a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, ProtocolError> {
        let message: Self = serde_json::from_str(text)?;
        message.validate()?;
        Ok(message)
    }

    /// Name of the message type, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authenticate { .. } => "authenticate",
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::StartQuiz => "start_quiz",
            Self::SubmitAnswer { .. } => "submit_answer",
            Self::LeaveRoom => "leave_room",
            Self::ChatMessage { .. } => "chat_message",
        }
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match self {
            Self::Authenticate { token } if token.trim().is_empty() => {
                let mut err = validator::ValidationError::new("token_empty");
                err.message = Some("Token must not be empty".into());
                errors.add("token", err);
            }
            Self::CreateRoom { quiz_id, settings } => {
                if quiz_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
                    let mut err = validator::ValidationError::new("quiz_id_empty");
                    err.message = Some("Quiz id must not be empty".into());
                    errors.add("quiz_id", err);
                }
                if let Err(settings_errors) = settings.validate() {
                    errors.merge_self("settings", Err(settings_errors));
                }
            }
            Self::JoinRoom { room_id } => {
                if let Err(err) = validate_room_code(room_id.trim()) {
                    errors.add("room_id", err);
                }
            }
            Self::ChatMessage { message } => {
                if let Err(err) = validate_chat_message(message) {
                    errors.add("message", err);
                }
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Events pushed to player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Handshake accepted.
    Authenticated {
        /// Profile bound to the connection.
        profile: Profile,
    },
    /// The sender now hosts a new room.
    RoomCreated {
        /// Code to share with other players.
        room_id: String,
        /// Initial room state.
        room: RoomSnapshot,
    },
    /// The sender entered a room.
    RoomJoined {
        /// Room state after joining.
        room: RoomSnapshot,
    },
    /// Another player entered the room.
    PlayerJoined {
        /// The newcomer.
        player: PlayerSummary,
        /// Room state after the join.
        room: RoomSnapshot,
    },
    /// The host's start request was refused.
    StartRejected {
        /// Every unmet precondition.
        reasons: Vec<String>,
    },
    /// The quiz began.
    QuizStarted {
        /// Questions that will be asked.
        total_questions: usize,
    },
    /// A question opened.
    NewQuestion {
        /// Zero-based index.
        question_index: usize,
        /// Prompt and options.
        question: QuestionView,
        /// One-based position of the question.
        question_number: usize,
        /// Questions in the quiz.
        total_questions: usize,
        /// Seconds allowed.
        time_limit: u32,
        /// RFC 3339 instant after which answers are no longer scored.
        deadline: String,
    },
    /// A player answered the open question.
    AnswerSubmitted {
        /// Who answered.
        player_id: String,
        /// Display name of who answered.
        player_name: String,
        /// Connected players who answered so far.
        answered_count: usize,
        /// Connected players.
        total_players: usize,
    },
    /// The sender already answered; the new answer was dropped.
    AnswerIgnored {
        /// Question already answered.
        question_index: usize,
    },
    /// Every connected player answered; results follow shortly.
    AllAnswered {
        /// Question being settled.
        question_index: usize,
        /// Seconds until the results.
        settle_seconds: f64,
    },
    /// A question closed.
    QuestionResults {
        /// Question that closed.
        question_index: usize,
        /// Answer key.
        #[schema(value_type = String)]
        correct_answer: Answer,
        /// Optional explanation of the key.
        explanation: Option<String>,
        /// One line per player.
        player_results: Vec<PlayerResult>,
        /// Standings after scoring.
        leaderboard: Vec<LeaderboardEntry>,
    },
    /// The last question was revealed.
    QuizFinished {
        /// Final standings.
        leaderboard: Vec<LeaderboardEntry>,
        /// Questions asked.
        total_questions: usize,
        /// Time from start to finish.
        duration_seconds: u64,
    },
    /// A member left or was disconnected.
    PlayerLeft {
        /// Who left.
        player_id: String,
        /// Display name of who left.
        player_name: String,
        /// Room state after the departure.
        room: RoomSnapshot,
    },
    /// The host role moved.
    HostChanged {
        /// New host.
        new_host_id: String,
        /// Display name of the new host.
        new_host_name: String,
    },
    /// Chat line relayed to the room.
    ChatMessage {
        /// Author.
        player_id: String,
        /// Display name of the author.
        player_name: String,
        /// Trimmed text.
        message: String,
        /// RFC 3339 relay time.
        timestamp: String,
    },
    /// The sender left the room.
    RoomLeft {
        /// Room left.
        room_id: String,
    },
    /// The room was retired.
    RoomClosed {
        /// Room closed.
        room_id: String,
    },
    /// Rewards credited to the sender's profile.
    RewardGranted {
        /// Experience credited.
        experience: u32,
        /// Level after crediting, when the store reported it.
        level: Option<u32>,
        /// Badge awarded, if any.
        badge: Option<String>,
    },
    /// An action was refused.
    Error {
        /// Category of the failure.
        kind: ErrorKind,
        /// Human-readable explanation.
        message: String,
    },
}

impl ServerMessage {
    /// Error event built from a kind and a human-readable message.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_decode_by_type() {
        let msg = ClientMessage::from_json_str(r#"{"type":"start_quiz"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::StartQuiz));

        let msg = ClientMessage::from_json_str(
            r#"{"type":"submit_answer","answer":"b","time_spent":4.5}"#,
        )
        .unwrap();
        let ClientMessage::SubmitAnswer { answer, time_spent } = msg else {
            panic!("expected submit_answer");
        };
        assert_eq!(answer, Answer::ByLetter('B'));
        assert_eq!(time_spent, Some(4.5));

        let msg =
            ClientMessage::from_json_str(r#"{"type":"create_room","quiz_id":"sample"}"#).unwrap();
        let ClientMessage::CreateRoom { settings, .. } = msg else {
            panic!("expected create_room");
        };
        assert!(settings.max_players.is_none());
    }

    #[test]
    fn invalid_payloads_are_refused() {
        assert!(matches!(
            ClientMessage::from_json_str(r#"{"type":"dance"}"#),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            ClientMessage::from_json_str(r#"{"type":"join_room","room_id":"nope"}"#),
            Err(ProtocolError::Invalid(_))
        ));
        assert!(matches!(
            ClientMessage::from_json_str(r#"{"type":"chat_message","message":"  "}"#),
            Err(ProtocolError::Invalid(_))
        ));
        assert!(matches!(
            ClientMessage::from_json_str(
                r#"{"type":"create_room","quiz_id":"q","settings":{"max_players":1}}"#
            ),
            Err(ProtocolError::Invalid(_))
        ));
    }

    #[test]
    fn server_messages_are_tagged() {
        let json = serde_json::to_value(ServerMessage::AnswerIgnored { question_index: 2 }).unwrap();
        assert_eq!(json["type"], "answer_ignored");
        assert_eq!(json["question_index"], 2);

        let json =
            serde_json::to_value(ServerMessage::error(ErrorKind::NotFound, "room not found"))
                .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["kind"], "not_found");
    }
}
