//! Room payloads shared by the REST routes and WebSocket events.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::Question,
    dto::format_system_time,
    state::{
        room::{Player, Room, RoomSettings},
        state_machine::RoomStatus,
    },
};

/// Settings a host may supply when creating a room; omitted values use the server defaults.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct RoomSettingsInput {
    /// Player limit, host included.
    #[validate(range(min = 2, max = 100))]
    pub max_players: Option<usize>,
    /// Seconds allowed per question.
    #[validate(range(min = 5, max = 3600))]
    pub time_per_question: Option<u32>,
    /// Ask only the first questions of the quiz.
    #[validate(range(min = 1))]
    pub question_count: Option<usize>,
    /// Extra options stored with the room untouched.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub options: Map<String, Value>,
}

/// Public view of a room member.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// Identity of the player.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Profile level when the player joined.
    pub level: u32,
    /// Optional avatar URL.
    pub avatar: Option<String>,
    /// Points scored so far.
    pub score: u32,
    /// Whether the player's socket is still open.
    pub connected: bool,
    /// Whether the player currently holds the host role.
    pub is_host: bool,
    /// RFC 3339 join time.
    pub joined_at: String,
}

impl PlayerSummary {
    /// Summarize `player`, flagging it as host when its id is `host_id`.
    pub fn new(player: &Player, host_id: &str) -> Self {
        Self {
            id: player.profile.id.clone(),
            name: player.profile.name.clone(),
            level: player.profile.level,
            avatar: player.profile.avatar.clone(),
            score: player.score,
            connected: player.connected,
            is_host: player.profile.id == host_id,
            joined_at: format_system_time(player.joined_at),
        }
    }
}

/// Quiz metadata visible before the questions are asked.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QuizSummary {
    /// Quiz identifier.
    pub id: String,
    /// Quiz title.
    pub title: String,
    /// Questions that will be asked.
    pub total_questions: usize,
}

/// Read-only projection of a room, served by `GET /rooms/{id}` and embedded in events.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RoomSnapshot {
    /// Room code.
    pub id: String,
    /// Current host.
    pub host_id: String,
    /// Members in join order.
    pub players: Vec<PlayerSummary>,
    /// Settings fixed at creation.
    pub settings: RoomSettings,
    /// Coarse lifecycle status.
    pub status: RoomStatus,
    /// Zero-based index of the current or last question.
    pub current_question_index: usize,
    /// Selected quiz, if any.
    pub quiz_summary: Option<QuizSummary>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 start time once the quiz began.
    pub started_at: Option<String>,
}

impl RoomSnapshot {
    /// Player currently holding the host role.
    pub fn host(&self) -> Option<&PlayerSummary> {
        self.players.iter().find(|player| player.is_host)
    }
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        Self {
            id: room.id().to_string(),
            host_id: room.host_id().to_string(),
            players: room
                .players()
                .map(|player| PlayerSummary::new(player, room.host_id()))
                .collect(),
            settings: room.settings().clone(),
            status: room.status(),
            current_question_index: room.current_question_index(),
            quiz_summary: room.quiz().map(|quiz| QuizSummary {
                id: quiz.id.clone(),
                title: quiz.title.clone(),
                total_questions: quiz.questions.len(),
            }),
            created_at: format_system_time(room.created_at()),
            started_at: room.started_at().map(format_system_time),
        }
    }
}

/// Entry of the waiting-room list served by `GET /rooms`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct WaitingRoomItem {
    /// Room code.
    pub id: String,
    /// Display name of the host.
    pub host_name: String,
    /// Members so far.
    pub player_count: usize,
    /// Player limit.
    pub max_players: usize,
    /// Title of the selected quiz.
    pub quiz_title: Option<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<&RoomSnapshot> for WaitingRoomItem {
    fn from(snapshot: &RoomSnapshot) -> Self {
        Self {
            id: snapshot.id.clone(),
            host_name: snapshot
                .host()
                .map(|host| host.name.clone())
                .unwrap_or_default(),
            player_count: snapshot.players.len(),
            max_players: snapshot.settings.max_players,
            quiz_title: snapshot
                .quiz_summary
                .as_ref()
                .map(|quiz| quiz.title.clone()),
            created_at: snapshot.created_at.clone(),
        }
    }
}

/// Question as shown to players: never includes the correct answer.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct QuestionView {
    /// Question text.
    pub prompt: String,
    /// Answer options, empty for free-text questions.
    pub options: Vec<String>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            prompt: question.prompt.clone(),
            options: question.options.clone(),
        }
    }
}

/// Response listing waiting rooms.
#[derive(Debug, Serialize, ToSchema)]
pub struct WaitingRoomsResponse {
    /// Rooms accepting players, oldest first.
    pub rooms: Vec<WaitingRoomItem>,
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::{
        dao::models::{Profile, Quiz},
        state::scoring::Answer,
    };

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.into(),
            name: id.to_uppercase(),
            level: 2,
            avatar: None,
        }
    }

    #[test]
    fn snapshot_hides_answers_and_marks_the_host() {
        let quiz = Quiz {
            id: "q".into(),
            title: "Capitals".into(),
            questions: vec![Question {
                prompt: "Capital of Italy?".into(),
                options: vec!["Rome".into(), "Milan".into()],
                correct_answer: Answer::ByIndex(0),
                explanation: None,
            }],
        };
        let settings = RoomSettings {
            max_players: 4,
            time_per_question: 20,
            question_count: None,
            options: Map::new(),
        };
        let mut room = Room::new("ABCDEF", profile("a"), Some(quiz), settings, SystemTime::now());
        room.join(profile("b"), SystemTime::now()).unwrap();

        let snapshot = RoomSnapshot::from(&room);
        assert_eq!(snapshot.host().map(|p| p.id.as_str()), Some("a"));
        assert_eq!(snapshot.players.len(), 2);
        assert_eq!(snapshot.quiz_summary.as_ref().unwrap().total_questions, 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["status"], "waiting");
        assert!(!json.to_string().contains("correct_answer"));

        let item = WaitingRoomItem::from(&snapshot);
        assert_eq!(item.host_name, "A");
        assert_eq!(item.quiz_title.as_deref(), Some("Capitals"));
    }

    #[test]
    fn settings_input_ranges_are_validated() {
        let ok = RoomSettingsInput {
            max_players: Some(4),
            time_per_question: Some(20),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let too_small = RoomSettingsInput {
            max_players: Some(1),
            ..Default::default()
        };
        assert!(too_small.validate().is_err());

        let too_fast = RoomSettingsInput {
            time_per_question: Some(1),
            ..Default::default()
        };
        assert!(too_fast.validate().is_err());
    }
}
