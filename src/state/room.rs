//! Synchronous room model: membership, question progression, answers and scores.
//!
//! A [`Room`] never touches channels or timers; the room actor drives it and turns
//! its return values into broadcasts and deferred commands.

use std::{
    cmp::Reverse,
    collections::{BTreeMap, HashMap},
    time::SystemTime,
};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::{
    dao::models::{Profile, Question, Quiz},
    error::RoomError,
    state::{
        leaderboard::LeaderboardEntry,
        scoring::{Answer, compute_points},
        state_machine::{FinishReason, RoomEvent, RoomPhase, RoomStateMachine, RoomStatus},
    },
};

/// Identity of a player as issued by the identity provider.
pub type PlayerId = String;

/// Players required before the host may start.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// Settings fixed at room creation.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RoomSettings {
    /// Player limit, host included.
    pub max_players: usize,
    /// Seconds allowed per question.
    pub time_per_question: u32,
    /// Number of questions asked; `None` until a quiz is attached.
    pub question_count: Option<usize>,
    /// Free-form options passed through from the host.
    #[schema(value_type = Object)]
    pub options: Map<String, Value>,
}

/// A member of a room.
#[derive(Debug, Clone)]
pub struct Player {
    /// Profile resolved at authentication.
    pub profile: Profile,
    /// Cleared when the player's outbox closes.
    pub connected: bool,
    /// Points accumulated over closed questions.
    pub score: u32,
    /// Scored answers, one per closed question.
    pub answers: Vec<AnswerRecord>,
    /// When the player entered the room.
    pub joined_at: SystemTime,
    /// Position in the join order; never reused inside a room.
    pub join_seq: u64,
}

impl Player {
    /// Identity of the player.
    pub fn id(&self) -> &str {
        &self.profile.id
    }

    /// Number of questions answered correctly.
    pub fn correct_answers(&self) -> usize {
        self.answers.iter().filter(|record| record.correct).count()
    }
}

/// Scored outcome of one question for one player.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRecord {
    /// Question the record belongs to.
    pub question_index: usize,
    /// Submitted answer; `None` when the player stayed silent.
    pub answer: Option<Answer>,
    /// Whether the answer matched the key.
    pub correct: bool,
    /// Points awarded.
    pub points: u32,
    /// Seconds taken, when an answer was submitted.
    pub time_spent: Option<f64>,
}

/// Raw submission kept until the question closes.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Answer as submitted.
    pub value: Answer,
    /// Seconds taken as reported, or measured on the server when missing.
    pub time_spent: f64,
    /// Arrival time on the server.
    pub submitted_at: SystemTime,
}

/// Tag carried by a deferred advance so stale ones can be recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceTag {
    /// Status when the advance was scheduled.
    pub status: RoomStatus,
    /// Question the advance closes.
    pub question_index: usize,
}

/// Result of [`Room::submit_answer`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// The answer was recorded.
    Accepted {
        /// Question answered.
        question_index: usize,
        /// Connected players who answered so far.
        answered_count: usize,
        /// Connected players.
        total_players: usize,
        /// Whether every connected player has answered.
        all_answered: bool,
    },
    /// The player already answered this question; nothing changed.
    Duplicate {
        /// Question already answered.
        question_index: usize,
    },
}

/// Per-player line of a question's results.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlayerResult {
    /// Player the line belongs to.
    pub player_id: PlayerId,
    /// Display name.
    pub name: String,
    /// Submitted answer, if any.
    #[schema(value_type = Option<String>)]
    pub answer: Option<Answer>,
    /// Whether the answer was correct.
    pub correct: bool,
    /// Points earned on this question.
    pub points: u32,
    /// Seconds taken.
    pub time_spent: Option<f64>,
    /// Score after this question.
    pub total_score: u32,
}

/// Everything revealed when a question closes.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResults {
    /// Question that closed.
    pub question_index: usize,
    /// Answer key.
    pub correct_answer: Answer,
    /// Optional explanation shown with the key.
    pub explanation: Option<String>,
    /// One line per player, in join order.
    pub player_results: Vec<PlayerResult>,
    /// Standings after scoring.
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// What happened when a player left or was dropped.
#[derive(Debug, Clone)]
pub struct Departure {
    /// The removed member.
    pub player: Player,
    /// Set when the host role moved to another member.
    pub new_host: Option<PlayerId>,
    /// Whether nobody is left.
    pub now_empty: bool,
}

/// One quiz session.
#[derive(Debug)]
pub struct Room {
    id: String,
    host_id: PlayerId,
    settings: RoomSettings,
    quiz: Option<Quiz>,
    machine: RoomStateMachine,
    current_question_index: usize,
    players: IndexMap<PlayerId, Player>,
    answers_by_question: BTreeMap<usize, HashMap<PlayerId, Submission>>,
    question_opened_at: Option<SystemTime>,
    next_join_seq: u64,
    created_at: SystemTime,
    started_at: Option<SystemTime>,
    finished_at: Option<SystemTime>,
}

impl Room {
    /// Create a waiting room with `host` as its first player.
    ///
    /// The quiz is cut down to `settings.question_count` questions when that is smaller.
    pub fn new(
        id: impl Into<String>,
        host: Profile,
        quiz: Option<Quiz>,
        mut settings: RoomSettings,
        now: SystemTime,
    ) -> Self {
        let quiz = quiz.map(|quiz| {
            let available = quiz.questions.len();
            let count = settings.question_count.unwrap_or(available).min(available);
            settings.question_count = Some(count);
            quiz.truncated(count)
        });

        let mut room = Self {
            id: id.into(),
            host_id: host.id.clone(),
            settings,
            quiz,
            machine: RoomStateMachine::new(),
            current_question_index: 0,
            players: IndexMap::new(),
            answers_by_question: BTreeMap::new(),
            question_opened_at: None,
            next_join_seq: 0,
            created_at: now,
            started_at: None,
            finished_at: None,
        };
        room.insert_player(host, now);
        room
    }

    /// Room code.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current host.
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    /// Settings fixed at creation.
    pub fn settings(&self) -> &RoomSettings {
        &self.settings
    }

    /// Quiz being played, already truncated.
    pub fn quiz(&self) -> Option<&Quiz> {
        self.quiz.as_ref()
    }

    /// Fine-grained lifecycle phase.
    pub fn phase(&self) -> RoomPhase {
        self.machine.phase()
    }

    /// Coarse status shown to clients.
    pub fn status(&self) -> RoomStatus {
        self.machine.phase().status()
    }

    /// Zero-based index of the current or last question.
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    /// Questions that will be asked.
    pub fn total_questions(&self) -> usize {
        self.quiz.as_ref().map_or(0, |quiz| quiz.questions.len())
    }

    /// Players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Member with id `player_id`.
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    /// Members, connected or not.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Members whose socket is still open.
    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Time the quiz started.
    pub fn started_at(&self) -> Option<SystemTime> {
        self.started_at
    }

    /// Time the room finished.
    pub fn finished_at(&self) -> Option<SystemTime> {
        self.finished_at
    }

    fn insert_player(&mut self, profile: Profile, now: SystemTime) -> &Player {
        let join_seq = self.next_join_seq;
        self.next_join_seq += 1;
        let entry = self.players.entry(profile.id.clone());
        entry.or_insert(Player {
            profile,
            connected: true,
            score: 0,
            answers: Vec::new(),
            joined_at: now,
            join_seq,
        })
    }

    /// Admit a player while the room is waiting.
    pub fn join(&mut self, profile: Profile, now: SystemTime) -> Result<&Player, RoomError> {
        if self.status() != RoomStatus::Waiting {
            return Err(RoomError::InvalidState(
                "room is no longer accepting players".into(),
            ));
        }
        if self.players.contains_key(&profile.id) {
            return Err(RoomError::AlreadyMember);
        }
        if self.players.len() >= self.settings.max_players {
            return Err(RoomError::RoomFull {
                capacity: self.settings.max_players,
            });
        }
        Ok(self.insert_player(profile, now))
    }

    /// Remove a player, moving the host role when needed.
    pub fn remove_player(&mut self, player_id: &str) -> Result<Departure, RoomError> {
        let player = self
            .players
            .shift_remove(player_id)
            .ok_or(RoomError::NotMember)?;

        let new_host = if self.host_id == player.profile.id {
            self.migrate_host()
        } else {
            None
        };

        Ok(Departure {
            player,
            new_host,
            now_empty: self.players.is_empty(),
        })
    }

    /// Flag a player whose connection is gone, returning the new host if the role moved.
    pub fn mark_disconnected(&mut self, player_id: &str) -> Option<PlayerId> {
        let player = self.players.get_mut(player_id)?;
        player.connected = false;
        if self.host_id == player_id {
            self.migrate_host()
        } else {
            None
        }
    }

    /// Hand the host role to the earliest-joined member, connected ones first.
    fn migrate_host(&mut self) -> Option<PlayerId> {
        let successor = self
            .players
            .values()
            .filter(|p| p.profile.id != self.host_id)
            .min_by_key(|p| (!p.connected, p.join_seq))
            .map(|p| p.profile.id.clone())?;
        self.host_id = successor.clone();
        Some(successor)
    }

    /// Reasons the quiz cannot start right now; empty when it can.
    pub fn start_blockers(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.status() != RoomStatus::Waiting {
            reasons.push("quiz already started".to_string());
        }
        if self.players.len() < MIN_PLAYERS_TO_START {
            reasons.push(format!("need at least {MIN_PLAYERS_TO_START} players"));
        }
        match &self.quiz {
            None => reasons.push("no quiz selected".to_string()),
            Some(quiz) if quiz.questions.is_empty() => {
                reasons.push("quiz has no questions".to_string())
            }
            Some(_) => {}
        }
        reasons
    }

    /// Start the quiz on behalf of `requested_by`, opening question 0.
    pub fn start(&mut self, requested_by: &str, now: SystemTime) -> Result<(), RoomError> {
        if requested_by != self.host_id {
            return Err(RoomError::Unauthorized(
                "only the host can start the quiz".into(),
            ));
        }
        let blockers = self.start_blockers();
        if !blockers.is_empty() {
            return Err(RoomError::StartRejected(blockers));
        }

        self.machine.apply(RoomEvent::Start)?;
        for player in self.players.values_mut() {
            player.score = 0;
            player.answers.clear();
        }
        self.answers_by_question.clear();
        self.current_question_index = 0;
        self.question_opened_at = Some(now);
        self.started_at = Some(now);
        Ok(())
    }

    /// Question currently open for answers.
    pub fn current_question(&self) -> Option<(usize, &Question)> {
        let RoomPhase::Asking { question_index } = self.phase() else {
            return None;
        };
        self.quiz
            .as_ref()
            .and_then(|quiz| quiz.questions.get(question_index))
            .map(|question| (question_index, question))
    }

    /// Record a player's answer to the open question.
    ///
    /// `time_spent` defaults to the time elapsed since the question opened.
    pub fn submit_answer(
        &mut self,
        player_id: &str,
        value: Answer,
        time_spent: Option<f64>,
        now: SystemTime,
    ) -> Result<SubmitOutcome, RoomError> {
        let RoomPhase::Asking { question_index } = self.phase() else {
            return Err(RoomError::InvalidState("no question is open".into()));
        };
        if !self.players.contains_key(player_id) {
            return Err(RoomError::NotMember);
        }

        let time_spent = self.sanitize_time_spent(time_spent, now);
        let submissions = self.answers_by_question.entry(question_index).or_default();
        if submissions.contains_key(player_id) {
            return Ok(SubmitOutcome::Duplicate { question_index });
        }
        submissions.insert(
            player_id.to_string(),
            Submission {
                value,
                time_spent,
                submitted_at: now,
            },
        );

        let (answered_count, total_players) = self.answer_progress(question_index);
        Ok(SubmitOutcome::Accepted {
            question_index,
            answered_count,
            total_players,
            all_answered: total_players > 0 && answered_count == total_players,
        })
    }

    fn sanitize_time_spent(&self, reported: Option<f64>, now: SystemTime) -> f64 {
        let limit = f64::from(self.settings.time_per_question);
        let elapsed = || {
            self.question_opened_at
                .and_then(|opened| now.duration_since(opened).ok())
                .map_or(limit, |elapsed| elapsed.as_secs_f64())
        };
        match reported {
            Some(value) if value.is_finite() => value.max(0.0),
            Some(_) => limit,
            None => elapsed(),
        }
    }

    /// Connected players that answered `question_index`, and connected players overall.
    fn answer_progress(&self, question_index: usize) -> (usize, usize) {
        let submissions = self.answers_by_question.get(&question_index);
        let connected = self.players.values().filter(|p| p.connected);
        let total = connected.clone().count();
        let answered = connected
            .filter(|p| submissions.is_some_and(|subs| subs.contains_key(&p.profile.id)))
            .count();
        (answered, total)
    }

    /// Whether every connected player has answered the open question.
    pub fn all_connected_answered(&self) -> bool {
        let RoomPhase::Asking { question_index } = self.phase() else {
            return false;
        };
        let (answered, total) = self.answer_progress(question_index);
        total > 0 && answered == total
    }

    /// Tag for a deferred advance of the open question.
    pub fn advance_tag(&self) -> Option<AdvanceTag> {
        let RoomPhase::Asking { question_index } = self.phase() else {
            return None;
        };
        Some(AdvanceTag {
            status: self.status(),
            question_index,
        })
    }

    /// Whether a deferred advance carrying `tag` still applies.
    pub fn accepts_advance(&self, tag: AdvanceTag) -> bool {
        self.status() == tag.status
            && self.phase()
                == RoomPhase::Asking {
                    question_index: tag.question_index,
                }
    }

    /// Close the open question, score it and produce its results.
    pub fn close_question(&mut self) -> Result<QuestionResults, RoomError> {
        let RoomPhase::Asking { question_index } = self.phase() else {
            return Err(RoomError::InvalidState("no question is open".into()));
        };
        let question = self
            .quiz
            .as_ref()
            .and_then(|quiz| quiz.questions.get(question_index))
            .cloned()
            .ok_or_else(|| RoomError::InvalidState("question is missing from the quiz".into()))?;
        self.machine.apply(RoomEvent::CloseQuestion)?;

        let time_limit = self.settings.time_per_question;
        let submissions = self
            .answers_by_question
            .get(&question_index)
            .cloned()
            .unwrap_or_default();

        let mut player_results = Vec::with_capacity(self.players.len());
        for player in self.players.values_mut() {
            let submission = submissions.get(&player.profile.id);
            let correct =
                submission.is_some_and(|sub| sub.value.matches(&question.correct_answer));
            let points = submission
                .map_or(0, |sub| compute_points(correct, sub.time_spent, time_limit));

            player.score += points;
            player.answers.push(AnswerRecord {
                question_index,
                answer: submission.map(|sub| sub.value.clone()),
                correct,
                points,
                time_spent: submission.map(|sub| sub.time_spent),
            });

            player_results.push(PlayerResult {
                player_id: player.profile.id.clone(),
                name: player.profile.name.clone(),
                answer: submission.map(|sub| sub.value.clone()),
                correct,
                points,
                time_spent: submission.map(|sub| sub.time_spent),
                total_score: player.score,
            });
        }

        Ok(QuestionResults {
            question_index,
            correct_answer: question.correct_answer,
            explanation: question.explanation,
            player_results,
            leaderboard: self.leaderboard(),
        })
    }

    /// Whether the revealed or open question is the final one.
    pub fn is_last_question(&self) -> bool {
        self.current_question_index + 1 >= self.total_questions()
    }

    /// Open the question following the revealed one.
    pub fn next_question(&mut self, now: SystemTime) -> Result<usize, RoomError> {
        if self.is_last_question() {
            return Err(RoomError::InvalidState("no questions left".into()));
        }
        let RoomPhase::Asking { question_index } = self.machine.apply(RoomEvent::NextQuestion)?
        else {
            return Err(RoomError::InvalidState("unexpected phase".into()));
        };
        self.current_question_index = question_index;
        self.question_opened_at = Some(now);
        Ok(question_index)
    }

    /// End the session, returning the final leaderboard.
    pub fn finish(
        &mut self,
        reason: FinishReason,
        now: SystemTime,
    ) -> Result<Vec<LeaderboardEntry>, RoomError> {
        self.machine.apply(RoomEvent::Finish(reason))?;
        self.finished_at = Some(now);
        self.question_opened_at = None;
        Ok(self.leaderboard())
    }

    /// Players ranked by score, earliest join first on ties.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<&Player> = self.players.values().collect();
        ranked.sort_by_key(|p| (Reverse(p.score), p.join_seq));
        ranked
            .into_iter()
            .enumerate()
            .map(|(index, player)| LeaderboardEntry {
                position: index + 1,
                player_id: player.profile.id.clone(),
                name: player.profile.name.clone(),
                score: player.score,
                correct_answers: player.correct_answers(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.into(),
            name: id.to_uppercase(),
            level: 1,
            avatar: None,
        }
    }

    fn quiz(questions: usize) -> Quiz {
        Quiz {
            id: "quiz".into(),
            title: "Quiz".into(),
            questions: (0..questions)
                .map(|i| Question {
                    prompt: format!("Question {i}"),
                    options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                    correct_answer: Answer::ByIndex(0),
                    explanation: None,
                })
                .collect(),
        }
    }

    fn settings(max_players: usize) -> RoomSettings {
        RoomSettings {
            max_players,
            time_per_question: 30,
            question_count: None,
            options: Map::new(),
        }
    }

    fn started_room(players: &[&str], questions: usize) -> Room {
        let now = SystemTime::UNIX_EPOCH;
        let mut room = Room::new("ROOM01", profile(players[0]), Some(quiz(questions)), settings(8), now);
        for id in &players[1..] {
            room.join(profile(id), now).unwrap();
        }
        room.start(players[0], now).unwrap();
        room
    }

    #[test]
    fn new_room_is_waiting_with_the_host_inside() {
        let room = Room::new("ROOM01", profile("a"), Some(quiz(3)), settings(4), SystemTime::now());
        assert_eq!(room.status(), RoomStatus::Waiting);
        assert_eq!(room.host_id(), "a");
        assert_eq!(room.player_count(), 1);
        assert_eq!(room.settings().question_count, Some(3));
    }

    #[test]
    fn question_count_truncates_the_quiz() {
        let mut s = settings(4);
        s.question_count = Some(2);
        let room = Room::new("ROOM01", profile("a"), Some(quiz(5)), s, SystemTime::now());
        assert_eq!(room.total_questions(), 2);

        let mut s = settings(4);
        s.question_count = Some(10);
        let room = Room::new("ROOM01", profile("a"), Some(quiz(5)), s, SystemTime::now());
        assert_eq!(room.total_questions(), 5);
        assert_eq!(room.settings().question_count, Some(5));
    }

    #[test]
    fn join_rejections() {
        let now = SystemTime::now();
        let mut room = Room::new("ROOM01", profile("a"), Some(quiz(1)), settings(2), now);

        assert_eq!(room.join(profile("a"), now).unwrap_err(), RoomError::AlreadyMember);
        room.join(profile("b"), now).unwrap();
        assert_eq!(
            room.join(profile("c"), now).unwrap_err(),
            RoomError::RoomFull { capacity: 2 }
        );

        room.start("a", now).unwrap();
        room.remove_player("b").unwrap();
        assert!(matches!(
            room.join(profile("d"), now).unwrap_err(),
            RoomError::InvalidState(_)
        ));
    }

    #[test]
    fn start_rejections_are_itemized() {
        let now = SystemTime::now();
        let mut room = Room::new("ROOM01", profile("a"), None, settings(4), now);

        let RoomError::StartRejected(reasons) = room.start("a", now).unwrap_err() else {
            panic!("expected a start rejection");
        };
        assert_eq!(
            reasons,
            vec!["need at least 2 players".to_string(), "no quiz selected".to_string()]
        );
        assert_eq!(room.status(), RoomStatus::Waiting);
    }

    #[test]
    fn only_the_host_can_start() {
        let now = SystemTime::now();
        let mut room = Room::new("ROOM01", profile("a"), Some(quiz(1)), settings(4), now);
        room.join(profile("b"), now).unwrap();

        assert!(matches!(room.start("b", now).unwrap_err(), RoomError::Unauthorized(_)));
        room.start("a", now).unwrap();
        assert_eq!(room.phase(), RoomPhase::Asking { question_index: 0 });
        assert_eq!(
            room.start("a", now).unwrap_err(),
            RoomError::StartRejected(vec!["quiz already started".into()])
        );
    }

    #[test]
    fn fast_correct_answer_beats_wrong_answer() {
        let mut room = started_room(&["a", "b"], 1);
        let now = SystemTime::now();

        room.submit_answer("a", Answer::ByLetter('A'), Some(10.0), now).unwrap();
        let outcome = room.submit_answer("b", Answer::ByIndex(1), Some(5.0), now).unwrap();
        assert_eq!(
            outcome,
            SubmitOutcome::Accepted {
                question_index: 0,
                answered_count: 2,
                total_players: 2,
                all_answered: true,
            }
        );

        let results = room.close_question().unwrap();
        assert_eq!(results.player_results[0].points, 833);
        assert!(results.player_results[0].correct);
        assert_eq!(results.player_results[1].points, 0);
        assert_eq!(results.leaderboard[0].player_id, "a");
        assert_eq!(results.leaderboard[0].score, 833);
        assert_eq!(results.leaderboard[1].score, 0);
    }

    #[test]
    fn duplicate_submission_changes_nothing() {
        let mut room = started_room(&["a", "b"], 1);
        let now = SystemTime::now();

        room.submit_answer("a", Answer::ByIndex(1), Some(3.0), now).unwrap();
        let outcome = room.submit_answer("a", Answer::ByIndex(0), Some(1.0), now).unwrap();
        assert_eq!(outcome, SubmitOutcome::Duplicate { question_index: 0 });

        let results = room.close_question().unwrap();
        assert_eq!(results.player_results[0].answer, Some(Answer::ByIndex(1)));
        assert_eq!(results.player_results[0].points, 0);
    }

    #[test]
    fn submissions_outside_an_open_question_are_rejected() {
        let now = SystemTime::now();
        let mut room = Room::new("ROOM01", profile("a"), Some(quiz(1)), settings(4), now);
        assert!(matches!(
            room.submit_answer("a", Answer::ByIndex(0), None, now).unwrap_err(),
            RoomError::InvalidState(_)
        ));

        let mut room = started_room(&["a", "b"], 1);
        assert_eq!(
            room.submit_answer("zed", Answer::ByIndex(0), None, now).unwrap_err(),
            RoomError::NotMember
        );
    }

    #[test]
    fn missing_time_spent_uses_elapsed_time() {
        let opened = SystemTime::UNIX_EPOCH;
        let mut room = started_room(&["a", "b"], 1);
        room.submit_answer("a", Answer::ByIndex(0), None, opened + Duration::from_secs(15))
            .unwrap();
        room.submit_answer("b", Answer::ByIndex(0), Some(f64::NAN), opened).unwrap();

        let results = room.close_question().unwrap();
        assert_eq!(results.player_results[0].time_spent, Some(15.0));
        assert_eq!(results.player_results[0].points, 750);
        assert_eq!(results.player_results[1].time_spent, Some(30.0));
        assert_eq!(results.player_results[1].points, 500);
    }

    #[test]
    fn host_role_moves_to_the_earliest_remaining_join() {
        let now = SystemTime::now();
        let mut room = Room::new("ROOM01", profile("a"), Some(quiz(1)), settings(4), now);
        room.join(profile("b"), now).unwrap();
        room.join(profile("c"), now).unwrap();

        let departure = room.remove_player("a").unwrap();
        assert_eq!(departure.new_host.as_deref(), Some("b"));
        assert!(!departure.now_empty);
        assert_eq!(room.host_id(), "b");

        let departure = room.remove_player("c").unwrap();
        assert_eq!(departure.new_host, None);
        assert_eq!(room.host_id(), "b");

        assert_eq!(room.remove_player("c").unwrap_err(), RoomError::NotMember);
        assert!(room.remove_player("b").unwrap().now_empty);
    }

    #[test]
    fn disconnected_players_are_skipped_for_host_and_answer_counts() {
        let mut room = started_room(&["a", "b", "c"], 1);
        let now = SystemTime::now();

        assert_eq!(room.mark_disconnected("a").as_deref(), Some("b"));
        room.mark_disconnected("c");
        room.submit_answer("b", Answer::ByIndex(0), Some(1.0), now).unwrap();
        assert!(room.all_connected_answered());
    }

    #[test]
    fn stale_advance_is_not_accepted() {
        let mut room = started_room(&["a", "b"], 2);
        let tag = room.advance_tag().unwrap();
        assert!(room.accepts_advance(tag));

        room.close_question().unwrap();
        assert!(!room.accepts_advance(tag));

        room.next_question(SystemTime::now()).unwrap();
        assert!(!room.accepts_advance(tag));
        assert!(room.accepts_advance(room.advance_tag().unwrap()));
    }

    #[test]
    fn leaderboard_orders_by_score_then_join_order() {
        let mut room = started_room(&["a", "b", "c"], 1);
        let now = SystemTime::now();
        room.submit_answer("c", Answer::ByIndex(0), Some(0.0), now).unwrap();
        room.submit_answer("b", Answer::ByIndex(0), Some(0.0), now).unwrap();
        room.close_question().unwrap();

        let board = room.finish(FinishReason::QuizCompleted, now).unwrap();
        let order: Vec<_> = board.iter().map(|e| e.player_id.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(board.iter().map(|e| e.position).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(board[0].correct_answers, 1);
        assert_eq!(room.status(), RoomStatus::Finished);
    }

    #[test]
    fn question_index_only_moves_forward() {
        let mut room = started_room(&["a", "b"], 2);
        let now = SystemTime::now();
        assert!(room.next_question(now).is_err());
        room.close_question().unwrap();
        assert!(!room.is_last_question());
        assert_eq!(room.next_question(now).unwrap(), 1);
        room.close_question().unwrap();
        assert!(room.is_last_question());
        assert!(room.next_question(now).is_err());
        assert_eq!(room.current_question_index(), 1);
    }
}
