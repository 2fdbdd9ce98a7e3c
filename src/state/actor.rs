//! One task per room: owns the [`Room`], serializes every mutation and drives the timers.

use std::{
    collections::HashMap,
    ops::ControlFlow,
    sync::{Arc, Weak},
    time::{Duration, SystemTime},
};

use tokio::{
    sync::{mpsc, oneshot, watch},
    time::sleep,
};
use tracing::{debug, info, warn};

use crate::{
    config::RoomTimings,
    dao::{models::Profile, profile_store::ProfileStore},
    dto::{
        format_system_time,
        room::{PlayerSummary, QuestionView, RoomSnapshot},
        ws::ServerMessage,
    },
    error::RoomError,
    state::{
        leaderboard::{LeaderboardEntry, RewardOutcome, compute_rewards, persist_rewards},
        registry::{RoomCode, RoomRegistry},
        room::{AdvanceTag, PlayerId, QuestionResults, Room, SubmitOutcome},
        scoring::{Answer, RewardTable},
        state_machine::{FinishReason, RoomPhase, RoomStatus},
    },
};

/// Channel feeding one player's socket writer.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Collaborators and tunables shared by every room.
#[derive(Clone)]
pub struct RoomServices {
    /// Delays driving the question loop.
    pub timings: RoomTimings,
    /// Experience granted by rank.
    pub rewards: RewardTable,
    /// Store credited when a quiz completes.
    pub profiles: Arc<dyn ProfileStore>,
}

/// Commands processed by a room actor, in arrival order.
pub(crate) enum RoomCommand {
    /// Admit a player and attach their outbox.
    Join {
        profile: Profile,
        outbox: Outbox,
        reply: Reply<RoomSnapshot>,
    },
    /// Host request to begin the quiz.
    Start {
        player_id: PlayerId,
        reply: Reply<()>,
    },
    /// Answer to the open question.
    Submit {
        player_id: PlayerId,
        answer: Answer,
        time_spent: Option<f64>,
        reply: Reply<()>,
    },
    /// Explicit leave when `reply` is set, dropped connection otherwise.
    Leave {
        player_id: PlayerId,
        reply: Option<Reply<()>>,
    },
    /// Chat line to relay to every member.
    Chat {
        player_id: PlayerId,
        message: String,
        reply: Reply<()>,
    },
    /// Deferred: close the tagged question if it is still open.
    Advance(AdvanceTag),
    /// Deferred: open the question after `after_index`.
    NextQuestion { after_index: usize },
    /// Deferred: end the quiz after the last question was revealed.
    Finalize { after_index: usize },
    /// Report from the reward persistence task.
    RewardsPersisted(Vec<RewardOutcome>),
    /// Deferred: stop the actor and leave the registry.
    Retire,
}

/// Task state owning one [`Room`] and the outboxes of its members.
pub(crate) struct RoomActor {
    code: RoomCode,
    room: Room,
    services: RoomServices,
    registry: Weak<RoomRegistry>,
    commands: mpsc::UnboundedSender<RoomCommand>,
    snapshot: watch::Sender<RoomSnapshot>,
    connections: HashMap<PlayerId, Outbox>,
    /// Question for which the settle delay is already running.
    settling: Option<usize>,
}

impl RoomActor {
    pub(crate) fn new(
        room: Room,
        services: RoomServices,
        registry: Weak<RoomRegistry>,
        commands: mpsc::UnboundedSender<RoomCommand>,
        snapshot: watch::Sender<RoomSnapshot>,
        host_id: PlayerId,
        host_outbox: Outbox,
    ) -> Self {
        Self {
            code: RoomCode::parse(room.id()),
            room,
            services,
            registry,
            commands,
            snapshot,
            connections: HashMap::from([(host_id, host_outbox)]),
            settling: None,
        }
    }

    /// Process commands until the room retires.
    pub(crate) async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<RoomCommand>) {
        while let Some(command) = inbox.recv().await {
            let flow = self.handle(command);
            self.publish();
            if flow.is_break() {
                break;
            }
        }
        debug!(room_id = %self.code, "room actor stopped");
    }

    fn handle(&mut self, command: RoomCommand) -> ControlFlow<()> {
        match command {
            RoomCommand::Join {
                profile,
                outbox,
                reply,
            } => {
                let _ = reply.send(self.join(profile, outbox));
            }
            RoomCommand::Start { player_id, reply } => {
                let _ = reply.send(self.start(&player_id));
            }
            RoomCommand::Submit {
                player_id,
                answer,
                time_spent,
                reply,
            } => {
                let _ = reply.send(self.submit(&player_id, answer, time_spent));
            }
            RoomCommand::Leave { player_id, reply } => return self.leave(&player_id, reply),
            RoomCommand::Chat {
                player_id,
                message,
                reply,
            } => {
                let _ = reply.send(self.chat(&player_id, &message));
            }
            RoomCommand::Advance(tag) => self.advance(tag),
            RoomCommand::NextQuestion { after_index } => self.next_question(after_index),
            RoomCommand::Finalize { after_index } => self.finalize(after_index),
            RoomCommand::RewardsPersisted(outcomes) => self.rewards_persisted(outcomes),
            RoomCommand::Retire => {
                self.retire();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn join(&mut self, profile: Profile, outbox: Outbox) -> Result<RoomSnapshot, RoomError> {
        let player_id = profile.id.clone();
        let host_id = self.room.host_id().to_string();
        let summary = PlayerSummary::new(self.room.join(profile, SystemTime::now())?, &host_id);

        self.connections.insert(player_id.clone(), outbox);
        let snapshot = RoomSnapshot::from(&self.room);
        self.send_to(
            &player_id,
            ServerMessage::RoomJoined {
                room: snapshot.clone(),
            },
        );
        self.broadcast_except(
            &player_id,
            ServerMessage::PlayerJoined {
                player: summary,
                room: snapshot.clone(),
            },
        );

        info!(
            room_id = %self.code,
            player_id = %player_id,
            players = self.room.player_count(),
            "player joined"
        );
        Ok(snapshot)
    }

    fn start(&mut self, player_id: &str) -> Result<(), RoomError> {
        self.room.start(player_id, SystemTime::now())?;
        info!(
            room_id = %self.code,
            players = self.room.player_count(),
            questions = self.room.total_questions(),
            "quiz started"
        );
        self.broadcast(ServerMessage::QuizStarted {
            total_questions: self.room.total_questions(),
        });
        self.open_question();
        Ok(())
    }

    /// Announce the open question and arm its deadline.
    fn open_question(&mut self) {
        let Some((question_index, question)) = self.room.current_question() else {
            warn!(room_id = %self.code, "no open question to announce");
            return;
        };
        let time_limit = self.room.settings().time_per_question;
        let limit = Duration::from_secs(u64::from(time_limit));
        let message = ServerMessage::NewQuestion {
            question_index,
            question: QuestionView::from(question),
            question_number: question_index + 1,
            total_questions: self.room.total_questions(),
            time_limit,
            deadline: format_system_time(SystemTime::now() + limit),
        };

        self.settling = None;
        self.broadcast(message);
        if let Some(tag) = self.room.advance_tag() {
            self.schedule(limit, RoomCommand::Advance(tag));
        }
        debug!(room_id = %self.code, question_index, "question opened");
    }

    fn submit(
        &mut self,
        player_id: &str,
        answer: Answer,
        time_spent: Option<f64>,
    ) -> Result<(), RoomError> {
        match self
            .room
            .submit_answer(player_id, answer, time_spent, SystemTime::now())?
        {
            SubmitOutcome::Duplicate { question_index } => {
                debug!(
                    room_id = %self.code,
                    player_id = %player_id,
                    question_index,
                    "duplicate answer ignored"
                );
                self.send_to(player_id, ServerMessage::AnswerIgnored { question_index });
            }
            SubmitOutcome::Accepted {
                question_index,
                answered_count,
                total_players,
                all_answered,
            } => {
                debug!(
                    room_id = %self.code,
                    player_id = %player_id,
                    question_index,
                    answered_count,
                    total_players,
                    "answer recorded"
                );
                self.broadcast(ServerMessage::AnswerSubmitted {
                    player_id: player_id.to_string(),
                    player_name: self.player_name(player_id),
                    answered_count,
                    total_players,
                });
                if all_answered {
                    self.begin_settle();
                }
            }
        }
        Ok(())
    }

    /// Everyone connected answered: close the question after the settle delay.
    fn begin_settle(&mut self) {
        let Some(tag) = self.room.advance_tag() else {
            return;
        };
        if self.settling == Some(tag.question_index) {
            return;
        }
        self.settling = Some(tag.question_index);

        let delay = self.services.timings.settle_delay;
        self.broadcast(ServerMessage::AllAnswered {
            question_index: tag.question_index,
            settle_seconds: delay.as_secs_f64(),
        });
        self.schedule(delay, RoomCommand::Advance(tag));
    }

    fn advance(&mut self, tag: AdvanceTag) {
        if !self.room.accepts_advance(tag) {
            debug!(
                room_id = %self.code,
                question_index = tag.question_index,
                "stale advance ignored"
            );
            return;
        }

        let QuestionResults {
            question_index,
            correct_answer,
            explanation,
            player_results,
            leaderboard,
        } = match self.room.close_question() {
            Ok(results) => results,
            Err(err) => {
                warn!(room_id = %self.code, error = %err, "failed to close question");
                return;
            }
        };
        info!(room_id = %self.code, question_index, "question closed");

        self.broadcast(ServerMessage::QuestionResults {
            question_index,
            correct_answer,
            explanation,
            player_results,
            leaderboard,
        });

        let timings = self.services.timings;
        if self.room.is_last_question() {
            self.schedule(
                timings.finish_delay,
                RoomCommand::Finalize {
                    after_index: question_index,
                },
            );
        } else {
            self.schedule(
                timings.inter_question_delay,
                RoomCommand::NextQuestion {
                    after_index: question_index,
                },
            );
        }
    }

    fn is_revealing(&self, question_index: usize) -> bool {
        self.room.phase() == RoomPhase::Revealing { question_index }
    }

    fn next_question(&mut self, after_index: usize) {
        if !self.is_revealing(after_index) {
            debug!(room_id = %self.code, after_index, "stale next question ignored");
            return;
        }
        match self.room.next_question(SystemTime::now()) {
            Ok(_) => self.open_question(),
            Err(err) => warn!(room_id = %self.code, error = %err, "failed to open next question"),
        }
    }

    fn finalize(&mut self, after_index: usize) {
        if !self.is_revealing(after_index) {
            debug!(room_id = %self.code, after_index, "stale finalize ignored");
            return;
        }
        self.conclude(FinishReason::QuizCompleted);
    }

    /// Finish the room and schedule its retirement.
    fn conclude(&mut self, reason: FinishReason) {
        let leaderboard = match self.room.finish(reason, SystemTime::now()) {
            Ok(leaderboard) => leaderboard,
            Err(err) => {
                warn!(room_id = %self.code, error = %err, "failed to finish room");
                return;
            }
        };
        info!(
            room_id = %self.code,
            reason = ?reason,
            players = leaderboard.len(),
            "quiz finished"
        );

        if reason == FinishReason::QuizCompleted {
            let duration_seconds = match (self.room.started_at(), self.room.finished_at()) {
                (Some(started), Some(finished)) => finished
                    .duration_since(started)
                    .map_or(0, |elapsed| elapsed.as_secs()),
                _ => 0,
            };
            self.broadcast(ServerMessage::QuizFinished {
                leaderboard: leaderboard.clone(),
                total_questions: self.room.total_questions(),
                duration_seconds,
            });
            self.hand_off_rewards(&leaderboard);
        }

        self.schedule(self.services.timings.grace_period, RoomCommand::Retire);
    }

    /// Persist rank rewards on a separate task; the outcome comes back as a command.
    fn hand_off_rewards(&self, leaderboard: &[LeaderboardEntry]) {
        let rewards = compute_rewards(leaderboard, &self.services.rewards);
        if rewards.is_empty() {
            return;
        }

        let store = self.services.profiles.clone();
        let commands = self.commands.clone();
        let room_id = self.code.to_string();
        tokio::spawn(async move {
            let outcomes = persist_rewards(store, room_id, rewards).await;
            let _ = commands.send(RoomCommand::RewardsPersisted(outcomes));
        });
    }

    fn rewards_persisted(&mut self, outcomes: Vec<RewardOutcome>) {
        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        debug!(
            room_id = %self.code,
            rewarded = outcomes.len() - failed,
            failed,
            "reward report received"
        );

        for outcome in outcomes.into_iter().filter(|o| o.error.is_none()) {
            self.send_to(
                &outcome.reward.player_id,
                ServerMessage::RewardGranted {
                    experience: outcome.reward.experience,
                    level: outcome.level,
                    badge: outcome.reward.badge.map(str::to_string),
                },
            );
        }
    }

    fn leave(&mut self, player_id: &str, reply: Option<Reply<()>>) -> ControlFlow<()> {
        let departure = match self.room.remove_player(player_id) {
            Ok(departure) => departure,
            Err(err) => {
                if let Some(reply) = reply {
                    let _ = reply.send(Err(err));
                }
                return ControlFlow::Continue(());
            }
        };

        if let Some(outbox) = self.connections.remove(player_id) {
            if reply.is_some() {
                let _ = outbox.send(ServerMessage::RoomLeft {
                    room_id: self.code.to_string(),
                });
            }
        }
        info!(
            room_id = %self.code,
            player_id = %player_id,
            explicit = reply.is_some(),
            remaining = self.room.player_count(),
            "player left"
        );

        self.broadcast(ServerMessage::PlayerLeft {
            player_id: player_id.to_string(),
            player_name: departure.player.profile.name.clone(),
            room: RoomSnapshot::from(&self.room),
        });
        if let Some(new_host) = departure.new_host {
            self.announce_host(&new_host);
        }

        let mut flow = ControlFlow::Continue(());
        if departure.now_empty {
            match self.room.status() {
                RoomStatus::Waiting => {
                    self.unregister();
                    flow = ControlFlow::Break(());
                }
                RoomStatus::InProgress => self.conclude(FinishReason::Abandoned),
                RoomStatus::Finished => {}
            }
        } else if self.room.all_connected_answered() {
            self.begin_settle();
        }

        if let Some(reply) = reply {
            let _ = reply.send(Ok(()));
        }
        flow
    }

    fn chat(&mut self, player_id: &str, message: &str) -> Result<(), RoomError> {
        let player = self.room.player(player_id).ok_or(RoomError::NotMember)?;
        let message = ServerMessage::ChatMessage {
            player_id: player_id.to_string(),
            player_name: player.profile.name.clone(),
            message: message.trim().to_string(),
            timestamp: format_system_time(SystemTime::now()),
        };
        self.broadcast(message);
        Ok(())
    }

    fn announce_host(&mut self, new_host_id: &str) {
        info!(room_id = %self.code, host_id = %new_host_id, "host role moved");
        self.broadcast(ServerMessage::HostChanged {
            new_host_id: new_host_id.to_string(),
            new_host_name: self.player_name(new_host_id),
        });
    }

    fn player_name(&self, player_id: &str) -> String {
        self.room
            .player(player_id)
            .map(|player| player.profile.name.clone())
            .unwrap_or_default()
    }

    fn broadcast(&mut self, message: ServerMessage) {
        self.deliver(None, message);
    }

    fn broadcast_except(&mut self, skip: &str, message: ServerMessage) {
        self.deliver(Some(skip), message);
    }

    fn deliver(&mut self, skip: Option<&str>, message: ServerMessage) {
        let failed: Vec<PlayerId> = self
            .connections
            .iter()
            .filter(|(player_id, _)| skip != Some(player_id.as_str()))
            .filter(|(_, outbox)| outbox.send(message.clone()).is_err())
            .map(|(player_id, _)| player_id.clone())
            .collect();
        self.drop_connections(failed);
    }

    fn send_to(&mut self, player_id: &str, message: ServerMessage) {
        let failed = self
            .connections
            .get(player_id)
            .is_some_and(|outbox| outbox.send(message).is_err());
        if failed {
            self.drop_connections(vec![player_id.to_string()]);
        }
    }

    /// Forget outboxes whose socket is gone; the session's leave follows.
    fn drop_connections(&mut self, failed: Vec<PlayerId>) {
        if failed.is_empty() {
            return;
        }
        for player_id in failed {
            self.connections.remove(&player_id);
            warn!(
                room_id = %self.code,
                player_id = %player_id,
                "outbox closed; marking player disconnected"
            );
            let Some(new_host) = self.room.mark_disconnected(&player_id) else {
                continue;
            };
            let message = ServerMessage::HostChanged {
                new_host_name: self.player_name(&new_host),
                new_host_id: new_host,
            };
            for outbox in self.connections.values() {
                let _ = outbox.send(message.clone());
            }
        }
        if self.room.all_connected_answered() {
            self.begin_settle();
        }
    }

    fn schedule(&self, delay: Duration, command: RoomCommand) {
        let commands = self.commands.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            let _ = commands.send(command);
        });
    }

    fn publish(&self) {
        self.snapshot.send_replace(RoomSnapshot::from(&self.room));
    }

    fn unregister(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.code);
        }
    }

    fn retire(&mut self) {
        self.unregister();
        let message = ServerMessage::RoomClosed {
            room_id: self.code.to_string(),
        };
        for outbox in self.connections.values() {
            let _ = outbox.send(message.clone());
        }
        info!(room_id = %self.code, "room retired");
    }
}
