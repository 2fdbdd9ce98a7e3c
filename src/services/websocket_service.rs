//! Per-connection WebSocket session: handshake, dispatch and outbound pump.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    dao::models::Profile,
    dto::{
        room::RoomSettingsInput,
        ws::{ClientMessage, ServerMessage},
    },
    error::{ErrorKind, RoomError},
    state::{
        SharedState,
        actor::{Outbox, RoomCommand},
        registry::{RoomCode, RoomHandle},
        scoring::Answer,
        state_machine::RoomStatus,
    },
};

/// Handle the full lifecycle of one player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    // Dedicated writer task keeps room events flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                message = outbound_rx.recv() => {
                    let Some(message) = message else { break };
                    let Some(frame) = encode(&message) else { continue };
                    if sender.send(frame).await.is_err() {
                        return;
                    }
                }
                _ = &mut shutdown_rx => break,
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let timeout = state.config().timings.identification_timeout;
    let initial_message = match tokio::time::timeout(timeout, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, shutdown_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(ServerMessage::error(
                ErrorKind::Validation,
                "expected an authenticate text frame",
            ));
            finalize(writer_task, shutdown_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, shutdown_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket authentication timed out");
            finalize(writer_task, shutdown_tx).await;
            return;
        }
    };

    let token = match ClientMessage::from_json_str(&initial_message) {
        Ok(ClientMessage::Authenticate { token }) => token,
        Ok(other) => {
            warn!(kind = other.kind(), "first message was not authenticate");
            let _ = outbound_tx.send(ServerMessage::error(
                ErrorKind::Authorization,
                "authenticate first",
            ));
            finalize(writer_task, shutdown_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse or validate handshake");
            let _ = outbound_tx.send(ServerMessage::error(ErrorKind::Validation, err.to_string()));
            finalize(writer_task, shutdown_tx).await;
            return;
        }
    };

    let profile = match state.identity().authenticate(&token).await {
        Ok(profile) => profile,
        Err(err) => {
            warn!(error = %err, "authentication rejected");
            let _ = outbound_tx.send(ServerMessage::error(ErrorKind::Authorization, err.to_string()));
            finalize(writer_task, shutdown_tx).await;
            return;
        }
    };

    info!(player_id = %profile.id, name = %profile.name, "player connected");
    let _ = outbound_tx.send(ServerMessage::Authenticated {
        profile: profile.clone(),
    });

    let mut session = Session::new(state, profile, outbound_tx);

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match ClientMessage::from_json_str(&text) {
                Ok(message) => {
                    debug!(
                        player_id = %session.profile.id,
                        kind = message.kind(),
                        "received client message"
                    );
                    if let Err(err) = session.handle(message).await {
                        session.report(err);
                    }
                }
                Err(err) => {
                    warn!(
                        player_id = %session.profile.id,
                        error = %err,
                        "failed to parse or validate client message"
                    );
                    session.send(ServerMessage::error(ErrorKind::Validation, err.to_string()));
                }
            },
            Ok(Message::Close(_)) => {
                info!(player_id = %session.profile.id, "player closed the connection");
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(player_id = %session.profile.id, error = %err, "websocket error");
                break;
            }
        }
    }

    session.disconnect();
    info!(player_id = %session.profile.id, "player disconnected");

    finalize(writer_task, shutdown_tx).await;
}

/// Serialize an event into a text frame; serialization failures are logged and skipped.
fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{message:?}`");
            None
        }
    }
}

/// Per-connection state once the player is authenticated.
struct Session {
    state: SharedState,
    profile: Profile,
    outbox: Outbox,
    room: Option<RoomHandle>,
}

impl Session {
    fn new(state: SharedState, profile: Profile, outbox: Outbox) -> Self {
        Self {
            state,
            profile,
            outbox,
            room: None,
        }
    }

    fn send(&self, message: ServerMessage) {
        let _ = self.outbox.send(message);
    }

    /// Send a failed action back to this player only.
    fn report(&self, err: RoomError) {
        debug!(player_id = %self.profile.id, error = %err, "action rejected");
        let message = match err {
            RoomError::StartRejected(reasons) => ServerMessage::StartRejected { reasons },
            other => ServerMessage::error(other.kind(), other.to_string()),
        };
        self.send(message);
    }

    async fn handle(&mut self, message: ClientMessage) -> Result<(), RoomError> {
        match message {
            ClientMessage::Authenticate { .. } => {
                Err(RoomError::InvalidState("already authenticated".into()))
            }
            ClientMessage::CreateRoom { quiz_id, settings } => {
                self.create_room(quiz_id, settings).await
            }
            ClientMessage::JoinRoom { room_id } => self.join_room(&room_id).await,
            ClientMessage::StartQuiz => {
                let player_id = self.profile.id.clone();
                self.current_room()?
                    .request(|reply| RoomCommand::Start { player_id, reply })
                    .await
            }
            ClientMessage::SubmitAnswer { answer, time_spent } => {
                self.submit_answer(answer, time_spent).await
            }
            ClientMessage::LeaveRoom => {
                let player_id = self.profile.id.clone();
                self.current_room()?
                    .request(|reply| RoomCommand::Leave {
                        player_id,
                        reply: Some(reply),
                    })
                    .await?;
                self.room = None;
                Ok(())
            }
            ClientMessage::ChatMessage { message } => {
                let player_id = self.profile.id.clone();
                self.current_room()?
                    .request(|reply| RoomCommand::Chat {
                        player_id,
                        message,
                        reply,
                    })
                    .await
            }
        }
    }

    async fn create_room(
        &mut self,
        quiz_id: Option<String>,
        settings: RoomSettingsInput,
    ) -> Result<(), RoomError> {
        self.ensure_free()?;
        let settings = self.state.config().resolve_settings(settings)?;

        let quiz = match quiz_id {
            Some(quiz_id) => Some(
                self.state
                    .quizzes()
                    .find_quiz(&quiz_id)
                    .await?
                    .ok_or_else(|| RoomError::NotFound(format!("quiz `{quiz_id}` not found")))?,
            ),
            None => None,
        };

        let (handle, _) = self.state.rooms().create_room(
            self.profile.clone(),
            self.outbox.clone(),
            quiz,
            settings,
        );
        self.room = Some(handle);
        Ok(())
    }

    async fn join_room(&mut self, room_id: &str) -> Result<(), RoomError> {
        self.ensure_free()?;
        let code = RoomCode::parse(room_id);
        let (handle, _) = self
            .state
            .rooms()
            .join_room(&code, self.profile.clone(), self.outbox.clone())
            .await?;
        self.room = Some(handle);
        Ok(())
    }

    async fn submit_answer(
        &mut self,
        answer: Answer,
        time_spent: Option<f64>,
    ) -> Result<(), RoomError> {
        let player_id = self.profile.id.clone();
        self.current_room()?
            .request(|reply| RoomCommand::Submit {
                player_id,
                answer,
                time_spent,
                reply,
            })
            .await
    }

    fn current_room(&self) -> Result<RoomHandle, RoomError> {
        self.room
            .as_ref()
            .filter(|handle| !handle.is_closed())
            .cloned()
            .ok_or_else(|| RoomError::InvalidState("not in a room".into()))
    }

    /// Make sure the player is free to create or join a room.
    ///
    /// A finished room is left silently; any other live room must be left first.
    fn ensure_free(&mut self) -> Result<(), RoomError> {
        let Some(handle) = self.room.as_ref() else {
            return Ok(());
        };
        if !handle.is_closed() && handle.status() != RoomStatus::Finished {
            return Err(RoomError::InvalidState(
                "already in a room; leave it first".into(),
            ));
        }
        self.disconnect();
        Ok(())
    }

    /// Leave the current room without waiting for an answer.
    fn disconnect(&mut self) {
        if let Some(handle) = self.room.take() {
            let _ = handle.send(RoomCommand::Leave {
                player_id: self.profile.id.clone(),
                reply: None,
            });
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, shutdown: oneshot::Sender<()>) {
    let _ = shutdown.send(());
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Arc};

    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            identity::StaticIdentityProvider, profile_store::memory::InMemoryProfileStore,
            quiz_store::InMemoryQuizStore,
        },
        state::AppState,
    };

    fn state() -> SharedState {
        AppState::new(
            AppConfig::with_defaults(),
            Arc::new(StaticIdentityProvider::new(HashMap::new(), true)),
            Arc::new(InMemoryQuizStore::with_samples()),
            Arc::new(InMemoryProfileStore::default()),
        )
    }

    fn session(state: &SharedState, id: &str) -> (Session, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = unbounded_channel();
        let profile = Profile {
            id: id.into(),
            name: id.to_uppercase(),
            level: 1,
            avatar: None,
        };
        (Session::new(state.clone(), profile, tx), rx)
    }

    fn create(quiz_id: Option<&str>) -> ClientMessage {
        ClientMessage::CreateRoom {
            quiz_id: quiz_id.map(str::to_string),
            settings: RoomSettingsInput::default(),
        }
    }

    #[tokio::test]
    async fn host_and_guest_meet_in_a_room() {
        let state = state();
        let (mut host, mut host_rx) = session(&state, "a");
        let (mut guest, mut guest_rx) = session(&state, "b");

        host.handle(create(Some("sample-general"))).await.unwrap();
        let Some(ServerMessage::RoomCreated { room_id, .. }) = host_rx.recv().await else {
            panic!("expected room_created");
        };

        guest
            .handle(ClientMessage::JoinRoom {
                room_id: room_id.to_lowercase(),
            })
            .await
            .unwrap();
        assert!(matches!(
            guest_rx.recv().await,
            Some(ServerMessage::RoomJoined { .. })
        ));
        assert!(matches!(
            host_rx.recv().await,
            Some(ServerMessage::PlayerJoined { .. })
        ));

        let err = guest.handle(ClientMessage::StartQuiz).await.unwrap_err();
        assert!(matches!(err, RoomError::Unauthorized(_)));
        host.handle(ClientMessage::StartQuiz).await.unwrap();
        assert!(matches!(
            guest_rx.recv().await,
            Some(ServerMessage::QuizStarted { total_questions: 4 })
        ));
    }

    #[tokio::test]
    async fn room_without_quiz_reports_start_reasons() {
        let state = state();
        let (mut host, mut host_rx) = session(&state, "a");
        host.handle(create(None)).await.unwrap();
        host_rx.recv().await;

        let err = host.handle(ClientMessage::StartQuiz).await.unwrap_err();
        host.report(err);
        let Some(ServerMessage::StartRejected { reasons }) = host_rx.recv().await else {
            panic!("expected start_rejected");
        };
        assert!(reasons.contains(&"no quiz selected".to_string()));
        assert!(reasons.contains(&"need at least 2 players".to_string()));
    }

    #[tokio::test]
    async fn actions_require_membership_and_a_known_quiz() {
        let state = state();
        let (mut player, _rx) = session(&state, "a");

        let err = player
            .handle(ClientMessage::SubmitAnswer {
                answer: Answer::ByIndex(0),
                time_spent: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);

        let err = player.handle(create(Some("missing"))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        player.handle(create(None)).await.unwrap();
        let err = player.handle(create(None)).await.unwrap_err();
        assert!(matches!(err, RoomError::InvalidState(_)));

        player.handle(ClientMessage::LeaveRoom).await.unwrap();
        assert!(state.rooms().is_empty());
    }
}
