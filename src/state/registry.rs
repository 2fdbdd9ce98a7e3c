//! Process-wide table of live rooms and the handles used to reach them.

use std::{
    fmt,
    sync::Arc,
    time::SystemTime,
};

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::info;

use crate::{
    dao::models::{Profile, Quiz},
    dto::{
        room::{RoomSnapshot, WaitingRoomItem},
        ws::ServerMessage,
    },
    error::RoomError,
    state::{
        actor::{Outbox, RoomActor, RoomCommand, RoomServices},
        room::{Room, RoomSettings},
        state_machine::RoomStatus,
    },
};

/// Characters room codes are drawn from; excludes look-alikes such as `0`/`O` and `1`/`I`.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Length of generated room codes.
pub const ROOM_CODE_LEN: usize = 6;

/// Short shareable room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Draw a random code.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code = (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalize user input (trim, upper-case) into a code.
    pub fn parse(input: &str) -> Self {
        Self(input.trim().to_ascii_uppercase())
    }

    /// Code as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cloneable handle to a running room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomCode,
    created_at: SystemTime,
    commands: mpsc::UnboundedSender<RoomCommand>,
    snapshot: watch::Receiver<RoomSnapshot>,
}

impl RoomHandle {
    /// Code of the room.
    pub fn id(&self) -> &RoomCode {
        &self.id
    }

    /// When the room was opened.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Latest published state of the room.
    pub fn snapshot(&self) -> RoomSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Status from the latest snapshot.
    pub fn status(&self) -> RoomStatus {
        self.snapshot.borrow().status
    }

    /// Whether the actor behind this handle has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Fire-and-forget command.
    pub(crate) fn send(&self, command: RoomCommand) -> Result<(), RoomError> {
        self.commands
            .send(command)
            .map_err(|_| self.closed_error())
    }

    /// Send a command carrying a reply channel and wait for the answer.
    pub(crate) async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, RoomError>>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(make(reply_tx))?;
        reply_rx.await.map_err(|_| self.closed_error())?
    }

    fn closed_error(&self) -> RoomError {
        RoomError::NotFound(format!("room `{}` not found", self.id))
    }
}

/// Registry of active rooms keyed by code.
pub struct RoomRegistry {
    rooms: DashMap<RoomCode, RoomHandle>,
    services: RoomServices,
}

impl RoomRegistry {
    /// Empty registry whose rooms share `services`.
    pub fn new(services: RoomServices) -> Arc<Self> {
        Arc::new(Self {
            rooms: DashMap::new(),
            services,
        })
    }

    /// Create a waiting room hosted by `host` and start its actor.
    ///
    /// `room_created` is queued on the host's outbox before the actor runs, so it is
    /// always the first room event the host sees.
    pub fn create_room(
        self: &Arc<Self>,
        host: Profile,
        outbox: Outbox,
        quiz: Option<Quiz>,
        settings: RoomSettings,
    ) -> (RoomHandle, RoomSnapshot) {
        loop {
            let code = RoomCode::generate();
            let Entry::Vacant(slot) = self.rooms.entry(code.clone()) else {
                continue;
            };

            let now = SystemTime::now();
            let host_id = host.id.clone();
            let room = Room::new(code.as_str(), host, quiz, settings, now);
            let snapshot = RoomSnapshot::from(&room);

            let (commands_tx, commands_rx) = mpsc::unbounded_channel();
            let (snapshot_tx, snapshot_rx) = watch::channel(snapshot.clone());
            let handle = RoomHandle {
                id: code.clone(),
                created_at: now,
                commands: commands_tx.clone(),
                snapshot: snapshot_rx,
            };
            slot.insert(handle.clone());

            let _ = outbox.send(ServerMessage::RoomCreated {
                room_id: code.to_string(),
                room: snapshot.clone(),
            });

            let actor = RoomActor::new(
                room,
                self.services.clone(),
                Arc::downgrade(self),
                commands_tx,
                snapshot_tx,
                host_id,
                outbox,
            );
            tokio::spawn(actor.run(commands_rx));

            info!(room_id = %code, "room created");
            return (handle, snapshot);
        }
    }

    /// Handle of a live room.
    pub fn get(&self, room_id: &RoomCode) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|entry| entry.value().clone())
    }

    /// Admit `profile` into a waiting room.
    pub async fn join_room(
        &self,
        room_id: &RoomCode,
        profile: Profile,
        outbox: Outbox,
    ) -> Result<(RoomHandle, RoomSnapshot), RoomError> {
        let handle = self
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(format!("room `{room_id}` not found")))?;
        let snapshot = handle
            .request(|reply| RoomCommand::Join {
                profile,
                outbox,
                reply,
            })
            .await?;
        Ok((handle, snapshot))
    }

    /// Remove `player_id` from a room.
    pub async fn leave_room(&self, room_id: &RoomCode, player_id: &str) -> Result<(), RoomError> {
        let handle = self
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(format!("room `{room_id}` not found")))?;
        handle
            .request(|reply| RoomCommand::Leave {
                player_id: player_id.to_string(),
                reply: Some(reply),
            })
            .await
    }

    /// Rooms still accepting players, oldest first.
    pub fn list_waiting(&self) -> Vec<WaitingRoomItem> {
        let mut waiting: Vec<(SystemTime, WaitingRoomItem)> = self
            .rooms
            .iter()
            .filter_map(|entry| {
                let handle = entry.value();
                let snapshot = handle.snapshot.borrow();
                (snapshot.status == RoomStatus::Waiting)
                    .then(|| (handle.created_at, WaitingRoomItem::from(&*snapshot)))
            })
            .collect();
        waiting.sort_by_key(|(created_at, _)| *created_at);
        waiting.into_iter().map(|(_, item)| item).collect()
    }

    /// Drop a room from the table; called by its actor when it retires.
    pub fn remove(&self, room_id: &RoomCode) {
        if self.rooms.remove(room_id).is_some() {
            info!(room_id = %room_id, "room removed from registry");
        }
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room is live.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, time::Duration};

    use serde_json::Map;
    use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

    use super::*;
    use crate::{
        dao::profile_store::memory::InMemoryProfileStore,
        dto::validation::validate_room_code, state::actor::RoomServices,
    };

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.into(),
            name: id.to_uppercase(),
            level: 1,
            avatar: None,
        }
    }

    fn settings() -> RoomSettings {
        RoomSettings {
            max_players: 4,
            time_per_question: 30,
            question_count: None,
            options: Map::new(),
        }
    }

    fn registry() -> Arc<RoomRegistry> {
        RoomRegistry::new(RoomServices {
            timings: Default::default(),
            rewards: Default::default(),
            profiles: Arc::new(InMemoryProfileStore::default()),
        })
    }

    fn outbox() -> (Outbox, UnboundedReceiver<ServerMessage>) {
        unbounded_channel()
    }

    #[test]
    fn generated_codes_use_the_alphabet() {
        let codes: HashSet<RoomCode> = (0..200).map(|_| RoomCode::generate()).collect();
        assert!(codes.len() > 190);
        for code in &codes {
            assert!(validate_room_code(code.as_str()).is_ok(), "{code}");
        }
        assert_eq!(RoomCode::parse(" abc234 ").as_str(), "ABC234");
    }

    #[tokio::test]
    async fn created_room_is_listed_and_announced() {
        let registry = registry();
        let (tx, mut rx) = outbox();
        let (handle, snapshot) = registry.create_room(profile("a"), tx, None, settings());

        assert_eq!(registry.len(), 1);
        assert_eq!(snapshot.status, RoomStatus::Waiting);
        assert!(registry.get(handle.id()).is_some());

        let Some(ServerMessage::RoomCreated { room_id, .. }) = rx.recv().await else {
            panic!("expected room_created");
        };
        assert_eq!(room_id, handle.id().to_string());

        let listed = registry.list_waiting();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].host_name, "A");
    }

    #[tokio::test]
    async fn waiting_rooms_are_listed_oldest_first() {
        let registry = registry();
        let (first, _) = registry.create_room(profile("a"), outbox().0, None, settings());
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (second, _) = registry.create_room(profile("b"), outbox().0, None, settings());

        let ids: Vec<String> = registry.list_waiting().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id().to_string(), second.id().to_string()]);
    }

    #[tokio::test]
    async fn unknown_rooms_are_not_found() {
        let registry = registry();
        let err = registry
            .join_room(&RoomCode::parse("ZZZZZZ"), profile("b"), outbox().0)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::NotFound(_)));
    }

    #[tokio::test]
    async fn last_player_leaving_a_waiting_room_removes_it() {
        let registry = registry();
        let (handle, _) = registry.create_room(profile("a"), outbox().0, None, settings());
        let code = handle.id().clone();

        registry.leave_room(&code, "a").await.unwrap();

        assert!(registry.get(&code).is_none());
        assert!(registry.is_empty());
        let err = registry
            .join_room(&code, profile("b"), outbox().0)
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::NotFound(_)));

        let err = handle
            .request(|reply| RoomCommand::Start {
                player_id: "a".into(),
                reply,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RoomError::NotFound(_)));
    }
}
