use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use doodle_core::net::messages::ClientMessage;
use doodle_core::participant::ParticipantId;
use doodle_core::room::RoomId;

use crate::config::ServerConfig;
use crate::coordinator::{JoinError, RoomCoordinator, RoomSnapshot};
use crate::room_loop::{PlayerSender, RoomCommand, RoomLoop, spawn_room_loop};
use crate::state::SharedRoomManager;

/// Cheap, clonable address of a running room task.
#[derive(Clone)]
pub struct RoomHandle {
    pub instance: Uuid,
    commands: mpsc::UnboundedSender<RoomCommand>,
    participants: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub fn participants(&self) -> usize {
        self.participants.load(Ordering::Relaxed)
    }

    pub async fn join(
        &self,
        name: String,
        sender: PlayerSender,
    ) -> Result<ParticipantId, JoinError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(RoomCommand::Join {
                name,
                sender,
                reply,
            })
            .map_err(|_| JoinError::RoomClosed)?;
        rx.await.map_err(|_| JoinError::RoomClosed)?
    }

    /// Queue an inbound message. Returns false if the room is gone.
    pub fn send(&self, participant: ParticipantId, message: ClientMessage) -> bool {
        self.commands
            .send(RoomCommand::Inbound {
                participant,
                message,
            })
            .is_ok()
    }

    pub fn leave(&self, participant: ParticipantId) {
        let _ = self.commands.send(RoomCommand::Leave { participant });
    }

    pub async fn snapshot(&self) -> Option<RoomSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(RoomCommand::Snapshot { reply }).ok()?;
        rx.await.ok()
    }
}

/// Directory of live rooms, keyed by room id.
pub struct RoomManager {
    rooms: HashMap<RoomId, RoomHandle>,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Return the live room for `room_id`, spawning a fresh one when it is
    /// unknown or its task has already shut down.
    pub fn get_or_create(
        &mut self,
        room_id: &str,
        config: &ServerConfig,
        directory: &SharedRoomManager,
    ) -> RoomHandle {
        if let Some(handle) = self.rooms.get(room_id)
            && !handle.is_closed()
        {
            return handle.clone();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = RoomHandle {
            instance: Uuid::new_v4(),
            commands: tx,
            participants: Arc::new(AtomicUsize::new(0)),
        };
        spawn_room_loop(RoomLoop {
            instance: handle.instance,
            coordinator: RoomCoordinator::new(
                room_id.to_string(),
                config.room_config(),
                config.word_bank(),
            ),
            commands: rx,
            self_sender: handle.commands.downgrade(),
            tick_interval: config.tick_interval(),
            participants: Arc::clone(&handle.participants),
            directory: Arc::clone(directory),
        });
        self.rooms.insert(room_id.to_string(), handle.clone());
        tracing::debug!(room = %room_id, instance = %handle.instance, "Room created");
        handle
    }

    pub fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms
            .get(room_id)
            .filter(|h| !h.is_closed())
            .cloned()
    }

    /// Drop the entry for `room_id` only if it still points at `instance`,
    /// so a room recreated under the same id is left alone.
    pub fn remove_if_instance(&mut self, room_id: &str, instance: Uuid) -> bool {
        if self
            .rooms
            .get(room_id)
            .is_some_and(|h| h.instance == instance)
        {
            self.rooms.remove(room_id);
            return true;
        }
        false
    }

    /// Returns (active rooms, connected participants).
    pub fn stats(&self) -> (usize, usize) {
        let live = self.rooms.values().filter(|h| !h.is_closed());
        live.fold((0, 0), |(rooms, players), h| {
            (rooms + 1, players + h.participants())
        })
    }
}
