use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use doodle_core::net::messages::{ClientMessage, ServerMessage};
use doodle_core::net::protocol::encode_server_message;
use doodle_core::participant::ParticipantId;
use doodle_core::round::Generation;

use crate::coordinator::{
    Effects, JoinError, Outbound, Recipient, RoomCoordinator, RoomFault, RoomSnapshot,
    TimerChange,
};
use crate::state::SharedRoomManager;

/// Outbound frame queue for one connection.
pub type PlayerSender = mpsc::Sender<Utf8Bytes>;

/// Everything a room task can be asked to do. Processed strictly in order.
pub enum RoomCommand {
    Join {
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<ParticipantId, JoinError>>,
    },
    Inbound {
        participant: ParticipantId,
        message: ClientMessage,
    },
    Leave {
        participant: ParticipantId,
    },
    Tick {
        generation: Generation,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
}

/// Wiring for one spawned room task.
pub struct RoomLoop {
    pub instance: Uuid,
    pub coordinator: RoomCoordinator,
    pub commands: mpsc::UnboundedReceiver<RoomCommand>,
    /// Handed to the round timer so it never keeps the room alive.
    pub self_sender: mpsc::WeakUnboundedSender<RoomCommand>,
    pub tick_interval: Duration,
    pub participants: Arc<AtomicUsize>,
    pub directory: SharedRoomManager,
}

struct RoomTask {
    coordinator: RoomCoordinator,
    senders: HashMap<ParticipantId, PlayerSender>,
    timer: Option<JoinHandle<()>>,
    self_sender: mpsc::WeakUnboundedSender<RoomCommand>,
    tick_interval: Duration,
    participants: Arc<AtomicUsize>,
}

/// Spawn the task that owns a room until its last participant leaves.
pub fn spawn_room_loop(room: RoomLoop) -> JoinHandle<()> {
    tokio::spawn(run_room(room))
}

async fn run_room(room: RoomLoop) {
    let RoomLoop {
        instance,
        coordinator,
        mut commands,
        self_sender,
        tick_interval,
        participants,
        directory,
    } = room;
    let room_id = coordinator.room_id().to_string();
    tracing::info!(room = %room_id, %instance, "Room opened");

    let mut task = RoomTask {
        coordinator,
        senders: HashMap::new(),
        timer: None,
        self_sender,
        tick_interval,
        participants,
    };

    while let Some(cmd) = commands.recv().await {
        match task.apply(cmd) {
            Ok(true) => {},
            Ok(false) => break,
            Err(fault) => {
                tracing::error!(room = %room_id, error = %fault, "Room fault, closing room");
                task.broadcast_failure();
                break;
            },
        }
    }

    task.stop_timer();
    // Late joiners waiting on a reply see RoomClosed and retry elsewhere.
    commands.close();
    while commands.recv().await.is_some() {}
    task.senders.clear();
    task.participants.store(0, Ordering::Relaxed);

    directory.write().await.remove_if_instance(&room_id, instance);
    tracing::info!(room = %room_id, %instance, "Room closed");
}

impl RoomTask {
    /// Returns `Ok(false)` once the room should shut down.
    fn apply(&mut self, cmd: RoomCommand) -> Result<bool, RoomFault> {
        let now = Instant::now().into_std();
        match cmd {
            RoomCommand::Join {
                name,
                sender,
                reply,
            } => match self.coordinator.join(name, now) {
                Ok((id, effects)) => {
                    self.senders.insert(id, sender);
                    self.sync_count();
                    self.apply_effects(effects);
                    if reply.send(Ok(id)).is_err() {
                        // Connection went away before it learned its id
                        return Ok(self.leave(id));
                    }
                },
                Err(JoinError::Fault(fault)) => {
                    let _ = reply.send(Err(JoinError::RoomClosed));
                    return Err(fault);
                },
                Err(e) => {
                    let _ = reply.send(Err(e));
                },
            },
            RoomCommand::Inbound {
                participant,
                message,
            } => {
                let effects = self.coordinator.handle(participant, message, now)?;
                self.apply_effects(effects);
            },
            RoomCommand::Leave { participant } => return Ok(self.leave(participant)),
            RoomCommand::Tick { generation } => {
                let effects = self.coordinator.tick(generation, now);
                self.apply_effects(effects);
            },
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.coordinator.snapshot(now));
            },
        }
        Ok(true)
    }

    /// Returns false when the room is now empty.
    fn leave(&mut self, id: ParticipantId) -> bool {
        self.senders.remove(&id);
        let effects = self.coordinator.leave(id);
        self.sync_count();
        self.apply_effects(effects);
        !self.coordinator.is_empty()
    }

    fn sync_count(&self) {
        self.participants
            .store(self.coordinator.connected_count(), Ordering::Relaxed);
    }

    fn apply_effects(&mut self, effects: Effects) {
        match effects.timer {
            Some(TimerChange::Start {
                generation,
                deadline,
            }) => {
                self.stop_timer();
                self.timer = Some(spawn_round_timer(
                    generation,
                    self.tick_interval,
                    Instant::from_std(deadline),
                    self.self_sender.clone(),
                ));
            },
            Some(TimerChange::Stop) => self.stop_timer(),
            None => {},
        }
        for outbound in effects.outbound {
            self.deliver(outbound);
        }
    }

    fn stop_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    /// Encode once, then fan out. A full queue drops the frame for that
    /// connection only.
    fn deliver(&self, Outbound { to, message }: Outbound) {
        let frame = match encode_server_message(&message) {
            Ok(text) => Utf8Bytes::from(text),
            Err(e) => {
                tracing::warn!(
                    room = %self.coordinator.room_id(),
                    kind = message.type_name(),
                    error = %e,
                    "Failed to encode outbound message"
                );
                return;
            },
        };
        for (id, tx) in &self.senders {
            if !to.includes(*id) {
                continue;
            }
            if tx.try_send(frame.clone()).is_err() {
                tracing::debug!(
                    room = %self.coordinator.room_id(),
                    participant = id,
                    kind = message.type_name(),
                    "Dropped message for slow or disconnected client"
                );
            }
        }
    }

    fn broadcast_failure(&self) {
        self.deliver(Outbound {
            to: Recipient::All,
            message: ServerMessage::Error {
                message: "room failure".to_string(),
            },
        });
    }
}

/// Feed `Tick` commands into the room every `period` until the deadline,
/// plus one at the deadline itself. Ends quietly once the room is gone.
pub fn spawn_round_timer(
    generation: Generation,
    period: Duration,
    deadline: Instant,
    commands: mpsc::WeakUnboundedSender<RoomCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let expiry = tokio::time::sleep_until(deadline);
        tokio::pin!(expiry);

        loop {
            let last = tokio::select! {
                _ = interval.tick() => false,
                () = &mut expiry => true,
            };
            let Some(tx) = commands.upgrade() else {
                break;
            };
            if tx.send(RoomCommand::Tick { generation }).is_err() || last {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::room_manager::RoomManager;
    use doodle_core::room::RoundState;
    use doodle_core::round::EndReason;
    use doodle_core::test_helpers::{fixed_words, room_config};
    use tokio::sync::RwLock;

    struct Harness {
        tx: mpsc::UnboundedSender<RoomCommand>,
        directory: SharedRoomManager,
        handle: JoinHandle<()>,
    }

    fn spawn_test_room(round_secs: u64, tick: Duration) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let directory = Arc::new(RwLock::new(RoomManager::new()));
        let handle = spawn_room_loop(RoomLoop {
            instance: Uuid::new_v4(),
            coordinator: RoomCoordinator::new(
                "room1".into(),
                room_config(round_secs),
                fixed_words("cat"),
            ),
            commands: rx,
            self_sender: tx.downgrade(),
            tick_interval: tick,
            participants: Arc::new(AtomicUsize::new(0)),
            directory: Arc::clone(&directory),
        });
        Harness {
            tx,
            directory,
            handle,
        }
    }

    async fn join(
        tx: &mpsc::UnboundedSender<RoomCommand>,
        name: &str,
    ) -> (ParticipantId, mpsc::Receiver<Utf8Bytes>) {
        let (sender, rx) = mpsc::channel(64);
        let (reply, reply_rx) = oneshot::channel();
        tx.send(RoomCommand::Join {
            name: name.to_string(),
            sender,
            reply,
        })
        .ok()
        .unwrap();
        (reply_rx.await.unwrap().unwrap(), rx)
    }

    fn decode(frame: Utf8Bytes) -> ServerMessage {
        doodle_core::net::protocol::decode_server_message(frame.as_str()).unwrap()
    }

    async fn next_message(rx: &mut mpsc::Receiver<Utf8Bytes>) -> ServerMessage {
        decode(rx.recv().await.unwrap())
    }

    /// Skip countdown frames.
    async fn next_non_tick(rx: &mut mpsc::Receiver<Utf8Bytes>) -> ServerMessage {
        loop {
            let msg = next_message(rx).await;
            if !matches!(msg, ServerMessage::TimeUpdate { .. }) {
                return msg;
            }
        }
    }

    async fn snapshot(tx: &mpsc::UnboundedSender<RoomCommand>) -> RoomSnapshot {
        let (reply, rx) = oneshot::channel();
        tx.send(RoomCommand::Snapshot { reply }).ok().unwrap();
        rx.await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn round_times_out_on_server_clock() {
        let room = spawn_test_room(3, Duration::from_secs(1));
        let (alice, mut alice_rx) = join(&room.tx, "Alice").await;
        let (_bob, mut bob_rx) = join(&room.tx, "Bob").await;

        room.tx
            .send(RoomCommand::Inbound {
                participant: alice,
                message: ClientMessage::NewRound,
            })
            .ok()
            .unwrap();

        let mut countdown = Vec::new();
        let ended = loop {
            match next_message(&mut bob_rx).await {
                ServerMessage::TimeUpdate { time_left } => countdown.push(time_left),
                msg @ ServerMessage::RoundEnd { .. } => break msg,
                _ => {},
            }
        };
        assert_eq!(countdown, vec![3, 2, 1, 0]);
        assert_eq!(
            ended,
            ServerMessage::RoundEnd {
                word: "cat".into(),
                reason: Some(EndReason::Timeout)
            }
        );

        let snap = snapshot(&room.tx).await;
        assert_eq!(snap.round_state, RoundState::Ended);
        assert_eq!(snap.scores.get("Bob"), 0);

        // Alice saw the word privately
        let mut saw_word = false;
        while let Ok(frame) = alice_rx.try_recv() {
            if matches!(decode(frame), ServerMessage::Word { .. }) {
                saw_word = true;
            }
        }
        assert!(saw_word);
    }

    #[tokio::test(start_paused = true)]
    async fn correct_guess_stops_timer() {
        let room = spawn_test_room(5, Duration::from_secs(1));
        let (alice, _alice_rx) = join(&room.tx, "Alice").await;
        let (bob, mut bob_rx) = join(&room.tx, "Bob").await;

        room.tx
            .send(RoomCommand::Inbound {
                participant: alice,
                message: ClientMessage::NewRound,
            })
            .ok()
            .unwrap();
        room.tx
            .send(RoomCommand::Inbound {
                participant: bob,
                message: ClientMessage::Guess {
                    guess: "CAT".into(),
                },
            })
            .ok()
            .unwrap();

        loop {
            if let ServerMessage::CorrectGuess { player_id, .. } = next_non_tick(&mut bob_rx).await
            {
                assert_eq!(player_id, "Bob");
                break;
            }
        }

        tokio::time::sleep(Duration::from_secs(10)).await;
        while let Ok(frame) = bob_rx.try_recv() {
            let msg = decode(frame);
            assert!(
                !matches!(
                    msg,
                    ServerMessage::RoundEnd { .. } | ServerMessage::TimeUpdate { .. }
                ),
                "timer fired after correct guess: {msg:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn last_leave_closes_room_and_rejects_joins() {
        let room = spawn_test_room(60, Duration::from_secs(1));
        let (alice, _alice_rx) = join(&room.tx, "Alice").await;

        room.tx
            .send(RoomCommand::Leave { participant: alice })
            .ok()
            .unwrap();
        room.handle.await.unwrap();

        let (sender, _rx) = mpsc::channel(4);
        let (reply, _reply_rx) = oneshot::channel();
        assert!(
            room.tx
                .send(RoomCommand::Join {
                    name: "Bob".into(),
                    sender,
                    reply,
                })
                .is_err()
        );
        assert_eq!(room.directory.read().await.stats(), (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_client_does_not_block_room() {
        let room = spawn_test_room(60, Duration::from_secs(1));
        let (sender, _never_read) = mpsc::channel(1);
        let (reply, reply_rx) = oneshot::channel();
        room.tx
            .send(RoomCommand::Join {
                name: "Sleepy".into(),
                sender,
                reply,
            })
            .ok()
            .unwrap();
        reply_rx.await.unwrap().unwrap();

        let (alice, mut alice_rx) = join(&room.tx, "Alice").await;
        for _ in 0..10 {
            room.tx
                .send(RoomCommand::Inbound {
                    participant: alice,
                    message: ClientMessage::Guess {
                        guess: "hello".into(),
                    },
                })
                .ok()
                .unwrap();
        }
        let snap = snapshot(&room.tx).await;
        assert_eq!(snap.participants.len(), 2);

        let mut chats = 0;
        while let Ok(frame) = alice_rx.try_recv() {
            if matches!(decode(frame), ServerMessage::Guess { .. }) {
                chats += 1;
            }
        }
        assert_eq!(chats, 10);
    }

    #[tokio::test]
    async fn timer_stops_when_room_is_gone() {
        let (tx, mut rx) = mpsc::unbounded_channel::<RoomCommand>();
        let handle = spawn_round_timer(
            7,
            Duration::from_millis(10),
            Instant::now() + Duration::from_secs(60),
            tx.downgrade(),
        );
        let Some(RoomCommand::Tick { generation }) = rx.recv().await else {
            panic!("expected tick");
        };
        assert_eq!(generation, 7);
        drop(tx);
        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn server_config_room_defaults_line_up() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.room_config().round_duration, Duration::from_secs(60));
    }
}
