use std::time::Instant;

use serde::Serialize;

use doodle_core::net::messages::{ClientMessage, ServerMessage};
use doodle_core::participant::ParticipantId;
use doodle_core::registry::Registry;
use doodle_core::room::{RoomConfig, RoomId, RoundState};
use doodle_core::round::{
    EndReason, Generation, GuessOutcome, RoundEnded, RoundMachine, TimerOutcome,
};
use doodle_core::scoreboard::Scoreboard;
use doodle_core::stroke::StrokeRelay;
use doodle_core::words::WordBank;

/// Who an outbound message is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    All,
    Only(ParticipantId),
    AllExcept(ParticipantId),
}

impl Recipient {
    pub fn includes(self, id: ParticipantId) -> bool {
        match self {
            Self::All => true,
            Self::Only(target) => target == id,
            Self::AllExcept(excluded) => excluded != id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub message: ServerMessage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerChange {
    Start {
        generation: Generation,
        deadline: Instant,
    },
    Stop,
}

/// Result of processing one event: messages in delivery order plus what to
/// do with the round timer.
#[derive(Debug, Default)]
pub struct Effects {
    pub outbound: Vec<Outbound>,
    pub timer: Option<TimerChange>,
}

impl Effects {
    fn all(&mut self, message: ServerMessage) {
        self.outbound.push(Outbound {
            to: Recipient::All,
            message,
        });
    }

    fn only(&mut self, id: ParticipantId, message: ServerMessage) {
        self.outbound.push(Outbound {
            to: Recipient::Only(id),
            message,
        });
    }

    fn others(&mut self, id: ParticipantId, message: ServerMessage) {
        self.outbound.push(Outbound {
            to: Recipient::AllExcept(id),
            message,
        });
    }

    /// Messages `id` would receive, in order.
    pub fn messages_for(&self, id: ParticipantId) -> impl Iterator<Item = &ServerMessage> {
        self.outbound
            .iter()
            .filter(move |o| o.to.includes(id))
            .map(|o| &o.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("room is full")]
    RoomFull,
    #[error("room closed")]
    RoomClosed,
    #[error(transparent)]
    Fault(#[from] RoomFault),
}

/// A broken internal invariant. The room cannot continue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomFault {
    #[error("participant {0} is not registered")]
    UnknownParticipant(ParticipantId),
}

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantSummary {
    pub name: String,
    pub connected: bool,
}

/// Read-only view of a room for the HTTP API. Never carries the word.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub participants: Vec<ParticipantSummary>,
    pub round_state: RoundState,
    pub drawer: Option<String>,
    pub time_left: u64,
    /// Outcome of the most recent round, if it has ended.
    pub winner: Option<String>,
    pub end_reason: Option<EndReason>,
    pub scores: Scoreboard,
}

/// All state for one room. Every mutation goes through `&mut self`, so a
/// single owner processing events one at a time gives a total order.
pub struct RoomCoordinator {
    room_id: RoomId,
    config: RoomConfig,
    registry: Registry,
    round: RoundMachine,
    scores: Scoreboard,
    relay: StrokeRelay,
    words: WordBank,
}

impl RoomCoordinator {
    pub fn new(room_id: RoomId, config: RoomConfig, words: WordBank) -> Self {
        Self {
            round: RoundMachine::new(config.round_duration, config.base_score),
            relay: StrokeRelay::new(config.replay_limit),
            room_id,
            config,
            registry: Registry::new(),
            scores: Scoreboard::new(),
            words,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn is_empty(&self) -> bool {
        self.registry.connected_count() == 0
    }

    pub fn connected_count(&self) -> usize {
        self.registry.connected_count()
    }

    fn name(&self, id: ParticipantId) -> Result<String, RoomFault> {
        self.registry
            .name_of(id)
            .map(str::to_string)
            .ok_or(RoomFault::UnknownParticipant(id))
    }

    /// Admit a participant. Everyone gets the scoreboard; a mid-round joiner
    /// also gets the round header and the canvas so far.
    pub fn join(
        &mut self,
        display_name: String,
        now: Instant,
    ) -> Result<(ParticipantId, Effects), JoinError> {
        if self.registry.connected_count() >= self.config.max_participants {
            return Err(JoinError::RoomFull);
        }

        let name = self.registry.unique_name(&display_name);
        if name != display_name {
            tracing::debug!(
                room = %self.room_id,
                requested = %display_name,
                assigned = %name,
                "Display name taken"
            );
        }
        self.scores.ensure(&name);
        let id = self.registry.join(name);
        let mut effects = Effects::default();
        effects.all(ServerMessage::ScoresUpdate {
            scores: self.scores.clone(),
        });

        if let Some(drawer) = self.round.active_drawer() {
            let drawer_name = self.name(drawer)?;
            effects.only(
                id,
                ServerMessage::RoundStart {
                    drawer: drawer_name.clone(),
                },
            );
            effects.only(
                id,
                ServerMessage::TimeUpdate {
                    time_left: self.round.time_left(now),
                },
            );
            for stroke in self.relay.replay() {
                effects.only(
                    id,
                    ServerMessage::Draw {
                        data: stroke.clone(),
                        player_id: drawer_name.clone(),
                    },
                );
            }
        }

        tracing::info!(room = %self.room_id, participant = id, "Participant joined");
        Ok((id, effects))
    }

    /// Mark a participant gone. Aborts the round if they were drawing.
    pub fn leave(&mut self, id: ParticipantId) -> Effects {
        let mut effects = Effects::default();
        let Some(participant) = self.registry.mark_gone(id) else {
            return effects;
        };
        let name = participant.display_name.clone();
        tracing::info!(room = %self.room_id, participant = id, player = %name, "Participant left");

        effects.all(ServerMessage::PlayerLeft { player_id: name });
        if let Some(ended) = self.round.abort_if_drawer(id) {
            self.round_ended(ended, &mut effects);
        }
        effects.all(ServerMessage::ScoresUpdate {
            scores: self.scores.clone(),
        });
        effects
    }

    /// Apply one inbound client message.
    pub fn handle(
        &mut self,
        from: ParticipantId,
        message: ClientMessage,
        now: Instant,
    ) -> Result<Effects, RoomFault> {
        let mut effects = Effects::default();
        if !self.registry.is_connected(from) {
            return Ok(effects);
        }
        tracing::trace!(
            room = %self.room_id,
            participant = from,
            kind = message.type_name(),
            "Inbound message"
        );

        match message {
            ClientMessage::NewRound => self.start_round(from, now, &mut effects)?,
            ClientMessage::Guess { guess } => self.guess(from, guess, now, &mut effects)?,
            ClientMessage::Draw { data } => {
                if let Some(stroke) = self
                    .relay
                    .relay_stroke(from, self.round.active_drawer(), data)
                {
                    effects.others(
                        from,
                        ServerMessage::Draw {
                            data: stroke,
                            player_id: self.name(from)?,
                        },
                    );
                }
            },
            ClientMessage::ClearCanvas => {
                if self.relay.relay_clear(from, self.round.active_drawer()) {
                    effects.others(from, ServerMessage::ClearCanvas);
                }
            },
            ClientMessage::RoundEnd { .. } => match self.round.expire_if_due(now) {
                Some(ended) => self.round_ended(ended, &mut effects),
                None => {
                    tracing::debug!(
                        room = %self.room_id,
                        participant = from,
                        "Ignoring client round_end before deadline"
                    );
                },
            },
        }
        Ok(effects)
    }

    /// Handle a round timer tick.
    pub fn tick(&mut self, generation: Generation, now: Instant) -> Effects {
        let mut effects = Effects::default();
        match self.round.on_timer(generation, now) {
            TimerOutcome::Stale => {},
            TimerOutcome::Tick { time_left } => {
                effects.all(ServerMessage::TimeUpdate { time_left });
            },
            TimerOutcome::Expired(ended) => {
                effects.all(ServerMessage::TimeUpdate { time_left: 0 });
                self.round_ended(ended, &mut effects);
            },
        }
        effects
    }

    pub fn snapshot(&self, now: Instant) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.room_id.clone(),
            participants: self
                .registry
                .all()
                .iter()
                .map(|p| ParticipantSummary {
                    name: p.display_name.clone(),
                    connected: p.connected,
                })
                .collect(),
            round_state: self.round.state(),
            drawer: self
                .round
                .active_drawer()
                .and_then(|id| self.registry.name_of(id))
                .map(str::to_string),
            time_left: self.round.time_left(now),
            winner: self
                .round
                .winner()
                .and_then(|id| self.registry.name_of(id))
                .map(str::to_string),
            end_reason: self.round.end_reason(),
            scores: self.scores.clone(),
        }
    }

    fn start_round(
        &mut self,
        requester: ParticipantId,
        now: Instant,
        effects: &mut Effects,
    ) -> Result<(), RoomFault> {
        if self.round.is_active() {
            tracing::debug!(room = %self.room_id, participant = requester, "Round already active");
            return Ok(());
        }
        let Some(drawer) = self
            .registry
            .next_drawer(self.round.last_drawer(), requester)
        else {
            return Ok(());
        };
        let drawer_name = self.name(drawer)?;
        let word = self.words.draw(&mut rand::rng());
        let Some(started) = self.round.start(drawer, word, now) else {
            tracing::warn!(
                room = %self.room_id,
                duration = ?self.config.round_duration,
                "Round deadline out of range, not starting"
            );
            return Ok(());
        };
        self.relay.clear();

        tracing::info!(
            room = %self.room_id,
            generation = started.generation,
            drawer = %drawer_name,
            "Round started"
        );
        effects.all(ServerMessage::RoundStart {
            drawer: drawer_name,
        });
        if let Some(word) = self.round.word_for(drawer) {
            effects.only(
                drawer,
                ServerMessage::Word {
                    word: word.to_string(),
                },
            );
        }
        effects.all(ServerMessage::TimeUpdate {
            time_left: self.round.time_left(now),
        });
        effects.timer = Some(TimerChange::Start {
            generation: started.generation,
            deadline: started.deadline,
        });
        Ok(())
    }

    fn guess(
        &mut self,
        from: ParticipantId,
        text: String,
        now: Instant,
        effects: &mut Effects,
    ) -> Result<(), RoomFault> {
        let name = self.name(from)?;
        match self.round.adjudicate(from, &text, now) {
            GuessOutcome::NotActive => {
                effects.all(ServerMessage::Guess {
                    player_id: name,
                    guess: text,
                });
            },
            GuessOutcome::FromDrawer => {
                tracing::debug!(room = %self.room_id, participant = from, "Ignoring guess from drawer");
            },
            GuessOutcome::Incorrect => {
                effects.all(ServerMessage::Guess {
                    player_id: name,
                    guess: text,
                });
                effects.only(from, ServerMessage::WrongGuess);
            },
            GuessOutcome::Correct {
                generation,
                word,
                points,
            } => {
                let total = self.scores.award(&name, points);
                tracing::info!(
                    room = %self.room_id,
                    generation,
                    player = %name,
                    points,
                    total,
                    "Correct guess"
                );
                self.relay.clear();
                effects.all(ServerMessage::CorrectGuess {
                    player_id: name,
                    word,
                    scores: self.scores.clone(),
                });
                effects.timer = Some(TimerChange::Stop);
            },
            GuessOutcome::Expired(ended) => {
                self.round_ended(ended, effects);
                effects.all(ServerMessage::Guess {
                    player_id: name,
                    guess: text,
                });
            },
        }
        Ok(())
    }

    fn round_ended(&mut self, ended: RoundEnded, effects: &mut Effects) {
        tracing::info!(
            room = %self.room_id,
            generation = ended.generation,
            reason = ?ended.reason,
            "Round ended"
        );
        self.relay.clear();
        effects.all(ServerMessage::RoundEnd {
            word: ended.word,
            reason: Some(ended.reason),
        });
        effects.timer = Some(TimerChange::Stop);
    }
}
