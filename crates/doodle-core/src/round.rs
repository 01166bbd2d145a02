use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::participant::ParticipantId;
use crate::room::RoundState;

/// Incremented on every round start. Timer ticks carry the generation they
/// were armed for so a tick from a finished round can be recognised.
pub type Generation = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Timeout,
    CorrectGuess,
    Aborted,
}

#[derive(Debug, Clone)]
struct Round {
    drawer: ParticipantId,
    word: String,
    deadline: Instant,
    winner: Option<ParticipantId>,
    end_reason: Option<EndReason>,
}

/// Emitted when a round becomes Active. The word stays behind
/// [`RoundMachine::word_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundStarted {
    pub generation: Generation,
    pub deadline: Instant,
}

/// Emitted on every Active -> Ended transition, exactly once per round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundEnded {
    pub generation: Generation,
    pub drawer: ParticipantId,
    pub word: String,
    pub reason: EndReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    /// No round in progress; the text is plain chat.
    NotActive,
    /// The drawer guessed; ignored.
    FromDrawer,
    Incorrect,
    Correct {
        generation: Generation,
        word: String,
        points: u32,
    },
    /// The deadline had already passed; the round ended on timeout before
    /// this guess was looked at.
    Expired(RoundEnded),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOutcome {
    Stale,
    Tick { time_left: u64 },
    Expired(RoundEnded),
}

/// Authoritative round lifecycle for one room.
#[derive(Debug, Clone)]
pub struct RoundMachine {
    state: RoundState,
    round: Option<Round>,
    generation: Generation,
    duration: Duration,
    base_score: u32,
}

impl RoundMachine {
    pub fn new(duration: Duration, base_score: u32) -> Self {
        Self {
            state: RoundState::Idle,
            round: None,
            generation: 0,
            duration,
            base_score,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.state == RoundState::Active
    }

    /// Begin a round. Returns `None` if one is already Active or the
    /// deadline is not representable.
    pub fn start(
        &mut self,
        drawer: ParticipantId,
        word: String,
        now: Instant,
    ) -> Option<RoundStarted> {
        if self.is_active() {
            return None;
        }
        let deadline = now.checked_add(self.duration)?;
        self.generation += 1;
        self.round = Some(Round {
            drawer,
            word,
            deadline,
            winner: None,
            end_reason: None,
        });
        self.state = RoundState::Active;
        Some(RoundStarted {
            generation: self.generation,
            deadline,
        })
    }

    /// Judge one guess. Callers must feed guesses in arrival order; the first
    /// match ends the round so every later one sees `NotActive`.
    pub fn adjudicate(&mut self, guesser: ParticipantId, text: &str, now: Instant) -> GuessOutcome {
        if !self.is_active() {
            return GuessOutcome::NotActive;
        }
        if let Some(ended) = self.expire_if_due(now) {
            return GuessOutcome::Expired(ended);
        }
        let Some(round) = self.round.as_mut() else {
            return GuessOutcome::NotActive;
        };
        if round.drawer == guesser {
            return GuessOutcome::FromDrawer;
        }
        if !matches_word(text, &round.word) {
            return GuessOutcome::Incorrect;
        }

        let remaining = round.deadline.saturating_duration_since(now);
        let points = score_for(self.base_score, remaining, self.duration);
        round.winner = Some(guesser);
        round.end_reason = Some(EndReason::CorrectGuess);
        self.state = RoundState::Ended;
        GuessOutcome::Correct {
            generation: self.generation,
            word: round.word.clone(),
            points,
        }
    }

    /// Handle a timer tick armed for `generation`.
    pub fn on_timer(&mut self, generation: Generation, now: Instant) -> TimerOutcome {
        if generation != self.generation || !self.is_active() {
            return TimerOutcome::Stale;
        }
        match self.expire_if_due(now) {
            Some(ended) => TimerOutcome::Expired(ended),
            None => TimerOutcome::Tick {
                time_left: self.time_left(now),
            },
        }
    }

    /// End the round on timeout if its deadline has passed.
    pub fn expire_if_due(&mut self, now: Instant) -> Option<RoundEnded> {
        let due = self
            .round
            .as_ref()
            .is_some_and(|r| self.state == RoundState::Active && now >= r.deadline);
        if !due {
            return None;
        }
        self.end(EndReason::Timeout)
    }

    /// End the round as aborted if `id` is the active drawer.
    pub fn abort_if_drawer(&mut self, id: ParticipantId) -> Option<RoundEnded> {
        if self.active_drawer() != Some(id) {
            return None;
        }
        self.end(EndReason::Aborted)
    }

    fn end(&mut self, reason: EndReason) -> Option<RoundEnded> {
        let round = self.round.as_mut()?;
        round.end_reason = Some(reason);
        self.state = RoundState::Ended;
        Some(RoundEnded {
            generation: self.generation,
            drawer: round.drawer,
            word: round.word.clone(),
            reason,
        })
    }

    /// Whole seconds until the deadline, rounded up. Zero unless Active.
    pub fn time_left(&self, now: Instant) -> u64 {
        match (&self.round, self.state) {
            (Some(round), RoundState::Active) => {
                let remaining = round.deadline.saturating_duration_since(now);
                remaining.as_millis().div_ceil(1000) as u64
            },
            _ => 0,
        }
    }

    /// Drawer of the round in progress.
    pub fn active_drawer(&self) -> Option<ParticipantId> {
        match (&self.round, self.state) {
            (Some(round), RoundState::Active) => Some(round.drawer),
            _ => None,
        }
    }

    /// Drawer of the most recent round, active or not. Drives rotation.
    pub fn last_drawer(&self) -> Option<ParticipantId> {
        self.round.as_ref().map(|r| r.drawer)
    }

    /// The secret word, but only for the active drawer.
    pub fn word_for(&self, id: ParticipantId) -> Option<&str> {
        match (&self.round, self.state) {
            (Some(round), RoundState::Active) if round.drawer == id => Some(&round.word),
            _ => None,
        }
    }

    pub fn winner(&self) -> Option<ParticipantId> {
        self.round.as_ref().and_then(|r| r.winner)
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.round.as_ref().and_then(|r| r.end_reason)
    }
}

/// Case-insensitive comparison after trimming surrounding whitespace.
pub fn matches_word(guess: &str, word: &str) -> bool {
    guess.trim().to_lowercase() == word.trim().to_lowercase()
}

/// `max(1, ceil(base * remaining / duration))`. Never decreases as
/// `remaining` grows.
pub fn score_for(base: u32, remaining: Duration, duration: Duration) -> u32 {
    let total = duration.as_millis();
    if total == 0 {
        return base.max(1);
    }
    let remaining = remaining.as_millis().min(total);
    let points = (u128::from(base) * remaining).div_ceil(total);
    u32::try_from(points).unwrap_or(u32::MAX).max(1)
}
