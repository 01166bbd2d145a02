use serde::{Deserialize, Serialize};

use crate::round::EndReason;
use crate::scoreboard::Scoreboard;
use crate::stroke::Stroke;

/// Messages sent from a browser client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    NewRound,
    Guess {
        guess: String,
    },
    Draw {
        data: Stroke,
    },
    ClearCanvas,
    /// Client-side countdown reached zero. Only a hint; the server rechecks
    /// its own deadline.
    RoundEnd {
        #[serde(default)]
        word: Option<String>,
    },
}

impl ClientMessage {
    /// Wire `type` tags accepted from clients.
    pub const TYPES: &'static [&'static str] =
        &["new_round", "guess", "draw", "clear_canvas", "round_end"];

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::NewRound => "new_round",
            Self::Guess { .. } => "guess",
            Self::Draw { .. } => "draw",
            Self::ClearCanvas => "clear_canvas",
            Self::RoundEnd { .. } => "round_end",
        }
    }
}

/// Messages sent from the server to clients. Player references are display
/// names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoundStart {
        drawer: String,
    },
    /// Private to the drawer.
    Word {
        word: String,
    },
    Draw {
        data: Stroke,
        player_id: String,
    },
    ClearCanvas,
    Guess {
        player_id: String,
        guess: String,
    },
    /// Private to the guesser.
    WrongGuess,
    CorrectGuess {
        player_id: String,
        word: String,
        scores: Scoreboard,
    },
    RoundEnd {
        word: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<EndReason>,
    },
    TimeUpdate {
        #[serde(rename = "timeLeft")]
        time_left: u64,
    },
    ScoresUpdate {
        scores: Scoreboard,
    },
    PlayerLeft {
        player_id: String,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::RoundStart { .. } => "round_start",
            Self::Word { .. } => "word",
            Self::Draw { .. } => "draw",
            Self::ClearCanvas => "clear_canvas",
            Self::Guess { .. } => "guess",
            Self::WrongGuess => "wrong_guess",
            Self::CorrectGuess { .. } => "correct_guess",
            Self::RoundEnd { .. } => "round_end",
            Self::TimeUpdate { .. } => "time_update",
            Self::ScoresUpdate { .. } => "scores_update",
            Self::PlayerLeft { .. } => "player_left",
            Self::Error { .. } => "error",
        }
    }
}
