use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Room identifier. Opaque to the engine beyond the character-set check.
pub type RoomId = String;

pub const MAX_ROOM_ID_LEN: usize = 32;
pub const MAX_DISPLAY_NAME_LEN: usize = 32;
const GENERATED_ROOM_ID_LEN: usize = 6;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Per-room gameplay settings handed to each coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    pub round_duration: Duration,
    pub base_score: u32,
    pub max_participants: usize,
    /// Strokes kept since the last clear for late joiners.
    pub replay_limit: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(60),
            base_score: 10,
            max_participants: 16,
            replay_limit: 200,
        }
    }
}

/// Lifecycle of a room's current round, as reported in snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    Idle,
    Active,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomIdError {
    #[error("room id is empty")]
    Empty,
    #[error("room id longer than {MAX_ROOM_ID_LEN} characters")]
    TooLong,
    #[error("room id contains invalid character {0:?}")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("display name is empty")]
    Empty,
    #[error("display name longer than {MAX_DISPLAY_NAME_LEN} characters")]
    TooLong,
    #[error("display name contains control characters")]
    ControlChar,
}

/// Short lowercase base36 token in the format the lobby hands out.
pub fn generate_room_id() -> RoomId {
    let mut rng = rand::rng();
    (0..GENERATED_ROOM_ID_LEN)
        .map(|_| BASE36[rng.random_range(0..BASE36.len())] as char)
        .collect()
}

pub fn validate_room_id(id: &str) -> Result<(), RoomIdError> {
    if id.is_empty() {
        return Err(RoomIdError::Empty);
    }
    if id.chars().count() > MAX_ROOM_ID_LEN {
        return Err(RoomIdError::TooLong);
    }
    if let Some(bad) = id
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(RoomIdError::InvalidChar(bad));
    }
    Ok(())
}

/// Trim and check a display name, returning the normalized form.
pub fn validate_display_name(name: &str) -> Result<String, NameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(NameError::TooLong);
    }
    if name.chars().any(char::is_control) {
        return Err(NameError::ControlChar);
    }
    Ok(name.to_string())
}
