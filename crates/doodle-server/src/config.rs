use std::time::Duration;

use serde::Deserialize;

use doodle_core::net::protocol::MAX_MESSAGE_SIZE;
use doodle_core::room::RoomConfig;
use doodle_core::words::WordBank;

/// Longest round a room will run: one day.
pub const MAX_ROUND_SECS: u64 = 24 * 60 * 60;

/// Top-level server configuration, loaded from `doodle.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Origins allowed to open sessions (the lobby front end).
    pub cors_origins: Vec<String>,
    pub limits: LimitsConfig,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
            limits: LimitsConfig::default(),
            game: GameConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
    pub max_message_size: usize,
    pub max_room_participants: usize,
    /// Strokes retained per round for late joiners.
    pub stroke_replay_limit: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            ws_rate_limit_per_sec: 60.0,
            player_message_buffer: 256,
            max_message_size: MAX_MESSAGE_SIZE,
            max_room_participants: 16,
            stroke_replay_limit: 200,
        }
    }
}

/// Round rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub round_duration_secs: u64,
    pub tick_interval_ms: u64,
    pub base_score: u32,
    pub word_history: usize,
    pub words: Option<Vec<String>>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 60,
            tick_interval_ms: 1000,
            base_score: 10,
            word_history: 5,
            words: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("listen_addr {0:?} is not a valid socket address")]
    InvalidListenAddr(String),
    #[error("{0} must be > 0")]
    Zero(&'static str),
    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },
    #[error("game.words is set but contains no usable words")]
    EmptyWordList,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidListenAddr(self.listen_addr.clone()));
        }

        if self.limits.max_ws_connections == 0 {
            return Err(ConfigError::Zero("limits.max_ws_connections"));
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            return Err(ConfigError::Zero("limits.ws_rate_limit_per_sec"));
        }
        if self.limits.player_message_buffer == 0 {
            return Err(ConfigError::Zero("limits.player_message_buffer"));
        }
        if self.limits.max_message_size == 0 {
            return Err(ConfigError::Zero("limits.max_message_size"));
        }
        if self.limits.max_room_participants == 0 {
            return Err(ConfigError::Zero("limits.max_room_participants"));
        }

        if self.game.round_duration_secs == 0 {
            return Err(ConfigError::Zero("game.round_duration_secs"));
        }
        if self.game.round_duration_secs > MAX_ROUND_SECS {
            return Err(ConfigError::TooLarge {
                field: "game.round_duration_secs",
                max: MAX_ROUND_SECS,
            });
        }
        if self.game.tick_interval_ms == 0 {
            return Err(ConfigError::Zero("game.tick_interval_ms"));
        }
        if self.game.tick_interval_ms > MAX_ROUND_SECS * 1000 {
            return Err(ConfigError::TooLarge {
                field: "game.tick_interval_ms",
                max: MAX_ROUND_SECS * 1000,
            });
        }
        if self.game.base_score == 0 {
            return Err(ConfigError::Zero("game.base_score"));
        }
        if let Some(words) = &self.game.words
            && WordBank::new(words.clone(), 0).is_err()
        {
            return Err(ConfigError::EmptyWordList);
        }

        if self.limits.stroke_replay_limit >= self.limits.player_message_buffer {
            tracing::warn!(
                replay = self.limits.stroke_replay_limit,
                buffer = self.limits.player_message_buffer,
                "stroke_replay_limit does not fit in player_message_buffer, late joiners may miss strokes"
            );
        }
        if self.cors_origins.is_empty() {
            tracing::warn!("cors_origins is empty, browsers on other origins cannot connect");
        }
        Ok(())
    }

    /// Per-room rules derived from this config.
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            round_duration: Duration::from_secs(self.game.round_duration_secs),
            base_score: self.game.base_score,
            max_participants: self.limits.max_room_participants,
            replay_limit: self.limits.stroke_replay_limit,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.game.tick_interval_ms)
    }

    /// A fresh word bank for one room.
    pub fn word_bank(&self) -> WordBank {
        let Some(words) = &self.game.words else {
            return WordBank::with_defaults(self.game.word_history);
        };
        match WordBank::new(words.clone(), self.game.word_history) {
            Ok(bank) => bank,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid custom word list, using built-in words");
                WordBank::with_defaults(self.game.word_history)
            },
        }
    }

    /// Load config from `doodle.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("doodle.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from doodle.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse doodle.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No doodle.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("DOODLE_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(origins) = std::env::var("DOODLE_CORS_ORIGINS")
            && !origins.is_empty()
        {
            config.cors_origins = parse_origins(&origins);
        }
        if let Ok(val) = std::env::var("DOODLE_ROUND_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.game.round_duration_secs = n;
        }
        if let Ok(val) = std::env::var("DOODLE_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("DOODLE_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            config.limits.ws_rate_limit_per_sec = n;
        }

        config
    }
}

/// Split a comma-separated origin list.
fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
