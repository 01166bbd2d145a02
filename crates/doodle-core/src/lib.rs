pub mod net;
pub mod participant;
pub mod registry;
pub mod room;
pub mod round;
pub mod scoreboard;
pub mod stroke;
pub mod words;

pub use room::{NameError, RoomIdError};

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::room::RoomConfig;
    use crate::stroke::{Point, Stroke};
    use crate::words::WordBank;

    /// Word bank that always yields `word`.
    pub fn fixed_words(word: &str) -> WordBank {
        WordBank::new(vec![word.to_string()], 0)
            .unwrap_or_else(|e| panic!("fixed word bank: {e}"))
    }

    /// A short horizontal segment starting at `x`.
    pub fn make_stroke(x: f64) -> Stroke {
        Stroke {
            from: Point::new(x, 10.0),
            to: Point::new(x + 5.0, 10.0),
            color: "#000000".to_string(),
            size: 3.0,
        }
    }

    /// Room settings with the given round length in seconds.
    pub fn room_config(round_secs: u64) -> RoomConfig {
        RoomConfig {
            round_duration: std::time::Duration::from_secs(round_secs),
            ..RoomConfig::default()
        }
    }
}
