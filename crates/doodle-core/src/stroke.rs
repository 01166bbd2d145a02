use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::participant::ParticipantId;

pub const MAX_COLOR_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One line segment of the drawer's input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub from: Point,
    pub to: Point,
    pub color: String,
    pub size: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrokeError {
    #[error("stroke coordinates must be finite")]
    NonFiniteCoordinate,
    #[error("stroke size must be positive")]
    InvalidSize,
    #[error("stroke color is empty or too long")]
    InvalidColor,
}

impl Stroke {
    /// Coordinates are relayed as-is; only values no renderer can use are refused.
    pub fn validate(&self) -> Result<(), StrokeError> {
        if !self.from.is_finite() || !self.to.is_finite() {
            return Err(StrokeError::NonFiniteCoordinate);
        }
        if !self.size.is_finite() || self.size <= 0.0 {
            return Err(StrokeError::InvalidSize);
        }
        if self.color.is_empty() || self.color.len() > MAX_COLOR_LEN {
            return Err(StrokeError::InvalidColor);
        }
        Ok(())
    }
}

/// Gatekeeper and replay log for canvas events.
///
/// Only the current drawer's events pass. Accepted strokes are kept since the
/// last clear so a participant joining mid-round sees the same canvas.
#[derive(Debug, Clone)]
pub struct StrokeRelay {
    log: VecDeque<Stroke>,
    limit: usize,
}

impl StrokeRelay {
    pub fn new(limit: usize) -> Self {
        Self {
            log: VecDeque::new(),
            limit,
        }
    }

    /// Accept a stroke from `from` if they are the drawer. Returns the stroke
    /// to forward, or `None` when it should be silently dropped.
    pub fn relay_stroke(
        &mut self,
        from: ParticipantId,
        drawer: Option<ParticipantId>,
        stroke: Stroke,
    ) -> Option<Stroke> {
        if drawer != Some(from) {
            return None;
        }
        if self.limit > 0 {
            if self.log.len() == self.limit {
                self.log.pop_front();
            }
            self.log.push_back(stroke.clone());
        }
        Some(stroke)
    }

    /// Accept a canvas clear from the drawer, resetting the replay log.
    pub fn relay_clear(&mut self, from: ParticipantId, drawer: Option<ParticipantId>) -> bool {
        if drawer != Some(from) {
            return false;
        }
        self.log.clear();
        true
    }

    pub fn clear(&mut self) {
        self.log.clear();
    }

    /// Strokes since the last clear, oldest first.
    pub fn replay(&self) -> impl Iterator<Item = &Stroke> {
        self.log.iter()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}
