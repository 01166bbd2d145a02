use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Accumulated points per display name for the lifetime of a room.
///
/// Serializes as a plain `{ "name": points }` object. Entries are only ever
/// added or increased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scoreboard {
    scores: BTreeMap<String, u32>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `name` has an entry, starting at zero.
    pub fn ensure(&mut self, name: &str) {
        if !self.scores.contains_key(name) {
            self.scores.insert(name.to_string(), 0);
        }
    }

    /// Add points and return the new total.
    pub fn award(&mut self, name: &str, points: u32) -> u32 {
        let entry = self.scores.entry(name.to_string()).or_insert(0);
        *entry = entry.saturating_add(points);
        *entry
    }

    pub fn get(&self, name: &str) -> u32 {
        self.scores.get(name).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.scores.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_starts_at_zero_and_keeps_existing() {
        let mut board = Scoreboard::new();
        board.ensure("Bob");
        assert_eq!(board.get("Bob"), 0);
        board.award("Bob", 7);
        board.ensure("Bob");
        assert_eq!(board.get("Bob"), 7);
    }

    #[test]
    fn award_accumulates() {
        let mut board = Scoreboard::new();
        assert_eq!(board.award("Bob", 4), 4);
        assert_eq!(board.award("Bob", 6), 10);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn award_saturates_instead_of_wrapping() {
        let mut board = Scoreboard::new();
        board.award("Bob", u32::MAX);
        assert_eq!(board.award("Bob", 5), u32::MAX);
    }

    #[test]
    fn serializes_as_flat_map() {
        let mut board = Scoreboard::new();
        board.award("Bob", 9);
        board.ensure("Alice");
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(json, r#"{"Alice":0,"Bob":9}"#);
    }
}
