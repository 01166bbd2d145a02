use std::collections::VecDeque;

use rand::Rng;
use rand::seq::IndexedRandom;

/// Built-in word list used when no custom list is configured.
pub const DEFAULT_WORDS: &[&str] = &[
    "cat", "dog", "house", "tree", "sun", "moon", "star", "book", "chair", "table", "computer",
    "phone", "car", "bike", "flower", "mountain", "river", "ocean", "beach", "cloud",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WordBankError {
    #[error("word list is empty")]
    Empty,
    #[error("word list contains a blank entry")]
    BlankWord,
}

/// Supplies secret words, avoiding the most recently drawn ones.
#[derive(Debug, Clone)]
pub struct WordBank {
    words: Vec<String>,
    recent: VecDeque<String>,
    history: usize,
}

impl WordBank {
    /// Build a bank from `words`, remembering up to `history` recent picks.
    /// History is capped below the list size so a candidate always exists.
    pub fn new(words: Vec<String>, history: usize) -> Result<Self, WordBankError> {
        if words.is_empty() {
            return Err(WordBankError::Empty);
        }
        let words: Vec<String> = words.into_iter().map(|w| w.trim().to_string()).collect();
        if words.iter().any(String::is_empty) {
            return Err(WordBankError::BlankWord);
        }
        let history = history.min(words.len() - 1);
        Ok(Self {
            words,
            recent: VecDeque::with_capacity(history),
            history,
        })
    }

    pub fn with_defaults(history: usize) -> Self {
        let words: Vec<String> = DEFAULT_WORDS.iter().map(|w| w.to_string()).collect();
        let history = history.min(words.len() - 1);
        Self {
            words,
            recent: VecDeque::with_capacity(history),
            history,
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Draw a random word that is not among the recent picks.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> String {
        let candidates: Vec<&String> = self
            .words
            .iter()
            .filter(|w| !self.recent.contains(*w))
            .collect();
        let word = candidates
            .choose(rng)
            .map(|w| (*w).clone())
            .unwrap_or_else(|| self.words[0].clone());

        if self.history > 0 {
            if self.recent.len() == self.history {
                self.recent.pop_front();
            }
            self.recent.push_back(word.clone());
        }
        word
    }
}
