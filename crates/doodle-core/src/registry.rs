use crate::participant::{Participant, ParticipantId};

/// Tracks everyone who has joined a room, in join order.
///
/// Entries are never removed: a disconnect only flips `connected`, so the join
/// order used for drawer rotation stays stable for the lifetime of the room.
#[derive(Debug, Clone)]
pub struct Registry {
    participants: Vec<Participant>,
    next_id: ParticipantId,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            participants: Vec::new(),
            next_id: 1,
        }
    }

    /// Register a new connection. Same-name joins produce distinct entries.
    pub fn join(&mut self, display_name: String) -> ParticipantId {
        let id = self.next_id;
        self.next_id += 1;
        self.participants.push(Participant::new(id, display_name));
        id
    }

    /// `requested` if no connected participant goes by it, otherwise the
    /// first free `"{requested} ({n})"` counting from 2. Names double as
    /// scoreboard keys, so two live players never share one.
    pub fn unique_name(&self, requested: &str) -> String {
        let taken = |name: &str| self.connected().any(|p| p.display_name == name);
        if !taken(requested) {
            return requested.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{requested} ({n})");
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Mark a participant as gone. Returns the entry only if it was connected,
    /// so a repeated disconnect is a no-op.
    pub fn mark_gone(&mut self, id: ParticipantId) -> Option<&Participant> {
        let participant = self
            .participants
            .iter_mut()
            .find(|p| p.id == id && p.connected)?;
        participant.connected = false;
        Some(participant)
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    pub fn name_of(&self, id: ParticipantId) -> Option<&str> {
        self.get(id).map(|p| p.display_name.as_str())
    }

    pub fn is_connected(&self, id: ParticipantId) -> bool {
        self.get(id).is_some_and(|p| p.connected)
    }

    pub fn connected(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.connected)
    }

    pub fn connected_count(&self) -> usize {
        self.connected().count()
    }

    /// Every entry ever registered, in join order.
    pub fn all(&self) -> &[Participant] {
        &self.participants
    }

    /// Pick the drawer for the next round.
    ///
    /// With no previous drawer the requester draws. Otherwise walk forward in
    /// join order from the previous drawer (wrapping, and finally considering
    /// the previous drawer again) and take the first connected participant.
    pub fn next_drawer(
        &self,
        previous: Option<ParticipantId>,
        requester: ParticipantId,
    ) -> Option<ParticipantId> {
        let Some(previous) = previous else {
            return self.is_connected(requester).then_some(requester);
        };

        let Some(start) = self.participants.iter().position(|p| p.id == previous) else {
            return self.is_connected(requester).then_some(requester);
        };

        let len = self.participants.len();
        (1..=len)
            .map(|offset| &self.participants[(start + offset) % len])
            .find(|p| p.connected)
            .map(|p| p.id)
    }
}
