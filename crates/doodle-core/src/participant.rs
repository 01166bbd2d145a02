/// Room-local identifier for one connection. Display names may collide, ids never do.
pub type ParticipantId = u64;

/// A player connected (or formerly connected) to a Doodle room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub connected: bool,
}

impl Participant {
    pub fn new(id: ParticipantId, display_name: String) -> Self {
        Self {
            id,
            display_name,
            connected: true,
        }
    }
}
