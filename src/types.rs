//! Shared handles and identifiers
//!
//! `ParticipantRef` is how rooms, events and the registry hold on to a
//! participant. `RoomId` separates successive rooms opened under one name.

use std::sync::Arc;

use uuid::Uuid;

use crate::participant::Participant;

/// Shared handle to a participant capability
pub type ParticipantRef = Arc<dyn Participant>;

/// Display color used when a participant does not pick one
pub const DEFAULT_COLOR: &str = "007AFF";

/// Identity of one opening of a room
///
/// A closed room's name can be opened again straight away. Logs carry
/// this id next to the name so a late close of the old room can be told
/// apart from the room that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomId(Uuid);

impl RoomId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
