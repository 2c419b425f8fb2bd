//! Deliverable event definitions
//!
//! Every notification the hub fans out to a participant is one `Event`.
//! Delivery queues carry events and their worker dispatches each one
//! to the matching participant callback.

use std::sync::Arc;

use crate::room::Room;
use crate::types::ParticipantRef;

/// Hub → participant notification
#[derive(Debug, Clone)]
pub enum Event {
    /// A new room was opened
    RoomOpened { room: Arc<Room> },
    /// A room was closed
    RoomClosed { room: Arc<Room> },
    /// Someone joined a room the recipient is in
    MemberJoined {
        room: Arc<Room>,
        member: ParticipantRef,
    },
    /// Someone left a room the recipient is in
    MemberLeft {
        room: Arc<Room>,
        member: ParticipantRef,
    },
    /// Chat message posted to a room the recipient is in
    Message {
        room: Arc<Room>,
        sender: ParticipantRef,
        message: Arc<str>,
    },
}

impl Event {
    /// Short name of the event kind, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Event::RoomOpened { .. } => "room_opened",
            Event::RoomClosed { .. } => "room_closed",
            Event::MemberJoined { .. } => "member_joined",
            Event::MemberLeft { .. } => "member_left",
            Event::Message { .. } => "message",
        }
    }

    /// The room this event concerns
    pub fn room(&self) -> &Arc<Room> {
        match self {
            Event::RoomOpened { room }
            | Event::RoomClosed { room }
            | Event::MemberJoined { room, .. }
            | Event::MemberLeft { room, .. }
            | Event::Message { room, .. } => room,
        }
    }
}
