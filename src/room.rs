//! Room struct definition
//!
//! Represents one named chat room: a roster of participants plus the
//! capacity token the room holds while it is open.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

use crate::delivery::DeliveryQueue;
use crate::error::ChatError;
use crate::event::Event;
use crate::registry::Shared;
use crate::types::{ParticipantRef, RoomId};

/// Roster entry: a participant and the queue that feeds it
#[derive(Debug, Clone)]
pub(crate) struct Member {
    pub(crate) participant: ParticipantRef,
    pub(crate) queue: DeliveryQueue,
}

/// Multi-participant chat room
///
/// Rooms are created by [`Registry::open_room`](crate::Registry::open_room)
/// and shared as `Arc<Room>`. The roster is a concurrent map, so joins,
/// leaves and broadcasts from different threads never block each other
/// for longer than one shard access. Broadcasts work on a snapshot of the
/// roster taken at call time.
pub struct Room {
    /// Instance identifier
    id: RoomId,
    /// Room name, unique among open rooms
    name: String,
    /// Current members keyed by participant name
    members: DashMap<String, Member>,
    /// Owning registry
    registry: Weak<Shared>,
    /// Capacity token, held while the room is open
    permit: Mutex<Option<OwnedSemaphorePermit>>,
    /// Room creation time
    created_at: Instant,
}

impl Room {
    /// Create a new, empty room holding one capacity token
    pub(crate) fn new(name: String, registry: Weak<Shared>, permit: OwnedSemaphorePermit) -> Self {
        Self {
            id: RoomId::new(),
            name,
            members: DashMap::new(),
            registry,
            permit: Mutex::new(Some(permit)),
            created_at: Instant::now(),
        }
    }

    /// Room name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance identifier of this room
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Room creation time
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Check if the room still holds its capacity token
    pub fn is_open(&self) -> bool {
        self.permit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Add a registered participant to the roster
    ///
    /// Replaces any member with the same name. Every other member is
    /// notified that `participant` joined; the participant itself is not.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ParticipantNotFound`] if the participant is not
    /// registered, or [`ChatError::RegistryClosed`] if the registry is gone.
    pub fn add_member(self: &Arc<Self>, participant: &ParticipantRef) -> Result<(), ChatError> {
        let registry = self.registry.upgrade().ok_or(ChatError::RegistryClosed)?;
        let name = participant.name().to_string();
        let member = registry
            .member(&name)
            .ok_or_else(|| ChatError::ParticipantNotFound(name.clone()))?;

        self.insert_member(&registry, member)
    }

    /// Insert a member taken from the registry and announce it
    ///
    /// If the participant was unregistered between the lookup and the
    /// insert, the entry is taken back out and nobody is notified.
    pub(crate) fn insert_member(
        self: &Arc<Self>,
        registry: &Shared,
        member: Member,
    ) -> Result<(), ChatError> {
        let name = member.participant.name().to_string();
        let joined = member.participant.clone();
        let queue = member.queue.clone();
        let previous = self.members.insert(name.clone(), member);

        let is_current = |queue: &DeliveryQueue| {
            registry
                .member(&name)
                .is_some_and(|current| current.queue.same_queue(queue))
        };
        if !is_current(&queue) {
            self.members
                .remove_if(&name, |_, entry| entry.queue.same_queue(&queue));
            // Put back an entry of a newer registration we displaced
            if let Some(previous) = previous.filter(|previous| is_current(&previous.queue)) {
                self.members.entry(name.clone()).or_insert(previous);
            }
            debug!("{} was unregistered while joining room {}", name, self.name);
            return Err(ChatError::ParticipantNotFound(name));
        }
        debug!("{} joined room {}", name, self.name);

        for other in self.members_except(&name) {
            self.notify(
                &other,
                Event::MemberJoined {
                    room: Arc::clone(self),
                    member: joined.clone(),
                },
            );
        }

        Ok(())
    }

    /// Remove a participant from the roster
    ///
    /// Every remaining member is notified that `participant` left; the
    /// participant itself is not. Removing a non-member does nothing.
    pub fn remove_member(self: &Arc<Self>, participant: &ParticipantRef) {
        let Some((name, removed)) = self.members.remove(participant.name()) else {
            return;
        };
        debug!("{} left room {}", name, self.name);

        for other in self.members_except(&name) {
            self.notify(
                &other,
                Event::MemberLeft {
                    room: Arc::clone(self),
                    member: removed.participant.clone(),
                },
            );
        }
    }

    /// Send a message to every member except the sender
    ///
    /// Returns once every event is queued, without waiting for delivery.
    /// Recipient failures are contained in the recipient's own worker.
    /// Returns the number of members the message was queued for.
    pub fn broadcast(
        self: &Arc<Self>,
        sender: &ParticipantRef,
        message: impl Into<Arc<str>>,
    ) -> usize {
        let message = message.into();
        let recipients = self.members_except(sender.name());

        debug!(
            room = %self.name,
            sender = sender.name(),
            recipients = recipients.len(),
            "Broadcasting message"
        );

        for recipient in &recipients {
            self.notify(
                recipient,
                Event::Message {
                    room: Arc::clone(self),
                    sender: sender.clone(),
                    message: message.clone(),
                },
            );
        }

        recipients.len()
    }

    /// Close the room through the owning registry
    ///
    /// Closing an already closed room does nothing.
    pub fn close(self: &Arc<Self>) {
        match self.registry.upgrade() {
            Some(registry) => registry.close_room(self),
            None => debug!("Room {} outlived its registry, nothing to close", self.name),
        }
    }

    /// Snapshot of the current members
    pub fn members(&self) -> Vec<ParticipantRef> {
        self.members
            .iter()
            .map(|entry| entry.value().participant.clone())
            .collect()
    }

    /// Look up a member by name
    pub fn member(&self, name: &str) -> Option<ParticipantRef> {
        self.members
            .get(name)
            .map(|entry| entry.value().participant.clone())
    }

    /// Check if a participant with this name is in the room
    pub fn contains(&self, name: &str) -> bool {
        self.members.contains_key(name)
    }

    /// Get the number of members in the room
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Give the capacity token back
    ///
    /// Returns true the first time only.
    pub(crate) fn release_capacity(&self) -> bool {
        self.permit
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    /// Helper: snapshot every member except `name`
    fn members_except(&self, name: &str) -> Vec<Member> {
        self.members
            .iter()
            .filter(|entry| entry.key() != name)
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Helper: queue one event for one member
    fn notify(&self, member: &Member, event: Event) {
        if member.queue.enqueue(event).is_err() {
            debug!(
                "Dropping event for {} in room {}: delivery queue stopped",
                member.queue.recipient(),
                self.name
            );
        }
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("members", &self.members.len())
            .field("open", &self.is_open())
            .finish()
    }
}
