//! Registry implementation
//!
//! The single source of truth for participant names, open rooms and
//! room capacity.
//!
//! # Concurrency
//! - `participants` and `rooms` are sharded concurrent maps. Name checks
//!   use the map's entry API, so check-and-insert is atomic per name and
//!   there is no registry-wide lock.
//! - Room capacity is a semaphore with `max_rooms` permits. An open room
//!   owns one permit until it is closed.
//! - Only [`Registry::open_room`] waits, and only for capacity.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::delivery::DeliveryQueue;
use crate::error::ChatError;
use crate::event::Event;
use crate::room::{Member, Room};
use crate::types::ParticipantRef;

/// A registered participant and its delivery machinery
struct Registration {
    participant: ParticipantRef,
    queue: DeliveryQueue,
    worker: JoinHandle<()>,
}

/// State shared by the registry handle and its rooms
pub(crate) struct Shared {
    /// All registered participants: name -> registration
    participants: DashMap<String, Registration>,
    /// All open rooms: name -> room
    rooms: DashMap<String, Arc<Room>>,
    /// Room admission tokens
    capacity: Arc<Semaphore>,
    /// Construction parameters
    config: RegistryConfig,
    /// Runtime the delivery workers are spawned on
    runtime: Handle,
}

impl Shared {
    /// Look up the roster entry for a registered participant
    pub(crate) fn member(&self, name: &str) -> Option<Member> {
        self.participants.get(name).map(|registration| Member {
            participant: registration.participant.clone(),
            queue: registration.queue.clone(),
        })
    }

    /// Remove `room` if it is still the open room under its name
    ///
    /// Notifies every participant and returns the room's capacity token.
    /// A stale or repeated close does nothing.
    pub(crate) fn close_room(&self, room: &Arc<Room>) {
        let closed = match self.rooms.entry(room.name().to_string()) {
            Entry::Occupied(current) if Arc::ptr_eq(current.get(), room) => {
                // Queue while the slot is still held so a reopen of the same
                // name is always seen after this close.
                self.notify_all(|| Event::RoomClosed {
                    room: Arc::clone(room),
                });
                current.remove();
                true
            }
            _ => false,
        };

        if !closed {
            debug!("Ignoring close of room {} ({}): not open", room.name(), room.id());
            return;
        }

        if room.release_capacity() {
            info!("Room {} ({}) closed", room.name(), room.id());
        }
        debug!(
            "Open rooms: {}, Available capacity: {}",
            self.rooms.len(),
            self.capacity.available_permits()
        );
    }

    /// Queue an event for every registered participant
    fn notify_all(&self, make_event: impl Fn() -> Event) {
        for registration in self.participants.iter() {
            if registration.queue.enqueue(make_event()).is_err() {
                debug!(
                    "Dropping event for {}: delivery queue stopped",
                    registration.key()
                );
            }
        }
    }
}

/// Handle to the chat registry
///
/// Cheap to clone; all clones share the same state. Delivery workers run
/// on the Tokio runtime the registry was created in.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

impl Registry {
    /// Create a registry admitting at most `max_rooms` open rooms
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidConfig`] if `max_rooms` is zero, or
    /// [`ChatError::NoRuntime`] when called outside a Tokio runtime.
    pub fn new(max_rooms: usize) -> Result<Self, ChatError> {
        Self::with_config(RegistryConfig {
            max_rooms,
            ..RegistryConfig::default()
        })
    }

    /// Create a registry from a configuration, on the current runtime
    ///
    /// # Errors
    ///
    /// Same as [`Registry::new`].
    pub fn with_config(config: RegistryConfig) -> Result<Self, ChatError> {
        let runtime = Handle::try_current().map_err(|_| ChatError::NoRuntime)?;
        Self::with_handle(config, runtime)
    }

    /// Create a registry whose delivery workers run on `runtime`
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::InvalidConfig`] if the configuration is invalid.
    pub fn with_handle(config: RegistryConfig, runtime: Handle) -> Result<Self, ChatError> {
        config.validate()?;
        info!("Registry created with capacity for {} rooms", config.max_rooms);

        Ok(Self {
            shared: Arc::new(Shared {
                participants: DashMap::new(),
                rooms: DashMap::new(),
                capacity: Arc::new(Semaphore::new(config.max_rooms)),
                config,
                runtime,
            }),
        })
    }

    /// Register a participant and start its delivery worker
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::DuplicateName`] if the name is taken. Of many
    /// concurrent registrations with one name, exactly one succeeds.
    /// Returns [`ChatError::RegistryClosed`] once shutdown has started.
    pub fn register_participant(&self, participant: ParticipantRef) -> Result<(), ChatError> {
        let name = participant.name().to_string();

        match self.shared.participants.entry(name.clone()) {
            Entry::Occupied(_) => {
                debug!("Rejected duplicate participant name '{}'", name);
                Err(ChatError::DuplicateName(name))
            }
            Entry::Vacant(slot) => {
                // Checked with the slot held, so shutdown either sees this
                // entry or we see the closed semaphore
                if self.shared.capacity.is_closed() {
                    debug!("Rejected participant '{}': registry shut down", name);
                    return Err(ChatError::RegistryClosed);
                }
                let (queue, worker) =
                    DeliveryQueue::spawn(participant.clone(), &self.shared.runtime);
                slot.insert(Registration {
                    participant,
                    queue,
                    worker,
                });
                info!("Participant '{}' registered", name);
                Ok(())
            }
        }
    }

    /// Unregister a participant and stop its delivery worker
    ///
    /// The participant is removed from every open room (remaining members
    /// are told it left). Events already queued for it are still delivered
    /// before the worker stops. The name becomes available again.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::ParticipantNotFound`] if no participant has
    /// this name.
    pub fn unregister_participant(&self, name: &str) -> Result<ParticipantRef, ChatError> {
        let (_, registration) = self
            .shared
            .participants
            .remove(name)
            .ok_or_else(|| ChatError::ParticipantNotFound(name.to_string()))?;

        for room in self.rooms() {
            room.remove_member(&registration.participant);
        }
        registration.queue.stop();

        info!("Participant '{}' unregistered", name);
        Ok(registration.participant)
    }

    /// Open a room, or return the open room with this name
    ///
    /// Waits up to `timeout` for a capacity token first. If a room with
    /// this name is already open, the token is handed straight back and
    /// the existing room is returned. A newly created room is announced
    /// to every registered participant.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::CapacityTimeout`] if no token frees up in time,
    /// or [`ChatError::RegistryClosed`] after [`Registry::shutdown`].
    pub async fn open_room(
        &self,
        name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Arc<Room>, ChatError> {
        let name = name.into();
        let acquire = Arc::clone(&self.shared.capacity).acquire_owned();

        let permit = match tokio::time::timeout(timeout, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(ChatError::RegistryClosed),
            Err(_) => {
                warn!("Timed out after {:?} waiting to open room '{}'", timeout, name);
                return Err(ChatError::CapacityTimeout(timeout));
            }
        };

        match self.shared.rooms.entry(name.clone()) {
            Entry::Occupied(existing) => {
                // No room was created, so the token goes straight back
                drop(permit);
                debug!("Room '{}' already open, reusing it", name);
                Ok(Arc::clone(existing.get()))
            }
            Entry::Vacant(slot) => {
                let room = Arc::new(Room::new(name, Arc::downgrade(&self.shared), permit));
                let entry = slot.insert(Arc::clone(&room));

                // Announce while the slot is held so a close of this room
                // is always seen after its open.
                self.shared.notify_all(|| Event::RoomOpened {
                    room: Arc::clone(&room),
                });
                drop(entry);

                info!("Room '{}' ({}) opened", room.name(), room.id());
                Ok(room)
            }
        }
    }

    /// Close `room` if it is still open
    ///
    /// Every registered participant is notified and one capacity token is
    /// returned. Closing a stale or already closed room does nothing.
    pub fn close_room(&self, room: &Arc<Room>) {
        self.shared.close_room(room);
    }

    /// Stop admitting rooms and stop every delivery worker
    ///
    /// Pending and later [`Registry::open_room`] calls fail with
    /// [`ChatError::RegistryClosed`]. Waits for each worker to drain the
    /// events already queued for it.
    pub async fn shutdown(&self) {
        self.shared.capacity.close();

        let names: Vec<String> = self
            .shared
            .participants
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut workers = Vec::with_capacity(names.len());
        for name in names {
            if let Some((_, registration)) = self.shared.participants.remove(&name) {
                registration.queue.stop();
                workers.push((name, registration.worker));
            }
        }

        for (name, worker) in workers {
            if let Err(e) = worker.await {
                warn!("Delivery worker for '{}' ended abnormally: {}", name, e);
            }
        }

        info!("Registry shut down");
    }

    /// Get an open room by name
    pub fn room(&self, name: &str) -> Option<Arc<Room>> {
        self.shared.rooms.get(name).map(|room| Arc::clone(room.value()))
    }

    /// Get a registered participant by name
    pub fn participant(&self, name: &str) -> Option<ParticipantRef> {
        self.shared
            .participants
            .get(name)
            .map(|registration| registration.participant.clone())
    }

    /// Snapshot of all open rooms
    pub fn rooms(&self) -> Vec<Arc<Room>> {
        self.shared
            .rooms
            .iter()
            .map(|room| Arc::clone(room.value()))
            .collect()
    }

    /// Snapshot of all registered participants
    pub fn participants(&self) -> Vec<ParticipantRef> {
        self.shared
            .participants
            .iter()
            .map(|registration| registration.participant.clone())
            .collect()
    }

    /// Number of open rooms
    pub fn open_room_count(&self) -> usize {
        self.shared.rooms.len()
    }

    /// Number of rooms that can still be opened without waiting
    pub fn available_capacity(&self) -> usize {
        self.shared.capacity.available_permits()
    }

    /// Maximum number of simultaneously open rooms
    pub fn max_rooms(&self) -> usize {
        self.shared.config.max_rooms
    }

    /// Configuration this registry was built with
    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("participants", &self.shared.participants.len())
            .field("rooms", &self.shared.rooms.len())
            .field("max_rooms", &self.shared.config.max_rooms)
            .field("available", &self.shared.capacity.available_permits())
            .finish()
    }
}
