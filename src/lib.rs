//! Multi-room Chat Hub Library
//!
//! The in-process notification core of a multi-room chat service:
//! a registry of participants and rooms with bounded room capacity, and
//! ordered, isolated fan-out of room events to every participant.
//!
//! # Features
//! - Unique participant names, enforced atomically under concurrency
//! - Room admission bounded by a fixed capacity, with timed waiting
//! - Join, leave and message fan-out that skips the acting participant
//! - Per-participant delivery in submission order
//! - Slow or failing participants never hold up anyone else
//!
//! # Architecture
//! - `Registry` owns participants, open rooms and the capacity semaphore
//! - `Room` owns a roster and fans events out to its members
//! - Each participant has one `DeliveryQueue`: an unbounded channel
//!   drained by a single worker task, the only place callbacks run
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use chat_hub::{Participant, ParticipantRef, Registry};
//!
//! struct Bot;
//!
//! impl Participant for Bot {
//!     fn name(&self) -> &str {
//!         "bot"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chat_hub::ChatError> {
//!     let registry = Registry::new(10)?;
//!     let bot: ParticipantRef = Arc::new(Bot);
//!     registry.register_participant(bot.clone())?;
//!
//!     let room = registry.open_room("lobby", Duration::from_secs(5)).await?;
//!     room.add_member(&bot)?;
//!     room.broadcast(&bot, "hello");
//!     room.close();
//!
//!     registry.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod participant;
pub mod registry;
pub mod room;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::RegistryConfig;
pub use delivery::DeliveryQueue;
pub use error::{ChatError, DeliveryError, SendError};
pub use event::Event;
pub use participant::Participant;
pub use registry::Registry;
pub use room::Room;
pub use types::{ParticipantRef, RoomId, DEFAULT_COLOR};
