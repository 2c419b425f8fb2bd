//! Participant capability
//!
//! A participant is whatever sits behind a connected user: a socket
//! session, a bot, a test double. The hub only ever talks to it through
//! this trait, and only from the participant's own delivery worker.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::room::Room;
use crate::types::{ParticipantRef, DEFAULT_COLOR};

/// Recipient of room and membership events
///
/// Callbacks for one participant are never invoked concurrently: they
/// run one at a time, in submission order, on that participant's
/// delivery worker. Returning an error (or panicking) only affects the
/// event being handled.
///
/// Every callback defaults to doing nothing, so an adapter implements
/// only the events it cares about.
#[async_trait]
pub trait Participant: Send + Sync + 'static {
    /// Unique name, used as the registry key
    fn name(&self) -> &str;

    /// Display color (hex RGB without `#`)
    fn color(&self) -> &str {
        DEFAULT_COLOR
    }

    /// A room was opened in the registry
    async fn on_room_opened(&self, _room: &Arc<Room>) -> Result<(), DeliveryError> {
        Ok(())
    }

    /// A room was closed in the registry
    async fn on_room_closed(&self, _room: &Arc<Room>) -> Result<(), DeliveryError> {
        Ok(())
    }

    /// Another participant joined a room this participant is in
    async fn on_member_joined(
        &self,
        _room: &Arc<Room>,
        _member: &ParticipantRef,
    ) -> Result<(), DeliveryError> {
        Ok(())
    }

    /// Another participant left a room this participant is in
    async fn on_member_left(
        &self,
        _room: &Arc<Room>,
        _member: &ParticipantRef,
    ) -> Result<(), DeliveryError> {
        Ok(())
    }

    /// Another participant sent a message to a room this participant is in
    async fn on_message(
        &self,
        _room: &Arc<Room>,
        _sender: &ParticipantRef,
        _message: &str,
    ) -> Result<(), DeliveryError> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}
