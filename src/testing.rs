//! Test doubles
//!
//! `RecordingParticipant` reports every callback it receives on a channel
//! so tests can await deliveries instead of sleeping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::DeliveryError;
use crate::participant::Participant;
use crate::room::Room;
use crate::types::ParticipantRef;

/// How long to wait for an expected delivery
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// A callback as observed by a recording participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Seen {
    RoomOpened(String),
    RoomClosed(String),
    Joined {
        room: String,
        member: String,
    },
    Left {
        room: String,
        member: String,
    },
    Message {
        room: String,
        sender: String,
        message: String,
    },
}

impl Seen {
    pub(crate) fn joined(room: &str, member: &str) -> Self {
        Seen::Joined {
            room: room.to_string(),
            member: member.to_string(),
        }
    }

    pub(crate) fn left(room: &str, member: &str) -> Self {
        Seen::Left {
            room: room.to_string(),
            member: member.to_string(),
        }
    }

    pub(crate) fn message(room: &str, sender: &str, message: &str) -> Self {
        Seen::Message {
            room: room.to_string(),
            sender: sender.to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Fail,
    Panic,
}

/// Participant that records each callback, optionally slowly or faultily
///
/// The callback is recorded first; the configured fault happens after.
pub(crate) struct RecordingParticipant {
    name: String,
    seen: mpsc::UnboundedSender<Seen>,
    delay: Option<Duration>,
    fault: Option<Fault>,
}

impl RecordingParticipant {
    /// Well-behaved recorder
    pub(crate) fn new(name: impl Into<String>) -> (Arc<Self>, mpsc::UnboundedReceiver<Seen>) {
        Self::builder(name).build()
    }

    pub(crate) fn builder(name: impl Into<String>) -> RecordingParticipantBuilder {
        RecordingParticipantBuilder {
            name: name.into(),
            delay: None,
            fault: None,
        }
    }

    async fn record(&self, seen: Seen) -> Result<(), DeliveryError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let _ = self.seen.send(seen);

        match self.fault {
            None => Ok(()),
            Some(Fault::Fail) => Err(DeliveryError::Failed(format!("{} is unreachable", self.name))),
            Some(Fault::Panic) => panic!("{} crashed", self.name),
        }
    }
}

pub(crate) struct RecordingParticipantBuilder {
    name: String,
    delay: Option<Duration>,
    fault: Option<Fault>,
}

impl RecordingParticipantBuilder {
    /// Sleep this long inside every callback
    pub(crate) fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Return an error from every callback
    pub(crate) fn failing(mut self) -> Self {
        self.fault = Some(Fault::Fail);
        self
    }

    /// Panic in every callback
    pub(crate) fn panicking(mut self) -> Self {
        self.fault = Some(Fault::Panic);
        self
    }

    pub(crate) fn build(self) -> (Arc<RecordingParticipant>, mpsc::UnboundedReceiver<Seen>) {
        let (seen, receiver) = mpsc::unbounded_channel();
        let participant = RecordingParticipant {
            name: self.name,
            seen,
            delay: self.delay,
            fault: self.fault,
        };
        (Arc::new(participant), receiver)
    }
}

#[async_trait]
impl Participant for RecordingParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_room_opened(&self, room: &Arc<Room>) -> Result<(), DeliveryError> {
        self.record(Seen::RoomOpened(room.name().to_string())).await
    }

    async fn on_room_closed(&self, room: &Arc<Room>) -> Result<(), DeliveryError> {
        self.record(Seen::RoomClosed(room.name().to_string())).await
    }

    async fn on_member_joined(
        &self,
        room: &Arc<Room>,
        member: &ParticipantRef,
    ) -> Result<(), DeliveryError> {
        self.record(Seen::joined(room.name(), member.name())).await
    }

    async fn on_member_left(
        &self,
        room: &Arc<Room>,
        member: &ParticipantRef,
    ) -> Result<(), DeliveryError> {
        self.record(Seen::left(room.name(), member.name())).await
    }

    async fn on_message(
        &self,
        room: &Arc<Room>,
        sender: &ParticipantRef,
        message: &str,
    ) -> Result<(), DeliveryError> {
        self.record(Seen::message(room.name(), sender.name(), message))
            .await
    }
}

/// Await the next recorded callback, failing the test on timeout
pub(crate) async fn next_seen(receiver: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    match tokio::time::timeout(DELIVERY_TIMEOUT, receiver.recv()).await {
        Ok(Some(seen)) => seen,
        Ok(None) => panic!("recording participant dropped"),
        Err(_) => panic!("timed out waiting for a delivery"),
    }
}

/// Await the next `count` recorded callbacks, in order
pub(crate) async fn collect_seen(
    receiver: &mut mpsc::UnboundedReceiver<Seen>,
    count: usize,
) -> Vec<Seen> {
    let mut seen = Vec::with_capacity(count);
    for _ in 0..count {
        seen.push(next_seen(receiver).await);
    }
    seen
}

/// Fail the test if anything is recorded within `window`
pub(crate) async fn expect_quiet(receiver: &mut mpsc::UnboundedReceiver<Seen>, window: Duration) {
    if let Ok(Some(seen)) = tokio::time::timeout(window, receiver.recv()).await {
        panic!("unexpected delivery: {:?}", seen);
    }
}
