//! Per-participant delivery queue
//!
//! Each registered participant owns exactly one queue and one worker
//! task. Producers (rooms, the registry) hand events to the queue
//! without waiting; the worker feeds them to the participant one at a
//! time, in the order they were enqueued.
//!
//! # Isolation
//! A callback that returns an error or panics is logged at the worker
//! boundary and dropped. The worker keeps going with the next event and
//! nothing is reported back to the producer.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::error::{DeliveryError, SendError};
use crate::event::Event;
use crate::types::ParticipantRef;

/// Items travelling through a delivery queue
#[derive(Debug)]
enum Envelope {
    /// Hand this event to the participant
    Deliver(Event),
    /// Stop after everything enqueued before this marker
    Stop,
}

/// Producer handle to one participant's delivery queue
///
/// Cheap to clone: every clone feeds the same FIFO and the same worker.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    /// Name of the participant this queue delivers to
    recipient: String,
    /// Producer → worker channel
    sender: mpsc::UnboundedSender<Envelope>,
}

impl DeliveryQueue {
    /// Create a queue for `participant` and spawn its worker on `runtime`
    ///
    /// Returns the producer handle and the worker's join handle. The
    /// worker exits once [`DeliveryQueue::stop`] is drained or every
    /// producer handle is dropped.
    pub fn spawn(participant: ParticipantRef, runtime: &Handle) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            recipient: participant.name().to_string(),
            sender,
        };
        let worker = DeliveryWorker {
            participant,
            receiver,
        };
        let handle = runtime.spawn(worker.run());
        (queue, handle)
    }

    /// Append an event to the queue
    ///
    /// Never blocks. Returns an error only if the worker has been stopped.
    pub fn enqueue(&self, event: Event) -> Result<(), SendError> {
        self.sender
            .send(Envelope::Deliver(event))
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Ask the worker to exit after draining what is already queued
    pub fn stop(&self) {
        if self.sender.send(Envelope::Stop).is_err() {
            trace!("Delivery queue for {} already stopped", self.recipient);
        }
    }

    /// Name of the participant this queue delivers to
    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Check if the worker has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Check if both handles feed the same worker
    pub(crate) fn same_queue(&self, other: &DeliveryQueue) -> bool {
        self.sender.same_channel(&other.sender)
    }
}

/// Consumer side: the single task serving one participant
struct DeliveryWorker {
    participant: ParticipantRef,
    receiver: mpsc::UnboundedReceiver<Envelope>,
}

impl DeliveryWorker {
    /// Run the delivery loop
    ///
    /// Receives until a stop marker arrives or all producers are dropped.
    async fn run(mut self) {
        debug!("Delivery worker started for {}", self.participant.name());

        while let Some(envelope) = self.receiver.recv().await {
            match envelope {
                Envelope::Deliver(event) => self.deliver(event).await,
                Envelope::Stop => break,
            }
        }

        debug!("Delivery worker stopped for {}", self.participant.name());
    }

    /// Deliver one event, containing errors and panics
    async fn deliver(&self, event: Event) {
        let kind = event.kind();
        let room = event.room().name().to_string();

        let outcome = AssertUnwindSafe(self.dispatch(event)).catch_unwind().await;

        match outcome {
            Ok(Ok(())) => {
                trace!(
                    recipient = self.participant.name(),
                    room = %room,
                    event = kind,
                    "Event delivered"
                );
            }
            Ok(Err(e)) => {
                warn!(
                    recipient = self.participant.name(),
                    room = %room,
                    event = kind,
                    error = %e,
                    "Recipient failed to handle event"
                );
            }
            Err(panic) => {
                error!(
                    recipient = self.participant.name(),
                    room = %room,
                    event = kind,
                    panic = %panic_message(&*panic),
                    "Recipient panicked while handling event"
                );
            }
        }
    }

    /// Route an event to the matching participant callback
    async fn dispatch(&self, event: Event) -> Result<(), DeliveryError> {
        match event {
            Event::RoomOpened { room } => self.participant.on_room_opened(&room).await,
            Event::RoomClosed { room } => self.participant.on_room_closed(&room).await,
            Event::MemberJoined { room, member } => {
                self.participant.on_member_joined(&room, &member).await
            }
            Event::MemberLeft { room, member } => {
                self.participant.on_member_left(&room, &member).await
            }
            Event::Message {
                room,
                sender,
                message,
            } => self.participant.on_message(&room, &sender, &message).await,
        }
    }
}

/// Best-effort text of a caught panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::testing::{expect_quiet, next_seen, RecordingParticipant, Seen};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_delivers_in_enqueue_order() {
        let registry = Registry::new(1).unwrap();
        let room = registry
            .open_room("order", Duration::from_secs(1))
            .await
            .unwrap();
        let (recorder, mut rx) = RecordingParticipant::new("reader");
        let (sender, _sender_rx) = RecordingParticipant::new("writer");
        let sender: ParticipantRef = sender;

        let (queue, _worker) = DeliveryQueue::spawn(recorder, &Handle::current());
        for i in 0..20 {
            queue
                .enqueue(Event::Message {
                    room: room.clone(),
                    sender: sender.clone(),
                    message: Arc::from(i.to_string()),
                })
                .unwrap();
        }

        for i in 0..20 {
            assert_eq!(next_seen(&mut rx).await, Seen::message("order", "writer", &i.to_string()));
        }
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_worker() {
        let registry = Registry::new(1).unwrap();
        let room = registry
            .open_room("faulty", Duration::from_secs(1))
            .await
            .unwrap();
        let (recorder, mut rx) = RecordingParticipant::builder("flaky").failing().build();
        let (queue, _worker) = DeliveryQueue::spawn(recorder, &Handle::current());

        queue.enqueue(Event::RoomOpened { room: room.clone() }).unwrap();
        queue.enqueue(Event::RoomClosed { room: room.clone() }).unwrap();

        // The recorder records before failing, so both attempts show up
        assert_eq!(next_seen(&mut rx).await, Seen::RoomOpened("faulty".into()));
        assert_eq!(next_seen(&mut rx).await, Seen::RoomClosed("faulty".into()));
    }

    #[tokio::test]
    async fn test_panics_do_not_stop_worker() {
        let registry = Registry::new(1).unwrap();
        let room = registry
            .open_room("panicky", Duration::from_secs(1))
            .await
            .unwrap();
        let (recorder, mut rx) = RecordingParticipant::builder("boom").panicking().build();
        let (queue, worker) = DeliveryQueue::spawn(recorder, &Handle::current());

        queue.enqueue(Event::RoomOpened { room: room.clone() }).unwrap();
        queue.enqueue(Event::RoomClosed { room: room.clone() }).unwrap();

        assert_eq!(next_seen(&mut rx).await, Seen::RoomOpened("panicky".into()));
        assert_eq!(next_seen(&mut rx).await, Seen::RoomClosed("panicky".into()));
        assert!(!worker.is_finished());
    }

    #[tokio::test]
    async fn test_stop_drains_then_rejects() {
        let registry = Registry::new(1).unwrap();
        let room = registry
            .open_room("drain", Duration::from_secs(1))
            .await
            .unwrap();
        let (recorder, mut rx) = RecordingParticipant::new("drainer");
        let (queue, worker) = DeliveryQueue::spawn(recorder, &Handle::current());
        assert_eq!(queue.recipient(), "drainer");

        queue.enqueue(Event::RoomOpened { room: room.clone() }).unwrap();
        queue.stop();

        assert_eq!(next_seen(&mut rx).await, Seen::RoomOpened("drain".into()));
        tokio::time::timeout(Duration::from_secs(2), worker)
            .await
            .unwrap()
            .unwrap();

        assert!(queue.is_closed());
        assert!(matches!(
            queue.enqueue(Event::RoomClosed { room }),
            Err(SendError::ChannelClosed)
        ));
        expect_quiet(&mut rx, Duration::from_millis(50)).await;
    }

    #[test]
    fn test_panic_message_extraction() {
        let from_str: Box<dyn Any + Send> = Box::new("static message");
        let from_string: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let other: Box<dyn Any + Send> = Box::new(42_u32);

        assert_eq!(panic_message(&*from_str), "static message");
        assert_eq!(panic_message(&*from_string), "owned message");
        assert_eq!(panic_message(&*other), "unknown panic");
    }
}
