//! Error types for the chat hub
//!
//! Defines caller-facing registry errors, recipient delivery errors and
//! queue send errors. Uses thiserror for ergonomic error definitions.

use std::time::Duration;

use thiserror::Error;

/// Errors returned synchronously to callers of the registry and rooms
///
/// Every variant describes a precondition the caller can react to
/// (pick another name, retry later, register first).
#[derive(Debug, Error)]
pub enum ChatError {
    /// A participant with this name is already registered
    #[error("Name already registered: {0}")]
    DuplicateName(String),

    /// No room capacity became available before the deadline
    #[error("Timed out after {0:?} waiting for room capacity")]
    CapacityTimeout(Duration),

    /// The participant is not registered with the registry
    #[error("Participant not registered: {0}")]
    ParticipantNotFound(String),

    /// The registry was shut down or dropped
    #[error("Registry closed")]
    RegistryClosed,

    /// Constructed outside of a Tokio runtime
    #[error("No Tokio runtime available to run delivery workers")]
    NoRuntime,

    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised by a participant while handling a delivered event
///
/// These never reach the producer of the event. The delivery worker
/// logs and discards them.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The participant's underlying connection is gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// The participant failed to process the event
    #[error("Delivery failed: {0}")]
    Failed(String),
}

/// Delivery queue send errors
///
/// Occurs when enqueueing onto a queue whose worker was stopped.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
