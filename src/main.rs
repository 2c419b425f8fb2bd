//! Chat Hub - Demo Entry Point
//!
//! Builds a registry from the environment, registers console-logging
//! participants and walks them through one room's lifecycle.
//!
//! Usage: `chat_hub [NAME...]` (defaults to alice, bob and carol)

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_hub::{DeliveryError, Participant, ParticipantRef, Registry, RegistryConfig, Room};

/// Default participants when none are given on the command line
const DEFAULT_NAMES: [&str; 3] = ["alice", "bob", "carol"];

/// Name of the demo room
const LOBBY: &str = "lobby";

/// Participant that logs every event it receives
struct ConsoleParticipant {
    name: String,
}

#[async_trait]
impl Participant for ConsoleParticipant {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_room_opened(&self, room: &Arc<Room>) -> Result<(), DeliveryError> {
        info!("[{}] room '{}' opened", self.name, room.name());
        Ok(())
    }

    async fn on_room_closed(&self, room: &Arc<Room>) -> Result<(), DeliveryError> {
        info!("[{}] room '{}' closed", self.name, room.name());
        Ok(())
    }

    async fn on_member_joined(
        &self,
        room: &Arc<Room>,
        member: &ParticipantRef,
    ) -> Result<(), DeliveryError> {
        info!("[{}] {} joined '{}'", self.name, member.name(), room.name());
        Ok(())
    }

    async fn on_member_left(
        &self,
        room: &Arc<Room>,
        member: &ParticipantRef,
    ) -> Result<(), DeliveryError> {
        info!("[{}] {} left '{}'", self.name, member.name(), room.name());
        Ok(())
    }

    async fn on_message(
        &self,
        room: &Arc<Room>,
        sender: &ParticipantRef,
        message: &str,
    ) -> Result<(), DeliveryError> {
        info!(
            "[{}] {}@{}: {}",
            self.name,
            sender.name(),
            room.name(),
            message
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_hub=info")),
        )
        .init();

    let config = RegistryConfig::from_env()?;
    let open_timeout = config.open_timeout;
    let registry = Registry::with_config(config)?;

    // Participant names from the command line, or the defaults
    let mut names: Vec<String> = env::args().skip(1).collect();
    if names.is_empty() {
        names = DEFAULT_NAMES.iter().map(|n| n.to_string()).collect();
    }

    let mut participants: Vec<ParticipantRef> = Vec::with_capacity(names.len());
    for name in names {
        let participant: ParticipantRef = Arc::new(ConsoleParticipant { name });
        registry.register_participant(participant.clone())?;
        participants.push(participant);
    }

    let room = registry.open_room(LOBBY, open_timeout).await?;
    for participant in &participants {
        room.add_member(participant)?;
    }

    for (i, participant) in participants.iter().enumerate() {
        room.broadcast(participant, format!("hello #{}", i));
    }

    if let Some(first) = participants.first() {
        room.remove_member(first);
    }
    room.close();

    registry.shutdown().await;
    info!("Demo finished");

    Ok(())
}
